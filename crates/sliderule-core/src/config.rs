//! Process-wide configuration surface (spec §6.4): `standard_queue_depth`,
//! `io_timeout_ms`, `io_maxsize`. Each resolves once from an environment
//! variable into an atomically-cached value, the same non-blocking
//! resolve-once-and-cache shape `sliderule-membrane`'s teacher crate uses for
//! its own runtime mode (an `AtomicU64` sentinel standing in for "not yet
//! resolved" rather than a `OnceLock`, so a reentrant read during resolution
//! never blocks).

use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel meaning "not yet resolved from the environment".
const UNRESOLVED: u64 = u64::MAX;

static STANDARD_QUEUE_DEPTH: AtomicU64 = AtomicU64::new(UNRESOLVED);
static IO_TIMEOUT_MS: AtomicU64 = AtomicU64::new(UNRESOLVED);
static IO_MAXSIZE: AtomicU64 = AtomicU64::new(UNRESOLVED);

const DEFAULT_STANDARD_QUEUE_DEPTH: u64 = 0; // 0 = infinite
const DEFAULT_IO_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_IO_MAXSIZE: u64 = 1 << 20; // 1 MiB

fn resolve(cache: &AtomicU64, env_var: &str, default: u64) -> u64 {
    let cached = cache.load(Ordering::Relaxed);
    if cached != UNRESOLVED {
        return cached;
    }
    let value = std::env::var(env_var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default);
    // A racing resolver may have already stored a (necessarily identical)
    // value; either way the cache now holds the resolved reading.
    cache.store(value, Ordering::Relaxed);
    value
}

/// Default queue depth when a caller requests "standard" depth. `0` means
/// infinite, matching the spec's `depth` convention.
#[must_use]
pub fn standard_queue_depth() -> usize {
    resolve(
        &STANDARD_QUEUE_DEPTH,
        "SLIDERULE_STANDARD_QUEUE_DEPTH",
        DEFAULT_STANDARD_QUEUE_DEPTH,
    ) as usize
}

/// Default blocking-operation timeout in milliseconds.
#[must_use]
pub fn io_timeout_ms() -> u64 {
    resolve(&IO_TIMEOUT_MS, "SLIDERULE_IO_TIMEOUT_MS", DEFAULT_IO_TIMEOUT_MS)
}

/// Default maximum single-post payload size in bytes.
#[must_use]
pub fn io_maxsize() -> usize {
    resolve(&IO_MAXSIZE, "SLIDERULE_IO_MAXSIZE", DEFAULT_IO_MAXSIZE) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_absent_or_unparsable() {
        // SAFETY-adjacent note: this test only asserts on the resolver
        // function directly, not the process-cached public getters, so it
        // can't be poisoned by test execution order touching the statics.
        let cache = AtomicU64::new(UNRESOLVED);
        assert_eq!(resolve(&cache, "SLIDERULE_TEST_DOES_NOT_EXIST", 42), 42);
        assert_eq!(cache.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn resolver_caches_after_first_call() {
        let cache = AtomicU64::new(UNRESOLVED);
        assert_eq!(resolve(&cache, "SLIDERULE_TEST_DOES_NOT_EXIST", 7), 7);
        cache.store(99, Ordering::Relaxed);
        // Second call sees the cached value, not the default or env again.
        assert_eq!(resolve(&cache, "SLIDERULE_TEST_DOES_NOT_EXIST", 7), 99);
    }
}
