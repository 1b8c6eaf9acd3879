//! Named, multi-producer / multi-consumer queues (spec §3.3–§3.5, §4.3).
//!
//! `Publisher` and `Subscriber` are the handles applications hold; both wrap
//! an `Arc<QueueState>` obtained by name from the process-wide queue
//! registry in [`queue`]. Constructing a handle with a name that already
//! exists attaches to the live queue; dropping the last handle tears it
//! down (spec §4.3.1).

pub mod error;
pub mod queue;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

pub use error::{QState, Timeout};
pub use queue::{QueueDisplay, SubscriberType, list_queues};

use queue::QueueState;

/// A queue depth/max-size request: either an explicit value or the
/// process-wide "standard" default resolved from [`crate::config`] (spec
/// §6.3's "standard depth configuration").
#[derive(Debug, Clone, Copy)]
pub enum QueueSize {
    Standard,
    Depth(usize),
}

impl QueueSize {
    fn resolve_depth(self) -> usize {
        match self {
            Self::Standard => crate::config::standard_queue_depth(),
            Self::Depth(d) => d,
        }
    }
}

/// Longest string `post_string` will accept, mirroring the original's
/// `vsnprintf`-bounded posted-string limit.
pub const MAX_POSTED_STR: usize = 1024;

fn last_state_to_u8(state: QState) -> u8 {
    match state {
        QState::Ok => 0,
        QState::Timeout => 1,
        QState::Full => 2,
        QState::SizeError => 3,
        QState::Error => 4,
        QState::Empty => 5,
        QState::NoSubscribers => 6,
    }
}

fn u8_to_last_state(v: u8) -> QState {
    match v {
        1 => QState::Timeout,
        2 => QState::Full,
        3 => QState::SizeError,
        4 => QState::Error,
        5 => QState::Empty,
        6 => QState::NoSubscribers,
        _ => QState::Ok,
    }
}

/// A handle that posts byte payloads onto a named queue (spec §4.3.2).
pub struct Publisher {
    state: Arc<QueueState>,
    last_state: AtomicU8,
}

impl Publisher {
    /// Attaches to (or creates) the named queue with the given depth and
    /// maximum single-post payload size.
    #[must_use]
    pub fn new(name: &str, depth: QueueSize, max_data_size: QueueSize) -> Self {
        let depth = depth.resolve_depth();
        let max_data_size = if max_data_size.resolve_depth() == 0 {
            crate::config::io_maxsize()
        } else {
            max_data_size.resolve_depth()
        };
        Self {
            state: queue::attach(name, depth, max_data_size),
            last_state: AtomicU8::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.state.name()
    }

    #[must_use]
    pub fn last_state(&self) -> QState {
        u8_to_last_state(self.last_state.load(Ordering::Relaxed))
    }

    fn record_state(&self, result: Result<(), QState>) -> Result<(), QState> {
        let state = result.as_ref().err().copied().unwrap_or(QState::Ok);
        self.last_state.store(last_state_to_u8(state), Ordering::Relaxed);
        result
    }

    /// Posts `data` by copying it into a fresh queue node. A `NoSubscribers`
    /// condition is promoted to `Ok` — there is nothing left for the caller
    /// to free (spec §4.3.2 step 2, §7/§9).
    pub fn post_copy(&self, data: &[u8], timeout: Timeout) -> Result<(), QState> {
        let payload: Arc<[u8]> = Arc::from(data);
        self.record_state(self.state.post(payload, timeout, true))
    }

    /// Posts an already-shared payload without copying it again. Unlike
    /// `post_copy`, `NoSubscribers` is reported rather than swallowed: the
    /// caller retains the `Arc` and may need to act on the fact that nobody
    /// received it (spec §4.3.2 step 2).
    pub fn post_ref(&self, data: Arc<[u8]>, timeout: Timeout) -> Result<(), QState> {
        self.record_state(self.state.post(data, timeout, false))
    }

    /// Formats `text` and posts it as a copy, bounded by [`MAX_POSTED_STR`]
    /// and rejecting an empty string (spec §4.3.2's `postString`).
    pub fn post_string(&self, text: &str, timeout: Timeout) -> Result<(), QState> {
        if text.is_empty() {
            return Err(QState::SizeError);
        }
        let bounded = if text.len() > MAX_POSTED_STR {
            &text[..MAX_POSTED_STR]
        } else {
            text
        };
        self.post_copy(bounded.as_bytes(), timeout)
    }

    #[must_use]
    pub fn subscriptions(&self) -> usize {
        self.state.subscriptions()
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        queue::detach(&self.state);
    }
}

/// A handle that reads byte payloads from a named queue, either as a
/// confidence or an opportunity subscriber (spec §4.3.3–§4.3.5).
pub struct Subscriber {
    state: Arc<QueueState>,
    index: usize,
    last_state: AtomicU8,
    /// Outstanding ref-mode receives not yet dereferenced, oldest first,
    /// paired with the payload `Arc` handed back to the caller so
    /// `dereference` can identify which node a given payload belongs to.
    held_refs: std::sync::Mutex<Vec<(u64, Arc<[u8]>)>>,
}

impl Subscriber {
    #[must_use]
    pub fn new(
        name: &str,
        kind: SubscriberType,
        depth: QueueSize,
        max_data_size: QueueSize,
    ) -> Self {
        let depth = depth.resolve_depth();
        let max_data_size = if max_data_size.resolve_depth() == 0 {
            crate::config::io_maxsize()
        } else {
            max_data_size.resolve_depth()
        };
        let state = queue::attach(name, depth, max_data_size);
        let index = state.subscribe(kind);
        Self {
            state,
            index,
            last_state: AtomicU8::new(0),
            held_refs: std::sync::Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.state.name()
    }

    #[must_use]
    pub fn kind(&self) -> SubscriberType {
        self.state.subscriber_kind(self.index)
    }

    #[must_use]
    pub fn last_state(&self) -> QState {
        u8_to_last_state(self.last_state.load(Ordering::Relaxed))
    }

    fn record_state<T>(&self, result: &Result<T, QState>) {
        let state = result.as_ref().err().copied().unwrap_or(QState::Ok);
        self.last_state.store(last_state_to_u8(state), Ordering::Relaxed);
    }

    /// Receives the next node by reference: the returned `Arc` is a
    /// zero-copy clone of the node's payload. `refs` is left untouched until
    /// [`Subscriber::dereference`] is called (spec §4.3.3 step 4).
    pub fn receive_ref(&self, timeout: Timeout) -> Result<Arc<[u8]>, QState> {
        let result = self.state.receive(self.index, timeout);
        self.record_state(&result);
        let (global_index, payload) = result?;
        self.held_refs.lock().unwrap().push((global_index, payload.clone()));
        Ok(payload)
    }

    /// Receives the next node by copying it into `dst`, immediately
    /// releasing the node's reference (spec §4.3.3 step 3). Returns the
    /// number of bytes copied, or `SizeError` if `dst` is too small.
    pub fn receive_copy(&self, dst: &mut [u8], timeout: Timeout) -> Result<usize, QState> {
        let result = self.state.receive(self.index, timeout);
        self.record_state(&result);
        let (global_index, payload) = result?;
        if payload.len() > dst.len() {
            self.state.dereference(global_index);
            self.last_state.store(last_state_to_u8(QState::SizeError), Ordering::Relaxed);
            return Err(QState::SizeError);
        }
        dst[..payload.len()].copy_from_slice(&payload);
        self.state.dereference(global_index);
        Ok(payload.len())
    }

    /// Releases a node previously obtained through [`Subscriber::receive_ref`],
    /// decrementing its reference count and attempting reclamation.
    pub fn dereference(&self, payload: &Arc<[u8]>) {
        let mut held = self.held_refs.lock().unwrap();
        if let Some(pos) = held.iter().position(|(_, p)| Arc::ptr_eq(p, payload)) {
            let (idx, _) = held.remove(pos);
            self.state.dereference(idx);
        }
    }

    /// Dereferences every undelivered node for this subscriber, discarding
    /// them without processing (spec §4.3.3's `drain(with_delete)`).
    pub fn drain(&self, with_delete: bool) -> usize {
        self.held_refs.lock().unwrap().clear();
        self.state.drain(self.index, with_delete)
    }

    #[must_use]
    pub fn depth_used(&self) -> usize {
        self.state.depth_used()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        // Outstanding receive_ref nodes this subscriber never dereferenced
        // need their refs released explicitly; unsubscribe only walks the
        // nodes this subscriber hasn't received at all.
        let held: Vec<(u64, Arc<[u8]>)> = self.held_refs.lock().unwrap().drain(..).collect();
        for (idx, _) in held {
            self.state.dereference(idx);
        }
        self.state.unsubscribe(self.index);
        queue::detach(&self.state);
    }
}

/// A timeout duration resolved from [`crate::config::io_timeout_ms`], for
/// callers that want the process-wide default rather than an explicit one.
#[must_use]
pub fn standard_timeout() -> Timeout {
    Timeout::After(Duration::from_millis(crate::config::io_timeout_ms()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_fifo_copy_delivery() {
        let name = "test-basic-fifo";
        let publisher = Publisher::new(name, QueueSize::Depth(4), QueueSize::Depth(64));
        let subscriber = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(4), QueueSize::Depth(64));

        for seq in 0u32..10 {
            publisher.post_copy(&seq.to_le_bytes(), Timeout::Pend).unwrap();
        }
        for expected in 0u32..10 {
            let mut buf = [0u8; 4];
            let n = subscriber.receive_copy(&mut buf, Timeout::Check).unwrap();
            assert_eq!(n, 4);
            assert_eq!(u32::from_le_bytes(buf), expected);
        }
        assert_eq!(subscriber.receive_copy(&mut [0u8; 4], Timeout::Check), Err(QState::Empty));
    }

    #[test]
    fn fanout_to_two_confidence_subscribers() {
        let name = "test-fanout";
        let publisher = Publisher::new(name, QueueSize::Depth(16), QueueSize::Depth(64));
        let s1 = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(16), QueueSize::Depth(64));
        let s2 = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(16), QueueSize::Depth(64));

        for seq in 0u32..10 {
            publisher.post_copy(&seq.to_le_bytes(), Timeout::Pend).unwrap();
        }
        for sub in [&s1, &s2] {
            for expected in 0u32..10 {
                let mut buf = [0u8; 4];
                sub.receive_copy(&mut buf, Timeout::Check).unwrap();
                assert_eq!(u32::from_le_bytes(buf), expected);
            }
        }
        assert_eq!(s1.depth_used(), 0);
    }

    #[test]
    fn opportunistic_drop_never_blocks_confidence_subscriber() {
        let name = "test-opportunistic-drop";
        let publisher = Publisher::new(name, QueueSize::Depth(2), QueueSize::Depth(64));
        let confidence = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(2), QueueSize::Depth(64));
        let _opportunity = Subscriber::new(name, SubscriberType::Opportunity, QueueSize::Depth(2), QueueSize::Depth(64));

        for seq in 0u32..10 {
            let result = publisher.post_copy(&seq.to_le_bytes(), Timeout::Check);
            assert_ne!(result, Err(QState::Full));
            if result.is_err() {
                continue;
            }
            let mut buf = [0u8; 4];
            confidence.receive_copy(&mut buf, Timeout::Check).unwrap();
            assert_eq!(u32::from_le_bytes(buf), seq);
        }
    }

    #[test]
    fn receive_ref_defers_dereference() {
        let name = "test-receive-ref";
        let publisher = Publisher::new(name, QueueSize::Depth(4), QueueSize::Depth(64));
        let subscriber = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(1), QueueSize::Depth(64));

        publisher.post_copy(&[1, 2, 3], Timeout::Check).unwrap();
        let held = subscriber.receive_ref(Timeout::Check).unwrap();
        assert_eq!(&*held, &[1u8, 2, 3]);
        // The node is still referenced, so posting into a depth-1 queue
        // blocks/`Full`s until it's dereferenced.
        assert_eq!(publisher.post_copy(&[4, 5, 6], Timeout::Check), Err(QState::Full));
        subscriber.dereference(&held);
        assert!(publisher.post_copy(&[4, 5, 6], Timeout::Check).is_ok());
    }

    #[test]
    fn dropping_subscriber_with_held_ref_releases_it() {
        let name = "test-drop-with-held-ref";
        let publisher = Publisher::new(name, QueueSize::Depth(1), QueueSize::Depth(64));
        let subscriber = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(1), QueueSize::Depth(64));

        publisher.post_copy(&[1, 2, 3], Timeout::Check).unwrap();
        let _held = subscriber.receive_ref(Timeout::Check).unwrap();
        // Dropping the subscriber without calling dereference() must still
        // release the node; otherwise the depth-1 queue stays pinned full.
        drop(subscriber);

        let other = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(1), QueueSize::Depth(64));
        assert!(publisher.post_copy(&[4, 5, 6], Timeout::Check).is_ok());
        drop(other);
    }

    #[test]
    fn dropping_subscriber_with_undelivered_node_releases_it() {
        let name = "test-drop-with-undelivered-node";
        let publisher = Publisher::new(name, QueueSize::Depth(1), QueueSize::Depth(64));
        let slow = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(1), QueueSize::Depth(64));
        let fast = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(1), QueueSize::Depth(64));

        publisher.post_copy(&[7, 8, 9], Timeout::Check).unwrap();
        let mut buf = [0u8; 3];
        fast.receive_copy(&mut buf, Timeout::Check).unwrap();
        // `slow` never reads the node at all; dropping it must still release
        // its ref so the queue doesn't stay pinned full.
        drop(slow);
        assert!(publisher.post_copy(&[10, 11, 12], Timeout::Check).is_ok());
        drop(fast);
    }

    #[test]
    fn post_string_rejects_empty() {
        let name = "test-post-string";
        let publisher = Publisher::new(name, QueueSize::Depth(4), QueueSize::Depth(64));
        let _subscriber = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(4), QueueSize::Depth(64));
        assert_eq!(publisher.post_string("", Timeout::Check), Err(QState::SizeError));
        assert!(publisher.post_string("hello", Timeout::Check).is_ok());
    }
}
