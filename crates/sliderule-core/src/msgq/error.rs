//! Queue status codes and post/receive timeout policy (spec §4.3.6, §7).
//!
//! `QState` is a status code, not a propagated exception: `post`/`receive`
//! return `Result<(), QState>`/`Result<T, QState>` so a caller can match on
//! `Full`/`Empty`/`Timeout` without unwinding, matching the original's
//! `qState_t` return-code contract.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QState {
    #[error("ok")]
    Ok,
    #[error("timed out waiting for queue capacity or data")]
    Timeout,
    #[error("queue is at capacity")]
    Full,
    #[error("payload exceeds the queue's max_data_size")]
    SizeError,
    #[error("queue error")]
    Error,
    #[error("queue is empty")]
    Empty,
    #[error("queue has no subscribers")]
    NoSubscribers,
}

/// How long `post`/`receive` are willing to wait for room or data.
#[derive(Debug, Clone, Copy)]
pub enum Timeout {
    /// Return immediately rather than wait.
    Check,
    /// Block indefinitely.
    Pend,
    /// Block up to the given duration, then return `QState::Timeout`.
    After(Duration),
}
