//! Run blocking work against a wall-clock deadline.
//!
//! The work runs on its own thread. If the deadline passes first the caller
//! gets a `Timeout` error and the worker is left to finish on its own; its
//! result is dropped.

use crate::error::{Error, ErrorCode, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::warn;

pub fn run_with_deadline<T, F>(label: &str, limit: Duration, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name(format!("deadline-{}", label))
        .spawn(move || {
            let _ = tx.send(work());
        })?;

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(operation = label, limit_ms = limit.as_millis() as u64, "deadline exceeded");
            Err(Error::timeout(label, limit))
        }
        Err(RecvTimeoutError::Disconnected) => Err(Error::new(
            ErrorCode::Unknown,
            format!("{} worker exited without a result", label),
        )),
    }
}
