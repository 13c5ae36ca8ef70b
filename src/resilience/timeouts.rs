//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream attempts with a read deadline
//! - Cancel the attempt cleanly on timeout (the future is dropped)
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - The deadline is per attempt; there are no retries to accumulate across

use std::future::Future;
use std::time::Duration;

/// Outcome of an attempt that did not produce a value.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The attempt itself failed.
    Failed(E),
    /// The deadline passed first.
    TimedOut(Duration),
}

/// Run `attempt`, giving up after `deadline`.
pub async fn with_deadline<T, E, F>(deadline: Duration, attempt: F) -> Result<T, AttemptError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, attempt).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AttemptError::Failed(e)),
        Err(_) => Err(AttemptError::TimedOut(deadline)),
    }
}
