//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Observe forwarding outcomes
//! - Feed successes and failures into the upstream's state machine
//!
//! # Design Decisions
//! - Only connection errors and timeouts count as failures
//! - Any upstream response, including 5xx, is a success at this layer
//! - Client-side problems (oversized body, bad request) are ignored

use crate::error::ProxyError;
use crate::upstream::Backend;

/// Record the outcome of one forwarding attempt against `backend`.
pub fn observe<T>(backend: &Backend, outcome: &Result<T, ProxyError>) {
    match outcome {
        Ok(_) => backend.mark_success(),
        Err(e) if e.counts_against_upstream() => backend.mark_failure(),
        Err(_) => {}
    }
}
