//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce the per-attempt read deadline)
//!     → On failure: health::passive records it; the client gets 502/504
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No automatic retries: a failed attempt surfaces to the client

pub mod timeouts;

pub use timeouts::{with_deadline, AttemptError};
