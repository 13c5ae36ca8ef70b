//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive health checks (passive.rs):
//!     Forwarding attempt completes
//!     → Classify outcome (response / connect error / timeout)
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Healthy ←→ Failing
//! ```
//!
//! # Design Decisions
//! - No active health checks; every request reports its own outcome
//! - State is shared across connections behind a mutex
//! - The single upstream is never taken out of rotation

pub mod passive;
pub mod state;

pub use state::{FailurePolicy, HealthSnapshot, HealthState, UpstreamHealth};
