//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarder
//!     → pool.rs (acquire slot, reuse keep-alive connection, apply deadlines)
//!     → backend.rs (target URI, health record)
//!     → health::passive (record outcome)
//! ```
//!
//! # Design Decisions
//! - Exactly one backend; there is no balancing to do
//! - A failing backend still receives every request

pub mod backend;
pub mod pool;

pub use backend::{Backend, BackendError};
pub use pool::UpstreamPool;
