//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (declared and streamed body size)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Pass to the upstream pool
//! ```
//!
//! # Design Decisions
//! - Fail closed: oversized bodies never reach the upstream
//! - No trust in client input; forwarding headers are rebuilt from the socket

pub mod headers;
pub mod limits;

pub use headers::{apply_forwarding_headers, strip_hop_by_hop};
pub use limits::{enforce_body_limit, BodyLimit, ClientBodyError};
