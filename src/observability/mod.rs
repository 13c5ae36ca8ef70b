//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → logging.rs (filter, format, write to stdout)
//!
//! Per request:
//!     → x-request-id assigned at the edge, sent upstream, echoed to the client
//!     → tower-http TraceLayer span around the request
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems

pub mod logging;

pub use logging::init;
