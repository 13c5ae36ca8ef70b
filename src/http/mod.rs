//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Plaintext connection (port 80)
//!     → server.rs (hyper, HTTP/1.1 + HTTP/2)
//!     → redirect.rs (301 to https://<host><path>)
//!
//! TLS connection (port 443)
//!     → net::tls (handshake)
//!     → server.rs (hyper, HTTP/1.1 + HTTP/2)
//!     → security::limits (body size)
//!     → proxy.rs (request.rs host, security::headers rewrite)
//!     → upstream::pool (send, deadline, health)
//!     → response.rs (strip hop-by-hop, rewrite Location)
//!     → Send to client
//! ```

pub mod origin;
pub mod proxy;
pub mod redirect;
pub mod request;
pub mod response;
pub mod server;

pub use origin::PublicOrigin;
pub use server::EdgeServer;
