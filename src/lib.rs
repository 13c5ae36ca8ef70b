//! Edge server library: HTTP→HTTPS redirection, TLS termination and
//! reverse proxying to a single upstream.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, StartupError};
pub use http::EdgeServer;
pub use lifecycle::Shutdown;
