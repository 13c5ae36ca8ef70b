//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses (listeners are socket addresses, upstream is host:port)
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::uri::Authority;

use crate::config::schema::ProxyConfig;
use crate::net::tls::MinTlsVersion;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending key, e.g. `upstream.address`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.listen_http", &config.listener.listen_http);
    check_socket_addr(&mut errors, "listener.listen_https", &config.listener.listen_https);

    if config.listener.public_host.trim().is_empty() {
        errors.push(ValidationError::new("listener.public_host", "must not be empty"));
    }
    if config.listener.server_names.iter().any(|n| n.trim().is_empty()) {
        errors.push(ValidationError::new("listener.server_names", "entries must not be empty"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    if config.tls.cert_path.is_empty() {
        errors.push(ValidationError::new("tls.cert_path", "is required"));
    }
    if config.tls.key_path.is_empty() {
        errors.push(ValidationError::new("tls.key_path", "is required"));
    }
    if let Err(e) = config.tls.min_tls_version.parse::<MinTlsVersion>() {
        errors.push(ValidationError::new("tls.min_tls_version", e.to_string()));
    }
    if config.tls.handshake_timeout_secs == 0 {
        errors.push(ValidationError::new("tls.handshake_timeout_secs", "must be greater than 0"));
    }

    match config.upstream.address.parse::<Authority>() {
        Ok(authority) if authority.port_u16().is_some() => {}
        Ok(_) => errors.push(ValidationError::new(
            "upstream.address",
            format!("'{}' is missing a port", config.upstream.address),
        )),
        Err(e) => errors.push(ValidationError::new(
            "upstream.address",
            format!("'{}' is not a valid host:port ({})", config.upstream.address, e),
        )),
    }
    if config.upstream.max_connections == 0 {
        errors.push(ValidationError::new("upstream.max_connections", "must be greater than 0"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.read_secs == 0 {
        errors.push(ValidationError::new("timeouts.read_secs", "must be greater than 0"));
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(
            field,
            format!("'{}' is not a socket address ({})", value, e),
        ));
    }
}
