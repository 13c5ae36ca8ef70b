//! Error taxonomy.
//!
//! Startup errors are fatal and surface from `EdgeServer::bind`. Request errors
//! stay inside the connection that produced them and become an HTTP status;
//! the client never sees internal detail, only the status text.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::ConfigError;
use crate::net::{ListenerError, TlsError};
use crate::upstream::BackendError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Anything that stops the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error(transparent)]
    Upstream(#[from] BackendError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Per-request failures on the forwarding path.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("malformed request: {0}")]
    ClientProtocol(String),

    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    #[error("upstream {upstream} unavailable: {source}")]
    UpstreamUnavailable {
        upstream: String,
        #[source]
        source: BoxError,
    },

    #[error("upstream {upstream} did not respond within {timeout:?}")]
    UpstreamTimeout { upstream: String, timeout: Duration },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::ClientProtocol(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether this error says something about the upstream's health.
    pub fn counts_against_upstream(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamUnavailable { .. } | ProxyError::UpstreamTimeout { .. }
        )
    }

    /// Client errors end the connection; the rest of the stream cannot be trusted.
    fn closes_connection(&self) -> bool {
        matches!(self, ProxyError::ClientProtocol(_) | ProxyError::PayloadTooLarge)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response =
            (status, status.canonical_reason().unwrap_or("Error")).into_response();
        if self.closes_connection() {
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
        }
        response
    }
}
