//! Plaintext HTTP to HTTPS redirection.
//!
//! # Responsibilities
//! - Answer every plaintext request with `301 Moved Permanently`
//! - Point `Location` at the same host and path over HTTPS
//! - Refuse to redirect to hosts we do not serve
//!
//! # Design Decisions
//! - Nothing on the plaintext port is ever forwarded upstream
//! - The connection is closed after each redirect
//! - Unknown or missing hosts are redirected to the public host

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::config::ListenerConfig;
use crate::http::origin::PublicOrigin;
use crate::http::request::{request_host, strip_port};

/// What the redirector needs to pick a target.
#[derive(Debug, Clone)]
pub struct RedirectState {
    origin: PublicOrigin,
    server_names: Vec<String>,
}

impl RedirectState {
    pub fn new(origin: PublicOrigin, server_names: Vec<String>) -> Self {
        Self {
            origin,
            server_names,
        }
    }

    pub fn from_config(config: &ListenerConfig) -> Self {
        Self::new(PublicOrigin::from_config(config), config.server_names.clone())
    }

    /// Host to place in the redirect for a request that asked for `requested`.
    pub fn target_host<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        let Some(host) = requested.map(strip_port).filter(|h| !h.is_empty()) else {
            return self.origin.host();
        };
        if self.server_names.is_empty()
            || self.server_names.iter().any(|name| name.eq_ignore_ascii_case(host))
        {
            host
        } else {
            self.origin.host()
        }
    }

    pub fn location(&self, requested: Option<&str>, path_and_query: &str) -> String {
        self.origin
            .https_url_for(self.target_host(requested), path_and_query)
    }
}

/// Router for the plaintext listener.
pub fn router(state: RedirectState) -> Router {
    Router::new()
        .fallback(redirect_handler)
        .with_state(Arc::new(state))
}

async fn redirect_handler(State(state): State<Arc<RedirectState>>, request: Request) -> Response {
    let host = request_host(request.headers(), request.uri());
    let requested = host.as_ref().and_then(|h| h.to_str().ok());
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let location = state.location(requested, path_and_query);
    tracing::debug!(
        host = requested.unwrap_or("-"),
        location = %location,
        "Redirecting to HTTPS"
    );

    match HeaderValue::from_str(&location) {
        Ok(location) => (
            StatusCode::MOVED_PERMANENTLY,
            [
                (header::LOCATION, location),
                (header::CONNECTION, HeaderValue::from_static("close")),
            ],
        )
            .into_response(),
        Err(_) => (
            StatusCode::BAD_REQUEST,
            [(header::CONNECTION, HeaderValue::from_static("close"))],
        )
            .into_response(),
    }
}
