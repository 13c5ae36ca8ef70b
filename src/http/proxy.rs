//! Reverse-proxy forwarding.
//!
//! # Responsibilities
//! - Rebuild request headers for the upstream hop
//! - Hand the request to the upstream pool
//! - Return the upstream response with client-facing headers
//!
//! # Design Decisions
//! - Upstream traffic is always HTTP/1.1, whatever the client spoke
//! - Bodies stream in both directions; nothing is buffered here
//! - Upstream 5xx responses pass through unchanged

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::Version;
use axum::middleware;
use axum::response::Response;
use axum::Router;

use crate::error::ProxyError;
use crate::http::origin::PublicOrigin;
use crate::http::request::request_host;
use crate::http::response;
use crate::security::{apply_forwarding_headers, enforce_body_limit, BodyLimit};
use crate::upstream::UpstreamPool;

/// Application state injected into the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: UpstreamPool,
    pub origin: PublicOrigin,
}

/// Router for the TLS listener.
pub fn router(state: AppState, limit: BodyLimit) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .with_state(state)
        .layer(middleware::from_fn_with_state(limit, enforce_body_limit))
}

async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Result<Response, ProxyError> {
    let host = request_host(request.headers(), request.uri())
        .ok_or_else(|| ProxyError::ClientProtocol("missing or invalid Host".into()))?;

    let (mut parts, body) = request.into_parts();
    tracing::debug!(
        client = %peer,
        method = %parts.method,
        path = %parts.uri.path(),
        "Forwarding request"
    );

    apply_forwarding_headers(&mut parts.headers, &host, peer.ip());
    parts.version = Version::HTTP_11;

    let upstream_response = state.pool.send(Request::from_parts(parts, body)).await?;

    let (mut parts, body) = upstream_response.into_parts();
    response::prepare_headers(&mut parts.headers, state.pool.backend(), &state.origin);
    Ok(Response::from_parts(parts, body))
}
