//! Request body limits.
//!
//! # Responsibilities
//! - Reject declared bodies over the limit before the upstream is contacted
//! - Cap streamed bodies that carry no usable Content-Length
//! - Tag body errors raised by the client so they never count against the upstream
//!
//! # Design Decisions
//! - The limit is inclusive: a body of exactly `max_body_size` bytes passes
//! - Rejections close the connection; the unread body is not drained

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, Limited};

use crate::error::ProxyError;

/// Maximum accepted request body, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimit(pub u64);

impl BodyLimit {
    pub fn allows(self, length: u64) -> bool {
        length <= self.0
    }
}

/// The client's request body failed mid-stream (bad chunk framing, aborted upload).
#[derive(Debug, thiserror::Error)]
#[error("client request body failed: {0}")]
pub struct ClientBodyError(#[source] axum::Error);

impl ClientBodyError {
    pub fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(axum::Error::new(error))
    }
}

/// Parsed Content-Length, if present and well formed.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Middleware applying [`BodyLimit`] to every request.
pub async fn enforce_body_limit(
    State(limit): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(length) = content_length(request.headers()) {
        if !limit.allows(length) {
            tracing::info!(
                content_length = length,
                max_body_size = limit.0,
                "Rejecting oversized request body"
            );
            return ProxyError::PayloadTooLarge.into_response();
        }
    }

    let (parts, body) = request.into_parts();
    let cap = usize::try_from(limit.0).unwrap_or(usize::MAX);
    let body = Body::new(Limited::new(body.map_err(ClientBodyError), cap));
    next.run(Request::from_parts(parts, body)).await
}
