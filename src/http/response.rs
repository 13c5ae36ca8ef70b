//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from upstream responses
//! - Rewrite redirects that point at the internal upstream address
//!
//! # Design Decisions
//! - Bodies are streamed untouched; only headers change
//! - Relative locations are left alone, they already resolve to the public host

use axum::http::{header, HeaderMap, HeaderValue};
use url::Url;

use crate::http::origin::PublicOrigin;
use crate::security::strip_hop_by_hop;
use crate::upstream::Backend;

/// Prepare upstream response headers for the client.
pub fn prepare_headers(headers: &mut HeaderMap, backend: &Backend, origin: &PublicOrigin) {
    strip_hop_by_hop(headers);
    rewrite_locations(headers, backend, origin);
}

/// Rewrite `Location` and `Content-Location` values addressed to `backend`.
pub fn rewrite_locations(headers: &mut HeaderMap, backend: &Backend, origin: &PublicOrigin) {
    for name in [header::LOCATION, header::CONTENT_LOCATION] {
        let Some(rewritten) = headers
            .get(&name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Url::parse(value).ok())
            .filter(|url| backend.owns_url(url))
            .map(|url| origin.https_url(&path_query_fragment(&url)))
        else {
            continue;
        };

        if let Ok(value) = HeaderValue::from_str(&rewritten) {
            tracing::debug!(header = %name, location = %rewritten, "Rewrote upstream location");
            headers.insert(name, value);
        }
    }
}

fn path_query_fragment(url: &Url) -> String {
    let mut tail = url.path().to_string();
    if let Some(query) = url.query() {
        tail.push('?');
        tail.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        tail.push('#');
        tail.push_str(fragment);
    }
    tail
}
