//! Header manipulation for forwarded traffic.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Set Host, X-Real-IP, X-Forwarded-For and X-Forwarded-Proto on requests
//!
//! # Design Decisions
//! - X-Forwarded-For is appended to, never replaced; the chain keeps its order
//! - X-Real-IP is always the socket peer, whatever the client sent

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");
const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Headers that describe a single transport hop.
pub const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    KEEP_ALIVE,
    PROXY_CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Rewrite request headers for the upstream hop.
pub fn apply_forwarding_headers(headers: &mut HeaderMap, host: &HeaderValue, client_ip: IpAddr) {
    strip_hop_by_hop(headers);

    headers.insert(header::HOST, host.clone());

    let ip = client_ip.to_string();
    let chain = match forwarded_chain(headers) {
        Some(existing) => format!("{existing}, {ip}"),
        None => ip.clone(),
    };

    // An IP address always renders as a valid header value.
    if let Ok(value) = HeaderValue::from_str(&ip) {
        headers.insert(X_REAL_IP, value);
    }
    match HeaderValue::from_str(&chain) {
        Ok(value) => {
            headers.insert(X_FORWARDED_FOR, value);
        }
        Err(_) => {
            tracing::debug!(chain = %chain, "Discarding unrepresentable X-Forwarded-For chain");
            if let Ok(value) = HeaderValue::from_str(&ip) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
}

/// Existing X-Forwarded-For entries joined in arrival order.
fn forwarded_chain(headers: &HeaderMap) -> Option<String> {
    let entries: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if entries.is_empty() {
        None
    } else {
        Some(entries.join(", "))
    }
}
