//! Request inspection.
//!
//! # Responsibilities
//! - Find the host a request was addressed to (Host header or :authority)
//! - Separate the host name from an optional port
//!
//! # Design Decisions
//! - HTTP/1.1 carries the host in the Host header; HTTP/2 in the URI authority
//! - Values that do not parse as a URI authority are treated as absent

use axum::http::uri::Authority;
use axum::http::{header, HeaderMap, HeaderValue, Uri};

/// Host the client addressed, exactly as sent (port included).
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<HeaderValue> {
    if let Some(host) = headers.get(header::HOST) {
        let valid = host
            .to_str()
            .ok()
            .is_some_and(|value| value.parse::<Authority>().is_ok() && !value.contains('@'));
        return valid.then(|| host.clone());
    }

    let authority = uri.authority()?;
    let host = match authority.port_u16() {
        Some(port) => format!("{}:{port}", authority.host()),
        None => authority.host().to_string(),
    };
    HeaderValue::from_str(&host).ok()
}

/// Host name with any `:port` suffix removed. IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
