//! Upstream target abstraction.
//!
//! # Responsibilities
//! - Represent the single backend server
//! - Build request URIs against it
//! - Recognize URLs that point at it (for Location rewriting)
//! - Own its health record

use axum::http::uri::{Authority, Scheme, Uri};
use url::Url;

use crate::config::UpstreamConfig;
use crate::health::{FailurePolicy, HealthState, UpstreamHealth};

/// Error type for upstream construction.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid upstream address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// The upstream backend server.
#[derive(Debug)]
pub struct Backend {
    /// host:port of the backend.
    authority: Authority,
    /// Pre-calculated base URL for matching redirects.
    base_url: Url,
    health: UpstreamHealth,
}

impl Backend {
    /// Create a new backend.
    pub fn new(authority: Authority, policy: FailurePolicy) -> Result<Self, BackendError> {
        let base_url = Url::parse(&format!("http://{}", authority)).map_err(|e| {
            BackendError::InvalidAddress {
                address: authority.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            authority,
            base_url,
            health: UpstreamHealth::new(policy),
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, BackendError> {
        let authority: Authority =
            config
                .address
                .parse()
                .map_err(|e: axum::http::uri::InvalidUri| BackendError::InvalidAddress {
                    address: config.address.clone(),
                    reason: e.to_string(),
                })?;
        Self::new(authority, FailurePolicy::from_config(config))
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Absolute URI for `path_and_query` on this backend.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }

    /// True if `url` addresses this backend over plain HTTP.
    pub fn owns_url(&self, url: &Url) -> bool {
        url.scheme() == "http"
            && match (url.host_str(), self.base_url.host_str()) {
                (Some(host), Some(ours)) => host.eq_ignore_ascii_case(ours),
                _ => false,
            }
            && url.port_or_known_default() == self.base_url.port_or_known_default()
    }

    // --- Health Logic ---

    pub fn health(&self) -> &UpstreamHealth {
        &self.health
    }

    pub fn state(&self) -> HealthState {
        self.health.state()
    }

    /// Report a successful attempt.
    pub fn mark_success(&self) {
        if let Some(HealthState::Healthy) = self.health.record_success() {
            tracing::info!(upstream = %self.authority, "Upstream recovered");
        }
    }

    /// Report a failed attempt.
    pub fn mark_failure(&self) {
        if let Some(HealthState::Failing) = self.health.record_failure() {
            tracing::warn!(upstream = %self.authority, "Upstream marked failing");
        }
    }
}
