//! The public HTTPS origin clients are sent to.

use crate::config::ListenerConfig;

const DEFAULT_HTTPS_PORT: u16 = 443;

/// Scheme is always `https`; only host and port vary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicOrigin {
    host: String,
    port: u16,
}

impl PublicOrigin {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn from_config(config: &ListenerConfig) -> Self {
        Self::new(config.public_host.clone(), config.public_https_port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port to put in URLs, or `None` when it is the HTTPS default.
    pub fn explicit_port(&self) -> Option<u16> {
        (self.port != DEFAULT_HTTPS_PORT).then_some(self.port)
    }

    /// `https://host[:port]` followed by `path_and_query`, using `host` in place of ours.
    pub fn https_url_for(&self, host: &str, path_and_query: &str) -> String {
        match self.explicit_port() {
            Some(port) => format!("https://{host}:{port}{path_and_query}"),
            None => format!("https://{host}{path_and_query}"),
        }
    }

    pub fn https_url(&self, path_and_query: &str) -> String {
        self.https_url_for(&self.host, path_and_query)
    }
}
