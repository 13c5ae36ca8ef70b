//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// 4 GiB, the largest request body accepted by default.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Root configuration for the edge proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind addresses, public naming).
    pub listener: ListenerConfig,

    /// TLS termination settings.
    pub tls: TlsConfig,

    /// The single upstream backend.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Startup/shutdown settings.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plaintext bind address, redirect-only (e.g., "0.0.0.0:80").
    pub listen_http: String,

    /// TLS bind address (e.g., "0.0.0.0:443").
    pub listen_https: String,

    /// Host names this server answers for. Empty accepts any host.
    pub server_names: Vec<String>,

    /// Public host name used in redirects and rewritten upstream locations.
    pub public_host: String,

    /// Public HTTPS port; omitted from generated URLs when 443.
    pub public_https_port: u16,

    /// Maximum concurrent client connections per listener (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listen_http: "0.0.0.0:80".to_string(),
            listen_https: "0.0.0.0:443".to_string(),
            server_names: Vec::new(),
            public_host: "localhost".to_string(),
            public_https_port: 443,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the HTTPS listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,

    /// Lowest protocol version accepted ("1.2" or "1.3").
    pub min_tls_version: String,

    /// Allowed cipher suites in server preference order. Empty uses provider defaults.
    pub cipher_allowlist: Vec<String>,

    /// Deadline for completing a handshake, in seconds.
    pub handshake_timeout_secs: u64,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: String::new(),
            key_path: String::new(),
            min_tls_version: "1.2".to_string(),
            cipher_allowlist: Vec::new(),
            handshake_timeout_secs: 10,
        }
    }
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend address (e.g., "127.0.0.1:8000").
    pub address: String,

    /// Maximum concurrent connections to the backend (pool size).
    pub max_connections: usize,

    /// Consecutive failures before the upstream is marked failing.
    pub max_fails: u32,

    /// Window in seconds over which failures accumulate. 0 disables the window.
    pub fail_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".to_string(),
            max_connections: 100,
            max_fails: 1,
            fail_timeout_secs: 0,
        }
    }
}

/// Timeout configuration for upstream operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to answer one attempt, in seconds.
    pub read_secs: u64,

    /// Idle pooled connection lifetime in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            read_secs: 90,
            idle_secs: 60,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long to wait for in-flight connections to drain on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
