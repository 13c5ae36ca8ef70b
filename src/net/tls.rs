//! TLS termination: configuration, certificate loading and handshakes.
//!
//! # Responsibilities
//! - Load certificate chain and private key once at startup (fail fast)
//! - Enforce the protocol version floor and cipher allow-list
//! - Prefer the server's cipher ordering over the client's
//! - Complete handshakes under a deadline; failed handshakes are simply closed

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, SupportedCipherSuite, SupportedProtocolVersion};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;

static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Lowest protocol version a client may negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MinTlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown TLS version '{0}' (expected one of 1.0, 1.1, 1.2, 1.3)")]
pub struct UnknownTlsVersion(pub String);

impl FromStr for MinTlsVersion {
    type Err = UnknownTlsVersion;

    /// Accepts `1.2`, `TLSv1.2`, `tls1.2` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let version = lower
            .strip_prefix("tlsv")
            .or_else(|| lower.strip_prefix("tls"))
            .unwrap_or(&lower);
        match version {
            "1" | "1.0" => Ok(Self::Tls10),
            "1.1" => Ok(Self::Tls11),
            "1.2" => Ok(Self::Tls12),
            "1.3" => Ok(Self::Tls13),
            _ => Err(UnknownTlsVersion(s.to_string())),
        }
    }
}

impl MinTlsVersion {
    /// Protocol versions rustls may negotiate at or above this floor.
    pub fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            Self::Tls13 => TLS13_ONLY,
            // rustls never speaks anything older than 1.2
            Self::Tls10 | Self::Tls11 | Self::Tls12 => rustls::ALL_VERSIONS,
        }
    }
}

/// Error type for TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no certificates found in {0:?}")]
    NoCertificates(PathBuf),
    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),
    #[error("unknown cipher suite '{0}'")]
    UnknownCipherSuite(String),
    #[error(transparent)]
    Version(#[from] UnknownTlsVersion),
    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Error type for a single handshake.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
}

/// Performs TLS handshakes with the configuration loaded at startup.
#[derive(Clone)]
pub struct TlsTerminator {
    acceptor: TlsAcceptor,
    handshake_timeout: Duration,
}

impl TlsTerminator {
    /// Load certificate material and build the acceptor.
    pub fn load(config: &TlsConfig) -> Result<Self, TlsError> {
        let server_config = build_server_config(config)?;
        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(server_config)),
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
        })
    }

    /// Run the server side of the handshake on an accepted socket.
    pub async fn accept(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>, HandshakeError> {
        match tokio::time::timeout(self.handshake_timeout, self.acceptor.accept(stream)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(HandshakeError::Timeout(self.handshake_timeout)),
        }
    }
}

/// Build the rustls server configuration from the TLS settings.
pub fn build_server_config(config: &TlsConfig) -> Result<ServerConfig, TlsError> {
    let min_version: MinTlsVersion = config.min_tls_version.parse()?;
    if min_version < MinTlsVersion::Tls12 {
        tracing::warn!(
            configured = %config.min_tls_version,
            "TLS versions below 1.2 are not supported; effective floor is TLS 1.2"
        );
    }

    let certs = load_certs(Path::new(&config.cert_path))?;
    let key = load_private_key(Path::new(&config.key_path))?;
    let provider = crypto_provider(&config.cipher_allowlist)?;

    // with_single_cert also rejects a key that does not match the leaf certificate
    let mut server_config = ServerConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(min_version.protocol_versions())?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    server_config.ignore_client_order = true;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::info!(
        cert_path = %config.cert_path,
        min_version = ?min_version,
        cipher_suites = server_config.crypto_provider().cipher_suites.len(),
        "TLS configuration loaded"
    );

    Ok(server_config)
}

/// The ring provider restricted to `allowlist`, in allow-list order.
pub fn crypto_provider(allowlist: &[String]) -> Result<CryptoProvider, TlsError> {
    let mut provider = ring::default_provider();
    if allowlist.is_empty() {
        return Ok(provider);
    }

    let mut suites = Vec::with_capacity(allowlist.len());
    for name in allowlist {
        let suite = provider
            .cipher_suites
            .iter()
            .find(|suite| suite_name(suite).eq_ignore_ascii_case(name.trim()))
            .copied()
            .ok_or_else(|| TlsError::UnknownCipherSuite(name.clone()))?;
        suites.push(suite);
    }
    provider.cipher_suites = suites;
    Ok(provider)
}

/// IANA-style name rustls uses for a suite, e.g. `TLS13_AES_128_GCM_SHA256`.
pub fn suite_name(suite: &SupportedCipherSuite) -> String {
    format!("{:?}", suite.suite())
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}
