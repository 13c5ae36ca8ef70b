//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edge_proxy::config::ProxyConfig;
use edge_proxy::upstream::Backend;
use edge_proxy::{EdgeServer, Shutdown};
use rcgen::{generate_simple_self_signed, CertifiedKey};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use rustls::pki_types::ServerName;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

pub const PUBLIC_HOST: &str = "libretees.com";

/// Self-signed certificate material written to a temporary directory.
pub struct TestCert {
    _dir: TempDir,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

pub fn self_signed_cert() -> TestCert {
    let dir = tempfile::tempdir().unwrap();
    let CertifiedKey { cert, key_pair } =
        generate_simple_self_signed(vec!["localhost".to_string(), PUBLIC_HOST.to_string()])
            .unwrap();

    let cert_path = dir.path().join("cert.pem");
    let key_path = dir.path().join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

    TestCert {
        _dir: dir,
        cert_path,
        key_path,
    }
}

/// Config with ephemeral listeners pointed at `upstream`.
pub fn test_config(cert: &TestCert, upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.listen_http = "127.0.0.1:0".into();
    config.listener.listen_https = "127.0.0.1:0".into();
    config.listener.public_host = PUBLIC_HOST.into();
    config.listener.server_names = vec![PUBLIC_HOST.into()];
    config.tls.cert_path = cert.cert_path.display().to_string();
    config.tls.key_path = cert.key_path.display().to_string();
    config.upstream.address = upstream.to_string();
    config.timeouts.connect_secs = 2;
    config.timeouts.read_secs = 5;
    config.lifecycle.shutdown_timeout_secs = 2;
    config
}

/// A running edge server.
pub struct RunningEdge {
    pub http_addr: SocketAddr,
    pub https_addr: SocketAddr,
    pub upstream: Arc<Backend>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

impl RunningEdge {
    pub fn https_url(&self, path_and_query: &str) -> String {
        format!("https://{}:{}{}", PUBLIC_HOST, self.https_addr.port(), path_and_query)
    }

    /// Client that trusts the test certificate and resolves the public host to us.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .resolve(PUBLIC_HOST, self.https_addr)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap()
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

pub async fn start_edge(config: ProxyConfig) -> RunningEdge {
    let server = EdgeServer::bind(config).await.unwrap();
    let shutdown = Shutdown::new();
    let http_addr = server.http_addr();
    let https_addr = server.https_addr();
    let upstream = server.upstream();
    let task = tokio::spawn(server.run(shutdown.subscribe()));

    RunningEdge {
        http_addr,
        https_addr,
        upstream,
        shutdown,
        task,
    }
}

/// What a mock upstream saw on one connection.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    /// Request line and headers, header names as sent.
    pub head: String,
    pub body: Vec<u8>,
    /// The mock's own listening address.
    pub upstream_addr: SocketAddr,
}

impl ReceivedRequest {
    /// Value of header `name` (case-insensitive), if present.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// A raw-TCP HTTP/1.1 upstream answering one request per connection.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<ReceivedRequest>>>,
    pub connections: Arc<AtomicUsize>,
    /// Connections the proxy side has closed.
    pub closed: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Fixed `200 OK` response with `body`.
pub fn ok_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

pub async fn start_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(&ReceivedRequest) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve_upstream(listener, respond)
}

/// Serve mock responses on an already bound listener.
pub fn serve_upstream<F>(listener: TcpListener, respond: F) -> MockUpstream
where
    F: Fn(&ReceivedRequest) -> String + Send + Sync + 'static,
{
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    let seen = requests.clone();
    let count = connections.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            count.fetch_add(1, Ordering::SeqCst);
            let seen = seen.clone();
            let respond = respond.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket, addr).await else {
                    return;
                };
                let response = respond(&request);
                seen.lock().unwrap().push(request);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockUpstream {
        addr,
        requests,
        connections,
        closed: Arc::new(AtomicUsize::new(0)),
    }
}

/// Upstream that accepts connections and never answers. It drains each
/// connection and counts it in `closed` once the proxy hangs up.
pub async fn start_silent_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));

    let count = connections.clone();
    let hung_up = closed.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            count.fetch_add(1, Ordering::SeqCst);
            let hung_up = hung_up.clone();
            tokio::spawn(async move {
                let mut sink = [0u8; 4096];
                while let Ok(n) = socket.read(&mut sink).await {
                    if n == 0 {
                        break;
                    }
                }
                hung_up.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    MockUpstream {
        addr,
        requests: Arc::new(Mutex::new(Vec::new())),
        connections,
        closed,
    }
}

/// A bound but not listening socket: connections to it are refused until
/// it is turned into a listener.
pub fn reserve_refusing_port() -> (TcpSocket, SocketAddr) {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

async fn read_request(socket: &mut TcpStream, upstream_addr: SocketAddr) -> Option<ReceivedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut request = ReceivedRequest {
        head,
        body: Vec::new(),
        upstream_addr,
    };

    let content_length: usize = request
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    request.body = body;
    Some(request)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Send raw bytes and read until the server closes the connection.
pub async fn raw_exchange(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Like [`raw_exchange`], over TLS to the edge's HTTPS listener. Lets tests
/// send request framing that ordinary clients refuse to produce.
pub async fn tls_exchange(addr: SocketAddr, cert: &TestCert, request: &[u8]) -> String {
    let pem = std::fs::read(&cert.cert_path).unwrap();
    let mut roots = rustls::RootCertStore::empty();
    for der in rustls_pemfile::certs(&mut pem.as_slice()) {
        roots.add(der.unwrap()).unwrap();
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let tcp = TcpStream::connect(addr).await.unwrap();
    let server_name = ServerName::try_from(PUBLIC_HOST).unwrap();
    let mut stream = connector.connect(server_name, tcp).await.unwrap();
    stream.write_all(request).await.unwrap();

    // A close without close_notify surfaces as an error; the bytes read so far are kept.
    let mut response = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection");
    String::from_utf8_lossy(&response).into_owned()
}
