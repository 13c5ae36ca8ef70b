//! Failure injection tests for the edge server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    ok_response, reserve_refusing_port, self_signed_cert, serve_upstream, start_edge,
    start_silent_upstream, start_upstream, test_config, tls_exchange,
};
use edge_proxy::health::HealthState;
use edge_proxy::{EdgeServer, StartupError};
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

#[tokio::test]
async fn refused_upstream_is_bad_gateway_then_recovers() {
    let cert = self_signed_cert();
    let (socket, upstream_addr) = reserve_refusing_port();
    let edge = start_edge(test_config(&cert, upstream_addr)).await;
    let client = edge.client();

    let refused = client.get(edge.https_url("/")).send().await.unwrap();
    assert_eq!(refused.status(), 502);
    assert_eq!(refused.text().await.unwrap(), "Bad Gateway");
    assert_eq!(edge.upstream.state(), HealthState::Failing);
    assert!(edge.upstream.health().snapshot().last_failure.is_some());

    let listener = socket.listen(128).unwrap();
    let _upstream = serve_upstream(listener, |_| ok_response("ok"));

    let recovered = client.get(edge.https_url("/")).send().await.unwrap();
    assert_eq!(recovered.status(), 200);
    assert_eq!(edge.upstream.state(), HealthState::Healthy);

    edge.stop().await;
}

#[tokio::test]
async fn silent_upstream_is_gateway_timeout() {
    let cert = self_signed_cert();
    let upstream = start_silent_upstream().await;
    let mut config = test_config(&cert, upstream.addr);
    config.timeouts.read_secs = 1;
    let edge = start_edge(config).await;

    let started = std::time::Instant::now();
    let response = edge.client().get(edge.https_url("/slow")).send().await.unwrap();

    assert_eq!(response.status(), 504);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(edge.upstream.state(), HealthState::Failing);

    edge.stop().await;
}

#[tokio::test]
async fn malformed_chunked_body_is_bad_request() {
    let cert = self_signed_cert();
    let upstream = start_silent_upstream().await;
    let edge = start_edge(test_config(&cert, upstream.addr)).await;

    let response = tls_exchange(
        edge.https_addr,
        &cert,
        b"POST /upload HTTP/1.1\r\nHost: libretees.com\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\nzz\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert_eq!(edge.upstream.state(), HealthState::Healthy);

    edge.stop().await;
}

#[tokio::test]
async fn client_disconnect_cancels_upstream_request() {
    let cert = self_signed_cert();
    let upstream = start_silent_upstream().await;
    let mut config = test_config(&cert, upstream.addr);
    config.timeouts.read_secs = 30;
    let edge = start_edge(config).await;

    let err = edge
        .client()
        .get(edge.https_url("/slow"))
        .timeout(Duration::from_millis(500))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");

    // The abandoned request must not keep the upstream connection open.
    let released = tokio::time::timeout(Duration::from_secs(5), async {
        while upstream.closed_count() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "upstream connection outlived the client");
    assert_eq!(upstream.connection_count(), 1);
    assert_eq!(edge.upstream.state(), HealthState::Healthy);

    edge.stop().await;
}

#[tokio::test]
async fn tls_below_floor_is_rejected_before_forwarding() {
    let cert = self_signed_cert();
    let upstream = start_upstream(|_| ok_response("ok")).await;
    let mut config = test_config(&cert, upstream.addr);
    config.tls.min_tls_version = "1.3".into();
    let edge = start_edge(config).await;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let client_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS12])
        .unwrap()
        .with_root_certificates(rustls::RootCertStore::empty())
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(client_config));

    let tcp = TcpStream::connect(edge.https_addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let handshake = tokio::time::timeout(Duration::from_secs(5), connector.connect(server_name, tcp))
        .await
        .expect("handshake hung");
    assert!(handshake.is_err());

    // TLS 1.3 still works on the same listener.
    let response = edge.client().get(edge.https_url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(upstream.connection_count(), 1);

    edge.stop().await;
}

#[tokio::test]
async fn garbage_on_tls_port_is_dropped() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let cert = self_signed_cert();
    let upstream = start_upstream(|_| ok_response("ok")).await;
    let edge = start_edge(test_config(&cert, upstream.addr)).await;

    let mut stream = TcpStream::connect(edge.https_addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: libretees.com\r\n\r\n")
        .await
        .unwrap();
    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;

    assert!(!String::from_utf8_lossy(&buf).contains("HTTP/1.1 200"));
    assert_eq!(upstream.connection_count(), 0);

    edge.stop().await;
}

#[tokio::test]
async fn mismatched_key_fails_startup() {
    let cert = self_signed_cert();
    let other = self_signed_cert();
    let mut config = test_config(&cert, "127.0.0.1:9".parse().unwrap());
    config.tls.key_path = other.key_path.display().to_string();

    let result = EdgeServer::bind(config).await;
    assert!(matches!(result, Err(StartupError::Tls(_))));
}

#[tokio::test]
async fn missing_certificate_fails_startup() {
    let cert = self_signed_cert();
    let mut config = test_config(&cert, "127.0.0.1:9".parse().unwrap());
    config.tls.cert_path = "/nonexistent/cert.pem".into();

    let result = EdgeServer::bind(config).await;
    assert!(matches!(result, Err(StartupError::Tls(_))));
}

#[tokio::test]
async fn invalid_config_fails_startup() {
    let cert = self_signed_cert();
    let mut config = test_config(&cert, "127.0.0.1:9".parse().unwrap());
    config.upstream.address = "no-port".into();

    let result = EdgeServer::bind(config).await;
    assert!(matches!(result, Err(StartupError::Config(_))));
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let cert = self_signed_cert();
    let upstream = start_upstream(|_| ok_response("ok")).await;
    let edge = start_edge(test_config(&cert, upstream.addr)).await;
    let http_addr = edge.http_addr;

    edge.stop().await;

    assert!(TcpStream::connect(http_addr).await.is_err());
}
