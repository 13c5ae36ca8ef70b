//! Edge server setup and connection driving.
//!
//! # Responsibilities
//! - Build the redirect and proxy routers with their middleware
//! - Bind the plaintext and TLS listeners
//! - Run one accept loop per listener and one task per connection
//! - Drive HTTP/1.1 and HTTP/2 over plain or TLS streams with hyper
//! - Graceful shutdown: stop accepting, finish in-flight requests, drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower::ServiceExt;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::{validation::validate_config, ConfigError, ProxyConfig};
use crate::error::StartupError;
use crate::http::origin::PublicOrigin;
use crate::http::proxy::{self, AppState};
use crate::http::redirect::{self, RedirectState};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionGuard, ConnectionTracker, Listener, TlsTerminator};
use crate::security::BodyLimit;
use crate::upstream::{Backend, UpstreamPool};

/// How an accepted socket becomes an HTTP stream.
#[derive(Clone)]
enum Handshake {
    Plain,
    Tls(TlsTerminator),
}

/// The bound edge server: a plaintext redirector and a TLS-terminating proxy.
pub struct EdgeServer {
    config: ProxyConfig,
    http_listener: Listener,
    https_listener: Listener,
    http_addr: SocketAddr,
    https_addr: SocketAddr,
    tls: TlsTerminator,
    redirect_app: Router,
    proxy_app: Router,
    upstream: Arc<Backend>,
    connections: ConnectionTracker,
}

impl EdgeServer {
    /// Validate `config`, load TLS material and bind both listeners.
    ///
    /// Listeners are bound last so no traffic arrives before the rest is ready.
    pub async fn bind(config: ProxyConfig) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let tls = TlsTerminator::load(&config.tls)?;
        let upstream = Arc::new(Backend::from_config(&config.upstream)?);
        let pool = UpstreamPool::new(upstream.clone(), &config.upstream, &config.timeouts);

        let redirect_app =
            with_request_layers(redirect::router(RedirectState::from_config(&config.listener)));
        let proxy_app = with_request_layers(proxy::router(
            AppState {
                pool,
                origin: PublicOrigin::from_config(&config.listener),
            },
            BodyLimit(config.limits.max_body_size),
        ));

        let max_connections = config.listener.max_connections;
        let http_listener =
            Listener::bind("http", &config.listener.listen_http, max_connections).await?;
        let https_listener =
            Listener::bind("https", &config.listener.listen_https, max_connections).await?;

        let local_addr = |listener: &Listener, address: &str| {
            listener
                .local_addr()
                .map_err(|source| crate::net::ListenerError::Bind {
                    address: address.to_string(),
                    source,
                })
        };
        let http_addr = local_addr(&http_listener, &config.listener.listen_http)?;
        let https_addr = local_addr(&https_listener, &config.listener.listen_https)?;

        tracing::info!(
            http = %http_addr,
            https = %https_addr,
            upstream = %upstream.authority(),
            public_host = %config.listener.public_host,
            "Edge server bound"
        );

        Ok(Self {
            config,
            http_listener,
            https_listener,
            http_addr,
            https_addr,
            tls,
            redirect_app,
            proxy_app,
            upstream,
            connections: ConnectionTracker::new(),
        })
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn https_addr(&self) -> SocketAddr {
        self.https_addr
    }

    /// The upstream and its health record.
    pub fn upstream(&self) -> Arc<Backend> {
        self.upstream.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then drain live connections.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let drain = Shutdown::new();

        let http = tokio::spawn(accept_loop(
            self.http_listener,
            Handshake::Plain,
            self.redirect_app,
            self.connections.clone(),
            drain.clone(),
        ));
        let https = tokio::spawn(accept_loop(
            self.https_listener,
            Handshake::Tls(self.tls),
            self.proxy_app,
            self.connections.clone(),
            drain.clone(),
        ));

        let _ = shutdown.recv().await;
        tracing::info!("Shutdown requested, no longer accepting connections");

        // Accept loops stop before connections are told, so none can miss the signal.
        http.abort();
        https.abort();
        let _ = tokio::join!(http, https);
        drain.trigger();

        let timeout = Duration::from_secs(self.config.lifecycle.shutdown_timeout_secs);
        let active = self.connections.active_count();
        if active > 0 {
            tracing::info!(active_connections = active, ?timeout, "Draining connections");
        }
        if self.connections.wait_for_drain(timeout).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                remaining = self.connections.active_count(),
                "Shutdown timeout reached with connections still open"
            );
        }
    }
}

/// Request ID assignment and per-request spans, shared by both listeners.
fn with_request_layers(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

async fn accept_loop(
    listener: Listener,
    handshake: Handshake,
    app: Router,
    connections: ConnectionTracker,
    drain: Shutdown,
) {
    loop {
        let (stream, peer, permit) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(listener = listener.name(), error = %e, "Accept loop stopped");
                return;
            }
        };

        let guard = connections.track();
        let shutdown = drain.subscribe();
        let handshake = handshake.clone();
        let app = app.clone();
        let name = listener.name();

        tokio::spawn(async move {
            let _permit = permit;
            match handshake {
                Handshake::Plain => serve_connection(stream, peer, app, shutdown, guard).await,
                Handshake::Tls(tls) => match tls.accept(stream).await {
                    Ok(stream) => serve_connection(stream, peer, app, shutdown, guard).await,
                    Err(e) => {
                        tracing::debug!(
                            listener = name,
                            connection_id = %guard.id(),
                            peer_addr = %peer,
                            error = %e,
                            "TLS handshake failed"
                        );
                    }
                },
            }
        });
    }
}

/// Drive one HTTP connection to completion.
async fn serve_connection<I>(
    io: I,
    peer: SocketAddr,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
    guard: ConnectionGuard,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(io), service);
    tokio::pin!(connection);

    let mut shutting_down = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer_addr = %peer,
                        error = %e,
                        "Connection ended with error"
                    );
                }
                break;
            }
            _ = shutdown.recv(), if !shutting_down => {
                connection.as_mut().graceful_shutdown();
                shutting_down = true;
            }
        }
    }
}
