//! Upstream connection pool.
//!
//! # Responsibilities
//! - Keep-alive connection reuse toward the backend
//! - Bound the number of in-flight upstream requests
//! - Enforce connect and read deadlines per attempt
//! - Classify failures and report them to the health tracker

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use http_body_util::LengthLimitError;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, Sleep};

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::error::ProxyError;
use crate::health::passive;
use crate::resilience::{with_deadline, AttemptError};
use crate::security::ClientBodyError;
use crate::upstream::Backend;

/// Shared handle for sending requests to the upstream.
#[derive(Clone)]
pub struct UpstreamPool {
    backend: Arc<Backend>,
    client: Client<HttpConnector, Body>,
    /// One permit per in-flight request, held until the response body ends.
    slots: Arc<Semaphore>,
    max_in_flight: usize,
    read_timeout: Duration,
}

impl UpstreamPool {
    pub fn new(backend: Arc<Backend>, upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .pool_max_idle_per_host(upstream.max_connections)
            .build(connector);

        tracing::debug!(
            upstream = %backend.authority(),
            max_connections = upstream.max_connections,
            read_timeout_secs = timeouts.read_secs,
            "Upstream pool created"
        );

        Self {
            backend,
            client,
            slots: Arc::new(Semaphore::new(upstream.max_connections)),
            max_in_flight: upstream.max_connections,
            read_timeout: Duration::from_secs(timeouts.read_secs),
        }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Requests currently holding an upstream slot.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.slots.available_permits()
    }

    /// Forward `request` to the backend, rewriting its target URI.
    ///
    /// The read timeout bounds the wait for a free slot plus response
    /// headers, and then each gap between response body frames.
    pub async fn send(&self, mut request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let target = {
            let path_and_query = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            self.backend
                .uri_for(path_and_query)
                .map_err(|e| ProxyError::ClientProtocol(e.to_string()))?
        };
        *request.uri_mut() = target;

        let attempt = async {
            let slot = self
                .slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| self.unavailable(e))?;
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| self.classify(e))?;
            Ok::<_, ProxyError>((slot, response))
        };

        let outcome = with_deadline(self.read_timeout, attempt)
            .await
            .map_err(|e| match e {
                AttemptError::Failed(e) => e,
                AttemptError::TimedOut(timeout) => ProxyError::UpstreamTimeout {
                    upstream: self.backend.authority().to_string(),
                    timeout,
                },
            });

        passive::observe(&self.backend, &outcome);

        match outcome {
            Ok((slot, response)) => {
                let (parts, body) = response.into_parts();
                let body = UpstreamBody {
                    inner: Body::new(body),
                    idle: Box::pin(tokio::time::sleep(self.read_timeout)),
                    read_timeout: self.read_timeout,
                    backend: self.backend.clone(),
                    _slot: slot,
                };
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Err(e) => {
                if e.counts_against_upstream() {
                    tracing::error!(upstream = %self.backend.authority(), error = %e, "Upstream request failed");
                }
                Err(e)
            }
        }
    }

    fn classify(&self, error: hyper_util::client::legacy::Error) -> ProxyError {
        // Checked first: a failed client body can itself wrap a limit error.
        if source_chain(&error).any(|e| e.is::<ClientBodyError>()) {
            return ProxyError::ClientProtocol(error.to_string());
        }
        if source_chain(&error).any(|e| e.is::<LengthLimitError>()) {
            return ProxyError::PayloadTooLarge;
        }

        let connect_timed_out = error.is_connect()
            && source_chain(&error).any(|e| {
                e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
            });
        if connect_timed_out {
            return ProxyError::UpstreamTimeout {
                upstream: self.backend.authority().to_string(),
                timeout: self.read_timeout,
            };
        }

        self.unavailable(error)
    }

    fn unavailable(&self, error: impl StdError + Send + Sync + 'static) -> ProxyError {
        ProxyError::UpstreamUnavailable {
            upstream: self.backend.authority().to_string(),
            source: Box::new(error),
        }
    }
}

fn source_chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&e| e.source())
}

/// Response body that keeps its upstream slot until dropped and fails
/// once the upstream goes quiet for longer than the read timeout.
struct UpstreamBody {
    inner: Body,
    idle: Pin<Box<Sleep>>,
    read_timeout: Duration,
    backend: Arc<Backend>,
    _slot: OwnedSemaphorePermit,
}

impl HttpBody for UpstreamBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = &mut *self;
        if let Poll::Ready(frame) = Pin::new(&mut this.inner).poll_frame(cx) {
            let deadline = Instant::now() + this.read_timeout;
            this.idle.as_mut().reset(deadline);
            return Poll::Ready(frame);
        }

        ready!(this.idle.as_mut().poll(cx));
        tracing::warn!(
            upstream = %this.backend.authority(),
            timeout_secs = this.read_timeout.as_secs(),
            "Upstream response body stalled"
        );
        this.backend.mark_failure();
        Poll::Ready(Some(Err(axum::Error::new(ProxyError::UpstreamTimeout {
            upstream: this.backend.authority().to_string(),
            timeout: this.read_timeout,
        }))))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
