//! Pinned-trust outbound transport.
//!
//! # Responsibilities
//! - Build an HTTPS client that trusts only the configured CA bundle
//! - Present the client identity for mutual TLS when configured
//! - Bound concurrent connections per host; callers wait for a slot
//! - Report transport failures without interpreting them
//!
//! # Design Decisions
//! - Built-in root certificates are disabled; there is no bypass
//! - Redirects are never followed; a 3xx is handed back as-is
//! - Response bodies are read up to a fixed cap
//! - Pool exhaustion blocks rather than fails; the executor bounds the
//!   wait with the caller's deadline
//! - The `Transport` trait is the seam the executor is generic over

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::net::tls;

/// One outbound HTTP request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// The status and full body of an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A failure below HTTP: nothing usable came back from the peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// DNS, TCP connect or connect timeout.
    #[error("connect error: {0}")]
    Connect(String),

    /// The peer's certificate did not validate against the pinned roots.
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// The connection broke after it was established.
    #[error("I/O error: {0}")]
    Io(String),

    /// The remote answered, but the body exceeded the configured cap.
    #[error("response body exceeds {limit} bytes (status {status})")]
    ResponseTooLarge { status: u16, limit: usize },
}

/// Sends requests to the upstream.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// HTTPS client pinned to an operator-supplied CA bundle.
#[derive(Debug)]
pub struct TrustedTransport {
    client: reqwest::Client,
    /// Host → connection slots.
    limits: DashMap<String, Arc<Semaphore>>,
    max_connections_per_host: usize,
    max_response_bytes: usize,
}

impl TrustedTransport {
    /// Build the transport. Fails with `TrustConfiguration` when the trust
    /// material cannot be loaded.
    pub fn from_config(
        upstream: &UpstreamConfig,
        timeouts: &TimeoutConfig,
    ) -> GatewayResult<Self> {
        let ca_path = Path::new(&upstream.ca_bundle_path);
        let roots = tls::load_ca_bundle(ca_path)?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .https_only(true)
            .redirect(reqwest::redirect::Policy::none())
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .no_proxy()
            .connect_timeout(timeouts.connect())
            .pool_max_idle_per_host(upstream.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(upstream.idle_timeout_secs));

        for root in roots {
            builder = builder.add_root_certificate(root);
        }

        if let Some(identity_config) = &upstream.client_identity {
            builder = builder.identity(tls::load_client_identity(identity_config)?);
        }

        let client = builder.build().map_err(|e| GatewayError::TrustConfiguration {
            path: upstream.ca_bundle_path.clone(),
            reason: format!("failed to build TLS client: {}", e),
        })?;

        tracing::info!(
            ca_bundle = %upstream.ca_bundle_path,
            mutual_tls = upstream.client_identity.is_some(),
            max_connections_per_host = upstream.max_connections_per_host,
            max_idle_per_host = upstream.max_idle_per_host,
            "Trusted transport initialized"
        );

        Ok(Self {
            client,
            limits: DashMap::new(),
            max_connections_per_host: upstream.max_connections_per_host.max(1),
            max_response_bytes: upstream.max_response_bytes,
        })
    }

    /// Wait for a connection slot to `target`'s host.
    pub async fn open(&self, target: &Url) -> Result<ConnectionHandle, TransportError> {
        let key = host_key(target);
        let slots = self
            .limits
            .entry(key)
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_connections_per_host)))
            .clone();

        let permit = slots
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Connect("connection pool closed".to_string()))?;

        Ok(ConnectionHandle {
            client: self.client.clone(),
            max_response_bytes: self.max_response_bytes,
            _permit: permit,
        })
    }

    /// Slots currently free for `target`'s host.
    pub fn available_connections(&self, target: &Url) -> usize {
        self.limits
            .get(&host_key(target))
            .map(|s| s.available_permits())
            .unwrap_or(self.max_connections_per_host)
    }
}

impl Transport for TrustedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        if self.available_connections(&request.url) == 0 {
            tracing::debug!(host = %host_key(&request.url), "Connection pool saturated, waiting");
        }
        let handle = self.open(&request.url).await?;
        handle.execute(request).await
    }
}

/// A held connection slot. The slot is returned when the handle drops.
#[derive(Debug)]
pub struct ConnectionHandle {
    client: reqwest::Client,
    max_response_bytes: usize,
    _permit: OwnedSemaphorePermit,
}

impl ConnectionHandle {
    pub async fn execute(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        let mut response = self
            .client
            .post(request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let limit = self.max_response_bytes;
        let too_large = TransportError::ResponseTooLarge { status, limit };
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(too_large);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            if body.len() + chunk.len() > limit {
                return Err(too_large);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RawResponse { status, body })
    }
}

fn host_key(url: &Url) -> String {
    format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let detail = error_chain(&err);
    if looks_like_tls(&detail) {
        TransportError::TlsHandshake(detail)
    } else if err.is_connect() || err.is_timeout() {
        TransportError::Connect(detail)
    } else {
        TransportError::Io(detail)
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        detail.push_str(": ");
        detail.push_str(&inner.to_string());
        source = inner.source();
    }
    detail
}

fn looks_like_tls(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    lower.contains("certificate") || lower.contains("handshake") || lower.contains("tls")
}
