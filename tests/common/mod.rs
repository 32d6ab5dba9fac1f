//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use trust_gateway::config::GatewayConfig;
use trust_gateway::net::{OutboundRequest, RawResponse, Transport, TransportError};
use trust_gateway::observability::TracingObserver;
use trust_gateway::{BreakerRegistry, CredentialVerifier};

pub const IDENTITY: &str = r#"{"user_id":"u-42","role":"admin"}"#;

/// One scripted answer of the identity service.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(u16, &'static str),
    Fail(TransportError),
    /// Answer after a delay.
    Slow(Duration, u16, &'static str),
    /// Never answer.
    Hang,
}

/// A transport that replays a script and records what it was sent.
/// Once the script runs out it keeps answering with `fallback`.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Self::with_fallback(steps, Step::Respond(200, IDENTITY))
    }

    pub fn with_fallback(steps: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Respond(status, body) => Ok(raw(status, body)),
            Step::Fail(err) => Err(err),
            Step::Slow(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(raw(status, body))
            }
            Step::Hang => std::future::pending().await,
        }
    }
}

fn raw(status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        body: body.as_bytes().to_vec(),
    }
}

pub fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

/// Defaults with the fixture CA and fast retries.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.name = "identity".into();
    config.upstream.verify_url = "https://identity.test/v1/verify".into();
    config.upstream.ca_bundle_path = fixture("ca.pem");
    config
}

pub fn registry(config: &GatewayConfig) -> Arc<BreakerRegistry> {
    Arc::new(BreakerRegistry::new(config.breaker.clone(), Arc::new(TracingObserver)))
}

pub fn verifier(
    config: &GatewayConfig,
    transport: Arc<ScriptedTransport>,
    registry: &BreakerRegistry,
) -> CredentialVerifier<ScriptedTransport> {
    CredentialVerifier::with_transport(config, transport, registry).unwrap()
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A plain-TCP peer that answers every connection with a fixed HTTP
/// response, without TLS. Returns the bound address.
pub async fn start_plaintext_peer(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Paths requested from a TLS peer, in arrival order.
pub type PeerLog = Arc<Mutex<Vec<String>>>;

/// Body size served on `/v1/oversized`.
pub const OVERSIZED_BODY_BYTES: usize = 128 * 1024;

/// An HTTPS peer presenting `cert`/`key` from the fixtures. Every path
/// answers with `IDENTITY`, except `/v1/moved` (307 to `/elsewhere`) and
/// `/v1/oversized`.
pub async fn start_tls_peer(cert: &str, key: &str) -> (SocketAddr, PeerLog) {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let tls = RustlsConfig::from_pem_file(fixture(cert), fixture(key))
        .await
        .unwrap();

    let log = PeerLog::default();
    let app = Router::new().fallback(peer_answer).with_state(log.clone());

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum_server::from_tcp_rustls(listener, tls);
    tokio::spawn(async move {
        let _ = server.serve(app.into_make_service()).await;
    });

    (addr, log)
}

async fn peer_answer(State(log): State<PeerLog>, uri: Uri) -> Response {
    log.lock().unwrap().push(uri.path().to_string());
    match uri.path() {
        "/v1/moved" => (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, "/elsewhere")]).into_response(),
        "/v1/oversized" => (
            [(CONTENT_TYPE, "application/json")],
            "x".repeat(OVERSIZED_BODY_BYTES),
        )
            .into_response(),
        _ => ([(CONTENT_TYPE, "application/json")], IDENTITY).into_response(),
    }
}
