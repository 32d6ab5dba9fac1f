//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router (protected session route, dependency health)
//! - Wire tower-http layers (request id, tracing, timeout)
//! - Serve until Ctrl+C
//!
//! # Design Decisions
//! - The outer timeout is a backstop a little longer than the call
//!   deadline, so the gateway's own deadline error wins the race

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::auth::require_credential;
use crate::net::{Transport, TrustedTransport};
use crate::resilience::{BreakerRegistry, BreakerSnapshot, CircuitState};
use crate::verify::{CredentialVerifier, VerifiedIdentity};

/// Extra time the outer timeout layer grants past the call deadline.
const TIMEOUT_GRACE: Duration = Duration::from_millis(250);

/// Application state injected into handlers.
pub struct AppState<T = TrustedTransport> {
    pub verifier: Arc<CredentialVerifier<T>>,
    pub registry: Arc<BreakerRegistry>,
    pub request_timeout: Duration,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            verifier: self.verifier.clone(),
            registry: self.registry.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// HTTP server of the owning service.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new<T>(
        config: GatewayConfig,
        verifier: Arc<CredentialVerifier<T>>,
        registry: Arc<BreakerRegistry>,
    ) -> Self
    where
        T: Transport + 'static,
    {
        let state = AppState {
            verifier,
            registry,
            request_timeout: config.service.request_timeout(),
        };
        let router = build_router(state);
        Self { router, config }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_ms = self.config.service.request_timeout_ms,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router<T>(state: AppState<T>) -> Router
where
    T: Transport + 'static,
{
    let timeout = state.request_timeout + TIMEOUT_GRACE;

    let protected = Router::new()
        .route("/v1/session", get(session))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_credential::<T>));

    Router::new()
        .merge(protected)
        .route("/health/dependencies", get(dependencies::<T>))
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// The identity behind the request's credential.
async fn session(Extension(identity): Extension<VerifiedIdentity>) -> Json<VerifiedIdentity> {
    Json(identity)
}

#[derive(Debug, Serialize)]
pub struct DependencyHealth {
    pub status: &'static str,
    pub dependencies: Vec<BreakerSnapshot>,
}

/// Breaker state of every known dependency. 503 while any breaker is open.
async fn dependencies<T>(State(state): State<AppState<T>>) -> impl IntoResponse
where
    T: Transport + 'static,
{
    let dependencies = state.registry.snapshots();

    let open = dependencies.iter().any(|d| d.state == CircuitState::Open);
    let (status, label) = if open {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        status,
        Json(DependencyHealth {
            status: label,
            dependencies,
        }),
    )
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
