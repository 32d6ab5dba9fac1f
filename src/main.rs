//! Trust gateway service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request           ┌───────────────────────────────────────────┐
//!     ────────────────────────▶│ http (request id, trace, timeout layers)  │
//!                              │   → require_credential                    │
//!                              │       → CredentialVerifier                │
//!                              │           → CallExecutor                  │
//!                              │               breaker / budget / retries  │
//!                              │               → TrustedTransport ─────────┼──▶ identity service
//!                              │   → handler                               │    (pinned CA, mTLS)
//!     ◀────────────────────────│ response (status mapping, Retry-After)    │
//!                              └───────────────────────────────────────────┘
//! ```
//!
//! A missing or malformed CA bundle aborts startup.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use trust_gateway::config::{self, GatewayConfig};
use trust_gateway::observability::{logging, metrics, TracingObserver};
use trust_gateway::{BreakerRegistry, CredentialVerifier, GatewayServer};

#[derive(Parser)]
#[command(name = "trust-gateway")]
#[command(
    about = "Credential-verifying service with a resilient identity gateway",
    long_about = None
)]
struct Args {
    /// Path to the TOML configuration file. Defaults plus GATEWAY_* variables when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("trust-gateway: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("trust-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

fn load(args: &Args) -> Result<GatewayConfig, config::ConfigError> {
    match &args.config {
        Some(path) => config::load_config(path),
        None => config::load_from_env(),
    }
}

async fn run(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.service.bind_address,
        dependency = %config.upstream.name,
        verify_url = %config.upstream.verify_url,
        trip_threshold = config.breaker.trip_threshold,
        max_attempts = config.retries.max_attempts,
        attempt_timeout_ms = config.timeouts.attempt_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let observer = Arc::new(TracingObserver);
    let registry = Arc::new(BreakerRegistry::new(config.breaker.clone(), observer));
    // Trust material is loaded here; failure is fatal.
    let verifier = Arc::new(CredentialVerifier::from_config(&config, &registry)?);

    let listener = TcpListener::bind(&config.service.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = GatewayServer::new(config, verifier, registry);
    server.run(listener).await?;
    Ok(())
}
