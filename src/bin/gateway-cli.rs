use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use trust_gateway::config::{self, GatewayConfig};
use trust_gateway::net::tls;
use trust_gateway::observability::{logging, TracingObserver};
use trust_gateway::{BreakerRegistry, CallContext, CredentialVerifier, GatewayError};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the trust gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify one credential through the full gateway stack
    Verify {
        #[arg(short, long)]
        token: String,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Caller deadline for the whole call
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Load and validate a configuration file and its trust material
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Verify {
            token,
            config,
            timeout_ms,
        } => {
            let config = load(config.as_deref())?;
            logging::init_logging(&config.observability.log_level);
            verify(&config, &token, timeout_ms).await
        }
        Commands::CheckConfig { config } => check_config(&config),
    }
}

fn load(path: Option<&Path>) -> Result<GatewayConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config(path),
        None => config::load_from_env(),
    }
}

async fn verify(
    config: &GatewayConfig,
    token: &str,
    timeout_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = BreakerRegistry::new(config.breaker.clone(), Arc::new(TracingObserver));
    let verifier = CredentialVerifier::from_config(config, &registry)?;

    let ctx = match timeout_ms {
        Some(ms) => CallContext::with_timeout(Duration::from_millis(ms)),
        None => CallContext::new(),
    };

    match verifier.verify_credential(&ctx, token).await {
        Ok(identity) => {
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.kind(), e);
            if let GatewayError::RemoteUnavailable { last, .. } = &e {
                eprintln!("Last failure: {}", last);
            }
            let snapshot = verifier.breaker_snapshot();
            eprintln!(
                "Breaker {}: {} ({} consecutive failures)",
                snapshot.dependency, snapshot.state, snapshot.consecutive_failures
            );
            std::process::exit(exit_code(&e));
        }
    }
}

fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(path)?;
    let certs = tls::load_ca_bundle(Path::new(&config.upstream.ca_bundle_path))?;
    if let Some(identity) = &config.upstream.client_identity {
        tls::load_client_identity(identity)?;
    }

    println!("{}", toml::to_string_pretty(&config)?);
    println!("# {} trusted CA certificate(s) loaded", certs.len());
    Ok(())
}

/// Distinct exit codes so scripts can tell outcomes apart.
fn exit_code(err: &GatewayError) -> i32 {
    match err {
        GatewayError::FatalResponse { .. } => 2,
        GatewayError::BreakerOpen { .. } | GatewayError::RemoteUnavailable { .. } => 3,
        GatewayError::CallerDeadlineExceeded { .. } => 4,
        GatewayError::Config(_) | GatewayError::TrustConfiguration { .. } => 1,
    }
}
