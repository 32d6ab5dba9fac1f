//! The "verify credential" operation.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::GatewayConfig;
use crate::context::CallContext;
use crate::error::{GatewayError, GatewayResult};
use crate::net::{Transport, TrustedTransport};
use crate::resilience::{BreakerRegistry, BreakerSnapshot, CallExecutor, ExecutorConfig};
use crate::verify::types::VerifiedIdentity;

/// Verifies bearer credentials against the identity service.
pub struct CredentialVerifier<T = TrustedTransport> {
    executor: CallExecutor<T>,
    verify_url: Url,
}

impl CredentialVerifier<TrustedTransport> {
    /// Build the production verifier. Fails when the trust material cannot
    /// be loaded, which must abort startup.
    pub fn from_config(config: &GatewayConfig, registry: &BreakerRegistry) -> GatewayResult<Self> {
        let transport = TrustedTransport::from_config(&config.upstream, &config.timeouts)?;
        Self::with_transport(config, Arc::new(transport), registry)
    }
}

impl<T: Transport> CredentialVerifier<T> {
    /// Build a verifier over any transport, sharing the registry's breaker
    /// for `upstream.name`.
    pub fn with_transport(
        config: &GatewayConfig,
        transport: Arc<T>,
        registry: &BreakerRegistry,
    ) -> GatewayResult<Self> {
        let verify_url = Url::parse(&config.upstream.verify_url)
            .map_err(|e| GatewayError::Config(format!("upstream.verify_url: {}", e)))?;
        let breaker = registry.get_or_create(&config.upstream.name);
        let executor = CallExecutor::new(
            transport,
            breaker,
            ExecutorConfig::from_config(config),
            registry.observer(),
        );

        Ok(Self {
            executor,
            verify_url,
        })
    }

    pub fn dependency(&self) -> &str {
        self.executor.breaker().dependency()
    }

    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.executor.breaker().snapshot()
    }

    /// How long the breaker stays open; a sensible `Retry-After`.
    pub fn cool_down(&self) -> Duration {
        self.executor.breaker().config().cool_down()
    }

    /// Verify `token` within the budget carried by `ctx`.
    pub async fn verify_credential(
        &self,
        ctx: &CallContext,
        token: &str,
    ) -> GatewayResult<VerifiedIdentity> {
        let body = serde_json::json!({ "token": token }).to_string().into_bytes();
        let identity: VerifiedIdentity = self
            .executor
            .perform_trusted_call(ctx, &self.verify_url, body)
            .await?;

        tracing::debug!(
            request_id = %ctx.request_id(),
            user_id = %identity.user_id,
            role = %identity.role,
            "Credential verified"
        );
        Ok(identity)
    }
}
