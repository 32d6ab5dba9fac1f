//! Per-dependency breaker registry.
//!
//! Owned by the embedding service and injected into every executor that
//! targets the same dependency, so breaker state is shared between them
//! while tests can still build isolated registries.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::BreakerConfig;
use crate::observability::GatewayObserver;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

/// Map of dependency name → shared breaker.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: BreakerConfig,
    observer: Arc<dyn GatewayObserver>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig, observer: Arc<dyn GatewayObserver>) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            observer,
        }
    }

    /// The breaker for `dependency`, created Closed on first use.
    pub fn get_or_create(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(dependency) {
            return existing.clone();
        }
        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                tracing::debug!(dependency, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(
                    dependency,
                    self.config.clone(),
                    self.observer.clone(),
                ))
            })
            .clone()
    }

    pub fn observer(&self) -> Arc<dyn GatewayObserver> {
        self.observer.clone()
    }

    pub fn get(&self, dependency: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(dependency).map(|b| b.clone())
    }

    /// Snapshots of every breaker, sorted by dependency name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        snapshots
    }
}
