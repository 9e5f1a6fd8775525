//! Named breaker registry.
//!
//! Guarantees a single breaker per upstream dependency within the process,
//! so every client of `product` shares the same failure view.

use dashmap::DashMap;
use std::sync::Arc;

use crate::config::BreakerConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};

#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the breaker for `name`, creating it with `config` on first use.
    ///
    /// `config` is ignored when the breaker already exists.
    pub fn get_or_create(&self, name: &str, config: &BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(circuit = %name, "Circuit breaker created");
                Arc::new(CircuitBreaker::new(name, config.clone()))
            })
            .value()
            .clone()
    }

    /// Like [`get_or_create`](Self::get_or_create), but an existing breaker
    /// takes on `config`. Used when the config is reloaded.
    pub fn configure(&self, name: &str, config: &BreakerConfig) -> Arc<CircuitBreaker> {
        let breaker = self.get_or_create(name, config);
        breaker.update_config(config.clone());
        breaker
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|r| r.value().clone())
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|r| r.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// True when every breaker is Closed.
    pub fn all_closed(&self) -> bool {
        self.breakers
            .iter()
            .all(|r| r.value().state() == CircuitState::Closed)
    }

    /// Force every breaker Closed.
    pub fn reset_all(&self) {
        for r in self.breakers.iter() {
            r.value().reset();
        }
        tracing::info!(count = self.breakers.len(), "All circuit breakers reset");
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
