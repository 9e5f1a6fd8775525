//! Known upstream services and their clients.
//!
//! URL resolution, first match wins:
//! 1. `[[services]]` entry in the config (already env-overridden by the loader)
//! 2. `<NAME>_SERVICE_URL` environment variable
//! 3. Built-in default `http://<name>-service:<port>`
//!
//! Breakers already in the registry take on the current breaker settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::service::ServiceClient;
use crate::client::transport::Transport;
use crate::config::loader::service_url_var;
use crate::config::{BreakerConfig, GatewayConfig};
use crate::resilience::registry::BreakerRegistry;

/// Default ports of the storefront services.
pub const DEFAULT_SERVICES: &[(&str, u16)] = &[
    ("auth", 3001),
    ("user", 3002),
    ("order", 3003),
    ("cart", 3004),
    ("wishlist", 3005),
    ("review", 3006),
    ("notification", 3007),
    ("payment", 3008),
    ("product", 3009),
    ("contact", 3011),
    ("promotion", 3019),
];

pub fn default_url(name: &str, port: u16) -> String {
    format!("http://{}-service:{}", name, port)
}

/// Name → client map. Clients share breakers through the registry.
#[derive(Debug, Default)]
pub struct ServiceDirectory {
    clients: BTreeMap<String, ServiceClient>,
}

impl ServiceDirectory {
    /// Build from config, reading overrides from the process environment.
    pub fn from_config(
        config: &GatewayConfig,
        registry: &BreakerRegistry,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_lookup(config, registry, transport, |key| std::env::var(key).ok())
    }

    pub fn with_lookup<F>(
        config: &GatewayConfig,
        registry: &BreakerRegistry,
        transport: Arc<dyn Transport>,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut urls: BTreeMap<String, (String, BreakerConfig)> = BTreeMap::new();

        for (name, port) in DEFAULT_SERVICES {
            let url = lookup(&service_url_var(name)).unwrap_or_else(|| default_url(name, *port));
            urls.insert(name.to_string(), (url, config.breaker.clone()));
        }
        for service in &config.services {
            let breaker = service.breaker.clone().unwrap_or_else(|| config.breaker.clone());
            urls.insert(service.name.clone(), (service.url.clone(), breaker));
        }

        let clients = urls
            .into_iter()
            .map(|(name, (url, breaker_config))| {
                let breaker = registry.configure(&name, &breaker_config);
                tracing::debug!(service = %name, url = %url, "Registered upstream service");
                let client = ServiceClient::new(name.clone(), url, breaker, Arc::clone(&transport));
                (name, client)
            })
            .collect();

        Self { clients }
    }

    pub fn client(&self, name: &str) -> Option<&ServiceClient> {
        self.clients.get(name)
    }

    pub fn clients(&self) -> impl Iterator<Item = &ServiceClient> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
