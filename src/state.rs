//! Application state shared between the web surface and background services.

use crate::config::Config;
use crate::pipeline::Pipeline;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Health status of a service.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    Active,
    Disabled,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub status: ServiceStatus,
    pub updated_at: Instant,
}

/// Thread-safe registry services report their health into.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatusRegistry {
    inner: Arc<DashMap<String, StatusEntry>>,
}

impl ServiceStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, status: ServiceStatus) {
        self.inner.insert(
            name.to_owned(),
            StatusEntry {
                status,
                updated_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<ServiceStatus> {
        self.inner.get(name).map(|entry| entry.status)
    }

    /// Snapshot of every service's status, sorted by name.
    pub fn all(&self) -> Vec<(String, ServiceStatus)> {
        let mut all: Vec<_> = self
            .inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub service_statuses: ServiceStatusRegistry,
}

impl AppState {
    pub fn new(config: Arc<Config>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            config,
            pipeline,
            service_statuses: ServiceStatusRegistry::new(),
        }
    }

    /// Request credentials, falling back to the configured defaults.
    pub fn credentials_or_default(
        &self,
        username: Option<String>,
        password: Option<String>,
    ) -> Option<(String, String)> {
        let defaults = self.config.default_credentials();
        let username = username
            .filter(|u| !u.is_empty())
            .or_else(|| defaults.as_ref().map(|(u, _)| u.clone()))?;
        let password = password
            .filter(|p| !p.is_empty())
            .or_else(|| defaults.map(|(_, p)| p))?;
        Some((username, password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_set_and_get() {
        let registry = ServiceStatusRegistry::new();
        assert_eq!(registry.get("web"), None);

        registry.set("web", ServiceStatus::Starting);
        registry.set("web", ServiceStatus::Active);
        registry.set("renewal", ServiceStatus::Error);

        assert_eq!(registry.get("web"), Some(ServiceStatus::Active));
        assert_eq!(
            registry.all(),
            vec![
                ("renewal".to_owned(), ServiceStatus::Error),
                ("web".to_owned(), ServiceStatus::Active),
            ]
        );
    }
}
