//! Component health for the forecasting service
//!
//! Trouble upstream of the service (unreachable agents, untrained or failing
//! backends) only degrades it; the query surface keeps serving the last
//! published results. A component is unhealthy only when the service itself
//! has stopped doing its job, such as a stopped scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Serving stale or partial results
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: Utc::now(),
        }
    }
}

/// Body of `/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub timestamp: DateTime<Utc>,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names as they appear under `components`
pub mod components {
    pub const COLLECTOR: &str = "collector";
    pub const SCHEDULER: &str = "scheduler";

    pub fn backend(name: &str) -> String {
        format!("backend:{}", name)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    ready: bool,
}

impl RegistryState {
    fn set(&mut self, name: &str, status: ComponentStatus, message: Option<String>) {
        self.components
            .insert(name.to_string(), ComponentHealth::new(status, message));
    }

    fn rollup(&self) -> ComponentStatus {
        self.components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Shared view of collector, backend and scheduler health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.state
            .write()
            .await
            .set(name, ComponentStatus::Healthy, None);
    }

    /// Record how many agents answered in the last collection
    ///
    /// An empty collection is a no-op cycle: the collector is degraded and
    /// the previous results stay published.
    pub async fn record_collection(&self, succeeded: usize, failed: usize) {
        let (status, message) = match (succeeded, failed) {
            (0, _) => (
                ComponentStatus::Degraded,
                Some("no agent returned metrics".to_string()),
            ),
            (_, 0) => (ComponentStatus::Healthy, None),
            (ok, failed) => (
                ComponentStatus::Degraded,
                Some(format!("{} of {} agent(s) failed", failed, ok + failed)),
            ),
        };
        self.state
            .write()
            .await
            .set(components::COLLECTOR, status, message);
    }

    /// Mark a backend as able to forecast
    pub async fn backend_ready(&self, backend: &str) {
        self.state.write().await.set(
            &components::backend(backend),
            ComponentStatus::Healthy,
            None,
        );
    }

    /// Mark a backend as unable to forecast; the other backends keep serving
    pub async fn backend_degraded(&self, backend: &str, reason: impl Into<String>) {
        self.state.write().await.set(
            &components::backend(backend),
            ComponentStatus::Degraded,
            Some(reason.into()),
        );
    }

    /// No further cycles will run
    pub async fn scheduler_stopped(&self) {
        self.state.write().await.set(
            components::SCHEDULER,
            ComponentStatus::Unhealthy,
            Some("scheduler stopped".to_string()),
        );
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn status(&self, name: &str) -> Option<ComponentStatus> {
        self.state
            .read()
            .await
            .components
            .get(name)
            .map(|c| c.status)
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: state.rollup(),
            timestamp: Utc::now(),
            components: state.components.clone(),
        }
    }

    /// Ready once wired up, until the service itself fails
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let reason = if !state.ready {
            Some("service not yet initialized")
        } else if state.rollup() == ComponentStatus::Unhealthy {
            Some("forecasting stopped")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_collection_outcomes() {
        let registry = HealthRegistry::new();
        registry.register(components::COLLECTOR).await;

        registry.record_collection(3, 1).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components["collector"].message.as_deref(),
            Some("1 of 4 agent(s) failed")
        );

        registry.record_collection(4, 0).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_empty_collection_keeps_service_ready() {
        let registry = HealthRegistry::new();
        registry.register(components::COLLECTOR).await;
        registry.set_ready(true).await;

        registry.record_collection(0, 2).await;

        assert_eq!(
            registry.status(components::COLLECTOR).await,
            Some(ComponentStatus::Degraded)
        );
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_backend_transitions() {
        let registry = HealthRegistry::new();
        registry.register(&components::backend("sequence")).await;

        registry.backend_degraded("sequence", "model not trained").await;
        assert_eq!(
            registry.status("backend:sequence").await,
            Some(ComponentStatus::Degraded)
        );

        registry.backend_ready("sequence").await;
        assert_eq!(
            registry.status("backend:sequence").await,
            Some(ComponentStatus::Healthy)
        );
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let registry = HealthRegistry::new();
        registry.backend_degraded("statistical", "insufficient data").await;
        registry.scheduler_stopped().await;

        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_readiness_transitions() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("service not yet initialized"));

        registry.register(components::SCHEDULER).await;
        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        registry.scheduler_stopped().await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("forecasting stopped"));
    }
}
