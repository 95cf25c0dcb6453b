use std::sync::Arc;

use feedline_core::{Config, JobOrchestrator, SanitizedConfig, Simplifier, StoreGateway};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<JobOrchestrator>,
    gateway: StoreGateway,
    simplifier: Option<Arc<Simplifier>>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<JobOrchestrator>,
        gateway: StoreGateway,
        simplifier: Option<Arc<Simplifier>>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            gateway,
            simplifier,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Arc<JobOrchestrator> {
        &self.orchestrator
    }

    pub fn gateway(&self) -> &StoreGateway {
        &self.gateway
    }

    /// Returns None when no `[llm]` section is configured.
    pub fn simplifier(&self) -> Option<&Arc<Simplifier>> {
        self.simplifier.as_ref()
    }
}
