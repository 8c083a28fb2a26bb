use std::sync::Arc;

use vizzy_contracts::sessions::SessionStore;
use vizzy_engine::{EngineConfig, GenerationOrchestrator};

/// Shared handler state. Cloned per request, so everything heavy is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(
        config: EngineConfig,
        orchestrator: Arc<GenerationOrchestrator>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            sessions,
        }
    }
}
