//! Shared application state.

use docsage_core::{AppConfig, Result};
use docsage_runtime::ChatOrchestrator;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: ChatOrchestrator,
}

impl AppState {
    pub fn new(config: AppConfig, orchestrator: ChatOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Build the orchestrator for the configured mode. Fails when generative
    /// mode has no usable index.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let orchestrator = ChatOrchestrator::from_config(&config)?;
        Ok(Self::new(config, orchestrator))
    }

    /// Swap in the index most recently written to the configured index
    /// directory, e.g. after `docsage ingest` rebuilt it.
    pub fn reload_index(&self) -> Result<usize> {
        self.orchestrator.reload_index(&self.config.paths.index_dir)
    }
}
