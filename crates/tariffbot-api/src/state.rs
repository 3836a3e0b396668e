//! Application state shared across all route handlers.
//!
//! Passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use tariffbot_chat::QueryOrchestrator;
use tariffbot_core::config::TariffConfig;
use tariffbot_storage::TariffCatalog;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. Nothing here
/// is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<TariffConfig>,
    /// Answers chat questions.
    pub orchestrator: Arc<QueryOrchestrator>,
    /// Direct catalog access for the lookup and calculation endpoints.
    pub catalog: Arc<TariffCatalog>,
    /// Bearer token required on protected routes.
    pub api_token: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(
        config: TariffConfig,
        orchestrator: Arc<QueryOrchestrator>,
        catalog: Arc<TariffCatalog>,
        api_token: String,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            catalog,
            api_token,
            start_time: Instant::now(),
        }
    }
}
