//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use docforge_converter::JobOrchestrator;
use docforge_core::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// Conversion job orchestrator.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Create state with the start time set to now.
    pub fn new(config: Arc<AppConfig>, orchestrator: Arc<JobOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
            started_at: Instant::now(),
        }
    }
}
