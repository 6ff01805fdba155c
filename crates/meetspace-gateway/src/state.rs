use std::sync::Arc;
use std::time::Duration;

use meetspace_agents::CompletionBackend;
use meetspace_common::{Error, Result};
use meetspace_config::AppConfig;
use meetspace_db::ConversationStore;

/// Shared application state accessible from all request handlers.
///
/// Nothing in here is mutated after startup; per-request state lives in
/// the relay pipeline.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<ConversationStore>,
    pub backend: Arc<dyn CompletionBackend>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<ConversationStore>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            config,
            store,
            backend,
        }
    }

    /// Delay applied between forwarded fragments.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.config.relay.pacing_ms)
    }

    /// Run a store operation on the blocking pool.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&ConversationStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| Error::Database(format!("storage task failed: {e}")))?
    }
}

pub type SharedState = Arc<AppState>;
