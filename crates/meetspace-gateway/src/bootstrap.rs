use std::sync::Arc;

use meetspace_agents::OpenAiCompatProvider;
use meetspace_common::Result;
use meetspace_config::AppConfig;
use meetspace_db::ConversationStore;
use tracing::info;

use crate::state::{AppState, SharedState};

/// Wire the store and completion backend from config.
///
/// Fails when no API key can be resolved, so a misconfigured process
/// never starts serving.
pub fn build_state(config: AppConfig) -> Result<SharedState> {
    let api_key = config.resolve_api_key()?;

    let backend = OpenAiCompatProvider::from_config(api_key, &config.llm)?;
    info!("configured completion backend: {}", config.llm.base_url);

    let store = ConversationStore::open(&config.database_path)?;

    Ok(Arc::new(AppState::new(
        config,
        Arc::new(store),
        Arc::new(backend),
    )))
}
