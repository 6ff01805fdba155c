use meetspace_common::Result;
use meetspace_config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::bootstrap::build_state;
use crate::router::build_router;

/// Binds the configured address and serves the chat relay.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);

        let state = build_state(self.config)?;
        info!(
            "MeetSpace relay: provider={}, model={}, store={}",
            state.backend.provider_id(),
            state.backend.model(),
            state.store.path().display()
        );
        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("MeetSpace gateway listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| meetspace_common::Error::Gateway(format!("server error: {e}")))?;

        Ok(())
    }
}
