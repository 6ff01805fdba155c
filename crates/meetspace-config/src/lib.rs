pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{API_KEY_ENV, AppConfig, GatewayConfig, LlmConfig, RelayConfig};
