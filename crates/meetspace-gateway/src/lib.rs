pub mod api;
pub mod bootstrap;
pub mod identity;
pub mod relay;
pub mod router;
pub mod server;
pub mod state;

pub use router::build_router;
pub use server::GatewayServer;
pub use state::{AppState, SharedState};
