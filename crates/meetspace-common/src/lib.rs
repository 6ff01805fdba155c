pub mod error;
pub mod turn;
pub mod types;

pub use error::{Error, Result};
pub use turn::{ChatRole, ChatTurn};
pub use types::UserId;
