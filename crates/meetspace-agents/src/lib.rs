pub mod openai;
pub mod providers;
pub mod sse;

pub use openai::{CompletionSettings, OpenAiCompatProvider};
pub use providers::{
    CompletionBackend, FragmentStream, INVALID_KEY_NOTICE, RATE_LIMIT_NOTICE, api_error_notice,
    connection_failed_notice,
};
