use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use meetspace_common::ChatTurn;

/// Assistant text fragments in arrival order. Finite and not restartable.
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

pub const INVALID_KEY_NOTICE: &str =
    "**Invalid API Key** – get a new one at https://console.groq.com/keys";

pub const RATE_LIMIT_NOTICE: &str = "**Rate limit hit** – wait a moment and try again (free tier)";

pub fn api_error_notice(status: u16, body: &str) -> String {
    format!("**API Error {status}**: {body}")
}

pub fn connection_failed_notice(error: impl std::fmt::Display) -> String {
    format!("**Connection failed**: {error}")
}

/// A remote chat model that streams its reply.
///
/// Implementations never fail: transport, authentication and rate-limit
/// problems are reported as a notice fragment so the caller always has
/// something to show and persist.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider identifier (e.g. "groq", "openai").
    fn provider_id(&self) -> &str;

    /// Model the backend sends requests for.
    fn model(&self) -> &str;

    /// Start a completion over `messages` and return its fragments.
    async fn stream_completion(&self, messages: &[ChatTurn]) -> FragmentStream;
}

/// A stream that yields a single notice and ends.
pub fn notice_stream(text: impl Into<String>) -> FragmentStream {
    Box::pin(futures::stream::once(futures::future::ready(text.into())))
}
