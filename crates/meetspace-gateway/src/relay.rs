//! One chat exchange, from the user's message to the persisted reply.
//!
//! The reply is streamed to the client while it is accumulated; when the
//! response body ends, either drained or dropped on disconnect, the
//! conversation is written back exactly once.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use meetspace_agents::CompletionBackend;
use meetspace_common::{ChatTurn, UserId};
use meetspace_db::ConversationStore;
use tracing::{debug, error, info, warn};

/// Reply sent instead of a completion when the message is blank.
pub const EMPTY_INPUT_REPLY: &str = "Please type something...";

/// Assistant turn stored when the model produced no text.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "[Empty response from model]";

/// System instruction, then the prior conversation, then the new message.
pub fn build_prompt(system_prompt: &str, history: &[ChatTurn], user_message: &str) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatTurn::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages.push(ChatTurn::user(user_message));
    messages
}

/// Working copy of one conversation while its reply streams.
///
/// Finalization appends the assistant turn and saves the whole history.
/// It runs from [`TurnRecorder::finish`] or, if that never happens, from
/// `Drop`, which hands the save to the blocking pool when a runtime is
/// available.
pub struct TurnRecorder {
    store: Arc<ConversationStore>,
    user_id: UserId,
    history: Vec<ChatTurn>,
    reply: String,
    finalized: bool,
}

impl TurnRecorder {
    /// The user turn is committed to the working history immediately.
    pub fn new(
        store: Arc<ConversationStore>,
        user_id: UserId,
        mut history: Vec<ChatTurn>,
        user_message: impl Into<String>,
    ) -> Self {
        history.push(ChatTurn::user(user_message));
        Self {
            store,
            user_id,
            history,
            reply: String::new(),
            finalized: false,
        }
    }

    pub fn record(&mut self, fragment: &str) {
        self.reply.push_str(fragment);
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    /// Save on the calling thread. Call from a blocking context.
    pub fn finish(mut self) {
        self.take_pending().persist();
    }

    fn take_pending(&mut self) -> PendingSave {
        self.finalized = true;
        PendingSave {
            store: Arc::clone(&self.store),
            user_id: self.user_id.clone(),
            history: std::mem::take(&mut self.history),
            reply: std::mem::take(&mut self.reply),
        }
    }
}

impl Drop for TurnRecorder {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        debug!("response stream dropped early for {}", self.user_id);

        let pending = self.take_pending();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || pending.persist());
            }
            Err(_) => pending.persist(),
        }
    }
}

/// Everything needed to write one finished exchange.
struct PendingSave {
    store: Arc<ConversationStore>,
    user_id: UserId,
    history: Vec<ChatTurn>,
    reply: String,
}

impl PendingSave {
    fn persist(mut self) {
        let reply = self.reply.trim();
        let turn = if reply.is_empty() {
            warn!("empty reply for {}", self.user_id);
            ChatTurn::assistant(EMPTY_RESPONSE_PLACEHOLDER)
        } else {
            ChatTurn::assistant(reply)
        };
        self.history.push(turn);

        match self.store.save(&self.user_id, &self.history) {
            Ok(()) => info!(
                "conversation saved: user={}, turns={}",
                self.user_id,
                self.history.len()
            ),
            Err(e) => error!("failed to save conversation for {}: {e}", self.user_id),
        }
    }
}

struct RelayState {
    fragments: Pin<Box<dyn Stream<Item = String> + Send>>,
    recorder: Option<TurnRecorder>,
    pacing: Duration,
    forwarded: bool,
}

/// Drive the backend and tee its fragments to the caller and the recorder.
///
/// The backend request is only sent once the returned stream is polled.
pub fn relay_stream(
    backend: Arc<dyn CompletionBackend>,
    messages: Vec<ChatTurn>,
    recorder: TurnRecorder,
    pacing: Duration,
) -> impl Stream<Item = String> + Send + 'static {
    let fragments = futures::stream::once(async move { backend.stream_completion(&messages).await })
        .flatten();

    let state = RelayState {
        fragments: Box::pin(fragments),
        recorder: Some(recorder),
        pacing,
        forwarded: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        state.recorder.as_ref()?;

        if state.forwarded && !state.pacing.is_zero() {
            tokio::time::sleep(state.pacing).await;
        }

        match state.fragments.next().await {
            Some(fragment) => {
                if let Some(recorder) = state.recorder.as_mut() {
                    recorder.record(&fragment);
                }
                state.forwarded = true;
                Some((fragment, state))
            }
            None => {
                if let Some(recorder) = state.recorder.take()
                    && let Err(e) = tokio::task::spawn_blocking(move || recorder.finish()).await
                {
                    error!("finalization task failed: {e}");
                }
                None
            }
        }
    })
}
