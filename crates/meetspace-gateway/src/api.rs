use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use futures::StreamExt;
use meetspace_common::{ChatTurn, UserId};
use serde::Deserialize;
use tracing::{error, info};

use crate::relay::{EMPTY_INPUT_REPLY, TurnRecorder, build_prompt, relay_stream};
use crate::state::SharedState;

const CHAT_PAGE: &str = include_str!("../assets/index.html");
const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

#[derive(Deserialize)]
pub struct StreamForm {
    #[serde(default)]
    pub message: String,
}

fn plain_text(status: StatusCode, body: impl Into<Body>) -> Response {
    (status, [(CONTENT_TYPE, PLAIN_TEXT)], body.into()).into_response()
}

fn storage_error(action: &str, e: impl std::fmt::Display) -> Response {
    error!("storage error while trying to {action}: {e}");
    plain_text(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("**Storage error**: could not {action}, please try again"),
    )
}

/// GET / — the chat page.
pub async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// POST /stream — relay one message and stream the reply as plain text.
pub async fn stream_reply(
    State(state): State<SharedState>,
    Extension(user_id): Extension<UserId>,
    Form(form): Form<StreamForm>,
) -> Response {
    let message = form.message.trim().to_string();
    if message.is_empty() {
        return plain_text(StatusCode::OK, EMPTY_INPUT_REPLY);
    }

    let uid = user_id.clone();
    let history = match state.with_store(move |store| store.load(&uid)).await {
        Ok(history) => history,
        Err(e) => return storage_error("load your conversation", e),
    };

    info!(
        "relaying message: user={}, len={}, history={}",
        user_id,
        message.len(),
        history.len()
    );

    let messages = build_prompt(&state.config.relay.system_prompt, &history, &message);
    let recorder = TurnRecorder::new(Arc::clone(&state.store), user_id, history, message);
    let fragments = relay_stream(
        Arc::clone(&state.backend),
        messages,
        recorder,
        state.pacing(),
    );

    plain_text(
        StatusCode::OK,
        Body::from_stream(fragments.map(Ok::<_, Infallible>)),
    )
}

/// GET /history — the caller's conversation, user and assistant turns only.
pub async fn history(
    State(state): State<SharedState>,
    Extension(user_id): Extension<UserId>,
) -> Response {
    match state.with_store(move |store| store.load(&user_id)).await {
        Ok(history) => {
            let turns: Vec<ChatTurn> = history
                .into_iter()
                .filter(|turn| turn.role.is_conversational())
                .collect();
            Json(turns).into_response()
        }
        Err(e) => storage_error("load your conversation", e),
    }
}

/// POST /clear — forget the caller's conversation.
pub async fn clear(
    State(state): State<SharedState>,
    Extension(user_id): Extension<UserId>,
) -> Response {
    let uid = user_id.clone();
    match state.with_store(move |store| store.clear(&uid)).await {
        Ok(()) => {
            info!("conversation cleared: user={user_id}");
            plain_text(StatusCode::OK, "Chat cleared")
        }
        Err(e) => storage_error("clear your conversation", e),
    }
}

/// GET /api/status — gateway summary.
pub async fn status(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let conversations = state.with_store(|store| store.count()).await.ok();
    Json(serde_json::json!({
        "status": "running",
        "provider": state.backend.provider_id(),
        "model": state.backend.model(),
        "conversations": conversations,
    }))
}
