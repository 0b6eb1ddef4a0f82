//! POST /chat: answer one question.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use docsage_core::Answer;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// A missing question is treated like an empty one.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "query")]
    pub question: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Answer>, ApiError> {
    let start = Instant::now();
    let answer = state.orchestrator.ask(&req.question).await?;
    debug!(
        mode = %answer.mode,
        outcome = ?answer.outcome,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Chat request served"
    );
    Ok(Json(answer))
}
