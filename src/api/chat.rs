//! POST /api/chat

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::api::{AppState, AuthUser};
use crate::error::AppResult;
use crate::services::{ChatReply, ChatRequest};

pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatReply>> {
    let Json(request) = payload?;
    info!(
        "💬 用户 {} 请求讲解 ({:?})，历史 {} 条",
        user.user_id,
        request.mode,
        request.conversation_history.len()
    );
    Ok(Json(state.chat.respond(&request).await?))
}
