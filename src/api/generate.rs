//! POST /api/generate

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::{AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{Difficulty, GenerationRequest, Section};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    pub section: Section,
    /// 领域名称或 slug，按分类表解析
    pub topic: String,
    #[serde(default)]
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub custom_context: Option<String>,
}

pub async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let request = GenerationRequest::new(
        body.section,
        &body.topic,
        body.subtopic,
        body.difficulty,
        body.custom_context,
    )?;
    info!("📨 用户 {} 请求出题: {}", user.user_id, request.label());

    let result = state.generator.generate(&request).await?;
    Ok(Json(json!({ "data": result })))
}
