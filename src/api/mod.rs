//! API 模块
//!
//! 对外的 HTTP 接口：出题、讲解、模考会话、健康检查
//!
//! 所有错误统一转换为 `{ "error": { "kind", "message", "issues"? } }`，
//! 状态码只由 [`ErrorKind`](crate::error::ErrorKind) 决定

pub mod auth;
pub mod chat;
pub mod error;
pub mod generate;
pub mod session;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::infrastructure::CompletionProvider;
use crate::models::SessionBlueprint;
use crate::orchestrator::{SessionOrchestrator, SessionStore};
use crate::services::{ChatService, ContextRetriever, LlmService};
use crate::workflow::{GenerationFlow, ItemGenerator};

pub use auth::AuthUser;

/// 各接口共享的状态
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn ItemGenerator>,
    pub chat: Arc<ChatService>,
    pub sessions: Arc<SessionOrchestrator>,
}

impl AppState {
    /// 按配置装配出题流程、讲解服务和会话编排
    pub fn new(
        config: &Config,
        provider: Arc<dyn CompletionProvider>,
        retriever: ContextRetriever,
        store: Arc<SessionStore>,
    ) -> Self {
        let generator: Arc<dyn ItemGenerator> = Arc::new(GenerationFlow::from_config(
            config,
            provider.clone(),
            retriever,
        ));
        let chat = ChatService::new(LlmService::for_model(config, provider, &config.chat_model));
        let sessions = SessionOrchestrator::new(
            store,
            generator.clone(),
            SessionBlueprint::from_config(config),
        );

        Self {
            generator,
            chat: Arc::new(chat),
            sessions: Arc::new(sessions),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(generate::generate))
        .route("/api/chat", post(chat::chat))
        .route("/api/session", post(session::session))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "activeSessions": state.sessions.store().len().await,
    }))
}
