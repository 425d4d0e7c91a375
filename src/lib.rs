//! # satgen
//!
//! SAT 题目生成与自适应模考服务
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 接入外部模型服务，只暴露能力
//! - `CompletionProvider` - 对话补全接口（OpenAI 兼容实现 + 测试用脚本化实现）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个能力只处理一件事
//! - `ContextRetriever` - 参考资料检索（失败时降级为通用资料）
//! - `ContentGenerator` / `ContentValidator` - 出题 / 审题
//! - `VisualGenerator` / `VisualValidator` - 配图 / 配图审核
//! - `TopicPlanner` / `TopicClassifier` - 主题约束 / 主题识别
//! - `ChatService` - 讲解与提示
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整生成流程
//! - `GenerationCtx` - 上下文封装（生成 ID + 轮次）
//! - `GenerationFlow` - 流程编排（检索 → 出题 ⇄ 审题 → 配图 ⇄ 审核）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_orchestrator` - 模考会话的状态推进
//! - `orchestrator/question_selector` - 自适应选题
//! - `orchestrator/session_store` - 会话存储与过期清理
//!
//! ### ⑤ 接口层（API）
//! - `api/` - axum 路由：出题、讲解、模考会话、健康检查
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::{router, AppState};
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};
pub use infrastructure::{CompletionProvider, MockProvider};
pub use models::{GeneratedResult, GenerationRequest, TestSession};
pub use orchestrator::{SessionOrchestrator, SessionStore};
pub use workflow::{GenerationFlow, ItemGenerator};
