//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责模考会话的调度，是会话相关请求的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session_store` - 会话存储
//! - 进程内保存所有会话，按会话分锁
//! - 定时清理闲置会话
//!
//! ### `question_selector` - 选题
//! - 按领域占比和第二模块难度组合，决定下一题的 (领域, 技能点, 难度)
//!
//! ### `session_orchestrator` - 会话编排
//! - 创建会话、取题、提交答案、查询进度、结束休息
//! - 取题时调用 workflow 生成题目
//!
//! ## 层次关系
//!
//! ```text
//! session_orchestrator (处理一个会话)
//!     ↓
//! question_selector + session_store
//!     ↓
//! workflow::GenerationFlow (生成一道题)
//!     ↓
//! services (能力层：检索 / 出题 / 审题 / 配图)
//!     ↓
//! infrastructure (基础设施：CompletionProvider)
//! ```
//!
//! ## 设计原则
//!
//! 1. **向下依赖**：编排层 → workflow → services → infrastructure
//! 2. **会话内串行**：同一会话的所有修改都在该会话的锁内完成

pub mod question_selector;
pub mod session_orchestrator;
pub mod session_store;

// 重新导出主要类型
pub use question_selector::{topic_sequence, QuestionSelector};
pub use session_orchestrator::{AnswerOutcome, NextQuestion, SessionOrchestrator, SessionSummary};
pub use session_store::{SessionStore, SharedSession};
