//! 业务能力层
//!
//! 每个服务只负责一件事（检索、规划、出题、审题、配图、讲解），
//! 不关心调用顺序；顺序由 workflow 层决定

pub mod chat_service;
pub mod content_generator;
pub mod content_validator;
pub mod context_retriever;
pub mod llm_service;
pub mod math_checker;
pub mod topic_classifier;
pub mod topic_planner;
pub mod visual_generator;
pub mod visual_validator;

pub use chat_service::{ChatMode, ChatReply, ChatRequest, ChatService};
pub use content_generator::{ContentGenerator, GenerationFeedback};
pub use content_validator::ContentValidator;
pub use context_retriever::{
    ContextProvider, ContextRetriever, HttpContextProvider, LlmContextProvider, TomlContextLibrary,
};
pub use llm_service::LlmService;
pub use topic_classifier::{Classification, TopicClassifier};
pub use topic_planner::TopicPlanner;
pub use visual_generator::VisualGenerator;
pub use visual_validator::VisualValidator;
