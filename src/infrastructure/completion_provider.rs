//! 大模型调用接口
//!
//! 服务层只依赖这个 trait，具体实现可以是 OpenAI 兼容接口，也可以是测试用的桩

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 对话消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 文本补全提供方
///
/// 错误必须按类别返回：额度耗尽、限流、临时故障分别对应
/// [`LlmError::QuotaExceeded`](crate::error::LlmError::QuotaExceeded)、
/// [`LlmError::RateLimited`](crate::error::LlmError::RateLimited)、
/// [`LlmError::ApiCallFailed`](crate::error::LlmError::ApiCallFailed)
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 提供方名称（日志用）
    fn name(&self) -> &str;

    /// 发送消息，返回模型输出的文本
    async fn complete(&self, model: &str, messages: &[Message]) -> AppResult<String>;
}
