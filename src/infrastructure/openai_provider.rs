//! OpenAI 兼容接口
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::infrastructure::completion_provider::{CompletionProvider, Message, Role};

/// OpenAI 兼容的补全提供方
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    temperature: f32,
    max_tokens: u32,
    /// 上游限流时建议等待的秒数
    retry_after_secs: u64,
}

impl OpenAiProvider {
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry_after_secs: config.rate_limit_retry_secs,
        }
    }

    fn build_messages(
        &self,
        model: &str,
        messages: &[Message],
    ) -> AppResult<Vec<ChatCompletionRequestMessage>> {
        let build_err = |e: OpenAIError| AppError::llm_api_failed(model, e.to_string());

        messages
            .iter()
            .map(|m| {
                let msg = match m.role {
                    Role::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(m.content.as_str())
                            .build()
                            .map_err(build_err)?,
                    ),
                    Role::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(m.content.as_str())
                            .build()
                            .map_err(build_err)?,
                    ),
                    Role::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(m.content.as_str())
                            .build()
                            .map_err(build_err)?,
                    ),
                };
                Ok(msg)
            })
            .collect()
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, model: &str, messages: &[Message]) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}, 消息数: {}", model, messages.len());

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(self.build_messages(model, messages)?)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| AppError::llm_api_failed(model, e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            classify_openai_error(model, e, self.retry_after_secs)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: model.to_string(),
            })?;

        Ok(content.trim().to_string())
    }
}

/// 把 SDK 错误映射为带类别的应用错误
fn classify_openai_error(model: &str, err: OpenAIError, retry_after: u64) -> AppError {
    match err {
        OpenAIError::ApiError(api) => classify_api_error(
            model,
            api.code.as_deref(),
            api.r#type.as_deref(),
            &api.message,
            retry_after,
        ),
        other => AppError::llm_api_failed(model, other.to_string()),
    }
}

/// 按错误码 / 错误类型判断额度与限流（接口不回传响应头，限流等待时间取配置值）
fn classify_api_error(
    model: &str,
    code: Option<&str>,
    kind: Option<&str>,
    message: &str,
    retry_after: u64,
) -> AppError {
    let is = |needle: &str| code == Some(needle) || kind == Some(needle);
    let lowered = message.to_lowercase();

    if is("insufficient_quota") || lowered.contains("exceeded your current quota") {
        LlmError::QuotaExceeded {
            model: model.to_string(),
            message: message.to_string(),
        }
        .into()
    } else if is("rate_limit_exceeded") || lowered.contains("rate limit") {
        LlmError::RateLimited {
            model: model.to_string(),
            retry_after,
        }
        .into()
    } else {
        AppError::llm_api_failed(model, message)
    }
}
