//! LLM 服务 - 业务能力层
//!
//! 只负责"调用模型并拿到结构化结果"，不关心流程
//!
//! - 底层通过 [`CompletionProvider`] 调用，可替换为任意实现
//! - 结构化输出统一走 [`LlmService::request_json`]：解析失败时在本地有限重试，
//!   额度 / 限流错误立即上抛

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{CompletionProvider, Message};
use crate::utils::truncate_text;

/// LLM 服务
///
/// 职责：
/// - 提供通用的 LLM 调用接口
/// - 提取并解析模型返回的 JSON
/// - 不关心出题 / 审题的流程顺序
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn CompletionProvider>,
    model_name: String,
    parse_retries: u32,
    parse_backoff: Duration,
}

impl LlmService {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        model_name: impl Into<String>,
        parse_retries: u32,
        parse_backoff: Duration,
    ) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
            parse_retries: parse_retries.max(1),
            parse_backoff,
        }
    }

    /// 按配置创建指定模型的服务
    pub fn for_model(config: &Config, provider: Arc<dyn CompletionProvider>, model: &str) -> Self {
        Self::new(
            provider,
            model,
            config.parse_retries,
            Duration::from_millis(config.parse_backoff_ms),
        )
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys_msg) = system_message {
            messages.push(Message::system(sys_msg));
        }
        messages.push(Message::user(user_message));
        self.send_messages(&messages).await
    }

    /// 发送完整对话
    pub async fn send_messages(&self, messages: &[Message]) -> AppResult<String> {
        debug!(
            "调用 {}，模型: {}，消息数: {}",
            self.provider.name(),
            self.model_name,
            messages.len()
        );
        self.provider.complete(&self.model_name, messages).await
    }

    /// 请求 JSON 结构化结果
    ///
    /// 解析失败时把错误反馈给模型重试，最多 `parse_retries` 次；
    /// 额度 / 限流错误不重试
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        step: &str,
        system_message: &str,
        user_message: &str,
    ) -> AppResult<T> {
        let mut messages = vec![Message::system(system_message), Message::user(user_message)];
        let mut last_error: Option<AppError> = None;

        for attempt in 1..=self.parse_retries {
            if attempt > 1 && !self.parse_backoff.is_zero() {
                tokio::time::sleep(self.parse_backoff * (attempt - 1)).await;
            }

            let reply = match self.send_messages(&messages).await {
                Ok(reply) => reply,
                Err(e) if e.is_upstream_limit() => return Err(e),
                Err(e) => {
                    warn!("⚠️ {} 第 {} 次调用失败: {}", step, attempt, e);
                    last_error = Some(e);
                    continue;
                }
            };

            match parse_json_reply::<T>(&reply) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} 第 {} 次解析成功", step, attempt);
                    }
                    return Ok(value);
                }
                Err(reason) => {
                    warn!(
                        "⚠️ {} 第 {} 次返回无法解析: {} (内容: {})",
                        step,
                        attempt,
                        reason,
                        truncate_text(&reply, 80)
                    );
                    messages.push(Message::assistant(reply));
                    messages.push(Message::user(format!(
                        "Your previous reply could not be parsed ({}). \
                         Reply again with only the JSON object, no prose and no code fences.",
                        reason
                    )));
                    last_error = Some(AppError::parse_failed(step, attempt, reason));
                }
            }
        }

        Err(match last_error {
            Some(AppError::Llm(crate::error::LlmError::ParseFailed { reason, .. })) => {
                AppError::parse_failed(step, self.parse_retries, reason)
            }
            Some(other) => other,
            None => AppError::parse_failed(step, self.parse_retries, "没有返回内容"),
        })
    }
}

fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T, String> {
    let json = extract_json(reply).ok_or_else(|| "回复中没有 JSON 对象".to_string())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// 从模型回复中截取 JSON（去掉代码块标记和前后说明文字）
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::infrastructure::{MockFailure, MockProvider};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: u32,
    }

    fn service(provider: Arc<MockProvider>) -> LlmService {
        LlmService::new(provider, "test-model", 3, Duration::ZERO)
    }

    #[test]
    fn test_extract_json_strips_fences() {
        let text = "Here you go:\n```json\n{\"value\": 3}\n```";
        assert_eq!(extract_json(text), Some("{\"value\": 3}"));
        assert_eq!(extract_json("[1, 2]"), Some("[1, 2]"));
        assert_eq!(extract_json("no json"), None);
    }

    #[tokio::test]
    async fn test_request_json_retries_parse_failures() {
        let provider = Arc::new(
            MockProvider::new()
                .on("solver", "I think the answer is three")
                .on("solver", "{\"value\": 3}"),
        );
        let answer: Answer = service(provider.clone())
            .request_json("测试", "You are a solver", "solve")
            .await
            .unwrap();
        assert_eq!(answer, Answer { value: 3 });
        assert_eq!(provider.calls_matching("solver"), 2);

        // 第二次调用带上了解析失败的反馈
        let second = &provider.calls()[1];
        assert!(second.transcript().contains("could not be parsed"));
    }

    #[tokio::test]
    async fn test_request_json_gives_up_after_budget() {
        let provider = Arc::new(MockProvider::new().on("solver", "never json"));
        let err = service(provider.clone())
            .request_json::<Answer>("测试", "You are a solver", "solve")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(provider.calls_matching("solver"), 3);
    }

    #[tokio::test]
    async fn test_quota_is_not_retried() {
        let provider = Arc::new(MockProvider::new().on_failure("solver", MockFailure::Quota));
        let err = service(provider.clone())
            .request_json::<Answer>("测试", "You are a solver", "solve")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Quota);
        assert_eq!(provider.calls_matching("solver"), 1);
    }
}
