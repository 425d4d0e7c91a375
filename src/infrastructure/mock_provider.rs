//! 脚本化的补全提供方（离线测试、本地演示用）
//!
//! 按系统消息中的关键字路由到预设回复。同一路由的回复依次消费，
//! 最后一条会一直重复。

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{AppError, AppResult, LlmError};
use crate::infrastructure::completion_provider::{CompletionProvider, Message, Role};

/// 模拟的上游故障
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Quota,
    RateLimit,
    Transient,
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(MockFailure),
}

#[derive(Debug)]
struct Route {
    needle: String,
    queue: VecDeque<MockReply>,
    last: Option<MockReply>,
}

impl Route {
    fn next(&mut self) -> Option<MockReply> {
        match self.queue.pop_front() {
            Some(reply) => {
                self.last = Some(reply.clone());
                Some(reply)
            }
            None => self.last.clone(),
        }
    }
}

/// 一次调用记录
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<Message>,
}

impl RecordedCall {
    pub fn system(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map_or("", |m| m.content.as_str())
    }

    /// 全部消息拼接后的文本
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Default)]
pub struct MockProvider {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 系统消息包含 `needle` 时返回 `reply`
    pub fn on(self, needle: &str, reply: impl Into<String>) -> Self {
        self.push(needle, MockReply::Text(reply.into()));
        self
    }

    /// 系统消息包含 `needle` 时返回故障
    pub fn on_failure(self, needle: &str, failure: MockFailure) -> Self {
        self.push(needle, MockReply::Fail(failure));
        self
    }

    fn push(&self, needle: &str, reply: MockReply) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        match routes.iter_mut().find(|r| r.needle == needle) {
            Some(route) => route.queue.push_back(reply),
            None => routes.push(Route {
                needle: needle.to_string(),
                queue: VecDeque::from([reply]),
                last: None,
            }),
        }
    }

    /// 所有调用记录
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 系统消息包含 `needle` 的调用次数
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.system().contains(needle))
            .count()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, model: &str, messages: &[Message]) -> AppResult<String> {
        let call = RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
        };
        let system = call.system().to_string();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let reply = {
            let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            routes
                .iter_mut()
                .find(|r| system.contains(&r.needle))
                .and_then(Route::next)
        };

        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(MockFailure::Quota)) => Err(LlmError::QuotaExceeded {
                model: model.to_string(),
                message: "mock quota exhausted".to_string(),
            }
            .into()),
            Some(MockReply::Fail(MockFailure::RateLimit)) => Err(LlmError::RateLimited {
                model: model.to_string(),
                retry_after: 30,
            }
            .into()),
            Some(MockReply::Fail(MockFailure::Transient)) => {
                Err(AppError::llm_api_failed(model, "mock transient failure"))
            }
            None => Err(AppError::llm_api_failed(
                model,
                format!("没有匹配的模拟回复: {}", crate::utils::truncate_text(&system, 60)),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_replies_are_consumed_then_sticky() {
        let provider = MockProvider::new()
            .on("writer", "first")
            .on("writer", "second");
        let msgs = [Message::system("You are a writer"), Message::user("go")];

        assert_eq!(provider.complete("m", &msgs).await.unwrap(), "first");
        assert_eq!(provider.complete("m", &msgs).await.unwrap(), "second");
        assert_eq!(provider.complete("m", &msgs).await.unwrap(), "second");
        assert_eq!(provider.calls_matching("writer"), 3);
    }

    #[tokio::test]
    async fn test_failure_reply_has_kind() {
        let provider = MockProvider::new().on_failure("writer", MockFailure::Quota);
        let err = provider
            .complete("m", &[Message::system("writer")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Quota);
    }

    #[tokio::test]
    async fn test_unrouted_call_fails() {
        let provider = MockProvider::new();
        let err = provider
            .complete("m", &[Message::system("nobody")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
