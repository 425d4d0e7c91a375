//! 参考资料检索 - 业务能力层
//!
//! 检索失败不会让出题失败：任何错误都会降级为通用参考资料，
//! 额度 / 限流错误只影响日志级别

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AppResult, RetrievalError};
use crate::models::{
    ContextLibrary, GenerationRequest, RetrievedContext, Section, WorkedExample,
};
use crate::services::llm_service::LlmService;

/// 参考资料来源
#[async_trait]
pub trait ContextProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, request: &GenerationRequest) -> AppResult<RetrievedContext>;
}

// ========== 本地 TOML 资料库 ==========

/// 本地 TOML 参考资料库
pub struct TomlContextLibrary {
    library: ContextLibrary,
}

impl TomlContextLibrary {
    pub fn new(library: ContextLibrary) -> Self {
        Self { library }
    }

    pub async fn load(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(crate::models::load_context_library(path).await?))
    }
}

#[async_trait]
impl ContextProvider for TomlContextLibrary {
    fn name(&self) -> &str {
        "toml-library"
    }

    async fn fetch(&self, request: &GenerationRequest) -> AppResult<RetrievedContext> {
        let entry = self
            .library
            .lookup(request.topic, request.subtopic.as_deref())
            .ok_or_else(|| RetrievalError::NoEntry {
                topic: request.topic.name().to_string(),
            })?;

        Ok(RetrievedContext {
            rules: entry.rules.clone(),
            instructions: entry.instructions.clone(),
            worked_examples: entry.examples.clone(),
            visual_exemplars: entry.visual_exemplars.clone(),
            degraded: false,
        })
    }
}

// ========== 远程检索后端 ==========

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalQuery<'a> {
    section: Section,
    topic: &'a str,
    subtopic: Option<&'a str>,
    difficulty: &'a str,
}

/// 远程检索后端（HTTP JSON）
pub struct HttpContextProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpContextProvider {
    pub fn new(endpoint: impl Into<String>) -> AppResult<Self> {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RetrievalError::RequestFailed {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ContextProvider for HttpContextProvider {
    fn name(&self) -> &str {
        "http-backend"
    }

    async fn fetch(&self, request: &GenerationRequest) -> AppResult<RetrievedContext> {
        let query = RetrievalQuery {
            section: request.section,
            topic: request.topic.slug(),
            subtopic: request.subtopic.as_deref(),
            difficulty: request.difficulty.name(),
        };

        let failed = |message: String| RetrievalError::RequestFailed {
            endpoint: self.endpoint.clone(),
            message,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&query)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            return Err(RetrievalError::QuotaExceeded {
                endpoint: self.endpoint.clone(),
            }
            .into());
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(RetrievalError::RateLimited {
                endpoint: self.endpoint.clone(),
                retry_after,
            }
            .into());
        }
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)).into());
        }

        let context = response
            .json::<RetrievedContext>()
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(context)
    }
}

// ========== 模型整理的参考资料 ==========

pub(crate) const LIBRARIAN_SYSTEM: &str = "You are an SAT content librarian. \
Summarize the official College Board rules and style conventions for the requested skill \
and give one worked example. Reply with JSON only: \
{\"rules\": string, \"instructions\": string, \
\"workedExamples\": [{\"prompt\": string, \"answer\": string, \"explanation\": string}], \
\"visualExemplars\": [string]}";

/// 没有资料库时，由模型整理参考资料
pub struct LlmContextProvider {
    llm: LlmService,
}

impl LlmContextProvider {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ContextProvider for LlmContextProvider {
    fn name(&self) -> &str {
        "llm-librarian"
    }

    async fn fetch(&self, request: &GenerationRequest) -> AppResult<RetrievedContext> {
        let user = format!(
            "Section: {}\nDomain: {}\nSkill: {}\nDifficulty: {}",
            request.section,
            request.topic.name(),
            request.subtopic.as_deref().unwrap_or("any"),
            request.difficulty
        );
        let mut context: RetrievedContext = self
            .llm
            .request_json("参考资料整理", LIBRARIAN_SYSTEM, &user)
            .await?;
        context.degraded = false;
        Ok(context)
    }
}

// ========== 检索器 ==========

/// 参考资料检索器（不会失败）
#[derive(Clone)]
pub struct ContextRetriever {
    provider: Option<Arc<dyn ContextProvider>>,
}

impl ContextRetriever {
    pub fn new(provider: Arc<dyn ContextProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// 不配置来源，始终使用通用资料
    pub fn generic_only() -> Self {
        Self { provider: None }
    }

    /// 检索参考资料，失败时降级为通用资料
    pub async fn retrieve(&self, request: &GenerationRequest, prefix: &str) -> RetrievedContext {
        let fetched = match &self.provider {
            Some(provider) => {
                debug!("{} 📚 从 {} 检索参考资料", prefix, provider.name());
                provider.fetch(request).await
            }
            None => Ok(generic_context(request)),
        };

        let mut context = match fetched {
            Ok(context) => context,
            Err(e) if e.is_upstream_limit() => {
                warn!(
                    "{} ⚠️ 检索时遇到额度/限流限制，改用通用参考资料: {}",
                    prefix, e
                );
                generic_context(request)
            }
            Err(e) => {
                warn!("{} ⚠️ 检索失败，改用通用参考资料: {}", prefix, e);
                generic_context(request)
            }
        };

        if let Some(custom) = &request.custom_context {
            if context.instructions.is_empty() {
                context.instructions = custom.clone();
            } else {
                context.instructions =
                    format!("{}\n\nAdditional context from the requester:\n{}", context.instructions, custom);
            }
        }

        if context.degraded {
            info!("{} 📚 使用通用参考资料", prefix);
        } else {
            info!(
                "{} 📚 参考资料就绪 (例题 {} 道, 配图范例 {} 个)",
                prefix,
                context.worked_examples.len(),
                context.visual_exemplars.len()
            );
        }

        context
    }
}

/// 通用参考资料（检索失败时的兜底）
pub fn generic_context(request: &GenerationRequest) -> RetrievedContext {
    let rules = match request.section {
        Section::ReadingWriting => "Digital SAT Reading and Writing: each question has one short \
passage (25-150 words) or a pair of short passages, followed by a single question with four \
answer choices. Exactly one choice is correct and it must be supported by the passage alone. \
Distractors must be plausible but clearly wrong on close reading.",
        Section::Math => "Digital SAT Math: multiple-choice questions with four answer choices and \
exactly one correct answer. Calculator use is allowed. Values must be exact and internally \
consistent; every distractor should reflect a realistic student error. Figures are drawn to \
scale unless stated otherwise.",
    };

    let worked_examples = match request.section {
        Section::ReadingWriting => vec![WorkedExample {
            prompt: "Which choice completes the text with the most logical and precise word or phrase?"
                .to_string(),
            answer: "The choice whose meaning fits the context of the sentence.".to_string(),
            explanation: None,
        }],
        Section::Math => vec![WorkedExample {
            prompt: "If 3x + 5 = 20, what is the value of x?".to_string(),
            answer: "5".to_string(),
            explanation: Some("Subtract 5 from both sides to get 3x = 15, so x = 5.".to_string()),
        }],
    };

    RetrievedContext {
        rules: rules.to_string(),
        instructions: format!(
            "Write a {} question in the domain {}{}.",
            request.difficulty,
            request.topic.name(),
            request
                .subtopic
                .as_deref()
                .map(|s| format!(", skill: {}", s))
                .unwrap_or_default()
        ),
        worked_examples,
        visual_exemplars: Vec::new(),
        degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, Topic};

    struct QuotaProvider;

    #[async_trait]
    impl ContextProvider for QuotaProvider {
        fn name(&self) -> &str {
            "quota"
        }

        async fn fetch(&self, _request: &GenerationRequest) -> AppResult<RetrievedContext> {
            Err(RetrievalError::QuotaExceeded {
                endpoint: "http://backend".into(),
            }
            .into())
        }
    }

    fn request(custom: Option<&str>) -> GenerationRequest {
        GenerationRequest::new(
            Section::Math,
            "geometry-and-trigonometry",
            Some("Circles".into()),
            Difficulty::Easy,
            custom.map(str::to_string),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_quota_degrades_to_generic_context() {
        let retriever = ContextRetriever::new(Arc::new(QuotaProvider));
        let context = retriever.retrieve(&request(None), "[测试]").await;
        assert!(context.degraded);
        assert!(context.rules.contains("Digital SAT Math"));
    }

    #[tokio::test]
    async fn test_custom_context_is_merged() {
        let retriever = ContextRetriever::generic_only();
        let context = retriever
            .retrieve(&request(Some("Use a bicycle wheel")), "[测试]")
            .await;
        assert!(context.instructions.contains("Use a bicycle wheel"));
        assert!(context.instructions.contains("Circles"));
    }

    #[tokio::test]
    async fn test_toml_library_missing_entry() {
        let provider = TomlContextLibrary::new(ContextLibrary::default());
        let err = provider.fetch(&request(None)).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
        assert_eq!(Topic::GeometryAndTrigonometry, request(None).topic);
    }
}
