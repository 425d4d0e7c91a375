//! 出题流程 - 流程层
//!
//! 核心职责：定义"一道题"从请求到结果的完整过程
//!
//! 流程顺序：
//! 1. 检索参考资料（额度 / 限流时降级为通用资料）
//! 2. 出题 → 审题 → （更正答案后复审一次）→ 达标接受，否则带反馈重出
//! 3. 连续两次主题不符时加强纠偏提示
//! 4. 预算耗尽时，最佳候选达到保底分即接受，否则报错并附带全部问题
//! 5. 需要配图时进入配图子循环（独立预算），配图失败不影响题目

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::CompletionProvider;
use crate::models::{
    CandidateItem, Decision, GeneratedResult, GenerationMetadata, GenerationRequest,
    RetrievedContext, RetryPolicy, TopicPlan, ValidationResult, VisualArtifact,
};
use crate::services::{
    ContentGenerator, ContentValidator, ContextRetriever, GenerationFeedback, LlmService,
    TopicPlanner, VisualGenerator, VisualValidator,
};
use crate::workflow::generation_ctx::GenerationCtx;
use crate::workflow::step::{
    execute, GenerateItemStep, GenerateVisualStep, RetrieveContextStep, ValidateItemStep,
    ValidateVisualStep,
};

/// 连续主题不符达到该次数后加强纠偏提示
const ESCALATION_AFTER: u32 = 2;

/// 题目生成接口（会话层只依赖这个 trait）
#[async_trait]
pub trait ItemGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> AppResult<GeneratedResult>;
}

/// 配图子循环的结果
struct VisualOutcome {
    visual: VisualArtifact,
    iterations: u32,
}

/// 出题流程
///
/// - 编排检索、出题、审题、配图
/// - 持有迭代策略，决定何时接受、何时重试、何时放弃
/// - 只依赖业务能力（services）
pub struct GenerationFlow {
    retriever: ContextRetriever,
    planner: TopicPlanner,
    generator: ContentGenerator,
    validator: ContentValidator,
    visual_generator: VisualGenerator,
    visual_validator: VisualValidator,
    policy: RetryPolicy,
}

impl GenerationFlow {
    pub fn new(
        retriever: ContextRetriever,
        generator: ContentGenerator,
        validator: ContentValidator,
        visual_generator: VisualGenerator,
        visual_validator: VisualValidator,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            retriever,
            planner: TopicPlanner::new(),
            generator,
            validator,
            visual_generator,
            visual_validator,
            policy,
        }
    }

    /// 按配置组装：出题和配图用出题模型，审题用审题模型
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn CompletionProvider>,
        retriever: ContextRetriever,
    ) -> Self {
        let writer = LlmService::for_model(config, provider.clone(), &config.generator_model);
        let reviewer = LlmService::for_model(config, provider, &config.validator_model);
        let policy = config.retry_policy();

        Self::new(
            retriever,
            ContentGenerator::new(writer.clone()),
            ContentValidator::new(reviewer.clone(), policy.target_score),
            VisualGenerator::new(writer),
            VisualValidator::new(reviewer, policy.target_score),
            policy,
        )
    }

    /// 生成一道题
    pub async fn run(&self, request: &GenerationRequest) -> AppResult<GeneratedResult> {
        let started = Instant::now();
        let ctx = GenerationCtx::new(request);
        info!("{} 🚀 开始生成 {}", ctx, ctx.label);

        let context = execute(
            &RetrieveContextStep {
                retriever: &self.retriever,
                request,
            },
            &ctx,
        )
        .await?;
        let plan = self.planner.plan(request.topic, request.subtopic.as_deref());

        let (item, validation, text_iterations) =
            self.text_loop(&ctx, request, &plan, &context).await?;

        let visual = if item.needs_visual {
            let outcome = self.visual_loop(&ctx, &item, &context).await;
            Some(outcome)
        } else {
            None
        };
        let visual_iterations = visual.as_ref().map_or(0, |v| v.iterations);

        let metadata = GenerationMetadata {
            section: request.section,
            topic: request.topic,
            subtopic: request.subtopic.clone(),
            difficulty: request.difficulty,
            generation_time_ms: started.elapsed().as_millis() as u64,
            iterations: text_iterations + visual_iterations,
            text_iterations,
            visual_iterations,
            score: validation.score(),
            degraded_context: context.degraded,
        };
        info!(
            "{} ✅ 生成完成: 得分 {:.2}，题目 {} 轮，配图 {} 轮，耗时 {} ms",
            ctx, metadata.score, text_iterations, visual_iterations, metadata.generation_time_ms
        );

        Ok(GeneratedResult {
            item,
            visual: visual.map(|v| v.visual),
            metadata,
        })
    }

    /// 题目循环：返回 (题目, 审题结果, 迭代次数)
    async fn text_loop(
        &self,
        ctx: &GenerationCtx,
        request: &GenerationRequest,
        plan: &TopicPlan,
        context: &RetrievedContext,
    ) -> AppResult<(CandidateItem, ValidationResult, u32)> {
        let mut feedback: Option<GenerationFeedback> = None;
        let mut best: Option<(CandidateItem, ValidationResult)> = None;
        let mut all_issues: Vec<String> = Vec::new();
        let mut consecutive_mismatch = 0u32;
        let mut iterations = 0u32;

        for iteration in 1..=self.policy.max_iterations {
            iterations = iteration;
            let round = ctx.at(iteration);

            let candidate = match execute(
                &GenerateItemStep {
                    generator: &self.generator,
                    request,
                    plan,
                    context,
                    feedback: feedback.as_ref(),
                },
                &round,
            )
            .await
            {
                Ok(candidate) => candidate,
                Err(e) if e.is_retryable() => {
                    all_issues.push(format!("第{}轮: 出题失败: {}", iteration, e));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (candidate, validation) =
                match self.validate_with_correction(&round, candidate, request, plan, context).await {
                    Ok(pair) => pair,
                    Err(e) if e.is_retryable() => {
                        all_issues.push(format!("第{}轮: 审题失败: {}", iteration, e));
                        continue;
                    }
                    Err(e) => return Err(e),
                };

            info!(
                "{} 📊 审题得分 {:.2}，{}，问题 {} 个",
                round,
                validation.score(),
                if validation.is_valid() { "通过" } else { "未通过" },
                validation.issues().len()
            );

            let escalation = if validation.is_topic_mismatch() {
                consecutive_mismatch += 1;
                self.escalation(&round, plan, &validation, consecutive_mismatch)
            } else {
                consecutive_mismatch = 0;
                None
            };

            match self
                .policy
                .decide(validation.is_valid(), validation.score(), iteration)
            {
                Decision::Accept => return Ok((candidate, validation, iteration)),
                Decision::Retry | Decision::Exhausted => {
                    all_issues.extend(
                        validation
                            .issue_lines()
                            .into_iter()
                            .map(|line| format!("第{}轮: {}", iteration, line)),
                    );
                    feedback = Some(GenerationFeedback {
                        score: validation.score(),
                        issues: validation.issue_lines(),
                        corrections: validation.corrections().to_string(),
                        escalation,
                    });
                    if best
                        .as_ref()
                        .map_or(true, |(_, b)| validation.score() > b.score())
                    {
                        best = Some((candidate, validation));
                    }
                }
            }
        }

        match best {
            Some((item, validation))
                if self.policy.clears_floor(validation.score()) && !validation.has_critical() =>
            {
                info!(
                    "{} 🟡 {} 轮未达目标分，接受最佳候选 (得分 {:.2} ≥ 保底分 {:.2})",
                    ctx,
                    iterations,
                    validation.score(),
                    self.policy.floor_score
                );
                Ok((item, validation, iterations))
            }
            best => {
                let best_score = best.as_ref().map_or(0.0, |(_, v)| v.score());
                warn!(
                    "{} ❌ {} 轮均未达到保底分，最高得分 {:.2}",
                    ctx, iterations, best_score
                );
                Err(AppError::ValidationExhausted {
                    iterations,
                    best_score,
                    floor: self.policy.floor_score,
                    issues: all_issues,
                })
            }
        }
    }

    /// 审题；审题给出的更正答案与标记答案不同时，改正后复审一次
    async fn validate_with_correction(
        &self,
        ctx: &GenerationCtx,
        mut candidate: CandidateItem,
        request: &GenerationRequest,
        plan: &TopicPlan,
        context: &RetrievedContext,
    ) -> AppResult<(CandidateItem, ValidationResult)> {
        let validation = self.validate(ctx, &candidate, request, plan, context).await?;

        let Some(corrected) = validation
            .corrected_answer()
            .filter(|label| *label != candidate.correct_choice)
        else {
            return Ok((candidate, validation));
        };

        info!(
            "{} 🔧 标记答案 {} 更正为 {}，复审一次",
            ctx, candidate.correct_choice, corrected
        );
        candidate.correct_choice = corrected;
        let revalidated = self.validate(ctx, &candidate, request, plan, context).await?;
        Ok((candidate, revalidated))
    }

    async fn validate(
        &self,
        ctx: &GenerationCtx,
        candidate: &CandidateItem,
        request: &GenerationRequest,
        plan: &TopicPlan,
        context: &RetrievedContext,
    ) -> AppResult<ValidationResult> {
        execute(
            &ValidateItemStep {
                validator: &self.validator,
                candidate,
                request,
                plan,
                context,
            },
            ctx,
        )
        .await
    }

    /// 连续主题不符时生成加强纠偏提示
    fn escalation(
        &self,
        ctx: &GenerationCtx,
        plan: &TopicPlan,
        validation: &ValidationResult,
        consecutive: u32,
    ) -> Option<String> {
        if consecutive < ESCALATION_AFTER {
            return None;
        }
        let check = validation.topic_check()?;
        let drifted_to = check.detected_topic?;
        warn!(
            "{} 🔁 连续 {} 次被识别为 {}，加强纠偏提示",
            ctx, consecutive, drifted_to
        );
        Some(self.planner.escalation_guidance(
            plan,
            drifted_to,
            check.detected_subtopic.as_deref(),
            consecutive,
        ))
    }

    /// 配图子循环：独立预算，任何失败都只会让配图标记为需要重新生成
    async fn visual_loop(
        &self,
        ctx: &GenerationCtx,
        item: &CandidateItem,
        context: &RetrievedContext,
    ) -> VisualOutcome {
        let mut feedback: Vec<String> = Vec::new();
        let mut best: Option<(VisualArtifact, ValidationResult)> = None;
        let mut iterations = 0u32;

        for iteration in 1..=self.policy.max_iterations {
            iterations = iteration;
            let round = ctx.at(iteration);

            let visual = match execute(
                &GenerateVisualStep {
                    generator: &self.visual_generator,
                    item,
                    context,
                    feedback: &feedback,
                },
                &round,
            )
            .await
            {
                Ok(visual) => visual,
                Err(e) if e.is_upstream_limit() => break,
                Err(_) => continue,
            };

            let validation = match execute(
                &ValidateVisualStep {
                    validator: &self.visual_validator,
                    item,
                    visual: &visual,
                },
                &round,
            )
            .await
            {
                Ok(validation) => validation,
                Err(e) if e.is_upstream_limit() => break,
                Err(_) => continue,
            };

            info!(
                "{} 🖼️ 配图得分 {:.2}，{}",
                round,
                validation.score(),
                if validation.is_valid() { "通过" } else { "未通过" }
            );

            match self
                .policy
                .decide(validation.is_valid(), validation.score(), iteration)
            {
                Decision::Accept => return VisualOutcome { visual, iterations },
                Decision::Retry | Decision::Exhausted => {
                    feedback = validation.issue_lines();
                    if !validation.corrections().is_empty() {
                        feedback.push(validation.corrections().to_string());
                    }
                    if best
                        .as_ref()
                        .map_or(true, |(_, b)| validation.score() > b.score())
                    {
                        best = Some((visual, validation));
                    }
                }
            }
        }

        match best {
            Some((visual, validation))
                if self.policy.clears_floor(validation.score()) && !validation.has_critical() =>
            {
                info!("{} 🟡 配图接受最佳候选 (得分 {:.2})", ctx, validation.score());
                VisualOutcome { visual, iterations }
            }
            Some((mut visual, _)) => {
                warn!("{} ⚠️ 配图未达到保底分，标记为需要重新生成", ctx);
                visual.needs_regeneration = true;
                VisualOutcome { visual, iterations }
            }
            None => {
                warn!("{} ⚠️ 配图生成失败，使用题目描述作为占位配图", ctx);
                VisualOutcome {
                    visual: VisualArtifact::placeholder(
                        item.visual_description.as_deref().unwrap_or_default(),
                    ),
                    iterations,
                }
            }
        }
    }
}

#[async_trait]
impl ItemGenerator for GenerationFlow {
    async fn generate(&self, request: &GenerationRequest) -> AppResult<GeneratedResult> {
        self.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::infrastructure::{MockFailure, MockProvider};
    use crate::models::{ChoiceLabel, Difficulty, Section, Topic};
    use crate::services::{LlmContextProvider, TopicClassifier};
    use std::time::Duration;

    const CIRCLE_ITEM: &str = r#"{
        "prompt": "A circle has center O and radius 6 centimeters. Points A and B lie on the circle, and the central angle AOB measures 60°. What is the length of arc AB, in centimeters?",
        "choices": ["π", "2π", "3π", "6π"],
        "correctAnswer": "B",
        "explanation": "The arc is 60/360 of the circumference. The circumference is 2π(6) = 12π, and 12π × 1/6 = 2π.",
        "needsVisual": true,
        "visualDescription": "Circle with center O, radius 6 cm, central angle AOB of 60°."
    }"#;
    const CIRCLE_ITEM_WRONG_KEY: &str = r#"{
        "prompt": "A circle has center O and radius 6 centimeters. Points A and B lie on the circle, and the central angle AOB measures 60°. What is the length of arc AB, in centimeters?",
        "choices": ["π", "2π", "3π", "6π"],
        "correctAnswer": "D",
        "explanation": "The arc is one sixth of the circumference.",
        "needsVisual": false
    }"#;
    const SOLVER_AGREES: &str =
        r#"{"solution": "60/360 of 12π", "finalValue": "2π", "matchingChoice": "B", "explanationErrors": []}"#;
    const GOOD_RUBRIC: &str = r#"{"score": 0.92, "issues": [], "corrections": ""}"#;
    const GOOD_FIGURE: &str = r#"{"type": "diagram", "description": "Circle with center O and radius 6 cm. Central angle AOB measures 60°.", "data": null, "svg": "<svg/>"}"#;
    const GOOD_FIGURE_REVIEW: &str =
        r#"{"score": 0.9, "missingInformation": [], "duplicatedContent": [], "issues": []}"#;

    fn circles_request() -> GenerationRequest {
        GenerationRequest::new(
            Section::Math,
            "geometry-and-trigonometry",
            Some("Circles".into()),
            Difficulty::Easy,
            None,
        )
        .unwrap()
    }

    fn flow_with(provider: Arc<MockProvider>, retriever: ContextRetriever) -> GenerationFlow {
        let llm = LlmService::new(provider, "mock-model", 3, Duration::ZERO);
        GenerationFlow::new(
            retriever,
            ContentGenerator::new(llm.clone()),
            ContentValidator::new(llm.clone(), 0.8),
            VisualGenerator::new(llm.clone()),
            VisualValidator::new(llm, 0.8),
            RetryPolicy::default(),
        )
    }

    fn flow(provider: Arc<MockProvider>) -> GenerationFlow {
        flow_with(provider, ContextRetriever::generic_only())
    }

    fn happy_provider() -> MockProvider {
        MockProvider::new()
            .on("SAT item writer", CIRCLE_ITEM)
            .on("SAT math solver", SOLVER_AGREES)
            .on("SAT item reviewer", GOOD_RUBRIC)
            .on("SAT visual designer", GOOD_FIGURE)
            .on("SAT visual reviewer", GOOD_FIGURE_REVIEW)
    }

    #[tokio::test]
    async fn test_circle_item_accepted_first_round() {
        let provider = Arc::new(happy_provider());
        let result = flow(provider.clone()).run(&circles_request()).await.unwrap();

        assert_eq!(result.metadata.text_iterations, 1);
        assert_eq!(result.metadata.visual_iterations, 1);
        assert_eq!(result.metadata.iterations, 2);
        assert!(result.metadata.score >= 0.8);
        let visual = result.visual.unwrap();
        assert!(!visual.needs_regeneration);

        // 生成的题目能被识别为几何题
        let classification = TopicClassifier::new().classify(&result.item.prompt, None, Some(Section::Math));
        assert_eq!(classification.topic, Some(Topic::GeometryAndTrigonometry));
        assert!(classification.confidence > 0.3);
    }

    #[tokio::test]
    async fn test_low_scores_exhaust_after_three_rounds() {
        let provider = Arc::new(
            MockProvider::new()
                .on("SAT item writer", CIRCLE_ITEM)
                .on("SAT math solver", SOLVER_AGREES)
                .on(
                    "SAT item reviewer",
                    r#"{"score": 0.4, "issues": [{"severity": "major", "message": "distractors are implausible"}], "corrections": "rewrite distractors"}"#,
                ),
        );
        let err = flow(provider.clone()).run(&circles_request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationExhausted);
        assert!(err.issues().iter().any(|i| i.contains("distractors are implausible")));
        assert_eq!(provider.calls_matching("SAT item writer"), 3);
        // 第二轮出题带上了上一轮的反馈
        let writer_calls: Vec<_> = provider
            .calls()
            .into_iter()
            .filter(|c| c.system().contains("SAT item writer"))
            .collect();
        assert!(writer_calls[1].transcript().contains("rewrite distractors"));
    }

    #[tokio::test]
    async fn test_floor_accepts_best_candidate() {
        let provider = Arc::new(
            MockProvider::new()
                .on("SAT item writer", CIRCLE_ITEM_WRONG_KEY.replace("\"D\"", "\"B\""))
                .on("SAT math solver", SOLVER_AGREES)
                .on("SAT item reviewer", r#"{"score": 0.6, "issues": [], "corrections": "tighten wording"}"#)
                .on("SAT item reviewer", r#"{"score": 0.75, "issues": [], "corrections": "tighten wording"}"#)
                .on("SAT item reviewer", r#"{"score": 0.72, "issues": [], "corrections": "tighten wording"}"#),
        );
        let result = flow(provider).run(&circles_request()).await.unwrap();
        assert_eq!(result.metadata.text_iterations, 3);
        assert_eq!(result.metadata.score, 0.75);
        assert!(result.visual.is_none());
    }

    #[tokio::test]
    async fn test_corrected_answer_is_revalidated() {
        let provider = Arc::new(
            MockProvider::new()
                .on("SAT item writer", CIRCLE_ITEM_WRONG_KEY)
                .on("SAT math solver", SOLVER_AGREES)
                .on("SAT item reviewer", GOOD_RUBRIC),
        );
        let result = flow(provider.clone()).run(&circles_request()).await.unwrap();

        assert_eq!(result.item.correct_choice, ChoiceLabel::B);
        assert_eq!(result.metadata.text_iterations, 1);
        assert_eq!(provider.calls_matching("SAT item writer"), 1);
        assert_eq!(provider.calls_matching("SAT math solver"), 2);
    }

    #[tokio::test]
    async fn test_repeated_topic_drift_escalates() {
        let main_idea = r#"{
            "passage": "Marine biologist Ana Ortiz studied coral reefs near Belize for a decade. Reefs recovered faster wherever herbivorous fish populations were protected from overfishing.",
            "prompt": "Which choice best states the main idea of the text?",
            "choices": ["Reefs recover faster when herbivorous fish are protected.", "Ortiz lived in Belize.", "Fishing is banned near every reef.", "Coral cannot recover."],
            "correctAnswer": "A",
            "explanation": "The text links protection of herbivorous fish to faster recovery."
        }"#;
        let provider = Arc::new(
            MockProvider::new()
                .on("SAT item writer", main_idea)
                .on("SAT item reviewer", r#"{"score": 0.9, "issues": [], "corrections": ""}"#),
        );
        let request = GenerationRequest::new(
            Section::ReadingWriting,
            "expression-of-ideas",
            Some("Rhetorical Synthesis".into()),
            Difficulty::Medium,
            None,
        )
        .unwrap();

        let err = flow(provider.clone()).run(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationExhausted);

        let writer_calls: Vec<_> = provider
            .calls()
            .into_iter()
            .filter(|c| c.system().contains("SAT item writer"))
            .collect();
        assert_eq!(writer_calls.len(), 3);
        assert!(!writer_calls[1].transcript().contains("The last 2 attempts"));
        assert!(writer_calls[2].transcript().contains("The last 2 attempts"));
        assert!(writer_calls[2].transcript().contains("Information and Ideas"));
    }

    #[tokio::test]
    async fn test_context_quota_degrades_but_generation_succeeds() {
        let provider = Arc::new(
            happy_provider().on_failure("SAT content librarian", MockFailure::Quota),
        );
        let librarian = LlmContextProvider::new(LlmService::new(
            provider.clone(),
            "mock-model",
            3,
            Duration::ZERO,
        ));
        let retriever = ContextRetriever::new(Arc::new(librarian));

        let result = flow_with(provider.clone(), retriever)
            .run(&circles_request())
            .await
            .unwrap();
        assert!(result.metadata.degraded_context);
        assert_eq!(provider.calls_matching("SAT content librarian"), 1);
    }

    #[tokio::test]
    async fn test_generator_quota_propagates() {
        let provider = Arc::new(MockProvider::new().on_failure("SAT item writer", MockFailure::Quota));
        let err = flow(provider.clone()).run(&circles_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Quota);
        assert_eq!(provider.calls_matching("SAT item writer"), 1);
    }

    #[tokio::test]
    async fn test_parse_failures_consume_an_iteration() {
        // 第一轮的三次解析重试全部失败，第二轮拿到合法回复
        let provider = Arc::new(
            MockProvider::new()
                .on("SAT item writer", "not json")
                .on("SAT item writer", "still not json")
                .on("SAT item writer", "no")
                .on("SAT item writer", CIRCLE_ITEM)
                .on("SAT math solver", SOLVER_AGREES)
                .on("SAT item reviewer", GOOD_RUBRIC)
                .on("SAT visual designer", GOOD_FIGURE)
                .on("SAT visual reviewer", GOOD_FIGURE_REVIEW),
        );
        let result = flow(provider).run(&circles_request()).await.unwrap();
        assert_eq!(result.metadata.text_iterations, 2);
    }

    #[tokio::test]
    async fn test_transient_failures_consume_an_iteration() {
        let provider = Arc::new(
            MockProvider::new()
                .on_failure("SAT item writer", MockFailure::Transient)
                .on_failure("SAT item writer", MockFailure::Transient)
                .on_failure("SAT item writer", MockFailure::Transient)
                .on("SAT item writer", CIRCLE_ITEM)
                .on("SAT math solver", SOLVER_AGREES)
                .on("SAT item reviewer", GOOD_RUBRIC)
                .on("SAT visual designer", GOOD_FIGURE)
                .on("SAT visual reviewer", GOOD_FIGURE_REVIEW),
        );
        let result = flow(provider.clone()).run(&circles_request()).await.unwrap();
        assert_eq!(result.metadata.text_iterations, 2);
        assert_eq!(provider.calls_matching("SAT item writer"), 4);
    }

    #[tokio::test]
    async fn test_validator_rate_limit_stops_the_loop() {
        let provider = Arc::new(
            MockProvider::new()
                .on("SAT item writer", CIRCLE_ITEM)
                .on_failure("SAT math solver", MockFailure::RateLimit),
        );
        let err = flow(provider.clone()).run(&circles_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.retry_after(), Some(30));
        assert_eq!(provider.calls_matching("SAT item writer"), 1);
    }

    #[tokio::test]
    async fn test_visual_failure_degrades_to_regeneration_flag() {
        let provider = Arc::new(
            MockProvider::new()
                .on("SAT item writer", CIRCLE_ITEM)
                .on("SAT math solver", SOLVER_AGREES)
                .on("SAT item reviewer", GOOD_RUBRIC)
                .on("SAT visual designer", r#"{"type": "diagram", "description": "A circle."}"#)
                .on(
                    "SAT visual reviewer",
                    r#"{"score": 0.9, "missingInformation": ["radius 6"], "duplicatedContent": [], "issues": []}"#,
                ),
        );
        let result = flow(provider).run(&circles_request()).await.unwrap();

        let visual = result.visual.unwrap();
        assert!(visual.needs_regeneration);
        assert_eq!(result.metadata.visual_iterations, 3);
        assert_eq!(result.metadata.iterations, 4);
    }

    #[tokio::test]
    async fn test_visual_quota_keeps_item() {
        let provider = Arc::new(
            MockProvider::new()
                .on("SAT item writer", CIRCLE_ITEM)
                .on("SAT math solver", SOLVER_AGREES)
                .on("SAT item reviewer", GOOD_RUBRIC)
                .on_failure("SAT visual designer", MockFailure::Quota),
        );
        let result = flow(provider).run(&circles_request()).await.unwrap();

        let visual = result.visual.unwrap();
        assert!(visual.needs_regeneration);
        assert!(visual.description.contains("radius 6"));
        assert_eq!(result.metadata.visual_iterations, 1);
    }
}
