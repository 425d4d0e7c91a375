//! 审题 - 业务能力层
//!
//! 校验顺序：格式（本地） → 主题对齐（本地识别器） → 数学独立求解（模型 + 算式核对） → 通用评分细则（模型）
//!
//! 分数封顶规则：
//! - 格式严重错误：≤ 0.5，不再调用模型
//! - 主题不符（识别器有把握且与请求不同）：≤ 0.3，强制不通过
//! - 技能点偏移：≤ 0.75
//! - 标记答案错误：≤ 0.1，给出更正答案（求解结果不在任何选项中同样按答案错误处理）
//! - 解析计算错误：≤ 0.1

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::models::{
    find_leaf, CandidateItem, ChoiceLabel, GenerationRequest, IssueCategory, RetrievedContext,
    Section, Severity, TopicCheck, TopicPlan, ValidationBuilder, ValidationResult,
};
use crate::services::llm_service::LlmService;
use crate::services::math_checker::check_arithmetic;
use crate::services::topic_classifier::TopicClassifier;

const FORMAT_CAP: f64 = 0.5;
const TOPIC_MISMATCH_CAP: f64 = 0.3;
const SUBTOPIC_DRIFT_CAP: f64 = 0.75;
const ANSWER_WRONG_CAP: f64 = 0.1;
const EXPLANATION_ERROR_CAP: f64 = 0.1;
const UNANSWERABLE_CAP: f64 = 0.6;

pub(crate) const SOLVER_SYSTEM: &str = "You are an SAT math solver. Solve the problem yourself \
from scratch before looking at the proposed explanation. Then audit the proposed explanation and \
list every mathematical error in it (wrong arithmetic, wrong simplification, wrong conclusion). \
Reply with JSON only: {\"solution\": string, \"finalValue\": string, \
\"matchingChoice\": \"A\"|\"B\"|\"C\"|\"D\"|\"none\", \"explanationErrors\": [string]}";

pub(crate) const REVIEWER_SYSTEM: &str = "You are an SAT item reviewer. Score the item from 0 to 1 \
against this rubric: format (exactly four choices, exactly one correct), difficulty alignment, \
clarity and lack of ambiguity, alignment with the requested domain and skill, distractor \
plausibility, and for passage-based items whether the question is answerable from the passage \
alone. Reply with JSON only: {\"score\": number, \
\"issues\": [{\"severity\": \"minor\"|\"major\"|\"critical\", \"message\": string}], \
\"corrections\": string, \"correctAnswer\": \"A\"|\"B\"|\"C\"|\"D\", \"answerableFromPassage\": boolean}";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolverReply {
    #[serde(default)]
    solution: String,
    #[serde(default)]
    final_value: String,
    #[serde(default, deserialize_with = "matching_choice")]
    matching_choice: Option<ChoiceLabel>,
    #[serde(default)]
    explanation_errors: Vec<String>,
}

/// "none" 表示没有选项等于求解结果；其他无法识别的写法作为解析失败，由调用方重问
fn matching_choice<'de, D>(deserializer: D) -> Result<Option<ChoiceLabel>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    ChoiceLabel::parse(raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("无法识别的 matchingChoice: {}", raw)))
}

#[derive(Debug, Deserialize)]
struct RubricIssue {
    #[serde(default)]
    severity: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RubricReply {
    score: f64,
    #[serde(default)]
    issues: Vec<RubricIssue>,
    #[serde(default)]
    corrections: String,
    #[serde(default)]
    correct_answer: Option<String>,
    #[serde(default)]
    answerable_from_passage: Option<bool>,
}

fn parse_severity(s: &str) -> Severity {
    match s.trim().to_lowercase().as_str() {
        "critical" | "severe" | "blocker" => Severity::Critical,
        "major" | "high" => Severity::Major,
        _ => Severity::Minor,
    }
}

/// 审题服务
pub struct ContentValidator {
    llm: LlmService,
    classifier: TopicClassifier,
    threshold: f64,
}

impl ContentValidator {
    pub fn new(llm: LlmService, threshold: f64) -> Self {
        Self {
            llm,
            classifier: TopicClassifier::new(),
            threshold,
        }
    }

    /// 校验一道候选题
    pub async fn validate(
        &self,
        candidate: &CandidateItem,
        request: &GenerationRequest,
        plan: &TopicPlan,
        context: &RetrievedContext,
        prefix: &str,
    ) -> AppResult<ValidationResult> {
        let mut builder = ValidationResult::builder(1.0);

        let violations = candidate.check_invariants();
        let format_ok = violations.is_empty();
        for violation in violations {
            builder
                .issue(Severity::Critical, IssueCategory::Format, violation)
                .cap(FORMAT_CAP);
        }

        self.check_topic(&mut builder, candidate, request, plan);

        if !format_ok {
            debug!("{} 格式不合格，跳过模型审题", prefix);
            return Ok(builder.finalize(self.threshold));
        }

        if request.section == Section::Math {
            let passed = self.check_math(&mut builder, candidate, prefix).await?;
            if !passed {
                return Ok(builder.finalize(self.threshold));
            }
        }

        self.check_rubric(&mut builder, candidate, request, plan, context)
            .await?;

        Ok(builder.finalize(self.threshold))
    }

    /// 主题对齐检查（本地，不调用模型）
    fn check_topic(
        &self,
        builder: &mut ValidationBuilder,
        candidate: &CandidateItem,
        request: &GenerationRequest,
        plan: &TopicPlan,
    ) {
        let classification = self.classifier.classify(
            &candidate.prompt,
            candidate.passage.as_deref(),
            Some(request.section),
        );

        if !classification.is_match() {
            builder
                .issue(
                    Severity::Minor,
                    IssueCategory::LowConfidenceTopic,
                    format!(
                        "无法确定题目所属主题（置信度 {:.2}），请使用更典型的 {} 问法",
                        classification.confidence,
                        plan.subtopic.as_deref().unwrap_or(plan.topic.name())
                    ),
                )
                .topic_check(TopicCheck {
                    detected_topic: None,
                    detected_subtopic: None,
                    confidence: classification.confidence,
                    mismatch: false,
                });
            return;
        }

        let detected = classification.topic;
        let detected_subtopic = classification.subtopic.map(str::to_string);
        let topic_mismatch = detected != Some(request.topic);

        if topic_mismatch {
            let detected_name = detected.map_or("未知", |t| t.name());
            builder
                .issue(
                    Severity::Critical,
                    IssueCategory::TopicMismatch,
                    format!(
                        "题目被识别为 {}（{}），而请求的是 {}",
                        detected_name,
                        classification.subtopic.unwrap_or("-"),
                        request.topic.name()
                    ),
                )
                .cap(TOPIC_MISMATCH_CAP)
                .force_invalid()
                .correction(format!(
                    "Rewrite the item so that it is {}",
                    plan.alignment_statement
                ));
        } else if let (Some(wanted), Some(found)) = (
            plan.subtopic
                .as_deref()
                .and_then(|s| find_leaf(request.topic, s)),
            classification.subtopic,
        ) {
            if wanted.name != found {
                builder
                    .issue(
                        Severity::Major,
                        IssueCategory::SubtopicDrift,
                        format!("题目更像 {}，而请求的技能点是 {}", found, wanted.name),
                    )
                    .cap(SUBTOPIC_DRIFT_CAP);
            }
        }

        builder.topic_check(TopicCheck {
            detected_topic: detected,
            detected_subtopic,
            confidence: classification.confidence,
            mismatch: topic_mismatch,
        });
    }

    /// 数学题独立求解；返回是否通过（未通过时不再做评分细则）
    async fn check_math(
        &self,
        builder: &mut ValidationBuilder,
        candidate: &CandidateItem,
        prefix: &str,
    ) -> AppResult<bool> {
        let mut problem = String::new();
        if let Some(passage) = &candidate.passage {
            problem.push_str(passage);
            problem.push('\n');
        }
        problem.push_str(&candidate.prompt);
        problem.push('\n');
        for (label, choice) in ChoiceLabel::ALL.iter().zip(&candidate.choices) {
            problem.push_str(&format!("{}) {}\n", label, choice));
        }
        if let Some(desc) = &candidate.visual_description {
            problem.push_str(&format!("Figure: {}\n", desc));
        }
        let explanation = candidate.explanation.as_deref().unwrap_or("");
        let user = format!(
            "PROBLEM\n{}\nPROPOSED EXPLANATION (audit only after solving)\n{}",
            problem,
            if explanation.is_empty() { "(none)" } else { explanation }
        );

        let reply: SolverReply = self.llm.request_json("数学独立求解", SOLVER_SYSTEM, &user).await?;
        let mut passed = true;

        if let Some(derived) = reply.matching_choice.filter(|d| *d != candidate.correct_choice) {
            info!(
                "{} ❌ 独立求解得到 {}（{}），标记答案为 {}",
                prefix, derived, reply.final_value, candidate.correct_choice
            );
            builder
                .issue(
                    Severity::Critical,
                    IssueCategory::AnswerWrong,
                    format!(
                        "标记答案 {} 错误，独立求解结果为 {}（{}）",
                        candidate.correct_choice, derived, reply.final_value
                    ),
                )
                .cap(ANSWER_WRONG_CAP)
                .corrected_answer(derived)
                .correction(format!(
                    "The correct answer is {} ({}). {}",
                    derived, reply.final_value, reply.solution
                ));
            passed = false;
        } else if reply.matching_choice.is_none() && !reply.final_value.trim().is_empty() {
            info!(
                "{} ❌ 独立求解得到 {}，没有选项与之相等",
                prefix, reply.final_value
            );
            builder
                .issue(
                    Severity::Critical,
                    IssueCategory::AnswerWrong,
                    format!(
                        "独立求解结果 {} 不在选项中，标记答案 {} 不成立",
                        reply.final_value, candidate.correct_choice
                    ),
                )
                .cap(ANSWER_WRONG_CAP)
                .correction(format!(
                    "None of the choices equals the correct value {}. Rewrite the choices so that \
                     exactly one of them equals it and mark that choice as correct. {}",
                    reply.final_value, reply.solution
                ));
            passed = false;
        }

        let mut explanation_errors: Vec<String> = check_arithmetic(explanation)
            .into_iter()
            .map(|e| e.to_string())
            .collect();
        explanation_errors.extend(
            reply
                .explanation_errors
                .into_iter()
                .filter(|e| !e.trim().is_empty()),
        );

        if !explanation_errors.is_empty() {
            info!("{} ❌ 解析存在 {} 处计算错误", prefix, explanation_errors.len());
            for error in &explanation_errors {
                builder.issue(Severity::Critical, IssueCategory::ExplanationError, error.clone());
            }
            builder.cap(EXPLANATION_ERROR_CAP).correction(format!(
                "Rewrite the explanation. Independent solution: {} Final value: {}",
                reply.solution, reply.final_value
            ));
            passed = false;
        }

        Ok(passed)
    }

    /// 通用评分细则
    async fn check_rubric(
        &self,
        builder: &mut ValidationBuilder,
        candidate: &CandidateItem,
        request: &GenerationRequest,
        plan: &TopicPlan,
        context: &RetrievedContext,
    ) -> AppResult<()> {
        let user = format!(
            "Requested: {} / {} / {} ({})\nThe item must be {}\n\nRULES\n{}\n\nITEM\n{}",
            request.section,
            plan.topic.name(),
            plan.subtopic.as_deref().unwrap_or("any skill"),
            request.difficulty,
            plan.alignment_statement,
            context.rules,
            candidate.render()
        );

        let reply: RubricReply = self.llm.request_json("评分细则", REVIEWER_SYSTEM, &user).await?;

        builder.set_score(reply.score).correction(reply.corrections);
        for issue in reply.issues {
            builder.issue(parse_severity(&issue.severity), IssueCategory::Rubric, issue.message);
        }

        if let Some(label) = reply.correct_answer.as_deref().and_then(ChoiceLabel::parse) {
            if label != candidate.correct_choice {
                builder
                    .issue(
                        Severity::Critical,
                        IssueCategory::AnswerWrong,
                        format!("审题认为正确答案是 {}，而不是 {}", label, candidate.correct_choice),
                    )
                    .cap(ANSWER_WRONG_CAP)
                    .corrected_answer(label);
            }
        }

        if candidate.passage.is_some() && reply.answerable_from_passage == Some(false) {
            builder
                .issue(Severity::Major, IssueCategory::Rubric, "题目无法仅凭文章作答")
                .cap(UNANSWERABLE_CAP);
        }

        Ok(())
    }
}
