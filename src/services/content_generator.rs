//! 出题 - 业务能力层
//!
//! 根据请求、出题规划和参考资料生成一道候选题；上一轮的审题意见作为反馈带入

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{CandidateItem, ChoiceLabel, GenerationRequest, RetrievedContext, TopicPlan};
use crate::services::llm_service::LlmService;

pub(crate) const WRITER_SYSTEM: &str = "You are an SAT item writer for the digital SAT. \
Write exactly one original multiple-choice question that follows the plan and rules you are given. \
Reply with JSON only: {\"passage\": string|null, \"prompt\": string, \
\"choices\": [string, string, string, string], \"correctAnswer\": \"A\"|\"B\"|\"C\"|\"D\", \
\"explanation\": string, \"needsVisual\": boolean, \"visualDescription\": string|null}. \
If the question refers to a figure, graph or table, set needsVisual to true and describe every \
measurement, angle and label of the figure in visualDescription.";

/// 上一轮的审题反馈
#[derive(Debug, Clone, Default)]
pub struct GenerationFeedback {
    pub score: f64,
    pub issues: Vec<String>,
    pub corrections: String,
    /// 连续主题偏移后的加强纠偏提示
    pub escalation: Option<String>,
}

impl GenerationFeedback {
    fn render(&self) -> String {
        let mut out = format!(
            "Your previous attempt scored {:.2} and was rejected. Fix these problems:\n",
            self.score
        );
        for issue in &self.issues {
            out.push_str("- ");
            out.push_str(issue);
            out.push('\n');
        }
        if !self.corrections.trim().is_empty() {
            out.push_str("Reviewer corrections:\n");
            out.push_str(&self.corrections);
            out.push('\n');
        }
        if let Some(escalation) = &self.escalation {
            out.push('\n');
            out.push_str(escalation);
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriterReply {
    #[serde(default)]
    passage: Option<String>,
    #[serde(alias = "question")]
    prompt: String,
    choices: Value,
    #[serde(alias = "correctChoice", alias = "answer")]
    correct_answer: String,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    needs_visual: bool,
    #[serde(default)]
    visual_description: Option<String>,
}

/// 出题服务
pub struct ContentGenerator {
    llm: LlmService,
}

impl ContentGenerator {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    /// 生成一道候选题
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        plan: &TopicPlan,
        context: &RetrievedContext,
        feedback: Option<&GenerationFeedback>,
    ) -> AppResult<CandidateItem> {
        let user_message = build_writer_message(request, plan, context, feedback);
        debug!("出题提示词长度: {} 字符", user_message.len());

        let reply: WriterReply = self
            .llm
            .request_json("出题", WRITER_SYSTEM, &user_message)
            .await?;
        into_candidate(reply)
    }
}

fn build_writer_message(
    request: &GenerationRequest,
    plan: &TopicPlan,
    context: &RetrievedContext,
    feedback: Option<&GenerationFeedback>,
) -> String {
    let mut out = format!(
        "Section: {}\nDomain: {}\nSkill: {}\nDifficulty: {}\n\n",
        request.section,
        plan.topic.name(),
        plan.subtopic.as_deref().unwrap_or("any skill in this domain"),
        request.difficulty
    );

    out.push_str(&format!(
        "PLAN\nQuestion type: {}\nThe item must be {}\nCanonical phrasing: {}\nPassage constraints: {}\nChoice style: {}\nUse this vocabulary: {}\n",
        plan.question_type,
        plan.alignment_statement,
        plan.canonical_phrasing,
        plan.passage_constraints,
        plan.choice_style,
        plan.required_keywords.join(", ")
    ));
    if !plan.forbidden_keywords.is_empty() {
        out.push_str(&format!(
            "Never use this vocabulary (it belongs to other skills): {}\n",
            plan.forbidden_keywords.join(", ")
        ));
    }

    out.push_str("\nRULES\n");
    out.push_str(&context.rules);
    out.push_str("\n\nINSTRUCTIONS\n");
    out.push_str(&context.instructions);
    out.push('\n');

    if !context.worked_examples.is_empty() {
        out.push_str("\nEXAMPLES (do not copy)\n");
        for (i, example) in context.worked_examples.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}\n   Answer: {}\n",
                i + 1,
                example.prompt,
                example.answer
            ));
            if let Some(explanation) = &example.explanation {
                out.push_str(&format!("   Explanation: {}\n", explanation));
            }
        }
    }

    if let Some(feedback) = feedback {
        out.push('\n');
        out.push_str(&feedback.render());
    }

    out
}

/// 去掉 "A) " / "(B) " / "C. " 之类的前缀
fn strip_label(choice: &str) -> String {
    let trimmed = choice.trim();
    let mut chars = trimmed.chars();
    let stripped = match (chars.next(), chars.next(), chars.next()) {
        (Some('('), Some(l), Some(')')) if ChoiceLabel::parse_letter(&l.to_string()).is_some() => {
            &trimmed[3..]
        }
        (Some(l), Some(')' | '.' | ':'), _) if l.is_ascii_uppercase() && ChoiceLabel::parse_letter(&l.to_string()).is_some() => {
            &trimmed[2..]
        }
        _ => trimmed,
    };
    stripped.trim().to_string()
}

fn parse_choices(value: &Value) -> AppResult<Vec<String>> {
    let choices: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => strip_label(s),
                Value::Object(map) => map
                    .get("text")
                    .and_then(Value::as_str)
                    .map(strip_label)
                    .unwrap_or_default(),
                other => other.to_string(),
            })
            .collect(),
        Value::Object(map) => ChoiceLabel::ALL
            .iter()
            .filter_map(|label| {
                map.get(label.as_str())
                    .or_else(|| map.get(&label.as_str().to_lowercase()))
            })
            .map(|v| v.as_str().map(strip_label).unwrap_or_else(|| v.to_string()))
            .collect(),
        _ => return Err(AppError::parse_failed("出题", 1, "choices 既不是数组也不是对象")),
    };
    Ok(choices)
}

fn into_candidate(reply: WriterReply) -> AppResult<CandidateItem> {
    let choices = parse_choices(&reply.choices)?;

    // 字母标签优先；纯数字答案先按选项文本匹配，避免 "2" 被当成第三个选项
    let answer = reply.correct_answer.trim();
    let by_label = ChoiceLabel::parse(answer).filter(|_| answer.chars().any(|c| c.is_ascii_alphabetic()));
    let wanted = strip_label(answer).to_lowercase();
    let by_text = choices
        .iter()
        .position(|c| c.to_lowercase() == wanted)
        .and_then(ChoiceLabel::from_index);

    let correct_choice = by_label
        .or(by_text)
        .or_else(|| ChoiceLabel::parse(answer))
        .ok_or_else(|| {
            AppError::parse_failed("出题", 1, format!("无法识别正确答案: {}", answer))
        })?;

    let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());

    Ok(CandidateItem {
        prompt: reply.prompt.trim().to_string(),
        passage: non_empty(reply.passage),
        choices,
        correct_choice,
        explanation: non_empty(reply.explanation),
        needs_visual: reply.needs_visual,
        visual_description: non_empty(reply.visual_description),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MockProvider;
    use crate::models::{Difficulty, Section};
    use crate::services::context_retriever::generic_context;
    use crate::services::topic_planner::TopicPlanner;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_strip_label() {
        assert_eq!(strip_label("A) 2π"), "2π");
        assert_eq!(strip_label("(C) 12"), "12");
        assert_eq!(strip_label("D. None"), "None");
        assert_eq!(strip_label("Amount"), "Amount");
        // 数字带括号是选项内容本身
        assert_eq!(strip_label("(3)"), "(3)");
        assert_eq!(strip_label("(0) + 4"), "(0) + 4");
    }

    #[test]
    fn test_object_choices_and_text_answer() {
        let reply: WriterReply = serde_json::from_str(
            r#"{"prompt": "What is 2 + 2?", "choices": {"A": "3", "B": "4", "C": "5", "D": "6"},
                "correctAnswer": "4", "explanation": "2 + 2 = 4."}"#,
        )
        .unwrap();
        let item = into_candidate(reply).unwrap();
        assert_eq!(item.choices, vec!["3", "4", "5", "6"]);
        assert_eq!(item.correct_choice, ChoiceLabel::B);
        assert!(!item.needs_visual);
    }

    #[tokio::test]
    async fn test_generate_includes_feedback() {
        let provider = Arc::new(MockProvider::new().on(
            "item writer",
            r#"{"prompt": "q", "choices": ["1", "2", "3", "4"], "correctAnswer": "C"}"#,
        ));
        let generator = ContentGenerator::new(LlmService::new(
            provider.clone(),
            "m",
            3,
            Duration::ZERO,
        ));
        let request = GenerationRequest::new(Section::Math, "algebra", None, Difficulty::Medium, None)
            .unwrap();
        let plan = TopicPlanner::new().plan(request.topic, None);
        let feedback = GenerationFeedback {
            score: 0.4,
            issues: vec!["[严重] 选项重复".into()],
            corrections: String::new(),
            escalation: None,
        };

        let item = generator
            .generate(&request, &plan, &generic_context(&request), Some(&feedback))
            .await
            .unwrap();
        assert_eq!(item.correct_choice, ChoiceLabel::C);
        assert!(provider.calls()[0].transcript().contains("选项重复"));
    }
}
