//! 配图审核 - 业务能力层
//!
//! 在通用评分之外做完整性检查：题干里能抽取出的角度、长度、数量关系必须全部出现在配图描述中。
//! 本地抽取和模型报告的缺失项合并计算，任意一项缺失即为严重问题。

use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::AppResult;
use crate::models::{
    CandidateItem, IssueCategory, Severity, ValidationBuilder, ValidationResult, VisualArtifact,
};
use crate::services::llm_service::LlmService;

const MISSING_CAP: f64 = 0.4;
const DUPLICATION_CAP: f64 = 0.6;

pub(crate) const VISUAL_REVIEWER_SYSTEM: &str = "You are an SAT visual reviewer. Compare the figure \
description with the question. List every angle, measurement, label or relationship the question \
states that the description omits, and every piece of content the description repeats. \
Reply with JSON only: {\"score\": number, \"missingInformation\": [string], \
\"duplicatedContent\": [string], \"issues\": [string]}";

fn angle_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*(?:°|degrees?\b)").expect("angle regex is valid")
    })
}

fn measurement_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(\d+(?:\.\d+)?)\s*(?:cm|centimeters?|mm|millimeters?|m|meters?|km|kilometers?|in|inch(?:es)?|ft|feet|foot|yards?|miles?|units?)\b",
        )
        .expect("measurement regex is valid")
    })
}

/// "AB = 10"、"radius 6"、"side length of 4" 之类的长度
fn named_length_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:[A-Z]{2}\s*=\s*|(?:radius|diameter|length|width|height|side(?: length)?)(?: of)?\s+)(\d+(?:\.\d+)?)\b",
        )
        .expect("named length regex is valid")
    })
}

/// 关系词：题干出现时，描述中出现任一写法即可
const RELATIONS: &[(&str, &[&str])] = &[
    ("twice", &["twice", "2 times", "two times", "double"]),
    ("three times", &["three times", "3 times", "triple"]),
    ("half", &["half", "1/2", "one-half"]),
    ("parallel", &["parallel", "∥"]),
    ("perpendicular", &["perpendicular", "90", "right angle", "⊥"]),
    ("congruent", &["congruent", "≅", "equal"]),
    ("bisect", &["bisect"]),
    ("midpoint", &["midpoint"]),
];

const RIGHT_ANGLE_MARKERS: &[&str] = &["right angle", "right triangle", "right-angled"];

/// 题干中需要在配图里体现的一条事实
#[derive(Debug, Clone, PartialEq)]
pub struct RequiredFact {
    pub label: String,
    accepted: Vec<String>,
    numeric: bool,
}

impl RequiredFact {
    fn number(label: String, value: &str) -> Self {
        Self {
            label,
            accepted: vec![value.to_string()],
            numeric: true,
        }
    }

    fn phrase(label: &str, accepted: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            accepted: accepted.iter().map(|s| s.to_string()).collect(),
            numeric: false,
        }
    }

    fn is_present_in(&self, description: &str) -> bool {
        self.accepted.iter().any(|token| {
            if self.numeric {
                contains_number(description, token)
            } else {
                description.contains(token.as_str())
            }
        })
    }
}

/// 从题干中抽取角度、长度和关系事实（去重，按出现顺序）
pub fn extract_facts(question: &str) -> Vec<RequiredFact> {
    let lower = question.to_lowercase();
    let mut facts = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut push = |fact: RequiredFact, facts: &mut Vec<RequiredFact>| {
        if seen.insert(fact.label.clone()) {
            facts.push(fact);
        }
    };

    for cap in angle_pattern().captures_iter(question) {
        let value = &cap[1];
        push(RequiredFact::number(format!("{}°", value), value), &mut facts);
    }
    for pattern in [measurement_pattern(), named_length_pattern()] {
        for cap in pattern.captures_iter(question) {
            let value = &cap[1];
            push(RequiredFact::number(value.to_string(), value), &mut facts);
        }
    }
    if RIGHT_ANGLE_MARKERS.iter().any(|m| lower.contains(m)) {
        push(
            RequiredFact::phrase("90° angle", &["90", "right angle", "⊥", "perpendicular"]),
            &mut facts,
        );
    }
    for (relation, accepted) in RELATIONS {
        if lower.contains(relation) {
            push(RequiredFact::phrase(relation, accepted), &mut facts);
        }
    }

    facts
}

/// 数字匹配：前后不能紧跟其他数字（"6" 不匹配 "60"）
fn contains_number(haystack: &str, number: &str) -> bool {
    haystack.match_indices(number).any(|(start, _)| {
        let end = start + number.len();
        let before_ok = !haystack[..start]
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_digit() || c == '.');
        let mut after = haystack[end..].chars();
        let after_ok = match (after.next(), after.next()) {
            (Some(c), _) if c.is_ascii_digit() => false,
            (Some('.'), Some(d)) if d.is_ascii_digit() => false,
            _ => true,
        };
        before_ok && after_ok
    })
}

/// 描述中重复出现的句子
fn duplicated_sentences(description: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for sentence in description.split(['.', ';', '\n']) {
        let normalized: String = sentence
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if normalized.len() < 8 {
            continue;
        }
        if !seen.insert(normalized.clone()) && !duplicates.contains(&normalized) {
            duplicates.push(normalized);
        }
    }
    duplicates
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisualReviewReply {
    score: f64,
    #[serde(default)]
    missing_information: Vec<String>,
    #[serde(default)]
    duplicated_content: Vec<String>,
    #[serde(default)]
    issues: Vec<String>,
}

/// 配图审核服务
pub struct VisualValidator {
    llm: LlmService,
    threshold: f64,
}

impl VisualValidator {
    pub fn new(llm: LlmService, threshold: f64) -> Self {
        Self { llm, threshold }
    }

    pub async fn validate(
        &self,
        item: &CandidateItem,
        visual: &VisualArtifact,
        prefix: &str,
    ) -> AppResult<ValidationResult> {
        let question = item.full_text();
        let user = format!(
            "QUESTION\n{}\n\nFIGURE ({:?})\n{}\n{}",
            question,
            visual.kind,
            visual.description,
            visual
                .data
                .as_ref()
                .map(|d| format!("Data: {}", d))
                .unwrap_or_default()
        );
        let reply: VisualReviewReply = self
            .llm
            .request_json("配图审核", VISUAL_REVIEWER_SYSTEM, &user)
            .await?;

        let mut builder = ValidationResult::builder(reply.score);
        for issue in reply.issues.into_iter().filter(|i| !i.trim().is_empty()) {
            builder.issue(Severity::Minor, IssueCategory::Rubric, issue);
        }

        let description = visual.description.to_lowercase();
        let mut missing: Vec<String> = extract_facts(&question)
            .into_iter()
            .filter(|fact| !fact.is_present_in(&description))
            .map(|fact| fact.label)
            .collect();
        for reported in reply.missing_information {
            if !reported.trim().is_empty() && !missing.contains(&reported) {
                missing.push(reported);
            }
        }
        record_missing(&mut builder, &missing);

        let mut duplicated = duplicated_sentences(&visual.description);
        duplicated.extend(reply.duplicated_content.into_iter().filter(|d| !d.trim().is_empty()));
        if !duplicated.is_empty() {
            for content in &duplicated {
                builder.issue(
                    Severity::Major,
                    IssueCategory::Duplication,
                    format!("配图描述重复: {}", content),
                );
            }
            builder
                .cap(DUPLICATION_CAP)
                .force_invalid()
                .correction("Describe each element of the figure exactly once.");
        }

        let result = builder.finalize(self.threshold);
        debug!(
            "{} 配图审核: 得分 {:.2}，缺失 {} 项，重复 {} 项",
            prefix,
            result.score(),
            missing.len(),
            duplicated.len()
        );
        Ok(result)
    }
}

fn record_missing(builder: &mut ValidationBuilder, missing: &[String]) {
    if missing.is_empty() {
        return;
    }
    for fact in missing {
        builder.issue(
            Severity::Critical,
            IssueCategory::MissingInformation,
            format!("配图缺少题干信息: {}", fact),
        );
    }
    builder.cap(MISSING_CAP).correction(format!(
        "The figure description must include: {}",
        missing.join(", ")
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MockProvider;
    use crate::models::candidate::fixtures::circle_item;
    use crate::models::VisualKind;
    use std::sync::Arc;
    use std::time::Duration;

    fn diagram(description: &str) -> VisualArtifact {
        VisualArtifact {
            kind: VisualKind::Diagram,
            description: description.to_string(),
            data: None,
            svg: None,
            needs_regeneration: false,
        }
    }

    fn validator(reply: &str) -> VisualValidator {
        let provider = Arc::new(MockProvider::new().on("SAT visual reviewer", reply));
        VisualValidator::new(LlmService::new(provider, "m", 3, Duration::ZERO), 0.8)
    }

    #[test]
    fn test_extract_facts_from_circle_question() {
        let labels: Vec<String> = extract_facts(&circle_item().prompt)
            .into_iter()
            .map(|f| f.label)
            .collect();
        assert_eq!(labels, vec!["60°", "6"]);
    }

    #[test]
    fn test_contains_number_respects_digits() {
        assert!(contains_number("radius 6 cm", "6"));
        assert!(!contains_number("angle of 60", "6"));
        assert!(!contains_number("length 6.5", "6"));
        assert!(contains_number("ends at 6.", "6"));
    }

    #[tokio::test]
    async fn test_complete_description_passes() {
        let v = validator(r#"{"score": 0.9, "missingInformation": [], "duplicatedContent": [], "issues": []}"#);
        let visual = diagram("Circle with center O and radius 6 cm; central angle AOB measures 60°.");
        let result = v.validate(&circle_item(), &visual, "[测试]").await.unwrap();
        assert!(result.is_valid(), "{:?}", result.issues());
    }

    #[tokio::test]
    async fn test_missing_right_angle_is_critical() {
        let mut item = circle_item();
        item.prompt = "In right triangle ABC, angle C is a right angle, AB = 10 and BC = 6. What is the length of AC?".into();
        let v = validator(r#"{"score": 0.9, "missingInformation": ["90° angle"], "duplicatedContent": [], "issues": []}"#);
        let visual = diagram("Triangle ABC with AB = 10 and BC = 6.");

        let result = v.validate(&item, &visual, "[测试]").await.unwrap();
        assert!(!result.is_valid());
        assert!(result.score() <= 0.4);
        assert!(result.has_category(IssueCategory::MissingInformation));
        // 本地抽取和模型报告的同一缺失项只记一次
        let missing = result
            .issues()
            .iter()
            .filter(|i| i.category == IssueCategory::MissingInformation)
            .count();
        assert_eq!(missing, 1);
    }

    #[tokio::test]
    async fn test_duplicated_description_is_capped() {
        let v = validator(r#"{"score": 0.95, "missingInformation": [], "duplicatedContent": [], "issues": []}"#);
        let visual = diagram(
            "Circle with center O and radius 6 cm. Central angle AOB is 60°. Circle with center O and radius 6 cm.",
        );
        let result = v.validate(&circle_item(), &visual, "[测试]").await.unwrap();
        assert!(!result.is_valid());
        assert!(result.score() <= 0.6);
        assert!(result.has_category(IssueCategory::Duplication));
    }
}
