use serde::{Deserialize, Serialize};

use crate::models::candidate::ChoiceLabel;
use crate::models::topic::Topic;

/// 问题严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

/// 问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// 格式（选项数、答案标签、配图描述）
    Format,
    /// 标记答案错误
    AnswerWrong,
    /// 解析计算错误
    ExplanationError,
    /// 主题不符
    TopicMismatch,
    /// 技能点偏移
    SubtopicDrift,
    /// 主题识别置信度低
    LowConfidenceTopic,
    /// 配图缺少题干信息
    MissingInformation,
    /// 配图描述重复
    Duplication,
    /// 评分细则
    Rubric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
}

impl Issue {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Critical => "严重",
            Severity::Major => "主要",
            Severity::Minor => "次要",
        };
        write!(f, "[{}] {}", level, self.message)
    }
}

/// 主题识别结果（附在校验结果上，供编排层升级纠偏提示）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCheck {
    pub detected_topic: Option<Topic>,
    pub detected_subtopic: Option<String>,
    pub confidence: f64,
    pub mismatch: bool,
}

/// 校验结果
///
/// 只能通过 [`ValidationBuilder`] 构造，保证 `is_valid ⇒ score ≥ 阈值 且 无严重问题`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    is_valid: bool,
    score: f64,
    issues: Vec<Issue>,
    corrections: String,
    corrected_answer: Option<ChoiceLabel>,
    topic_check: Option<TopicCheck>,
}

impl ValidationResult {
    pub fn builder(raw_score: f64) -> ValidationBuilder {
        ValidationBuilder {
            score: raw_score,
            cap: 1.0,
            force_invalid: false,
            issues: Vec::new(),
            corrections: Vec::new(),
            corrected_answer: None,
            topic_check: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn corrections(&self) -> &str {
        &self.corrections
    }

    pub fn corrected_answer(&self) -> Option<ChoiceLabel> {
        self.corrected_answer
    }

    pub fn topic_check(&self) -> Option<&TopicCheck> {
        self.topic_check.as_ref()
    }

    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(Issue::is_critical)
    }

    pub fn has_category(&self, category: IssueCategory) -> bool {
        self.issues.iter().any(|i| i.category == category)
    }

    /// 是否为确定的主题不符
    pub fn is_topic_mismatch(&self) -> bool {
        self.topic_check.as_ref().is_some_and(|t| t.mismatch)
    }

    /// 问题列表的文本形式
    pub fn issue_lines(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }
}

/// 校验结果构造器：记录问题并按规则封顶分数
#[derive(Debug)]
pub struct ValidationBuilder {
    score: f64,
    cap: f64,
    force_invalid: bool,
    issues: Vec<Issue>,
    corrections: Vec<String>,
    corrected_answer: Option<ChoiceLabel>,
    topic_check: Option<TopicCheck>,
}

impl ValidationBuilder {
    pub fn issue(
        &mut self,
        severity: Severity,
        category: IssueCategory,
        message: impl Into<String>,
    ) -> &mut Self {
        self.issues.push(Issue {
            severity,
            category,
            message: message.into(),
        });
        self
    }

    /// 分数上限（多次调用取最小值）
    pub fn cap(&mut self, max: f64) -> &mut Self {
        self.cap = self.cap.min(max);
        self
    }

    pub fn force_invalid(&mut self) -> &mut Self {
        self.force_invalid = true;
        self
    }

    pub fn correction(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.corrections.push(text);
        }
        self
    }

    pub fn corrected_answer(&mut self, label: ChoiceLabel) -> &mut Self {
        self.corrected_answer = Some(label);
        self
    }

    pub fn topic_check(&mut self, check: TopicCheck) -> &mut Self {
        self.topic_check = Some(check);
        self
    }

    pub fn set_score(&mut self, score: f64) -> &mut Self {
        self.score = score;
        self
    }

    pub fn current_cap(&self) -> f64 {
        self.cap
    }

    /// 生成最终结果
    pub fn finalize(&mut self, threshold: f64) -> ValidationResult {
        let raw = if self.score.is_finite() { self.score } else { 0.0 };
        let score = raw.min(self.cap).clamp(0.0, 1.0);
        let has_critical = self.issues.iter().any(Issue::is_critical);
        let is_valid = !self.force_invalid && !has_critical && score >= threshold;

        ValidationResult {
            is_valid,
            score,
            issues: std::mem::take(&mut self.issues),
            corrections: self.corrections.join("\n"),
            corrected_answer: self.corrected_answer,
            topic_check: self.topic_check.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_requires_threshold() {
        let result = ValidationResult::builder(0.79).finalize(0.8);
        assert!(!result.is_valid());
        let result = ValidationResult::builder(0.85).finalize(0.8);
        assert!(result.is_valid());
    }

    #[test]
    fn test_critical_issue_blocks_validity() {
        let result = ValidationResult::builder(0.95)
            .issue(Severity::Critical, IssueCategory::Format, "选项数量错误")
            .finalize(0.8);
        assert!(!result.is_valid());
        assert!(result.has_critical());
    }

    #[test]
    fn test_caps_take_minimum() {
        let result = ValidationResult::builder(0.9)
            .cap(0.6)
            .cap(0.3)
            .cap(0.4)
            .finalize(0.8);
        assert_eq!(result.score(), 0.3);
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(ValidationResult::builder(1.7).finalize(0.8).score(), 1.0);
        assert_eq!(ValidationResult::builder(f64::NAN).finalize(0.8).score(), 0.0);
    }
}
