use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::topic::Topic;

/// 考试部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    /// 数学
    Math,
    /// 阅读与写作
    ReadingWriting,
}

impl Section {
    pub fn slug(self) -> &'static str {
        match self {
            Section::Math => "math",
            Section::ReadingWriting => "reading-writing",
        }
    }

    /// 是否需要计算（数学部分需要独立验算）
    pub fn is_quantitative(self) -> bool {
        matches!(self, Section::Math)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// 难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 出题请求（创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub section: Section,
    pub topic: Topic,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    /// 调用方提供的补充上下文
    pub custom_context: Option<String>,
}

impl GenerationRequest {
    /// 根据原始字符串构建请求，主题会按分类表解析
    pub fn new(
        section: Section,
        topic: &str,
        subtopic: Option<String>,
        difficulty: Difficulty,
        custom_context: Option<String>,
    ) -> AppResult<Self> {
        let topic = Topic::resolve(topic)
            .ok_or_else(|| AppError::invalid_input(format!("未知的主题: {}", topic)))?;

        if topic.section() != section {
            return Err(AppError::invalid_input(format!(
                "主题 {} 不属于 {} 部分",
                topic.name(),
                section
            )));
        }

        let subtopic = subtopic.filter(|s| !s.trim().is_empty());
        let custom_context = custom_context.filter(|s| !s.trim().is_empty());

        Ok(Self {
            section,
            topic,
            subtopic,
            difficulty,
            custom_context,
        })
    }

    /// 日志用的简短描述
    pub fn label(&self) -> String {
        match &self.subtopic {
            Some(sub) => format!("{}/{}/{} ({})", self.section, self.topic.slug(), sub, self.difficulty),
            None => format!("{}/{} ({})", self.section, self.topic.slug(), self.difficulty),
        }
    }
}
