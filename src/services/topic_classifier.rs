//! 题型识别 - 业务能力层
//!
//! 出题规划的反方向：给定生成的题目文本，按分类表的特征词打分，
//! 返回最可能的 (主题, 技能点, 置信度)。
//!
//! 这是启发式打分，结果只作为参考：置信度不超过 [`MATCH_THRESHOLD`] 时视为"无法识别"，
//! 校验层只把它当成低置信度警告，而不是确定的主题不符。

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::topic::LEAVES;
use crate::models::{Section, SubtopicLeaf, Topic};

/// 置信度超过该值才认定匹配
pub const MATCH_THRESHOLD: f64 = 0.3;

/// 最佳技能点得分达到该值时，饱和度为 1
const SATURATION_SCORE: f64 = 3.0;

/// 强信号加分
const STRONG_BOOST: f64 = 3.0;

/// 数学符号出现时，阅读与写作技能点的得分系数
const MATH_NOTATION_PENALTY: f64 = 0.2;

/// 完全没有数字时，数学技能点的得分系数
const NO_NUMBERS_PENALTY: f64 = 0.5;

fn math_notation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d\s*[-+*/=^<>]\s*[\d(a-z]|[a-z]\s*[=^]\s*-?\d|[√π²³≤≥]|\b(sin|cos|tan)\s*\(?\s*[a-z\d]|\bf\(x\)")
            .expect("math notation regex is valid")
    })
}

/// 识别结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub topic: Option<Topic>,
    pub subtopic: Option<&'static str>,
    pub confidence: f64,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            topic: None,
            subtopic: None,
            confidence: 0.0,
        }
    }

    /// 是否为可信的识别结果
    pub fn is_match(&self) -> bool {
        self.topic.is_some() && self.confidence > MATCH_THRESHOLD
    }
}

/// 题型识别器
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicClassifier;

impl TopicClassifier {
    pub fn new() -> Self {
        Self
    }

    /// 识别题目所属的主题和技能点
    ///
    /// `section_hint` 会把候选范围限制在该部分的主题内
    pub fn classify(
        &self,
        text: &str,
        passage: Option<&str>,
        section_hint: Option<Section>,
    ) -> Classification {
        let haystack = match passage {
            Some(p) => format!("{}\n{}", p, text).to_lowercase(),
            None => text.to_lowercase(),
        };

        let has_math = math_notation().is_match(&haystack);
        let has_digits = haystack.chars().any(|c| c.is_ascii_digit());

        let mut leaf_scores: Vec<(&'static SubtopicLeaf, f64)> = LEAVES
            .iter()
            .filter(|leaf| section_hint.map_or(true, |s| leaf.topic.section() == s))
            .map(|leaf| {
                let mut score = keyword_score(&haystack, leaf.keywords);
                score += boost(&haystack, leaf);
                // 数学符号强烈暗示不是阅读与写作题，反之亦然
                if leaf.topic.section() == Section::ReadingWriting && has_math {
                    score *= MATH_NOTATION_PENALTY;
                }
                if leaf.topic.section() == Section::Math && !has_digits && !has_math {
                    score *= NO_NUMBERS_PENALTY;
                }
                (leaf, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();

        let total: f64 = leaf_scores.iter().map(|(_, s)| s).sum();
        if total <= 0.0 {
            return Classification::unknown();
        }

        let mut topic_scores: HashMap<Topic, f64> = HashMap::new();
        for (leaf, score) in &leaf_scores {
            *topic_scores.entry(leaf.topic).or_default() += score;
        }

        // 同分时按分类表顺序取第一个，保证结果确定
        let best_topic = Topic::ALL
            .into_iter()
            .filter_map(|t| topic_scores.get(&t).map(|s| (t, *s)))
            .fold(None, |best: Option<(Topic, f64)>, (t, s)| match best {
                Some((_, bs)) if bs >= s => best,
                _ => Some((t, s)),
            });
        let Some((topic, topic_score)) = best_topic else {
            return Classification::unknown();
        };

        leaf_scores.retain(|(leaf, _)| leaf.topic == topic);
        let best_leaf = leaf_scores
            .iter()
            .fold(None, |best: Option<(&SubtopicLeaf, f64)>, (leaf, s)| match best {
                Some((_, bs)) if bs >= *s => best,
                _ => Some((*leaf, *s)),
            });
        let Some((best_leaf, leaf_score)) = best_leaf else {
            return Classification::unknown();
        };

        let share = topic_score / total;
        let saturation = (leaf_score / SATURATION_SCORE).min(1.0);
        let confidence = (share * saturation).clamp(0.0, 1.0);

        if confidence <= MATCH_THRESHOLD {
            return Classification {
                topic: None,
                subtopic: None,
                confidence,
            };
        }

        Classification {
            topic: Some(topic),
            subtopic: Some(best_leaf.name),
            confidence,
        }
    }
}

/// 特征词命中得分：多词短语权重更高
fn keyword_score(haystack: &str, keywords: &[&str]) -> f64 {
    keywords
        .iter()
        .filter(|kw| contains_term(haystack, kw))
        .map(|kw| {
            let words = kw.split_whitespace().count().max(1) as f64;
            (1.0 + 0.5 * (words - 1.0)).min(2.5)
        })
        .sum()
}

/// 特定题型的强信号
fn boost(haystack: &str, leaf: &SubtopicLeaf) -> f64 {
    match leaf.question_type {
        // 两篇带标签的文章几乎一定是跨文本联系题
        "cross-text" if contains_term(haystack, "text 1") && contains_term(haystack, "text 2") => {
            STRONG_BOOST
        }
        "rhetorical-synthesis"
            if contains_term(haystack, "notes") || contains_term(haystack, "student wants to") =>
        {
            STRONG_BOOST
        }
        "transition" if contains_term(haystack, "most logical transition") => STRONG_BOOST,
        "boundaries" | "form-structure-sense"
            if contains_term(haystack, "conforms to the conventions of standard english") =>
        {
            1.0
        }
        _ => 0.0,
    }
}

/// 词语匹配：关键字首尾是字母数字时要求词边界
fn contains_term(haystack: &str, term: &str) -> bool {
    let needs_left = term.chars().next().is_some_and(|c| c.is_alphanumeric());
    let needs_right = term.chars().last().is_some_and(|c| c.is_alphanumeric());

    haystack.match_indices(term).any(|(start, _)| {
        let end = start + term.len();
        let left_ok = !needs_left
            || haystack[..start]
                .chars()
                .last()
                .map_or(true, |c| !c.is_alphanumeric());
        let right_ok = !needs_right
            || haystack[end..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
        left_ok && right_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIRCLE_QUESTION: &str = "A circle has center O and radius 6. Points A and B lie on the circle \
so that central angle AOB measures 60°. What is the length of minor arc AB?";

    #[test]
    fn test_circle_question_is_geometry() {
        let result = TopicClassifier::new().classify(CIRCLE_QUESTION, None, Some(Section::Math));
        assert_eq!(result.topic, Some(Topic::GeometryAndTrigonometry));
        assert_eq!(result.subtopic, Some("Circles"));
        assert!(result.confidence > MATCH_THRESHOLD);
        assert!(result.is_match());
    }

    #[test]
    fn test_two_labeled_passages_imply_cross_text() {
        let passage = "Text 1\nSome historians argue the canal was built for trade.\n\
Text 2\nArchaeologist Ana Ruiz disputes this, citing evidence of ceremonial use.";
        let prompt = "Based on the texts, how would the author of Text 2 most likely respond to the historians in Text 1?";
        let result = TopicClassifier::new().classify(prompt, Some(passage), None);
        assert_eq!(result.topic, Some(Topic::CraftAndStructure));
        assert_eq!(result.subtopic, Some("Cross-Text Connections"));
    }

    #[test]
    fn test_notes_imply_rhetorical_synthesis() {
        let prompt = "While researching a topic, a student has taken the following notes. \
The student wants to emphasize a difference between the two species. Which choice most \
effectively uses relevant information from the notes to accomplish this goal?";
        let result = TopicClassifier::new().classify(prompt, None, Some(Section::ReadingWriting));
        assert_eq!(result.topic, Some(Topic::ExpressionOfIdeas));
        assert_eq!(result.subtopic, Some("Rhetorical Synthesis"));
    }

    #[test]
    fn test_math_notation_penalizes_language_leaves() {
        let prompt = "If 3x + 5 = 20, what is the value of x? Which choice best states the solution?";
        let result = TopicClassifier::new().classify(prompt, None, None);
        assert_eq!(result.topic, Some(Topic::Algebra));
    }

    #[test]
    fn test_unrelated_text_is_unknown() {
        let result = TopicClassifier::new().classify("Hello there, how are you today?", None, None);
        assert!(!result.is_match());
        assert_eq!(result.topic, None);
    }

    #[test]
    fn test_word_boundaries() {
        assert!(!contains_term("the constant cost", "tan"));
        assert!(!contains_term("using this", "sin"));
        assert!(contains_term("angle of 60°", "°"));
        assert!(contains_term("find sin(x)", "sin"));
    }
}
