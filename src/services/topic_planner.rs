//! 出题规划 - 业务能力层
//!
//! 纯规则，不调用模型：由 (主题, 技能点) 确定性地生成 [`TopicPlan`]

use tracing::warn;

use crate::models::{find_leaf, SubtopicLeaf, Topic, TopicPlan};

/// 技能点未指定时，每个技能点取前几个特征词
const KEYWORDS_PER_LEAF: usize = 2;

/// 出题规划器
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicPlanner;

impl TopicPlanner {
    pub fn new() -> Self {
        Self
    }

    /// 生成出题规划
    pub fn plan(&self, topic: Topic, subtopic: Option<&str>) -> TopicPlan {
        match subtopic {
            Some(name) => match find_leaf(topic, name) {
                Some(leaf) => plan_for_leaf(leaf),
                None => {
                    warn!("⚠️ 技能点 {} 不在 {} 的分类表中，按主题出题", name, topic);
                    let mut plan = plan_for_topic(topic);
                    plan.subtopic = Some(name.to_string());
                    plan
                }
            },
            None => plan_for_topic(topic),
        }
    }

    /// 连续主题偏移时的加强纠偏提示：点名偏移到的主题，要求删除它的词汇
    pub fn escalation_guidance(
        &self,
        plan: &TopicPlan,
        drifted_to: Topic,
        drifted_subtopic: Option<&str>,
        consecutive: u32,
    ) -> String {
        let leaf = drifted_subtopic.and_then(|s| find_leaf(drifted_to, s));
        let foreign: Vec<&str> = match leaf {
            Some(leaf) => leaf.keywords.to_vec(),
            None => drifted_to
                .leaves()
                .flat_map(|l| l.keywords.iter().take(KEYWORDS_PER_LEAF).copied())
                .collect(),
        };
        let foreign: Vec<&str> = foreign
            .into_iter()
            .filter(|kw| !plan.required_keywords.iter().any(|r| r == kw))
            .collect();

        format!(
            "CRITICAL: The last {} attempts were classified as \"{}\"{} instead of \"{}\". \
             Remove all vocabulary of that category ({}). \
             The question MUST read as: {} Use this phrasing: \"{}\". Required vocabulary: {}.",
            consecutive,
            drifted_to.name(),
            drifted_subtopic
                .map(|s| format!(" / \"{}\"", s))
                .unwrap_or_default(),
            plan.subtopic.as_deref().unwrap_or(plan.topic.name()),
            foreign.join(", "),
            plan.alignment_statement,
            plan.canonical_phrasing,
            plan.required_keywords.join(", ")
        )
    }
}

fn plan_for_leaf(leaf: &SubtopicLeaf) -> TopicPlan {
    TopicPlan {
        topic: leaf.topic,
        subtopic: Some(leaf.name.to_string()),
        question_type: leaf.question_type.to_string(),
        required_keywords: leaf.keywords.iter().map(|s| s.to_string()).collect(),
        forbidden_keywords: leaf.avoid.iter().map(|s| s.to_string()).collect(),
        canonical_phrasing: leaf.canonical_phrasing.to_string(),
        passage_constraints: leaf.passage_constraints.to_string(),
        choice_style: leaf.choice_style.to_string(),
        alignment_statement: format!(
            "a {} question ({} / {}); it must not read as any other skill in the domain.",
            leaf.question_type,
            leaf.topic.name(),
            leaf.name
        ),
    }
}

fn plan_for_topic(topic: Topic) -> TopicPlan {
    let mut required: Vec<String> = Vec::new();
    for kw in topic
        .leaves()
        .flat_map(|l| l.keywords.iter().take(KEYWORDS_PER_LEAF))
    {
        if !required.iter().any(|r| r == kw) {
            required.push(kw.to_string());
        }
    }

    let skills: Vec<&str> = topic.leaves().map(|l| l.name).collect();
    let first = topic.leaves().next();

    TopicPlan {
        topic,
        subtopic: None,
        question_type: topic.slug().to_string(),
        required_keywords: required,
        forbidden_keywords: Vec::new(),
        canonical_phrasing: first
            .map(|l| l.canonical_phrasing.to_string())
            .unwrap_or_default(),
        passage_constraints: first
            .map(|l| l.passage_constraints.to_string())
            .unwrap_or_default(),
        choice_style: "Four answer choices; exactly one is correct.".to_string(),
        alignment_statement: format!(
            "a {} question testing one of: {}.",
            topic.name(),
            skills.join("; ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_is_deterministic() {
        let planner = TopicPlanner::new();
        let a = planner.plan(Topic::GeometryAndTrigonometry, Some("Circles"));
        let b = planner.plan(Topic::GeometryAndTrigonometry, Some("circles"));
        assert_eq!(a, b);
        assert_eq!(a.subtopic.as_deref(), Some("Circles"));
        assert!(a.required_keywords.contains(&"radius".to_string()));
    }

    #[test]
    fn test_synthesis_plan_forbids_summary_vocabulary() {
        let plan = TopicPlanner::new().plan(Topic::ExpressionOfIdeas, Some("Rhetorical Synthesis"));
        assert!(plan.forbidden_keywords.contains(&"main idea".to_string()));
        assert!(plan.required_keywords.contains(&"notes".to_string()));
    }

    #[test]
    fn test_unknown_subtopic_falls_back_to_topic() {
        let plan = TopicPlanner::new().plan(Topic::Algebra, Some("Matrices"));
        assert_eq!(plan.subtopic.as_deref(), Some("Matrices"));
        assert_eq!(plan.question_type, "algebra");
        assert!(!plan.required_keywords.is_empty());
    }

    #[test]
    fn test_escalation_names_drifted_topic() {
        let planner = TopicPlanner::new();
        let plan = planner.plan(Topic::ExpressionOfIdeas, Some("Rhetorical Synthesis"));
        let text = planner.escalation_guidance(
            &plan,
            Topic::InformationAndIdeas,
            Some("Central Ideas and Details"),
            2,
        );
        assert!(text.contains("Information and Ideas"));
        assert!(text.contains("main idea"));
    }
}
