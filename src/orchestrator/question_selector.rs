//! 选题
//!
//! 按各领域在正式考试中的占比，确定性地为每个题位分配 (领域, 技能点, 难度)。
//! 同一会话状态下选题结果总是相同的，方便复现。

use crate::error::{AppError, AppResult};
use crate::models::{
    Difficulty, Module2Mix, QuestionSelection, Section, TestSession, Topic,
};

/// 领域占比（百分比）
const READING_WRITING_WEIGHTS: &[(Topic, u32)] = &[
    (Topic::CraftAndStructure, 28),
    (Topic::InformationAndIdeas, 26),
    (Topic::StandardEnglishConventions, 26),
    (Topic::ExpressionOfIdeas, 20),
];

const MATH_WEIGHTS: &[(Topic, u32)] = &[
    (Topic::Algebra, 35),
    (Topic::AdvancedMath, 35),
    (Topic::ProblemSolvingAndDataAnalysis, 15),
    (Topic::GeometryAndTrigonometry, 15),
];

const MODULE_ONE_MIX: &[Difficulty] = &[
    Difficulty::Easy,
    Difficulty::Medium,
    Difficulty::Medium,
    Difficulty::Hard,
];
const HARDER_MIX: &[Difficulty] = &[Difficulty::Medium, Difficulty::Hard, Difficulty::Hard];
const EASIER_MIX: &[Difficulty] = &[Difficulty::Easy, Difficulty::Easy, Difficulty::Medium];

#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionSelector;

impl QuestionSelector {
    pub fn new() -> Self {
        Self
    }

    /// 为当前模块的下一个题位选题
    pub fn select(&self, session: &TestSession) -> AppResult<QuestionSelection> {
        let phase = session.state.phase;
        let (Some(section), Some(module)) = (phase.section(), phase.module()) else {
            return Err(AppError::invalid_input(format!(
                "会话 {} 当前阶段 {:?} 不能取题",
                session.id, phase
            )));
        };

        let position = session
            .questions
            .iter()
            .filter(|q| q.selection.section == section && q.selection.module == module)
            .count();

        let topics = topic_sequence(section, session.blueprint.module_size(section));
        if topics.is_empty() {
            return Err(AppError::invalid_input(format!("{} 模块题量为 0", section)));
        }
        let slot = position % topics.len();
        let topic = topics[slot];

        // 同一领域第 k 次出现时轮换到第 k 个技能点；第二模块错开一位
        let occurrence = topics[..slot].iter().filter(|t| **t == topic).count();
        let leaves: Vec<_> = topic.leaves().collect();
        let subtopic = (!leaves.is_empty()).then(|| {
            let offset = usize::from(module - 1);
            leaves[(occurrence + offset) % leaves.len()].name.to_string()
        });

        let mix = match module {
            1 => MODULE_ONE_MIX,
            _ => match session.state.module2_mix.unwrap_or(Module2Mix::Standard) {
                Module2Mix::Harder => HARDER_MIX,
                Module2Mix::Standard => MODULE_ONE_MIX,
                Module2Mix::Easier => EASIER_MIX,
            },
        };

        Ok(QuestionSelection {
            section,
            topic,
            subtopic,
            difficulty: mix[position % mix.len()],
            question_number: session.questions.len() + 1,
            module,
        })
    }
}

/// 平滑加权轮询：占比高的领域出现得多，且均匀分布在模块中
pub fn topic_sequence(section: Section, size: usize) -> Vec<Topic> {
    let weights = match section {
        Section::ReadingWriting => READING_WRITING_WEIGHTS,
        Section::Math => MATH_WEIGHTS,
    };
    let total: i64 = weights.iter().map(|(_, w)| i64::from(*w)).sum();
    let mut current: Vec<i64> = vec![0; weights.len()];
    let mut sequence = Vec::with_capacity(size);

    for _ in 0..size {
        for (slot, (_, weight)) in current.iter_mut().zip(weights) {
            *slot += i64::from(*weight);
        }
        // 同分取靠前的领域
        let mut pick = 0;
        for i in 1..current.len() {
            if current[i] > current[pick] {
                pick = i;
            }
        }
        current[pick] -= total;
        sequence.push(weights[pick].0);
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionBlueprint, SessionPhase};
    use chrono::Utc;

    fn started_session() -> TestSession {
        let now = Utc::now();
        let mut session = TestSession::new("s".into(), "u".into(), SessionBlueprint::default(), now);
        session.begin_if_needed(now);
        session
    }

    #[test]
    fn test_sequence_follows_weights() {
        let seq = topic_sequence(Section::Math, 22);
        let count = |t: Topic| seq.iter().filter(|x| **x == t).count();
        assert_eq!(seq.len(), 22);
        assert!(count(Topic::Algebra) >= 7);
        assert!(count(Topic::AdvancedMath) >= 7);
        assert!(count(Topic::GeometryAndTrigonometry) >= 3);
        assert!(seq.iter().all(|t| t.section() == Section::Math));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let session = started_session();
        let a = QuestionSelector::new().select(&session).unwrap();
        let b = QuestionSelector::new().select(&session).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.section, Section::ReadingWriting);
        assert_eq!(a.module, 1);
        assert_eq!(a.question_number, 1);
        assert_eq!(a.difficulty, Difficulty::Easy);
        assert!(a.subtopic.is_some());
    }

    #[test]
    fn test_harder_mix_has_no_easy_questions() {
        let mut session = started_session();
        session.state.phase = SessionPhase::Section1Module2;
        session.state.module2_mix = Some(Module2Mix::Harder);
        let selection = QuestionSelector::new().select(&session).unwrap();
        assert_eq!(selection.module, 2);
        assert_eq!(selection.difficulty, Difficulty::Medium);
        assert!(HARDER_MIX.iter().all(|d| *d != Difficulty::Easy));
    }

    #[test]
    fn test_break_cannot_select() {
        let mut session = started_session();
        session.state.phase = SessionPhase::Break;
        assert!(QuestionSelector::new().select(&session).is_err());
    }
}
