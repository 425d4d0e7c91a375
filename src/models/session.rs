//! 模考会话状态机
//!
//! 阶段转换只由已答题数驱动（休息阶段除外，由外部显式恢复）：
//!
//! ```text
//! NOT_STARTED → SECTION_1_MODULE_1 → SECTION_1_MODULE_2 → BREAK
//!             → SECTION_2_MODULE_1 → SECTION_2_MODULE_2 → COMPLETE
//! ```
//!
//! 第一部分是阅读与写作，第二部分是数学。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult, SessionError};
use crate::models::candidate::ChoiceLabel;
use crate::models::request::{Difficulty, Section};
use crate::models::result::GeneratedResult;
use crate::models::topic::Topic;

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    NotStarted,
    #[serde(rename = "SECTION_1_MODULE_1")]
    Section1Module1,
    #[serde(rename = "SECTION_1_MODULE_2")]
    Section1Module2,
    Break,
    #[serde(rename = "SECTION_2_MODULE_1")]
    Section2Module1,
    #[serde(rename = "SECTION_2_MODULE_2")]
    Section2Module2,
    Complete,
}

impl SessionPhase {
    pub fn section(self) -> Option<Section> {
        match self {
            SessionPhase::Section1Module1 | SessionPhase::Section1Module2 => {
                Some(Section::ReadingWriting)
            }
            SessionPhase::Section2Module1 | SessionPhase::Section2Module2 => Some(Section::Math),
            _ => None,
        }
    }

    pub fn module(self) -> Option<u8> {
        match self {
            SessionPhase::Section1Module1 | SessionPhase::Section2Module1 => Some(1),
            SessionPhase::Section1Module2 | SessionPhase::Section2Module2 => Some(2),
            _ => None,
        }
    }
}

/// 第二模块的难度组合（由第一模块正确率决定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module2Mix {
    Harder,
    Standard,
    Easier,
}

impl Module2Mix {
    /// 正确率 ≥ 70% 进入难模块，< 50% 进入易模块，其余为标准模块
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 0.7 {
            Module2Mix::Harder
        } else if accuracy < 0.5 {
            Module2Mix::Easier
        } else {
            Module2Mix::Standard
        }
    }
}

/// 会话题量与时长
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBlueprint {
    pub rw_module_questions: usize,
    pub math_module_questions: usize,
    pub rw_section_secs: u64,
    pub math_section_secs: u64,
    pub break_secs: u64,
}

impl Default for SessionBlueprint {
    fn default() -> Self {
        Self {
            rw_module_questions: 27,
            math_module_questions: 22,
            rw_section_secs: 64 * 60,
            math_section_secs: 70 * 60,
            break_secs: 10 * 60,
        }
    }
}

impl SessionBlueprint {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rw_module_questions: config.rw_module_questions,
            math_module_questions: config.math_module_questions,
            rw_section_secs: config.rw_section_minutes * 60,
            math_section_secs: config.math_section_minutes * 60,
            break_secs: config.break_minutes * 60,
        }
    }

    pub fn module_size(&self, section: Section) -> usize {
        match section {
            Section::ReadingWriting => self.rw_module_questions,
            Section::Math => self.math_module_questions,
        }
    }

    pub fn section_total(&self, section: Section) -> usize {
        self.module_size(section) * 2
    }

    pub fn total(&self) -> usize {
        self.section_total(Section::ReadingWriting) + self.section_total(Section::Math)
    }

    pub fn section_budget_secs(&self, section: Section) -> u64 {
        match section {
            Section::ReadingWriting => self.rw_section_secs,
            Section::Math => self.math_section_secs,
        }
    }
}

/// 选题结果（每个题位一个）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSelection {
    pub section: Section,
    pub topic: Topic,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub question_number: usize,
    pub module: u8,
}

/// 作答统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    pub correct: u32,
    pub incorrect: u32,
}

/// 会话状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// 当前部分（未开始 / 休息 / 完成时为空）
    pub current_section: Option<Section>,
    pub current_module: u8,
    pub phase: SessionPhase,
    pub questions_answered: usize,
    pub total_questions: usize,
    pub performance: Performance,
    /// 当前部分第一模块的正确率
    pub module_one_accuracy: Option<f64>,
    /// 当前部分第二模块的难度组合
    pub module2_mix: Option<Module2Mix>,
}

/// 会话中的一道题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuestion {
    pub selection: QuestionSelection,
    pub result: Option<GeneratedResult>,
    pub user_answer: Option<ChoiceLabel>,
    pub is_correct: Option<bool>,
    /// 用时（秒）
    pub time_spent: Option<u64>,
}

/// 模考会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSession {
    pub id: String,
    pub owner: String,
    pub state: SessionState,
    pub questions: Vec<SessionQuestion>,
    pub blueprint: SessionBlueprint,
    pub start_time: DateTime<Utc>,
    pub module_start_time: Option<DateTime<Utc>>,
    pub break_start_time: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

impl TestSession {
    pub fn new(id: String, owner: String, blueprint: SessionBlueprint, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            state: SessionState {
                current_section: None,
                current_module: 1,
                phase: SessionPhase::NotStarted,
                questions_answered: 0,
                total_questions: blueprint.total(),
                performance: Performance::default(),
                module_one_accuracy: None,
                module2_mix: None,
            },
            questions: Vec::new(),
            blueprint,
            start_time: now,
            module_start_time: None,
            break_start_time: None,
            last_activity: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state.questions_answered >= self.state.total_questions
    }

    /// 最后一道已下发但未作答的题
    pub fn pending_question(&self) -> Option<usize> {
        let last = self.questions.len().checked_sub(1)?;
        self.questions[last].user_answer.is_none().then_some(last)
    }

    /// 某部分某模块已答题数
    pub fn answered_in(&self, section: Section, module: Option<u8>) -> usize {
        self.questions
            .iter()
            .filter(|q| q.selection.section == section)
            .filter(|q| module.map_or(true, |m| q.selection.module == m))
            .filter(|q| q.user_answer.is_some())
            .count()
    }

    /// 首次取题时进入第一部分第一模块
    pub fn begin_if_needed(&mut self, now: DateTime<Utc>) {
        if self.state.phase == SessionPhase::NotStarted {
            self.enter(SessionPhase::Section1Module1, now);
        }
    }

    /// 结束休息，进入第二部分（不在休息阶段时返回 false）
    pub fn resume_break(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.phase != SessionPhase::Break {
            return false;
        }
        self.enter(SessionPhase::Section2Module1, now);
        true
    }

    /// 记录作答并推进状态，返回是否答对
    pub fn record_answer(
        &mut self,
        index: usize,
        answer: ChoiceLabel,
        time_spent: Option<u64>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let session_id = self.id.clone();
        let question = self.questions.get_mut(index).ok_or_else(|| {
            AppError::Session(SessionError::QuestionNotFound {
                session_id: session_id.clone(),
                index,
            })
        })?;

        if question.user_answer.is_some() {
            return Err(SessionError::AlreadyAnswered { index }.into());
        }

        let correct = question
            .result
            .as_ref()
            .map(|r| r.item.correct_choice == answer)
            .ok_or_else(|| AppError::Internal(format!("第 {} 题没有生成结果", index)))?;

        question.user_answer = Some(answer);
        question.is_correct = Some(correct);
        question.time_spent = time_spent;

        self.state.questions_answered += 1;
        if correct {
            self.state.performance.correct += 1;
        } else {
            self.state.performance.incorrect += 1;
        }
        self.last_activity = now;

        self.advance(now);
        Ok(correct)
    }

    /// 按已答题数推进阶段
    fn advance(&mut self, now: DateTime<Utc>) {
        if self.is_complete() {
            self.enter(SessionPhase::Complete, now);
            return;
        }

        match self.state.phase {
            SessionPhase::Section1Module1 => {
                let section = Section::ReadingWriting;
                if self.answered_in(section, Some(1)) >= self.blueprint.module_size(section) {
                    self.start_module_two(section, SessionPhase::Section1Module2, now);
                }
            }
            SessionPhase::Section1Module2 => {
                let section = Section::ReadingWriting;
                if self.answered_in(section, None) >= self.blueprint.section_total(section) {
                    self.enter(SessionPhase::Break, now);
                }
            }
            SessionPhase::Section2Module1 => {
                let section = Section::Math;
                if self.answered_in(section, Some(1)) >= self.blueprint.module_size(section) {
                    self.start_module_two(section, SessionPhase::Section2Module2, now);
                }
            }
            SessionPhase::Section2Module2 => {
                let section = Section::Math;
                if self.answered_in(section, None) >= self.blueprint.section_total(section) {
                    self.enter(SessionPhase::Complete, now);
                }
            }
            SessionPhase::NotStarted | SessionPhase::Break | SessionPhase::Complete => {}
        }
    }

    fn start_module_two(&mut self, section: Section, phase: SessionPhase, now: DateTime<Utc>) {
        let (correct, total) = self
            .questions
            .iter()
            .filter(|q| q.selection.section == section && q.selection.module == 1)
            .fold((0usize, 0usize), |(c, t), q| {
                (c + usize::from(q.is_correct == Some(true)), t + 1)
            });
        let accuracy = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        };
        let mix = Module2Mix::from_accuracy(accuracy);

        info!(
            "[会话 {}] 📈 {} 第一模块正确率 {:.0}% ({}/{})，第二模块难度: {:?}",
            self.id,
            section,
            accuracy * 100.0,
            correct,
            total,
            mix
        );

        self.state.module_one_accuracy = Some(accuracy);
        self.state.module2_mix = Some(mix);
        self.enter(phase, now);
    }

    fn enter(&mut self, phase: SessionPhase, now: DateTime<Utc>) {
        info!("[会话 {}] 🔀 {:?} → {:?}", self.id, self.state.phase, phase);

        self.state.phase = phase;
        self.state.current_section = phase.section();
        if let Some(module) = phase.module() {
            self.state.current_module = module;
        }

        match phase {
            SessionPhase::Break => {
                self.break_start_time = Some(now);
                self.module_start_time = None;
            }
            SessionPhase::Section2Module1 => {
                self.break_start_time = None;
                self.module_start_time = Some(now);
                self.state.module_one_accuracy = None;
                self.state.module2_mix = None;
            }
            SessionPhase::Complete => {
                self.module_start_time = None;
            }
            _ => {
                self.module_start_time = Some(now);
            }
        }
        self.last_activity = now;
    }

    /// 当前部分剩余时间（秒）= 部分时长 − 自 max(模块开始, 会话开始) 起的耗时
    pub fn remaining_time_secs(&self, now: DateTime<Utc>) -> u64 {
        let section = match self.state.phase {
            SessionPhase::NotStarted => return self.blueprint.section_budget_secs(Section::ReadingWriting),
            SessionPhase::Break => return self.blueprint.section_budget_secs(Section::Math),
            SessionPhase::Complete => return 0,
            phase => match phase.section() {
                Some(section) => section,
                None => return 0,
            },
        };

        let anchor = self
            .module_start_time
            .map_or(self.start_time, |m| m.max(self.start_time));
        let elapsed = (now - anchor).num_seconds().max(0) as u64;
        self.blueprint
            .section_budget_secs(section)
            .saturating_sub(elapsed)
    }

    /// 休息剩余时间（秒），不在休息阶段时为空
    pub fn break_remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        let started = self.break_start_time?;
        let elapsed = (now - started).num_seconds().max(0) as u64;
        Some(self.blueprint.break_secs.saturating_sub(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::CandidateItem;
    use crate::models::result::GenerationMetadata;
    use chrono::Duration;

    fn small_blueprint() -> SessionBlueprint {
        SessionBlueprint {
            rw_module_questions: 2,
            math_module_questions: 2,
            ..SessionBlueprint::default()
        }
    }

    fn push(session: &mut TestSession, correct: ChoiceLabel) -> usize {
        let phase = session.state.phase;
        let section = phase.section().unwrap();
        let item = CandidateItem {
            prompt: "q".into(),
            passage: None,
            choices: vec!["1".into(), "2".into(), "3".into(), "4".into()],
            correct_choice: correct,
            explanation: None,
            needs_visual: false,
            visual_description: None,
        };
        let selection = QuestionSelection {
            section,
            topic: Topic::in_section(section).next().unwrap(),
            subtopic: None,
            difficulty: Difficulty::Medium,
            question_number: session.questions.len() + 1,
            module: phase.module().unwrap(),
        };
        session.questions.push(SessionQuestion {
            result: Some(GeneratedResult {
                item,
                visual: None,
                metadata: GenerationMetadata {
                    section,
                    topic: selection.topic,
                    subtopic: None,
                    difficulty: Difficulty::Medium,
                    generation_time_ms: 0,
                    iterations: 1,
                    text_iterations: 1,
                    visual_iterations: 0,
                    score: 0.9,
                    degraded_context: false,
                },
            }),
            selection,
            user_answer: None,
            is_correct: None,
            time_spent: None,
        });
        session.questions.len() - 1
    }

    #[test]
    fn test_total_matches_reference_split() {
        let blueprint = SessionBlueprint::default();
        assert_eq!(blueprint.section_total(Section::ReadingWriting), 54);
        assert_eq!(blueprint.section_total(Section::Math), 44);
        assert_eq!(blueprint.total(), 98);
    }

    #[test]
    fn test_full_walk_through_phases() {
        let now = Utc::now();
        let mut session = TestSession::new("s".into(), "u".into(), small_blueprint(), now);
        session.begin_if_needed(now);
        assert_eq!(session.state.phase, SessionPhase::Section1Module1);

        for _ in 0..2 {
            let idx = push(&mut session, ChoiceLabel::A);
            session.record_answer(idx, ChoiceLabel::A, Some(30), now).unwrap();
        }
        assert_eq!(session.state.phase, SessionPhase::Section1Module2);
        assert_eq!(session.state.module2_mix, Some(Module2Mix::Harder));

        for _ in 0..2 {
            let idx = push(&mut session, ChoiceLabel::A);
            session.record_answer(idx, ChoiceLabel::B, None, now).unwrap();
        }
        assert_eq!(session.state.phase, SessionPhase::Break);
        assert!(session.break_start_time.is_some());
        assert_eq!(session.state.current_section, None);

        assert!(session.resume_break(now));
        assert_eq!(session.state.phase, SessionPhase::Section2Module1);
        assert_eq!(session.state.current_section, Some(Section::Math));
        assert_eq!(session.state.module2_mix, None);

        for _ in 0..2 {
            let idx = push(&mut session, ChoiceLabel::C);
            session.record_answer(idx, ChoiceLabel::D, None, now).unwrap();
        }
        assert_eq!(session.state.phase, SessionPhase::Section2Module2);
        assert_eq!(session.state.module2_mix, Some(Module2Mix::Easier));

        for _ in 0..2 {
            let idx = push(&mut session, ChoiceLabel::C);
            session.record_answer(idx, ChoiceLabel::C, None, now).unwrap();
        }
        assert!(session.is_complete());
        assert_eq!(session.state.phase, SessionPhase::Complete);
        assert_eq!(session.state.performance, Performance { correct: 4, incorrect: 4 });
    }

    #[test]
    fn test_double_submit_rejected_and_count_unchanged() {
        let now = Utc::now();
        let mut session = TestSession::new("s".into(), "u".into(), small_blueprint(), now);
        session.begin_if_needed(now);
        let idx = push(&mut session, ChoiceLabel::A);
        session.record_answer(idx, ChoiceLabel::A, None, now).unwrap();
        assert!(session.record_answer(idx, ChoiceLabel::B, None, now).is_err());
        assert_eq!(session.state.questions_answered, 1);
        assert!(session.record_answer(9, ChoiceLabel::B, None, now).is_err());
    }

    #[test]
    fn test_module_mix_thresholds() {
        assert_eq!(Module2Mix::from_accuracy(0.7), Module2Mix::Harder);
        assert_eq!(Module2Mix::from_accuracy(0.6), Module2Mix::Standard);
        assert_eq!(Module2Mix::from_accuracy(0.5), Module2Mix::Standard);
        assert_eq!(Module2Mix::from_accuracy(0.49), Module2Mix::Easier);
    }

    #[test]
    fn test_remaining_time_uses_module_start() {
        let start = Utc::now();
        let mut session = TestSession::new("s".into(), "u".into(), small_blueprint(), start);
        let later = start + Duration::minutes(5);
        session.begin_if_needed(later);
        let remaining = session.remaining_time_secs(later + Duration::minutes(10));
        assert_eq!(remaining, 64 * 60 - 10 * 60);
        assert_eq!(session.remaining_time_secs(later + Duration::hours(3)), 0);
    }

    #[test]
    fn test_pending_question() {
        let now = Utc::now();
        let mut session = TestSession::new("s".into(), "u".into(), small_blueprint(), now);
        assert_eq!(session.pending_question(), None);
        session.begin_if_needed(now);
        let idx = push(&mut session, ChoiceLabel::A);
        assert_eq!(session.pending_question(), Some(idx));
        session.record_answer(idx, ChoiceLabel::A, None, now).unwrap();
        assert_eq!(session.pending_question(), None);
    }
}
