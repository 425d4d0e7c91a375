//! 模考会话编排 - 编排层
//!
//! ## 职责
//!
//! - 创建会话、取题、提交答案、查询进度、结束休息
//! - 每次取题：选题 → 调用出题流程 → 结果写回会话
//! - 所有修改都在该会话的锁内完成，同一会话的操作互不交错
//!
//! ## 层次关系
//!
//! ```text
//! session_orchestrator (处理一个会话)
//!     ↓
//! question_selector (决定下一题考什么)
//!     ↓
//! workflow::ItemGenerator (生成一道题)
//! ```

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult, SessionError};
use crate::models::{
    ChoiceLabel, GeneratedResult, GenerationRequest, QuestionSelection, SessionBlueprint,
    SessionQuestion, SessionState, TestSession,
};
use crate::orchestrator::question_selector::QuestionSelector;
use crate::orchestrator::session_store::SessionStore;
use crate::workflow::ItemGenerator;

/// 取题结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestion {
    pub question_index: usize,
    pub selection: QuestionSelection,
    pub question: GeneratedResult,
    pub session_state: SessionState,
}

/// 提交结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub session_state: SessionState,
}

/// 会话概况
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session: TestSession,
    /// 当前部分剩余秒数
    pub remaining_time: u64,
    pub is_complete: bool,
    /// 休息剩余秒数（仅休息阶段）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_remaining: Option<u64>,
}

pub struct SessionOrchestrator {
    store: Arc<SessionStore>,
    selector: QuestionSelector,
    generator: Arc<dyn ItemGenerator>,
    blueprint: SessionBlueprint,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        generator: Arc<dyn ItemGenerator>,
        blueprint: SessionBlueprint,
    ) -> Self {
        Self {
            store,
            selector: QuestionSelector::new(),
            generator,
            blueprint,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// 创建会话
    pub async fn initialize(&self, owner: &str) -> AppResult<TestSession> {
        let session = TestSession::new(
            Uuid::new_v4().to_string(),
            owner.to_string(),
            self.blueprint,
            Utc::now(),
        );
        info!(
            "[会话 {}] 🆕 创建会话，共 {} 题",
            session.id, session.state.total_questions
        );
        let snapshot = session.clone();
        self.store.insert(session).await;
        Ok(snapshot)
    }

    /// 取下一题
    ///
    /// - 休息阶段取题视为结束休息
    /// - 上一题未作答时重新下发上一题
    pub async fn next_question(&self, owner: &str, session_id: &str) -> AppResult<NextQuestion> {
        let shared = self.store.get(session_id).await?;
        let mut session = shared.lock().await;
        check_owner(&session, owner)?;

        if session.is_complete() {
            return Err(SessionError::Completed {
                session_id: session_id.to_string(),
            }
            .into());
        }

        let now = Utc::now();
        if session.resume_break(now) {
            info!("[会话 {}] ▶️ 休息阶段取题，进入数学部分", session.id);
        }
        session.begin_if_needed(now);
        session.last_activity = now;

        if let Some(index) = session.pending_question() {
            let pending = &session.questions[index];
            if let Some(result) = &pending.result {
                info!("[会话 {}] 🔁 第 {} 题尚未作答，重新下发", session.id, index + 1);
                return Ok(NextQuestion {
                    question_index: index,
                    selection: pending.selection.clone(),
                    question: result.clone(),
                    session_state: session.state.clone(),
                });
            }
        }

        let selection = self.selector.select(&session)?;
        info!(
            "[会话 {}] 📝 第 {} 题: {} / {} / {} (模块 {})",
            session.id,
            selection.question_number,
            selection.topic,
            selection.subtopic.as_deref().unwrap_or("-"),
            selection.difficulty,
            selection.module
        );

        let request = GenerationRequest {
            section: selection.section,
            topic: selection.topic,
            subtopic: selection.subtopic.clone(),
            difficulty: selection.difficulty,
            custom_context: None,
        };
        let result = self.generator.generate(&request).await?;

        session.questions.push(SessionQuestion {
            selection: selection.clone(),
            result: Some(result.clone()),
            user_answer: None,
            is_correct: None,
            time_spent: None,
        });

        Ok(NextQuestion {
            question_index: session.questions.len() - 1,
            selection,
            question: result,
            session_state: session.state.clone(),
        })
    }

    /// 提交答案
    pub async fn submit_answer(
        &self,
        owner: &str,
        session_id: &str,
        question_index: usize,
        user_answer: &str,
        time_spent: Option<u64>,
    ) -> AppResult<AnswerOutcome> {
        let answer = ChoiceLabel::parse_letter(user_answer)
            .ok_or_else(|| AppError::invalid_input(format!("无法识别的答案: {}", user_answer)))?;

        let shared = self.store.get(session_id).await?;
        let mut session = shared.lock().await;
        check_owner(&session, owner)?;

        let is_correct = session.record_answer(question_index, answer, time_spent, Utc::now())?;
        info!(
            "[会话 {}] {} 第 {} 题作答 {} ({}/{})",
            session.id,
            if is_correct { "✓" } else { "✗" },
            question_index + 1,
            answer,
            session.state.questions_answered,
            session.state.total_questions
        );

        Ok(AnswerOutcome {
            is_correct,
            session_state: session.state.clone(),
        })
    }

    /// 会话概况
    pub async fn session_summary(&self, owner: &str, session_id: &str) -> AppResult<SessionSummary> {
        let shared = self.store.get(session_id).await?;
        let session = shared.lock().await;
        check_owner(&session, owner)?;

        let now = Utc::now();
        Ok(SessionSummary {
            remaining_time: session.remaining_time_secs(now),
            is_complete: session.is_complete(),
            break_remaining: session.break_remaining_secs(now),
            session: session.clone(),
        })
    }

    /// 结束休息
    pub async fn resume_break(&self, owner: &str, session_id: &str) -> AppResult<SessionState> {
        let shared = self.store.get(session_id).await?;
        let mut session = shared.lock().await;
        check_owner(&session, owner)?;

        if !session.resume_break(Utc::now()) {
            return Err(AppError::invalid_input(format!(
                "会话 {} 不在休息阶段 (当前 {:?})",
                session_id, session.state.phase
            )));
        }
        Ok(session.state.clone())
    }
}

fn check_owner(session: &TestSession, owner: &str) -> AppResult<()> {
    if session.owner == owner {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            session_id: session.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::candidate::fixtures::circle_item;
    use crate::models::{GenerationMetadata, Module2Mix, Section, SessionPhase};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// 按请求原样回填的出题桩，正确答案固定为 B
    #[derive(Default)]
    struct EchoGenerator {
        calls: AtomicUsize,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl ItemGenerator for EchoGenerator {
        async fn generate(&self, request: &GenerationRequest) -> AppResult<GeneratedResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let mut item = circle_item();
            item.needs_visual = false;
            Ok(GeneratedResult {
                item,
                visual: None,
                metadata: GenerationMetadata {
                    section: request.section,
                    topic: request.topic,
                    subtopic: request.subtopic.clone(),
                    difficulty: request.difficulty,
                    generation_time_ms: 1,
                    iterations: 1,
                    text_iterations: 1,
                    visual_iterations: 0,
                    score: 0.9,
                    degraded_context: false,
                },
            })
        }
    }

    fn orchestrator(blueprint: SessionBlueprint) -> (SessionOrchestrator, Arc<EchoGenerator>) {
        let generator = Arc::new(EchoGenerator::default());
        let orchestrator =
            SessionOrchestrator::new(Arc::new(SessionStore::new()), generator.clone(), blueprint);
        (orchestrator, generator)
    }

    async fn answer_next(o: &SessionOrchestrator, id: &str, answer: &str) -> AnswerOutcome {
        let next = o.next_question("alice", id).await.unwrap();
        o.submit_answer("alice", id, next.question_index, answer, Some(40))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_math_follows_reading_writing_section() {
        let (o, _) = orchestrator(SessionBlueprint::default());
        let session = o.initialize("alice").await.unwrap();

        for _ in 0..54 {
            answer_next(&o, &session.id, "B").await;
        }
        let summary = o.session_summary("alice", &session.id).await.unwrap();
        assert_eq!(summary.session.state.phase, SessionPhase::Break);
        assert!(summary.break_remaining.is_some());

        let next = o.next_question("alice", &session.id).await.unwrap();
        assert_eq!(next.selection.section, Section::Math);
        assert_eq!(next.selection.module, 1);
        assert_eq!(next.session_state.phase, SessionPhase::Section2Module1);
    }

    #[tokio::test]
    async fn test_module_two_mix_follows_accuracy() {
        let blueprint = SessionBlueprint {
            rw_module_questions: 3,
            math_module_questions: 3,
            ..SessionBlueprint::default()
        };
        let (o, generator) = orchestrator(blueprint);
        let id = o.initialize("alice").await.unwrap().id;

        // 阅读与写作第一模块全对，数学第一模块全错
        for _ in 0..3 {
            answer_next(&o, &id, "B").await;
        }
        let state = answer_next(&o, &id, "B").await.session_state;
        assert_eq!(state.module2_mix, Some(Module2Mix::Harder));
        for _ in 0..2 {
            answer_next(&o, &id, "B").await;
        }
        o.resume_break("alice", &id).await.unwrap();
        for _ in 0..3 {
            answer_next(&o, &id, "A").await;
        }
        let state = answer_next(&o, &id, "A").await.session_state;
        assert_eq!(state.module2_mix, Some(Module2Mix::Easier));

        let requests = generator.requests.lock().unwrap().clone();
        let rw_module_two = &requests[3..6];
        assert!(rw_module_two
            .iter()
            .all(|r| r.difficulty != crate::models::Difficulty::Easy));
    }

    #[tokio::test]
    async fn test_unanswered_question_is_served_again() {
        let (o, generator) = orchestrator(SessionBlueprint::default());
        let id = o.initialize("alice").await.unwrap().id;

        let first = o.next_question("alice", &id).await.unwrap();
        let again = o.next_question("alice", &id).await.unwrap();
        assert_eq!(first.question_index, again.question_index);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_double_submit_is_rejected() {
        let (o, _) = orchestrator(SessionBlueprint::default());
        let id = o.initialize("alice").await.unwrap().id;
        let next = o.next_question("alice", &id).await.unwrap();

        let outcome =
            assert_ok!(o.submit_answer("alice", &id, next.question_index, "b", None).await);
        assert!(outcome.is_correct);
        assert_eq!(outcome.session_state.questions_answered, 1);

        let err =
            assert_err!(o.submit_answer("alice", &id, next.question_index, "B", None).await);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_other_users_are_forbidden() {
        let (o, _) = orchestrator(SessionBlueprint::default());
        let id = o.initialize("alice").await.unwrap().id;
        let err = assert_err!(o.next_question("mallory", &id).await);
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_unknown_session_and_index() {
        let (o, _) = orchestrator(SessionBlueprint::default());
        let err = assert_err!(o.session_summary("alice", "nope").await);
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let id = o.initialize("alice").await.unwrap().id;
        let err = assert_err!(o.submit_answer("alice", &id, 7, "A", None).await);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = assert_err!(o.submit_answer("alice", &id, 0, "Z", None).await);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_numeric_answer_is_not_read_as_letter() {
        let (o, _) = orchestrator(SessionBlueprint::default());
        let id = o.initialize("alice").await.unwrap().id;
        let next = o.next_question("alice", &id).await.unwrap();

        let err = assert_err!(o.submit_answer("alice", &id, next.question_index, "1", None).await);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        // 被拒绝的作答不计入进度
        let outcome =
            assert_ok!(o.submit_answer("alice", &id, next.question_index, "B", None).await);
        assert_eq!(outcome.session_state.questions_answered, 1);
    }

    #[tokio::test]
    async fn test_resume_outside_break_is_rejected() {
        let (o, _) = orchestrator(SessionBlueprint::default());
        let id = o.initialize("alice").await.unwrap().id;
        let err = assert_err!(o.resume_break("alice", &id).await);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_completed_session_refuses_more_questions() {
        let blueprint = SessionBlueprint {
            rw_module_questions: 1,
            math_module_questions: 1,
            ..SessionBlueprint::default()
        };
        let (o, _) = orchestrator(blueprint);
        let id = o.initialize("alice").await.unwrap().id;
        for _ in 0..4 {
            answer_next(&o, &id, "C").await;
        }
        let summary = o.session_summary("alice", &id).await.unwrap();
        assert!(summary.is_complete);
        assert_eq!(summary.remaining_time, 0);
        assert_eq!(summary.session.state.performance.incorrect, 4);

        let err = assert_err!(o.next_question("alice", &id).await);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
