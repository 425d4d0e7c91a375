//! POST /api/session
//!
//! 一个入口按 `action` 分发：initialize / get-next-question / submit-answer /
//! get-session / resume-break

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{AppState, AuthUser};
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SessionAction {
    Initialize,
    GetNextQuestion {
        session_id: String,
    },
    SubmitAnswer {
        session_id: String,
        question_index: usize,
        user_answer: String,
        #[serde(default)]
        time_spent: Option<u64>,
    },
    GetSession {
        session_id: String,
    },
    ResumeBreak {
        session_id: String,
    },
}

pub async fn session(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<SessionAction>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(action) = payload?;
    let sessions = &state.sessions;
    let owner = user.user_id.as_str();

    let body = match action {
        SessionAction::Initialize => {
            let session = sessions.initialize(owner).await?;
            json!({
                "session": {
                    "id": session.id,
                    "state": session.state,
                    "startTime": session.start_time,
                }
            })
        }
        SessionAction::GetNextQuestion { session_id } => {
            json!(sessions.next_question(owner, &session_id).await?)
        }
        SessionAction::SubmitAnswer {
            session_id,
            question_index,
            user_answer,
            time_spent,
        } => json!(
            sessions
                .submit_answer(owner, &session_id, question_index, &user_answer, time_spent)
                .await?
        ),
        SessionAction::GetSession { session_id } => {
            json!(sessions.session_summary(owner, &session_id).await?)
        }
        SessionAction::ResumeBreak { session_id } => {
            let state = sessions.resume_break(owner, &session_id).await?;
            json!({ "sessionState": state })
        }
    };
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        let action: SessionAction = serde_json::from_value(json!({
            "action": "submit-answer",
            "sessionId": "abc",
            "questionIndex": 2,
            "userAnswer": "C",
        }))
        .unwrap();
        match action {
            SessionAction::SubmitAnswer {
                session_id,
                question_index,
                user_answer,
                time_spent,
            } => {
                assert_eq!(session_id, "abc");
                assert_eq!(question_index, 2);
                assert_eq!(user_answer, "C");
                assert_eq!(time_spent, None);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_missing_session_id_is_rejected() {
        let parsed: Result<SessionAction, _> =
            serde_json::from_value(json!({ "action": "get-session" }));
        assert!(parsed.is_err());
    }
}
