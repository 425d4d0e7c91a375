//! 讲解 / 提示 - 业务能力层
//!
//! 基于题目和历史对话生成讲解或提示。提示模式下不把正确答案和解析发给模型，
//! 从源头上避免泄露答案。

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::infrastructure::{Message, Role};
use crate::services::llm_service::LlmService;

/// 历史对话最多保留的轮数
const MAX_HISTORY: usize = 12;

pub(crate) const TUTOR_SYSTEM: &str = "You are an SAT tutor helping a student with one practice question.";

const EXPLAIN_INSTRUCTIONS: &str = "Explain step by step why the correct answer is correct and why \
each other choice is wrong. Be concise and encouraging.";

const HINT_INSTRUCTIONS: &str = "Give a single hint that moves the student one step forward. \
Never state which choice is correct, never eliminate all but one choice, and never give the final value.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Explain,
    Hint,
}

/// 客户端传来的题目（字段都是可选的，尽量宽松）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionData {
    #[serde(default, alias = "question")]
    pub prompt: String,
    #[serde(default)]
    pub passage: Option<String>,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default, alias = "correctChoice")]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question_data: QuestionData,
    pub user_message: String,
    #[serde(rename = "type")]
    pub mode: ChatMode,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub model: String,
    pub provider: String,
}

pub struct ChatService {
    llm: LlmService,
}

impl ChatService {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    pub async fn respond(&self, request: &ChatRequest) -> AppResult<ChatReply> {
        if request.question_data.prompt.trim().is_empty() {
            return Err(AppError::invalid_input("questionData 缺少题干"));
        }
        if request.user_message.trim().is_empty() {
            return Err(AppError::invalid_input("userMessage 不能为空"));
        }

        let messages = build_messages(request);
        let response = self.llm.send_messages(&messages).await?;
        info!(
            "💬 {:?} 回复完成，历史 {} 条，回复 {} 字符",
            request.mode,
            request.conversation_history.len(),
            response.len()
        );

        Ok(ChatReply {
            response: response.trim().to_string(),
            model: self.llm.model_name().to_string(),
            provider: self.llm.provider_name().to_string(),
        })
    }
}

fn render_question(question: &QuestionData, mode: ChatMode) -> String {
    let mut out = String::new();
    if let Some(passage) = question.passage.as_deref().filter(|p| !p.trim().is_empty()) {
        out.push_str(&format!("Passage:\n{}\n\n", passage));
    }
    out.push_str(&format!("Question: {}\n", question.prompt));
    for (label, choice) in ["A", "B", "C", "D"].iter().zip(&question.choices) {
        out.push_str(&format!("{}) {}\n", label, choice));
    }
    if mode == ChatMode::Explain {
        if let Some(answer) = &question.correct_answer {
            out.push_str(&format!("Correct answer: {}\n", answer));
        }
        if let Some(explanation) = &question.explanation {
            out.push_str(&format!("Reference explanation: {}\n", explanation));
        }
    }
    out
}

fn build_messages(request: &ChatRequest) -> Vec<Message> {
    let instructions = match request.mode {
        ChatMode::Explain => EXPLAIN_INSTRUCTIONS,
        ChatMode::Hint => HINT_INSTRUCTIONS,
    };
    let system = format!(
        "{} {}\n\n{}",
        TUTOR_SYSTEM,
        instructions,
        render_question(&request.question_data, request.mode)
    );

    let mut messages = vec![Message::system(system)];
    let skip = request.conversation_history.len().saturating_sub(MAX_HISTORY);
    for turn in request.conversation_history.iter().skip(skip) {
        let role = match turn.role.to_lowercase().as_str() {
            "assistant" | "tutor" | "ai" => Role::Assistant,
            _ => Role::User,
        };
        messages.push(Message {
            role,
            content: turn.content.clone(),
        });
    }
    messages.push(Message::user(request.user_message.clone()));
    messages
}
