//! 配图生成 - 业务能力层
//!
//! 根据已通过审题的题目生成配图（图形、表格、示意图等）；上一轮配图审核意见作为反馈带入

use serde::Deserialize;
use serde_json::Value;

use crate::error::AppResult;
use crate::models::{CandidateItem, RetrievedContext, VisualArtifact, VisualKind};
use crate::services::llm_service::LlmService;

pub(crate) const DESIGNER_SYSTEM: &str = "You are an SAT visual designer. Produce the figure, graph, \
table or chart that accompanies the question. The description must state every measurement, angle, \
label and relationship the question relies on, exactly once. Reply with JSON only: \
{\"type\": \"graph\"|\"table\"|\"diagram\"|\"chart\"|\"image\", \"description\": string, \
\"data\": object|null, \"svg\": string|null}";

#[derive(Debug, Deserialize)]
struct DesignerReply {
    #[serde(rename = "type", alias = "kind", default)]
    kind: String,
    description: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    svg: Option<String>,
}

/// 配图生成服务
pub struct VisualGenerator {
    llm: LlmService,
}

impl VisualGenerator {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    /// 生成配图；`feedback` 为上一轮配图审核的问题列表
    pub async fn generate(
        &self,
        item: &CandidateItem,
        context: &RetrievedContext,
        feedback: &[String],
    ) -> AppResult<VisualArtifact> {
        let mut user = format!(
            "QUESTION\n{}\n\nREQUESTED FIGURE\n{}\n",
            item.full_text(),
            item.visual_description.as_deref().unwrap_or("(none given)")
        );
        if !context.visual_exemplars.is_empty() {
            user.push_str("\nREFERENCE FIGURES (style only)\n");
            for exemplar in &context.visual_exemplars {
                user.push_str("- ");
                user.push_str(exemplar);
                user.push('\n');
            }
        }
        if !feedback.is_empty() {
            user.push_str("\nThe previous figure was rejected. Fix these problems:\n");
            for line in feedback {
                user.push_str("- ");
                user.push_str(line);
                user.push('\n');
            }
        }

        let reply: DesignerReply = self.llm.request_json("配图生成", DESIGNER_SYSTEM, &user).await?;

        Ok(VisualArtifact {
            kind: VisualKind::parse_lenient(&reply.kind),
            description: reply.description.trim().to_string(),
            data: reply.data.filter(|v| !v.is_null()),
            svg: reply.svg.filter(|s| !s.trim().is_empty()),
            needs_regeneration: false,
        })
    }
}
