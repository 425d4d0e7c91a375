use serde::{Deserialize, Serialize};

use crate::models::candidate::CandidateItem;
use crate::models::request::{Difficulty, Section};
use crate::models::topic::Topic;
use crate::models::visual::VisualArtifact;

/// 生成元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub section: Section,
    pub topic: Topic,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    /// 生成耗时（毫秒）
    pub generation_time_ms: u64,
    /// 总迭代次数（题目 + 配图）
    pub iterations: u32,
    pub text_iterations: u32,
    pub visual_iterations: u32,
    /// 最终得分
    pub score: f64,
    /// 是否使用了兜底参考资料
    pub degraded_context: bool,
}

/// 一次编排的最终结果（返回后不再修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResult {
    pub item: CandidateItem,
    pub visual: Option<VisualArtifact>,
    pub metadata: GenerationMetadata,
}
