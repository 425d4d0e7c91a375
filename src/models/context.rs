use serde::{Deserialize, Serialize};

/// 参考例题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkedExample {
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// 检索得到的参考资料（每个请求检索一次，之后只读）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedContext {
    pub rules: String,
    pub instructions: String,
    #[serde(default)]
    pub worked_examples: Vec<WorkedExample>,
    #[serde(default)]
    pub visual_exemplars: Vec<String>,
    /// 是否为检索失败后的通用兜底资料
    #[serde(default)]
    pub degraded: bool,
}
