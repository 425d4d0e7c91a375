use serde::{Deserialize, Serialize};

/// 配图类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    Graph,
    Table,
    Diagram,
    Chart,
    Image,
}

impl VisualKind {
    /// 宽松解析，无法识别时视为示意图
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "graph" | "plot" | "coordinate" => VisualKind::Graph,
            "table" => VisualKind::Table,
            "chart" | "bar" | "histogram" | "scatterplot" => VisualKind::Chart,
            "image" | "picture" | "photo" => VisualKind::Image,
            _ => VisualKind::Diagram,
        }
    }
}

/// 题目配图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualArtifact {
    pub kind: VisualKind,
    pub description: String,
    /// 结构化数据（表格行、坐标点等）
    pub data: Option<serde_json::Value>,
    /// SVG 矢量图
    pub svg: Option<String>,
    /// 配图未通过校验，需要重新生成
    pub needs_regeneration: bool,
}

impl VisualArtifact {
    /// 配图流程失败时的占位配图：保留题目给出的描述
    pub fn placeholder(description: &str) -> Self {
        Self {
            kind: VisualKind::Diagram,
            description: description.to_string(),
            data: None,
            svg: None,
            needs_regeneration: true,
        }
    }
}
