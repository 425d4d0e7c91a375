use crate::models::context::WorkedExample;
use crate::models::topic::Topic;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 参考资料库中的一条记录
///
/// ```toml
/// [[entries]]
/// topic = "geometry-and-trigonometry"
/// subtopic = "Circles"
/// rules = "..."
/// instructions = "..."
/// visual_exemplars = ["..."]
///
/// [[entries.examples]]
/// prompt = "..."
/// answer = "B"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ContextEntry {
    pub topic: String,
    #[serde(default)]
    pub subtopic: Option<String>,
    #[serde(default)]
    pub rules: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub examples: Vec<WorkedExample>,
    #[serde(default)]
    pub visual_exemplars: Vec<String>,
}

impl ContextEntry {
    /// 记录对应的主题（无法解析时为空）
    pub fn resolved_topic(&self) -> Option<Topic> {
        Topic::resolve(&self.topic)
    }
}

/// 参考资料库
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextLibrary {
    #[serde(default)]
    pub entries: Vec<ContextEntry>,
}

impl ContextLibrary {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 查找最匹配的记录：技能点精确匹配优先，其次是只标注主题的通用记录
    pub fn lookup(&self, topic: Topic, subtopic: Option<&str>) -> Option<&ContextEntry> {
        let same_topic = || {
            self.entries
                .iter()
                .filter(move |e| e.resolved_topic() == Some(topic))
        };

        if let Some(wanted) = subtopic.map(|s| s.trim().to_lowercase()) {
            if let Some(entry) = same_topic().find(|e| {
                e.subtopic
                    .as_deref()
                    .is_some_and(|s| s.trim().to_lowercase() == wanted)
            }) {
                return Some(entry);
            }
        }

        same_topic().find(|e| e.subtopic.is_none())
    }
}

/// 从单个 TOML 文件加载参考资料库
async fn load_library_file(path: &Path) -> Result<ContextLibrary> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", path.display()))?;

    let library: ContextLibrary = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", path.display()))?;

    for entry in &library.entries {
        if entry.resolved_topic().is_none() {
            tracing::warn!("⚠️ 参考资料记录的主题无法识别: {}", entry.topic);
        }
    }

    Ok(library)
}

/// 加载参考资料库：路径可以是单个文件，也可以是包含多个 TOML 文件的文件夹
pub async fn load_context_library(library_path: &str) -> Result<ContextLibrary> {
    let path = PathBuf::from(library_path);

    if !path.exists() {
        anyhow::bail!("参考资料库不存在: {}", library_path);
    }

    if path.is_file() {
        let library = load_library_file(&path).await?;
        tracing::info!("成功加载 {} 条参考资料", library.entries.len());
        return Ok(library);
    }

    let mut files = Vec::new();
    let mut dir = fs::read_dir(&path)
        .await
        .with_context(|| format!("无法读取文件夹: {}", library_path))?;

    while let Some(entry) = dir.next_entry().await? {
        let file = entry.path();
        if file.extension().and_then(|s| s.to_str()) == Some("toml") {
            files.push(file);
        }
    }
    files.sort();

    let mut library = ContextLibrary::default();
    for file in files {
        tracing::info!(
            "正在加载: {}",
            file.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_library_file(&file).await {
            Ok(part) => library.entries.extend(part.entries),
            Err(e) => tracing::warn!("加载文件失败 {}: {}", file.display(), e),
        }
    }

    tracing::info!("成功加载 {} 条参考资料", library.entries.len());
    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[entries]]
topic = "geometry-and-trigonometry"
rules = "General geometry rules"
instructions = "Use exact values"

[[entries]]
topic = "geometry-and-trigonometry"
subtopic = "Circles"
rules = "Arc length is proportional to the central angle"
instructions = "Give answers in terms of pi"
visual_exemplars = ["Circle with center O and radius 6"]

[[entries.examples]]
prompt = "A circle has radius 3. What is its circumference?"
answer = "6π"
"#;

    #[test]
    fn test_lookup_prefers_subtopic_entry() {
        let library: ContextLibrary = toml::from_str(SAMPLE).unwrap();
        let entry = library
            .lookup(Topic::GeometryAndTrigonometry, Some("circles"))
            .unwrap();
        assert_eq!(entry.examples.len(), 1);
        assert_eq!(entry.visual_exemplars.len(), 1);

        let general = library
            .lookup(Topic::GeometryAndTrigonometry, Some("Right triangles"))
            .unwrap();
        assert!(general.subtopic.is_none());

        assert!(library.lookup(Topic::Algebra, None).is_none());
    }

    #[tokio::test]
    async fn test_missing_library_is_error() {
        assert!(load_context_library("/nonexistent/library.toml").await.is_err());
    }
}
