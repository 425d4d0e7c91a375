/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志订阅者
///
/// `RUST_LOG` 优先，其次使用配置中的日志级别
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("satgen={0},tower_http={0}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录服务启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 服务启动 - SAT 题目生成与模考");
    info!("🌐 监听地址: {}:{}", config.bind_addr, config.port);
    info!(
        "🤖 模型: 出题 {} / 审题 {} / 讲解 {}",
        config.generator_model, config.validator_model, config.chat_model
    );
    info!(
        "🎯 迭代策略: 目标分 {:.2} / 保底分 {:.2} / 最多 {} 轮",
        config.target_score, config.floor_score, config.max_iterations
    );
    info!(
        "📝 模考题量: 阅读与写作 {}×2 / 数学 {}×2",
        config.rw_module_questions, config.math_module_questions
    );
    info!("{}", "=".repeat(60));
}

/// 记录服务停止信息
pub fn log_shutdown(active_sessions: usize) {
    info!("\n{}", "─".repeat(60));
    info!("🛑 服务停止，当前活跃会话: {}", active_sessions);
    info!(
        "停止时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("你好世界", 2), "你好...");
        assert_eq!(truncate_text("short", 10), "short");
    }
}
