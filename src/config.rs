use serde::Deserialize;
use std::path::Path;

use crate::error::{AppResult, ConfigError};
use crate::models::RetryPolicy;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 监听地址
    pub bind_addr: String,
    /// 监听端口
    pub port: u16,
    /// 日志级别（可被 RUST_LOG 覆盖）
    pub log_level: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 出题模型
    pub generator_model: String,
    /// 审题模型
    pub validator_model: String,
    /// 讲解/提示模型
    pub chat_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// JSON 解析失败时的本地重试次数
    pub parse_retries: u32,
    /// 解析重试间隔（毫秒）
    pub parse_backoff_ms: u64,
    /// 上游限流且没有给出等待时间时，建议客户端等待的秒数
    pub rate_limit_retry_secs: u64,
    // --- 迭代策略 ---
    pub target_score: f64,
    pub floor_score: f64,
    pub max_iterations: u32,
    // --- 参考资料 ---
    /// 本地参考资料库（TOML）
    pub context_library_path: String,
    /// 远程检索后端地址（为空则使用本地库）
    pub context_backend_url: String,
    // --- 模考会话 ---
    /// 阅读与写作每个模块的题量
    pub rw_module_questions: usize,
    /// 数学每个模块的题量
    pub math_module_questions: usize,
    /// 阅读与写作部分时长（分钟）
    pub rw_section_minutes: u64,
    /// 数学部分时长（分钟）
    pub math_section_minutes: u64,
    /// 休息时长（分钟）
    pub break_minutes: u64,
    /// 会话闲置多久后清理（分钟）
    pub session_ttl_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            generator_model: "gpt-4o".to_string(),
            validator_model: "gpt-4o".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            parse_retries: 3,
            parse_backoff_ms: 500,
            rate_limit_retry_secs: 30,
            target_score: 0.8,
            floor_score: 0.7,
            max_iterations: 3,
            context_library_path: "context_library.toml".to_string(),
            context_backend_url: String::new(),
            rw_module_questions: 27,
            math_module_questions: 22,
            rw_section_minutes: 64,
            math_section_minutes: 70,
            break_minutes: 10,
            session_ttl_minutes: 240,
        }
    }
}

impl Config {
    /// 加载配置：先读 `SATGEN_CONFIG` 指向的文件（可选），再用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("SATGEN_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        let config = base.with_env();
        config.check()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        Ok(config)
    }

    /// 只使用默认值 + 环境变量
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    fn with_env(self) -> Self {
        let base = self;
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(base.bind_addr),
            port: env_parse("PORT").unwrap_or(base.port),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(base.log_level),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(base.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(base.llm_api_base_url),
            generator_model: std::env::var("GENERATOR_MODEL").unwrap_or(base.generator_model),
            validator_model: std::env::var("VALIDATOR_MODEL").unwrap_or(base.validator_model),
            chat_model: std::env::var("CHAT_MODEL").unwrap_or(base.chat_model),
            temperature: env_parse("LLM_TEMPERATURE").unwrap_or(base.temperature),
            max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(base.max_tokens),
            parse_retries: env_parse("PARSE_RETRIES").unwrap_or(base.parse_retries),
            parse_backoff_ms: env_parse("PARSE_BACKOFF_MS").unwrap_or(base.parse_backoff_ms),
            rate_limit_retry_secs: env_parse("RATE_LIMIT_RETRY_SECS")
                .unwrap_or(base.rate_limit_retry_secs),
            target_score: env_parse("TARGET_SCORE").unwrap_or(base.target_score),
            floor_score: env_parse("FLOOR_SCORE").unwrap_or(base.floor_score),
            max_iterations: env_parse("MAX_ITERATIONS").unwrap_or(base.max_iterations),
            context_library_path: std::env::var("CONTEXT_LIBRARY_PATH")
                .unwrap_or(base.context_library_path),
            context_backend_url: std::env::var("CONTEXT_BACKEND_URL")
                .unwrap_or(base.context_backend_url),
            rw_module_questions: env_parse("RW_MODULE_QUESTIONS")
                .unwrap_or(base.rw_module_questions),
            math_module_questions: env_parse("MATH_MODULE_QUESTIONS")
                .unwrap_or(base.math_module_questions),
            rw_section_minutes: env_parse("RW_SECTION_MINUTES").unwrap_or(base.rw_section_minutes),
            math_section_minutes: env_parse("MATH_SECTION_MINUTES")
                .unwrap_or(base.math_section_minutes),
            break_minutes: env_parse("BREAK_MINUTES").unwrap_or(base.break_minutes),
            session_ttl_minutes: env_parse("SESSION_TTL_MINUTES")
                .unwrap_or(base.session_ttl_minutes),
        }
    }

    /// 校验阈值和题量
    pub fn check(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.floor_score) || !(0.0..=1.0).contains(&self.target_score) {
            return Err(invalid("target_score/floor_score", "必须在 [0, 1] 之间"));
        }
        if self.floor_score > self.target_score {
            return Err(invalid("floor_score", "不能高于 target_score"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "至少为 1"));
        }
        if self.rw_module_questions == 0 || self.math_module_questions == 0 {
            return Err(invalid("module_questions", "每个模块至少 1 题"));
        }
        Ok(())
    }

    /// 迭代策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            target_score: self.target_score,
            floor_score: self.floor_score,
            max_iterations: self.max_iterations,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn invalid(field: &str, reason: &str) -> crate::error::AppError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
