use serde::Serialize;
use thiserror::Error;

/// 错误类别
///
/// 上层（编排层、HTTP 层）只根据类别分支，不解析错误消息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 上游额度耗尽（不重试）
    Quota,
    /// 上游限流（提示稍后重试）
    RateLimit,
    /// 模型返回内容无法解析
    Parse,
    /// 迭代预算耗尽仍未达到保底分
    ValidationExhausted,
    /// 会话或题目不存在
    NotFound,
    /// 未登录
    Unauthorized,
    /// 无权访问
    Forbidden,
    /// 临时故障（网络、超时）
    Transient,
    /// 请求参数错误
    InvalidInput,
    /// 内部错误
    Internal,
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 会话错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 检索后端错误
    #[error("检索错误: {0}")]
    Retrieval(#[from] RetrievalError),
    /// 迭代预算耗尽
    #[error("生成失败: 已迭代 {iterations} 次，最高得分 {best_score:.2} 低于保底分 {floor:.2}")]
    ValidationExhausted {
        iterations: u32,
        best_score: f64,
        floor: f64,
        issues: Vec<String>,
    },
    /// 请求参数错误
    #[error("参数错误: {0}")]
    InvalidInput(String),
    /// 未登录
    #[error("未登录，请先认证")]
    Unauthorized,
    /// 无权访问
    #[error("无权访问会话 {session_id}")]
    Forbidden { session_id: String },
    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 额度耗尽
    #[error("模型 {model} 额度已耗尽: {message}")]
    QuotaExceeded { model: String, message: String },
    /// 请求频率限制
    #[error("模型 {model} 请求频率限制, 请在 {retry_after} 秒后重试")]
    RateLimited { model: String, retry_after: u64 },
    /// 返回内容无法解析
    #[error("{step} 返回内容无法解析 (已尝试 {attempts} 次): {reason}")]
    ParseFailed {
        step: String,
        attempts: u32,
        reason: String,
    },
    /// API 调用失败（网络、超时、5xx）
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 会话错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 会话不存在
    #[error("会话不存在: {session_id}")]
    NotFound { session_id: String },
    /// 题目索引不存在
    #[error("会话 {session_id} 中不存在第 {index} 题")]
    QuestionNotFound { session_id: String, index: usize },
    /// 题目已作答
    #[error("第 {index} 题已作答，不能重复提交")]
    AlreadyAnswered { index: usize },
    /// 会话已完成
    #[error("会话 {session_id} 已完成")]
    Completed { session_id: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值非法
    #[error("配置项 {field} 非法: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 检索后端错误
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 没有匹配的参考资料
    #[error("没有找到 {topic} 的参考资料")]
    NoEntry { topic: String },
    /// 检索后端额度耗尽
    #[error("检索后端额度已耗尽 ({endpoint})")]
    QuotaExceeded { endpoint: String },
    /// 检索后端限流
    #[error("检索后端请求频率限制 ({endpoint})")]
    RateLimited {
        endpoint: String,
        retry_after: Option<u64>,
    },
    /// 请求失败
    #[error("检索请求失败 ({endpoint}): {message}")]
    RequestFailed { endpoint: String, message: String },
}

impl AppError {
    /// 错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Llm(e) => match e {
                LlmError::QuotaExceeded { .. } => ErrorKind::Quota,
                LlmError::RateLimited { .. } => ErrorKind::RateLimit,
                LlmError::ParseFailed { .. } => ErrorKind::Parse,
                LlmError::ApiCallFailed { .. } | LlmError::EmptyContent { .. } => {
                    ErrorKind::Transient
                }
            },
            AppError::Session(e) => match e {
                SessionError::NotFound { .. } | SessionError::QuestionNotFound { .. } => {
                    ErrorKind::NotFound
                }
                SessionError::AlreadyAnswered { .. } | SessionError::Completed { .. } => {
                    ErrorKind::InvalidInput
                }
            },
            AppError::Config(_) => ErrorKind::Internal,
            AppError::Retrieval(e) => match e {
                RetrievalError::QuotaExceeded { .. } => ErrorKind::Quota,
                RetrievalError::RateLimited { .. } => ErrorKind::RateLimit,
                RetrievalError::NoEntry { .. } => ErrorKind::NotFound,
                RetrievalError::RequestFailed { .. } => ErrorKind::Transient,
            },
            AppError::ValidationExhausted { .. } => ErrorKind::ValidationExhausted,
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::Unauthorized => ErrorKind::Unauthorized,
            AppError::Forbidden { .. } => ErrorKind::Forbidden,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 上游额度或限流错误：继续重试没有意义，需要直接上抛
    pub fn is_upstream_limit(&self) -> bool {
        matches!(self.kind(), ErrorKind::Quota | ErrorKind::RateLimit)
    }

    /// 是否可以在本轮迭代预算内重试
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Parse | ErrorKind::Transient)
    }

    /// 建议等待秒数（限流时）
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::Llm(LlmError::RateLimited { retry_after, .. }) => Some(*retry_after),
            AppError::Retrieval(RetrievalError::RateLimited { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }

    /// 迭代耗尽时附带的问题列表
    pub fn issues(&self) -> &[String] {
        match self {
            AppError::ValidationExhausted { issues, .. } => issues,
            _ => &[],
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建参数错误
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    /// 创建会话不存在错误
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        AppError::Session(SessionError::NotFound {
            session_id: session_id.into(),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(model: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            message: message.into(),
        })
    }

    /// 创建解析失败错误
    pub fn parse_failed(step: impl Into<String>, attempts: u32, reason: impl Into<String>) -> Self {
        AppError::Llm(LlmError::ParseFailed {
            step: step.into(),
            attempts,
            reason: reason.into(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::parse_failed("json", 1, err.to_string())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
