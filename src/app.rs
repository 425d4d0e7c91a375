//! 应用入口
//!
//! 1. **初始化**：校验配置、选择参考资料来源、装配出题流程和会话编排
//! 2. **运行**：启动 HTTP 服务和会话清理任务，Ctrl-C 时优雅退出

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::config::Config;
use crate::infrastructure::{CompletionProvider, OpenAiProvider};
use crate::orchestrator::SessionStore;
use crate::services::{
    ContextRetriever, HttpContextProvider, LlmContextProvider, LlmService, TomlContextLibrary,
};
use crate::utils::logging::{log_shutdown, log_startup};

/// 会话清理间隔
const SWEEP_EVERY: std::time::Duration = std::time::Duration::from_secs(60);

/// 应用主结构
pub struct App {
    config: Config,
    store: Arc<SessionStore>,
    state: AppState,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.check().context("配置校验失败")?;
        log_startup(&config);

        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未配置 LLM_API_KEY，模型调用将会失败");
        }

        let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiProvider::new(&config));
        let retriever = build_retriever(&config, provider.clone()).await?;
        let store = Arc::new(SessionStore::new());
        let state = AppState::new(&config, provider, retriever, store.clone());

        Ok(Self {
            config,
            store,
            state,
        })
    }

    /// 运行 HTTP 服务，直到收到 Ctrl-C
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("无法监听 {}", addr))?;

        let ttl = chrono::Duration::minutes(self.config.session_ttl_minutes as i64);
        let sweeper = self.store.clone().spawn_sweeper(ttl, SWEEP_EVERY);

        info!("✅ 服务已就绪: http://{}", addr);
        axum::serve(listener, api::router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        sweeper.abort();
        log_shutdown(self.store.len().await);
        Ok(())
    }
}

/// 参考资料来源：检索服务 > 本地资料库 > 模型整理
async fn build_retriever(
    config: &Config,
    provider: Arc<dyn CompletionProvider>,
) -> Result<ContextRetriever> {
    if !config.context_backend_url.is_empty() {
        info!("📚 参考资料来源: 检索服务 {}", config.context_backend_url);
        let backend = HttpContextProvider::new(config.context_backend_url.as_str())
            .context("创建检索服务客户端失败")?;
        return Ok(ContextRetriever::new(Arc::new(backend)));
    }

    if Path::new(&config.context_library_path).exists() {
        info!("📚 参考资料来源: 本地资料库 {}", config.context_library_path);
        let library = TomlContextLibrary::load(&config.context_library_path)
            .await
            .with_context(|| format!("加载资料库失败: {}", config.context_library_path))?;
        return Ok(ContextRetriever::new(Arc::new(library)));
    }

    info!("📚 参考资料来源: 模型整理 ({})", config.generator_model);
    let librarian = LlmService::for_model(config, provider, &config.generator_model);
    Ok(ContextRetriever::new(Arc::new(LlmContextProvider::new(
        librarian,
    ))))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 收到退出信号，正在停止服务..."),
        Err(e) => warn!("⚠️ 无法监听退出信号: {}", e),
    }
}
