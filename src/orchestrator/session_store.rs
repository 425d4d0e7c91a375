//! 会话存储
//!
//! 进程内存储，按会话 ID 分锁：外层读写锁只保护映射表，
//! 每个会话自己的互斥锁保证同一会话的修改是原子的

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::TestSession;

pub type SharedSession = Arc<Mutex<TestSession>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: TestSession) -> SharedSession {
        let id = session.id.clone();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        shared
    }

    pub async fn get(&self, id: &str) -> AppResult<SharedSession> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::session_not_found(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// 清理闲置超过 `ttl` 的会话；正在被使用（锁被占用）的会话跳过
    pub async fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, shared| match shared.try_lock() {
            Ok(session) => now - session.last_activity < ttl,
            Err(_) => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!("🧹 清理过期会话 {} 个，剩余 {} 个", removed, sessions.len());
        } else {
            debug!("🧹 没有过期会话，当前 {} 个", sessions.len());
        }
        removed
    }

    /// 后台定时清理
    pub fn spawn_sweeper(
        self: Arc<Self>,
        ttl: Duration,
        every: std::time::Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep_expired(Utc::now(), ttl).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::SessionBlueprint;
    use tokio_test::{assert_err, assert_ok};

    fn session(id: &str, last_activity: DateTime<Utc>) -> TestSession {
        TestSession::new(id.into(), "u".into(), SessionBlueprint::default(), last_activity)
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = SessionStore::new();
        let err = assert_err!(store.get("missing").await);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_idle_sessions() {
        let now = Utc::now();
        let store = SessionStore::new();
        store.insert(session("old", now - Duration::hours(5))).await;
        store.insert(session("fresh", now - Duration::minutes(5))).await;

        let removed = store.sweep_expired(now, Duration::hours(4)).await;
        assert_eq!(removed, 1);
        assert_ok!(store.get("fresh").await);
        assert_err!(store.get("old").await);
    }

    #[tokio::test]
    async fn test_sweep_skips_locked_sessions() {
        let now = Utc::now();
        let store = SessionStore::new();
        let shared = store.insert(session("busy", now - Duration::hours(5))).await;
        let _guard = shared.lock().await;

        assert_eq!(store.sweep_expired(now, Duration::hours(4)).await, 0);
        assert_eq!(store.len().await, 1);
    }
}
