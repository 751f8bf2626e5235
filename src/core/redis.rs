use std::sync::{Arc, OnceLock};

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError, Script};
use tokio::sync::RwLock;

/// Length of one grading quota window.
pub(crate) const QUOTA_WINDOW_SECONDS: i64 = 60;

/// Bumps the window counter and arms its expiry on the first hit of a window.
const WINDOW_COUNTER: &str = r#"
local used = redis.call("INCR", KEYS[1])
if used == 1 then
    redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return used
"#;

fn window_counter() -> &'static Script {
    static SCRIPT: OnceLock<Script> = OnceLock::new();
    SCRIPT.get_or_init(|| Script::new(WINDOW_COUNTER))
}

/// Shared Redis connection. Starts empty; grading keeps working without it.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHealth {
    pub(crate) fn label(&self) -> String {
        match self {
            Self::Healthy => "healthy".to_string(),
            Self::Disconnected => "disconnected".to_string(),
            Self::Unhealthy(error) => format!("unhealthy: {error}"),
        }
    }

    /// A missing connection is expected in some deployments; only a failing one degrades.
    pub(crate) fn is_degraded(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// Outcome of counting one grading request against a student's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quota {
    Within { used: u64 },
    Exceeded,
    /// No connection, so nothing was counted.
    Unchecked,
}

impl Quota {
    pub(crate) fn allows(self) -> bool {
        !matches!(self, Self::Exceeded)
    }
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let manager = ConnectionManager::new(Client::open(self.url.as_str())?).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        self.manager.write().await.take();
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut conn) = self.connection().await else {
            return RedisHealth::Disconnected;
        };

        cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_or_else(|err| RedisHealth::Unhealthy(err.to_string()), |_| RedisHealth::Healthy)
    }

    /// Counts one grading request for `student_id` in the current minute.
    pub(crate) async fn grade_quota(
        &self,
        student_id: &str,
        per_minute: u64,
    ) -> Result<Quota, RedisError> {
        let Some(mut conn) = self.connection().await else {
            return Ok(Quota::Unchecked);
        };

        let used: u64 = window_counter()
            .key(grade_quota_key(student_id))
            .arg(QUOTA_WINDOW_SECONDS)
            .invoke_async(&mut conn)
            .await?;

        Ok(if used > per_minute { Quota::Exceeded } else { Quota::Within { used } })
    }
}

fn grade_quota_key(student_id: &str) -> String {
    format!("homework-grade:{}", student_id.trim())
}
