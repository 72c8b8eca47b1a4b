use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::services::gateway::NotificationGateway;
use crate::{JobHandle, NotificationError, NotificationJob};

const JOB_TTL_SECONDS: i64 = 604_800;
const DEFAULT_KEY_PREFIX: &str = "notification";

/// Redis-backed notification queue.
///
/// Each job is stored as a hash under `{prefix}_job:{id}` and its id is pushed
/// onto the `{prefix}_queue:pending` list for delivery workers to pop.
pub struct RedisNotificationQueue {
    pool: Pool,
    key_prefix: String,
}

impl std::fmt::Debug for RedisNotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisNotificationQueue")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisNotificationQueue {
    pub async fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        let redis_url = config.redis_url.clone().ok_or(NotificationError::NotConfigured)?;
        Self::connect(&redis_url, DEFAULT_KEY_PREFIX).await
    }

    pub async fn connect(redis_url: &str, key_prefix: &str) -> Result<Self, NotificationError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            NotificationError::RedisError(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to create Redis pool",
                format!("Pool creation error: {}", e),
            )))
        })?;

        let queue = Self {
            pool,
            key_prefix: key_prefix.to_string(),
        };

        let mut conn = queue.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis notification queue initialized");

        Ok(queue)
    }

    pub fn job_key(&self, job_id: Uuid) -> String {
        format!("{}_job:{}", self.key_prefix, job_id)
    }

    pub fn pending_key(&self) -> String {
        format!("{}_queue:pending", self.key_prefix)
    }

    pub async fn queue_depth(&self) -> Result<u64, NotificationError> {
        let mut conn = self.get_connection().await?;
        let depth: u64 = conn.llen(self.pending_key()).await?;
        Ok(depth)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<NotificationJob>, NotificationError> {
        let mut conn = self.get_connection().await?;
        let data: Option<String> = conn.hget(self.job_key(job_id), "data").await?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn get_connection(&self) -> Result<Connection, NotificationError> {
        self.pool.get().await.map_err(|e| {
            NotificationError::RedisError(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to get Redis connection",
                e.to_string(),
            )))
        })
    }
}

#[async_trait]
impl NotificationGateway for RedisNotificationQueue {
    async fn enqueue(&self, kind: &str, payload: Value) -> Result<JobHandle, NotificationError> {
        if kind.trim().is_empty() {
            return Err(NotificationError::ValidationError("notification kind is empty".to_string()));
        }

        let job = NotificationJob::new(kind, payload);
        let mut conn = self.get_connection().await?;

        let job_data = serde_json::to_string(&job)?;
        let job_key = self.job_key(job.job_id);
        let _: () = conn
            .hset_multiple(
                &job_key,
                &[
                    ("data", job_data.as_str()),
                    ("kind", job.kind.as_str()),
                    ("status", &serde_json::to_string(&job.status)?),
                    ("created_at", &job.created_at.to_rfc3339()),
                ],
            )
            .await?;

        let _: () = conn.expire(&job_key, JOB_TTL_SECONDS).await?;
        let _: () = conn.lpush(self.pending_key(), job.job_id.to_string()).await?;

        debug!("Notification job {} ({}) enqueued", job.job_id, job.kind);
        Ok(job.handle())
    }
}
