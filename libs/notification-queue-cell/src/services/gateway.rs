use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::services::queue::RedisNotificationQueue;
use crate::{JobHandle, NotificationError};

/// Accepts outbound notifications for asynchronous delivery.
///
/// A successful return means the job is durably queued, not that it has been
/// delivered.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn enqueue(&self, kind: &str, payload: Value) -> Result<JobHandle, NotificationError>;
}

/// Gateway used when no queue backend is configured; every enqueue fails.
pub struct DisabledNotificationGateway;

#[async_trait]
impl NotificationGateway for DisabledNotificationGateway {
    async fn enqueue(&self, _kind: &str, _payload: Value) -> Result<JobHandle, NotificationError> {
        Err(NotificationError::NotConfigured)
    }
}

/// Picks the production gateway for `config`.
///
/// Without a reachable Redis every enqueue fails, so reminder sweeps leave
/// their rows unsent and retry once the queue comes back.
pub async fn connect_gateway(config: &AppConfig) -> Arc<dyn NotificationGateway> {
    if !config.is_notification_queue_configured() {
        warn!("REDIS_URL not set, reminder delivery is disabled");
        return Arc::new(DisabledNotificationGateway);
    }

    match RedisNotificationQueue::new(config).await {
        Ok(queue) => {
            info!("Reminders will be delivered through the Redis notification queue");
            Arc::new(queue)
        }
        Err(e) => {
            warn!("Redis notification queue unavailable ({}), reminder delivery is disabled", e);
            Arc::new(DisabledNotificationGateway)
        }
    }
}
