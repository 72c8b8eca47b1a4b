use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::services::gateway::NotificationGateway;
use crate::{JobHandle, NotificationError, NotificationJob};

/// Process-local queue used as a test double.
///
/// Nothing drains it outside of tests, so it must never back a running server.
#[derive(Default)]
pub struct InMemoryNotificationQueue {
    jobs: Mutex<VecDeque<NotificationJob>>,
}

impl InMemoryNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Removes and returns every queued job, oldest first.
    pub async fn drain(&self) -> Vec<NotificationJob> {
        self.jobs.lock().await.drain(..).collect()
    }
}

#[async_trait]
impl NotificationGateway for InMemoryNotificationQueue {
    async fn enqueue(&self, kind: &str, payload: Value) -> Result<JobHandle, NotificationError> {
        if kind.trim().is_empty() {
            return Err(NotificationError::ValidationError("notification kind is empty".to_string()));
        }

        let job = NotificationJob::new(kind, payload);
        let handle = job.handle();
        self.jobs.lock().await.push_back(job);

        debug!("Job {} of kind {} queued in memory", handle.job_id, handle.kind);
        Ok(handle)
    }
}
