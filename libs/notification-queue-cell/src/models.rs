use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Notification kind used for the 24-hour appointment reminder.
pub const APPOINTMENT_REMINDER: &str = "appointment-reminder";

/// A unit of outbound work waiting for a delivery worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationJob {
    pub job_id: Uuid,
    pub kind: String,
    pub payload: Value,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Queued,
    Delivered,
    Failed,
}

impl NotificationJob {
    pub fn new(kind: &str, payload: Value) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            kind: kind.to_string(),
            payload,
            status: NotificationStatus::Queued,
            created_at: Utc::now(),
        }
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            job_id: self.job_id,
            kind: self.kind.clone(),
            queued_at: self.created_at,
        }
    }
}

/// Receipt returned once a job is accepted by the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub kind: String,
    pub queued_at: DateTime<Utc>,
}
