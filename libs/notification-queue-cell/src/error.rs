use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Queue operation failed: {0}")]
    QueueError(String),

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Notification queue is not configured")]
    NotConfigured,

    #[error("Invalid notification: {0}")]
    ValidationError(String),
}
