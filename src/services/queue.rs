use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const QUEUE_KEY: &str = "id_verify:submissions";
const PROCESSING_KEY: &str = "id_verify:processing";

/// One document within a queued submission. The image itself lives in the
/// object store; only its key travels through Redis. The document type is
/// carried as a string so that unsupported types degrade to a skip at the
/// worker, not a deserialization failure for the whole submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedDocument {
    pub document_type: String,
    pub image_key: String,
    pub mime_type: String,
    pub declared_value: String,
}

/// Submission payload serialized into Redis, keyed by submission id so a
/// stuck or crashed analysis is observable and retryable.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedSubmission {
    pub submission_id: Uuid,
    pub user_id: Uuid,
    pub documents: Vec<QueuedDocument>,
}

/// Redis-backed submission queue with a processing list for crash visibility.
pub struct SubmissionQueue {
    client: redis::Client,
}

impl SubmissionQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Enqueue a submission for background analysis.
    pub async fn enqueue(&self, submission: &QueuedSubmission) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(submission).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Dequeue the next submission, moving it onto the processing list.
    pub async fn dequeue(&self) -> Result<Option<QueuedSubmission>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let result: Option<String> = conn
            .rpoplpush(QUEUE_KEY, PROCESSING_KEY)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let submission: QueuedSubmission =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(submission))
            }
            None => Ok(None),
        }
    }

    /// Remove a submission from the processing list once it is done.
    pub async fn complete(&self, submission: &QueuedSubmission) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(submission).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Number of submissions waiting for a worker.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }

    /// Redis connectivity check for the health endpoint.
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
