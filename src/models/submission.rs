use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a verification submission in the async queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Processing => "processing",
            SubmissionStatus::Completed => "completed",
            SubmissionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => SubmissionStatus::Processing,
            "completed" => SubmissionStatus::Completed,
            "failed" => SubmissionStatus::Failed,
            _ => SubmissionStatus::Pending,
        }
    }
}

/// A document-verification submission as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SubmissionStatus,
    pub document_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decision: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retry_count: i32,
}

/// Declared metadata accompanying one uploaded document (multipart text part).
#[derive(Debug, Deserialize, Validate)]
pub struct DeclaredDocument {
    /// Value the user claims the document carries, e.g. an ID number.
    #[garde(length(min = 1, max = 100))]
    pub declared_value: String,
}

/// Response after submitting documents for verification.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission_id: Uuid,
    pub status: String,
    pub message: String,
}

/// Response for querying submission status.
#[derive(Debug, Serialize)]
pub struct SubmissionStatusResponse {
    pub submission_id: Uuid,
    pub status: String,
    pub decision: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Request body for the manual override endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct OverrideRequest {
    #[garde(skip)]
    pub user_id: Uuid,

    /// Final status; must be "verified" or "rejected".
    #[garde(length(min = 1, max = 20))]
    pub status: String,

    #[garde(length(min = 1, max = 1000))]
    pub reason: String,
}
