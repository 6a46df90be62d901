use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle of a user's account verification.
///
/// `NotSubmitted → Pending → {Verified, Rejected}`. An approved decision
/// drives Pending→Verified, a rejected one Pending→Rejected; manual review
/// leaves the account Pending for a human.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    NotSubmitted,
    Pending,
    Verified,
    Rejected,
}

/// A user's verification record as persisted, including the stored AI
/// decision (if any). This is the audit-facing shape the review UI reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserVerification {
    pub user_id: Uuid,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    /// Serialized [`crate::models::decision::VerificationDecision`], present
    /// once the pipeline has run.
    pub decision: Option<serde_json::Value>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of a manual reviewer override. Stored alongside, and
/// never instead of, the AI decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: VerificationStatus,
    pub reason: String,
    pub reviewer_id: Uuid,
    pub created_at: DateTime<Utc>,
}
