use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::document::DocumentAnalysisResult;

/// Final outcome of the automated decision pipeline for one submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    ManualReview,
}

/// The auditable record produced once per submission. Immutable after
/// computation; a manual override is layered on top as a separate event and
/// never mutates these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationDecision {
    pub decision: Decision,
    /// False only when the analysis service never ran (unconfigured); the
    /// per-document evidence is empty in that case and the original images
    /// are kept for the human reviewer.
    pub analyzed: bool,
    /// Rounded mean of per-document confidences; 0 when nothing was analyzable.
    pub aggregate_confidence: u8,
    pub reasoning: String,
    pub per_document: Vec<DocumentAnalysisResult>,
    pub analyzed_at: DateTime<Utc>,
}

impl VerificationDecision {
    /// Decision used when the analysis service is not configured: defer to a
    /// human with zero external calls made.
    pub fn service_unavailable() -> Self {
        Self {
            decision: Decision::ManualReview,
            analyzed: false,
            aggregate_confidence: 0,
            reasoning: "automated verification unavailable".to_string(),
            per_document: Vec::new(),
            analyzed_at: Utc::now(),
        }
    }
}
