use chrono::Utc;

use crate::models::decision::{Decision, VerificationDecision};
use crate::models::document::DocumentAnalysisResult;

/// Decision thresholds. The observed product defaults are 70/50/3; they are
/// carried as configuration so policy can be tuned without code changes.
#[derive(Debug, Clone, Copy)]
pub struct DecisionThresholds {
    /// Minimum aggregate confidence for automatic approval.
    pub approve_confidence: u8,
    /// Aggregate confidence below which the batch is rejected outright.
    pub reject_confidence: u8,
    /// Total issue count above which the batch is rejected outright.
    pub max_issues: usize,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            approve_confidence: 70,
            reject_confidence: 50,
            max_issues: 3,
        }
    }
}

/// Pure decision policy over the collected per-document results.
///
/// Evaluated in order:
/// 1. every document valid and matching, aggregate ≥ approve threshold → approved;
/// 2. aggregate below reject threshold, or too many issues → rejected
///    (this dominates individual validity flags: a low-confidence batch is
///    rejected even if each document claims to be valid);
/// 3. anything in between → manual review.
pub fn decide(
    results: Vec<DocumentAnalysisResult>,
    thresholds: &DecisionThresholds,
) -> VerificationDecision {
    let aggregate_confidence = aggregate(&results);
    let all_accepted = !results.is_empty() && results.iter().all(|r| r.accepted());
    let issue_count: usize = results.iter().map(|r| r.issues.len()).sum();

    let (decision, reasoning) = if all_accepted
        && aggregate_confidence >= thresholds.approve_confidence
    {
        (
            Decision::Approved,
            "All documents verified successfully; information matches user-provided data."
                .to_string(),
        )
    } else if aggregate_confidence < thresholds.reject_confidence
        || issue_count > thresholds.max_issues
    {
        (Decision::Rejected, rejection_reasoning(&results))
    } else {
        (
            Decision::ManualReview,
            "Some issues detected; manual review recommended.".to_string(),
        )
    };

    VerificationDecision {
        decision,
        analyzed: true,
        aggregate_confidence,
        reasoning,
        per_document: results,
        analyzed_at: Utc::now(),
    }
}

/// Rounded mean of per-document confidences; 0 when nothing was analyzable.
fn aggregate(results: &[DocumentAnalysisResult]) -> u8 {
    if results.is_empty() {
        return 0;
    }
    let sum: u32 = results.iter().map(|r| u32::from(r.confidence)).sum();
    let mean = f64::from(sum) / results.len() as f64;
    mean.round() as u8
}

/// Reviewer-facing explanation for a rejection: each failing document's type
/// and its recorded issues, plus a resubmission instruction.
fn rejection_reasoning(results: &[DocumentAnalysisResult]) -> String {
    let mut parts: Vec<String> = Vec::new();

    for result in results.iter().filter(|r| !r.accepted()) {
        if result.issues.is_empty() {
            parts.push(format!(
                "{}: document quality or information mismatch",
                result.document_type.label()
            ));
        } else {
            parts.push(format!(
                "{}: {}",
                result.document_type.label(),
                result.issues.join(", ")
            ));
        }
    }

    if parts.is_empty() {
        parts.push("Document quality or information mismatch".to_string());
    }

    format!(
        "{}. Please resubmit clearer photos of your documents.",
        parts.join("; ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{DocumentQuality, DocumentType, ExtractedFields};

    fn result(
        document_type: DocumentType,
        is_valid: bool,
        matches_declared: bool,
        confidence: u8,
        issues: Vec<&str>,
    ) -> DocumentAnalysisResult {
        DocumentAnalysisResult {
            document_type,
            extracted_value: Some("X123".to_string()),
            extracted_fields: ExtractedFields::default(),
            quality: DocumentQuality::Clear,
            is_valid,
            matches_declared,
            confidence,
            issues: issues.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn single_clear_id_card_is_approved() {
        let decision = decide(
            vec![result(DocumentType::IdCard, true, true, 85, vec![])],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::Approved);
        assert_eq!(decision.aggregate_confidence, 85);
        // Any outcome of the policy is a real analysis; only the
        // unconfigured-service shortcut leaves this unset, and the worker
        // keys image retention off it.
        assert!(decision.analyzed);
    }

    #[test]
    fn middle_band_defers_to_manual_review() {
        // Confidences 40 and 90: mean 65 is below approval but above
        // rejection, with zero issues.
        let decision = decide(
            vec![
                result(DocumentType::IdCard, true, true, 40, vec![]),
                result(DocumentType::Passport, true, true, 90, vec![]),
            ],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::ManualReview);
        assert_eq!(decision.aggregate_confidence, 65);
    }

    #[test]
    fn low_confidence_is_rejected_with_document_reference() {
        let decision = decide(
            vec![result(
                DocumentType::DriverLicense,
                false,
                false,
                30,
                vec!["photo too dark"],
            )],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::Rejected);
        assert!(decision.reasoning.contains("driver's license"));
        assert!(decision.reasoning.contains("photo too dark"));
        assert!(decision.reasoning.contains("resubmit"));
    }

    #[test]
    fn low_confidence_dominates_validity_flags() {
        // Every document claims validity, yet the batch mean is below the
        // rejection threshold: rejection wins over manual review.
        let decision = decide(
            vec![
                result(DocumentType::IdCard, true, true, 45, vec![]),
                result(DocumentType::TaxId, true, true, 45, vec![]),
            ],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::Rejected);
        assert!(decision.reasoning.contains("Document quality or information mismatch"));
    }

    #[test]
    fn too_many_issues_reject_despite_decent_confidence() {
        let decision = decide(
            vec![
                result(DocumentType::IdCard, false, true, 60, vec!["glare", "cropped"]),
                result(DocumentType::Passport, true, false, 60, vec!["name unclear", "edge cut"]),
            ],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::Rejected);
        assert!(decision.reasoning.contains("ID card"));
        assert!(decision.reasoning.contains("passport"));
    }

    #[test]
    fn approval_rule_wins_over_issue_count() {
        // Rule 1 is evaluated first: a fully valid, high-confidence batch is
        // approved even if the model noted several cosmetic issues.
        let decision = decide(
            vec![result(
                DocumentType::Passport,
                true,
                true,
                95,
                vec!["slight glare", "corner worn", "stamp overlaps text", "minor fold"],
            )],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::Approved);
    }

    #[test]
    fn empty_input_has_zero_aggregate() {
        let decision = decide(Vec::new(), &DecisionThresholds::default());
        assert_eq!(decision.aggregate_confidence, 0);
        assert_eq!(decision.decision, Decision::Rejected);
        assert!(decision.per_document.is_empty());
    }

    #[test]
    fn aggregate_is_rounded_mean() {
        let decision = decide(
            vec![
                result(DocumentType::IdCard, true, true, 70, vec![]),
                result(DocumentType::TaxId, true, true, 71, vec![]),
            ],
            &DecisionThresholds::default(),
        );
        // 70.5 rounds to 71.
        assert_eq!(decision.aggregate_confidence, 71);
        assert_eq!(decision.decision, Decision::Approved);
    }

    #[test]
    fn approval_boundary_is_inclusive() {
        let decision = decide(
            vec![result(DocumentType::IdCard, true, true, 70, vec![])],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::Approved);

        let decision = decide(
            vec![result(DocumentType::IdCard, true, true, 69, vec![])],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::ManualReview);
    }

    #[test]
    fn rejection_boundary_is_exclusive() {
        let decision = decide(
            vec![result(DocumentType::IdCard, true, true, 50, vec![])],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::ManualReview);

        let decision = decide(
            vec![result(DocumentType::IdCard, true, true, 49, vec![])],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::Rejected);
    }

    #[test]
    fn sentinel_results_drag_the_aggregate_down() {
        // One clean document plus one failed analysis: mean of 90 and 0 is
        // 45, which rejects the batch rather than silently dropping the
        // failure.
        let decision = decide(
            vec![
                result(DocumentType::Passport, true, true, 90, vec![]),
                DocumentAnalysisResult::failure(DocumentType::IdCard, "retries exhausted"),
            ],
            &DecisionThresholds::default(),
        );
        assert_eq!(decision.decision, Decision::Rejected);
        assert!(decision.reasoning.contains("retries exhausted"));
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let thresholds = DecisionThresholds {
            approve_confidence: 90,
            reject_confidence: 80,
            max_issues: 0,
        };
        let decision = decide(
            vec![result(DocumentType::IdCard, true, true, 85, vec![])],
            &thresholds,
        );
        assert_eq!(decision.decision, Decision::ManualReview);
    }
}
