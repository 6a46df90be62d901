use std::sync::Arc;

use serde::Deserialize;
use strsim::jaro_winkler;

use crate::models::document::{
    DocumentAnalysisResult, DocumentJob, DocumentQuality, DocumentType, ExtractedFields,
};
use crate::services::extract;
use crate::services::retry::RetryPolicy;
use crate::services::vision::VisionClient;

/// Threshold for fuzzy matching of extracted vs declared values (0.0 - 1.0).
const MATCH_THRESHOLD: f64 = 0.85;

/// Verdict block the analysis service is instructed to embed in its reply.
/// All fields are lenient: anything the model omits defaults to the most
/// pessimistic value.
#[derive(Debug, Default, Deserialize)]
struct ModelVerdict {
    #[serde(default)]
    extracted_value: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    date_of_birth: Option<String>,
    #[serde(default)]
    nationality: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    is_valid: bool,
    #[serde(default)]
    matches_declared: bool,
    #[serde(default)]
    confidence: i64,
    #[serde(default)]
    issues: Vec<String>,
}

/// Analyzes one document through the vision service, with retry, and
/// normalizes every outcome into a [`DocumentAnalysisResult`].
///
/// This component never fails: exhausted retries, permanent service errors
/// and unparseable responses all degrade to the sentinel invalid result so a
/// single bad document cannot abort the batch.
pub struct DocumentAnalyzer {
    vision: Arc<VisionClient>,
    retry: RetryPolicy,
}

impl DocumentAnalyzer {
    pub fn new(vision: Arc<VisionClient>, retry: RetryPolicy) -> Self {
        Self { vision, retry }
    }

    pub async fn analyze(&self, job: &DocumentJob) -> DocumentAnalysisResult {
        let prompt = build_prompt(job.document_type, &job.declared_value);

        let raw = match self
            .retry
            .run(|| self.vision.analyze(&job.image_bytes, &job.mime_type, &prompt))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    document_type = %job.document_type,
                    error = %e,
                    "document analysis call failed"
                );
                return DocumentAnalysisResult::failure(job.document_type, e.to_string());
            }
        };

        let verdict: ModelVerdict = match extract::first_json_block(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    document_type = %job.document_type,
                    error = %e,
                    "analysis response had no usable verdict block"
                );
                return DocumentAnalysisResult::failure(
                    job.document_type,
                    format!("could not parse analysis response: {e}"),
                );
            }
        };

        verdict_to_result(job.document_type, &job.declared_value, verdict)
    }
}

/// Build the type-specific instruction prompt.
///
/// Privacy rule: for national ID cards only the last 4 digits of the
/// declared value are included, and the model is told to compare only those.
fn build_prompt(document_type: DocumentType, declared_value: &str) -> String {
    let mut fields = String::from(
        "\"extracted_value\" (the ",
    );
    fields.push_str(document_type.id_field());
    fields.push_str(" printed on the document), \"full_name\", \"date_of_birth\" (YYYY-MM-DD)");
    if document_type == DocumentType::Passport {
        fields.push_str(", \"nationality\"");
    }
    fields.push_str(
        ", \"quality\" (one of CLEAR, BLURRY, DAMAGED), \
         \"is_valid\" (boolean: the document looks authentic, complete and unexpired), \
         \"matches_declared\" (boolean: extracted_value matches the declared value given below), \
         \"confidence\" (integer 0-100), \
         \"issues\" (array of strings describing any problems found)",
    );

    let declared_line = match document_type {
        DocumentType::IdCard => format!(
            "Declared {} — last 4 digits only: {}. Compare only the last 4 digits of the number on the card and do not write out the full number.",
            document_type.id_field(),
            last4(declared_value),
        ),
        _ => format!("Declared {}: {}.", document_type.id_field(), declared_value),
    };

    format!(
        "You are verifying a {} image for identity verification. \
         Examine the image and respond with exactly one JSON object containing: {}. \
         {} Respond with the JSON object only.",
        document_type.label(),
        fields,
        declared_line,
    )
}

/// Normalize the parsed verdict into the common per-document record,
/// cross-checking the extracted value against what the user declared.
fn verdict_to_result(
    document_type: DocumentType,
    declared_value: &str,
    verdict: ModelVerdict,
) -> DocumentAnalysisResult {
    let confidence = verdict.confidence.clamp(0, 100) as u8;
    let quality = verdict
        .quality
        .as_deref()
        .map(DocumentQuality::from_model_text)
        .unwrap_or_default();

    let mut issues = verdict.issues;
    let mut matches_declared = verdict.matches_declared;

    // The model's self-reported match is double-checked against the value it
    // actually extracted. A confirmed mismatch overrides a yes; the reverse
    // direction is left to the model, which sees the image.
    if matches_declared {
        if let Some(extracted) = verdict.extracted_value.as_deref() {
            if !values_match(document_type, extracted, declared_value) {
                matches_declared = false;
                issues.push(format!(
                    "extracted {} does not match the declared value",
                    document_type.id_field()
                ));
            }
        }
    }

    DocumentAnalysisResult {
        document_type,
        extracted_value: verdict.extracted_value,
        extracted_fields: ExtractedFields {
            full_name: verdict.full_name,
            date_of_birth: verdict.date_of_birth,
            nationality: verdict.nationality,
        },
        quality,
        is_valid: verdict.is_valid,
        matches_declared,
        confidence,
        issues,
    }
}

/// Compare an extracted identifier against the declared one. ID cards are
/// compared on the last 4 digits only; everything else on the normalized
/// full value with a fuzzy fallback for OCR noise.
fn values_match(document_type: DocumentType, extracted: &str, declared: &str) -> bool {
    let extracted_norm = normalize_id(extracted);
    let declared_norm = normalize_id(declared);

    if extracted_norm.is_empty() || declared_norm.is_empty() {
        return false;
    }

    match document_type {
        DocumentType::IdCard => {
            let tail = last4(declared);
            !tail.is_empty() && extracted_norm.ends_with(&tail)
        }
        _ => {
            extracted_norm == declared_norm
                || jaro_winkler(&extracted_norm, &declared_norm) >= MATCH_THRESHOLD
        }
    }
}

/// Keep only alphanumerics, uppercased, so separators and spacing never
/// break a comparison.
fn normalize_id(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Last 4 alphanumeric characters of a declared identifier.
fn last4(value: &str) -> String {
    let normalized = normalize_id(value);
    let start = normalized.len().saturating_sub(4);
    normalized[start..].to_string()
}
