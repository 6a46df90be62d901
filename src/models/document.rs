use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Supported identity document categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    IdCard,
    TaxId,
    DriverLicense,
    Passport,
}

impl DocumentType {
    /// Human-readable label used in reviewer-facing reasoning strings.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::IdCard => "ID card",
            DocumentType::TaxId => "tax ID card",
            DocumentType::DriverLicense => "driver's license",
            DocumentType::Passport => "passport",
        }
    }

    /// The canonical identifier field the analysis service is asked to read.
    pub fn id_field(&self) -> &'static str {
        match self {
            DocumentType::IdCard => "national ID number",
            DocumentType::TaxId => "tax identification number",
            DocumentType::DriverLicense => "license number",
            DocumentType::Passport => "passport number",
        }
    }
}

/// Image quality as rated by the analysis service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentQuality {
    Clear,
    #[default]
    Blurry,
    Damaged,
}

impl DocumentQuality {
    /// Lenient parse of the model's free-text quality rating.
    /// Anything unrecognized degrades to `Blurry` rather than failing.
    pub fn from_model_text(text: &str) -> Self {
        match text.trim().to_ascii_uppercase().as_str() {
            "CLEAR" => DocumentQuality::Clear,
            "DAMAGED" => DocumentQuality::Damaged,
            _ => DocumentQuality::Blurry,
        }
    }
}

/// One uploaded document awaiting analysis. Created at submission time,
/// discarded once the analysis result is produced.
#[derive(Debug, Clone)]
pub struct DocumentJob {
    pub document_type: DocumentType,
    pub image_bytes: Vec<u8>,
    pub mime_type: String,
    /// Value the user claims the document carries (e.g. the ID number).
    pub declared_value: String,
}

/// Free-form claims the analysis service reads off a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
}

/// Outcome of analyzing a single document.
///
/// Invariant: `confidence` is always within 0..=100. A failed analysis is
/// represented by [`DocumentAnalysisResult::failure`], never by an absent
/// result, so failures participate in aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysisResult {
    pub document_type: DocumentType,
    pub extracted_value: Option<String>,
    pub extracted_fields: ExtractedFields,
    pub quality: DocumentQuality,
    pub is_valid: bool,
    pub matches_declared: bool,
    pub confidence: u8,
    pub issues: Vec<String>,
}

impl DocumentAnalysisResult {
    /// Sentinel result for a document whose analysis could not be completed.
    pub fn failure(document_type: DocumentType, issue: impl Into<String>) -> Self {
        Self {
            document_type,
            extracted_value: None,
            extracted_fields: ExtractedFields::default(),
            quality: DocumentQuality::Blurry,
            is_valid: false,
            matches_declared: false,
            confidence: 0,
            issues: vec![issue.into()],
        }
    }

    /// True when the document both passed validity checks and matched the
    /// user-declared value.
    pub fn accepted(&self) -> bool {
        self.is_valid && self.matches_declared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn document_type_string_roundtrip() {
        assert_eq!(DocumentType::from_str("id_card").unwrap(), DocumentType::IdCard);
        assert_eq!(DocumentType::from_str("passport").unwrap(), DocumentType::Passport);
        assert_eq!(DocumentType::DriverLicense.to_string(), "driver_license");
        assert!(DocumentType::from_str("voter_card").is_err());
    }

    #[test]
    fn quality_parse_is_lenient() {
        assert_eq!(DocumentQuality::from_model_text("clear"), DocumentQuality::Clear);
        assert_eq!(DocumentQuality::from_model_text(" DAMAGED "), DocumentQuality::Damaged);
        assert_eq!(DocumentQuality::from_model_text("pretty good"), DocumentQuality::Blurry);
    }

    #[test]
    fn failure_sentinel_shape() {
        let r = DocumentAnalysisResult::failure(DocumentType::TaxId, "timed out");
        assert!(!r.is_valid);
        assert!(!r.matches_declared);
        assert_eq!(r.confidence, 0);
        assert_eq!(r.issues, vec!["timed out".to_string()]);
    }
}
