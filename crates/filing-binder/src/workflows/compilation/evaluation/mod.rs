mod requirements;
mod validator;

pub use requirements::{RequirementEvaluator, RequirementStatus};
pub use validator::{RuleValidator, RuleViolation, ValidationContext};

use serde::{Deserialize, Serialize};

use crate::config::CompilationSettings;

use super::domain::{DocumentType, MatterDocument, PresenceStatus, UploadStatus};

/// Confidence floors below which a matching document only counts as a warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub min_classification_confidence: f32,
    pub min_ocr_confidence: f32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        let settings = CompilationSettings::default();
        Self::from_settings(&settings)
    }
}

impl EvaluationConfig {
    pub fn from_settings(settings: &CompilationSettings) -> Self {
        Self {
            min_classification_confidence: settings.min_classification_confidence,
            min_ocr_confidence: settings.min_ocr_confidence,
        }
    }

    /// Why a filed document cannot be trusted without review, if it cannot.
    pub(crate) fn concern(&self, document: &MatterDocument) -> Option<String> {
        if document.upload_status == UploadStatus::NeedsReview {
            let details = if document.issue_details.is_empty() {
                "no details recorded".to_string()
            } else {
                document.issue_details.join("; ")
            };
            return Some(format!("{} flagged for review ({details})", document.filename));
        }

        if document.classification_confidence < self.min_classification_confidence {
            return Some(format!(
                "{} classified with confidence {:.2}, below {:.2}",
                document.filename,
                document.classification_confidence,
                self.min_classification_confidence
            ));
        }

        match document.ocr_confidence {
            Some(ocr) if ocr < self.min_ocr_confidence => Some(format!(
                "{} OCR confidence {:.2}, below {:.2}",
                document.filename, ocr, self.min_ocr_confidence
            )),
            _ => None,
        }
    }
}

/// Outcome of looking for one document type in the filed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PresenceAssessment {
    pub status: PresenceStatus,
    pub reason: String,
    pub file_ids: Vec<String>,
}

/// Filed documents sorted by upload order, the view every pass works from.
pub(crate) fn filed_documents(documents: &[MatterDocument]) -> Vec<&MatterDocument> {
    let mut filed: Vec<&MatterDocument> = documents.iter().filter(|doc| doc.is_filed()).collect();
    filed.sort_by(|a, b| {
        a.upload_sequence
            .cmp(&b.upload_sequence)
            .then_with(|| a.file_id.cmp(&b.file_id))
    });
    filed
}

/// `present` if any matching document is clean, `warning` if every match has a concern,
/// `missing` if nothing matches.
pub(crate) fn assess_presence(
    document_type: &DocumentType,
    filed: &[&MatterDocument],
    config: &EvaluationConfig,
) -> PresenceAssessment {
    let matches: Vec<&MatterDocument> = filed
        .iter()
        .copied()
        .filter(|doc| &doc.classification == document_type)
        .collect();

    if matches.is_empty() {
        return PresenceAssessment {
            status: PresenceStatus::Missing,
            reason: format!("no uploaded document is classified as {document_type}"),
            file_ids: Vec::new(),
        };
    }

    let file_ids = matches.iter().map(|doc| doc.file_id.clone()).collect();

    if let Some(clean) = matches.iter().find(|doc| config.concern(doc).is_none()) {
        return PresenceAssessment {
            status: PresenceStatus::Present,
            reason: format!("{} filed as {document_type}", clean.filename),
            file_ids,
        };
    }

    let reason = matches
        .iter()
        .filter_map(|doc| config.concern(doc))
        .next()
        .unwrap_or_default();
    PresenceAssessment {
        status: PresenceStatus::Warning,
        reason,
        file_ids,
    }
}
