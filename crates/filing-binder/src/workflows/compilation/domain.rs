use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for a matter (one filing package under preparation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatterId(pub String);

impl MatterId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Court or tribunal context selecting the applicable rule catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Forum {
    FederalCourtJrLeave,
    FederalCourtJrHearing,
    Rpd,
    Rad,
    Id,
    Iad,
    IrccApplication,
}

impl Forum {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::FederalCourtJrLeave,
            Self::FederalCourtJrHearing,
            Self::Rpd,
            Self::Rad,
            Self::Id,
            Self::Iad,
            Self::IrccApplication,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FederalCourtJrLeave => "federal_court_jr_leave",
            Self::FederalCourtJrHearing => "federal_court_jr_hearing",
            Self::Rpd => "rpd",
            Self::Rad => "rad",
            Self::Id => "id",
            Self::Iad => "iad",
            Self::IrccApplication => "ircc_application",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FederalCourtJrLeave => "Federal Court (JR leave)",
            Self::FederalCourtJrHearing => "Federal Court (JR hearing)",
            Self::Rpd => "Refugee Protection Division",
            Self::Rad => "Refugee Appeal Division",
            Self::Id => "Immigration Division",
            Self::Iad => "Immigration Appeal Division",
            Self::IrccApplication => "IRCC application",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|forum| forum.as_str() == normalized)
    }
}

impl fmt::Display for Forum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier label for a document (e.g. `hearing_notice`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentType(pub String);

impl DocumentType {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The classifier could not assign a type.
    pub fn is_unclassified(&self) -> bool {
        let label = self.0.trim();
        label.is_empty() || label.eq_ignore_ascii_case(Self::UNKNOWN)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Intake lifecycle of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploaded,
    NeedsReview,
    Failed,
}

impl UploadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::NeedsReview => "needs_review",
            UploadStatus::Failed => "failed",
        }
    }
}

/// Runner-up classifier guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationAlternate {
    pub document_type: DocumentType,
    pub confidence: f32,
}

/// A classified document as supplied by the intake collaborator. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatterDocument {
    pub file_id: String,
    pub filename: String,
    pub classification: DocumentType,
    pub classification_confidence: f32,
    #[serde(default)]
    pub alternates: Vec<ClassificationAlternate>,
    #[serde(default)]
    pub ocr_confidence: Option<f32>,
    #[serde(default)]
    pub page_count: Option<u32>,
    pub upload_status: UploadStatus,
    #[serde(default)]
    pub issue_details: Vec<String>,
    /// Monotonic upload order assigned by intake.
    #[serde(default)]
    pub upload_sequence: u64,
    /// ISO 639-1 code detected during OCR, when known.
    #[serde(default)]
    pub language: Option<String>,
}

const OFFICIAL_LANGUAGES: [&str; 2] = ["en", "fr"];

impl MatterDocument {
    /// Uploaded documents count toward the filed set; pending and failed uploads do not.
    pub fn is_filed(&self) -> bool {
        matches!(
            self.upload_status,
            UploadStatus::Uploaded | UploadStatus::NeedsReview
        )
    }

    /// Documents with no detected language are treated as English or French.
    pub fn is_official_language(&self) -> bool {
        match &self.language {
            Some(code) => {
                let code = code.trim().to_ascii_lowercase();
                let primary = code
                    .split(|c: char| c == '-' || c == '_')
                    .next()
                    .unwrap_or_default();
                primary.is_empty() || OFFICIAL_LANGUAGES.contains(&primary)
            }
            None => true,
        }
    }
}

/// Optional case facts feeding timing predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatterFacts {
    #[serde(default)]
    pub hearing_date: Option<NaiveDate>,
}

/// Tri-state outcome shared by requirement statuses, record slots, and sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Present,
    Missing,
    Warning,
}

impl PresenceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PresenceStatus::Present => "present",
            PresenceStatus::Missing => "missing",
            PresenceStatus::Warning => "warning",
        }
    }
}

/// Which kind of check produced a requirement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementScope {
    Base,
    Conditional,
    /// Per-document classification problems that degrade to warnings.
    Classification,
}
