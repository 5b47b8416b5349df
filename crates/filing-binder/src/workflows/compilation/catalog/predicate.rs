use serde::{Deserialize, Serialize};

use super::super::domain::DocumentType;

/// Closed set of rule predicates interpreted by the evaluator and validator.
///
/// Presence predicates resolve to a required document type; structural predicates inspect the
/// filed set or the compilation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RulePredicate {
    /// `document_type` must be filed.
    DocumentPresent { document_type: DocumentType },
    /// Filing a `trigger` document requires a `required` document.
    ConditionalOnClassification {
        trigger: DocumentType,
        required: DocumentType,
    },
    /// Any filed document outside English/French requires `required`.
    ConditionalOnLanguage { required: DocumentType },
    /// Filing at least `min_documents` other documents requires a `document_type` index.
    DocumentListRequired {
        document_type: DocumentType,
        min_documents: usize,
    },
    /// Page numbers run consecutively from 1 across the filed set.
    ConsecutivePagination,
    /// Documents of `document_type` may not exceed `max_pages`.
    MaxPages {
        document_type: DocumentType,
        max_pages: u32,
    },
    /// Documents must be filed at least `days_before_hearing` days before a known hearing.
    DisclosureDeadline { days_before_hearing: u32 },
}

impl RulePredicate {
    pub const fn kind(&self) -> &'static str {
        match self {
            RulePredicate::DocumentPresent { .. } => "document_present",
            RulePredicate::ConditionalOnClassification { .. } => "conditional_on_classification",
            RulePredicate::ConditionalOnLanguage { .. } => "conditional_on_language",
            RulePredicate::DocumentListRequired { .. } => "document_list_required",
            RulePredicate::ConsecutivePagination => "consecutive_pagination",
            RulePredicate::MaxPages { .. } => "max_pages",
            RulePredicate::DisclosureDeadline { .. } => "disclosure_deadline",
        }
    }

    /// Document type a presence predicate asks for.
    pub fn required_document(&self) -> Option<&DocumentType> {
        match self {
            RulePredicate::DocumentPresent { document_type } => Some(document_type),
            RulePredicate::ConditionalOnClassification { required, .. } => Some(required),
            RulePredicate::ConditionalOnLanguage { required } => Some(required),
            RulePredicate::DocumentListRequired { document_type, .. } => Some(document_type),
            RulePredicate::ConsecutivePagination
            | RulePredicate::MaxPages { .. }
            | RulePredicate::DisclosureDeadline { .. } => None,
        }
    }

    pub fn is_presence(&self) -> bool {
        self.required_document().is_some()
    }

    /// Unconditional presence predicates are the only ones allowed in `base` scope.
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            RulePredicate::ConditionalOnClassification { .. }
                | RulePredicate::ConditionalOnLanguage { .. }
                | RulePredicate::DocumentListRequired { .. }
        )
    }
}
