use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::catalog::{CompilationProfile, RuleCatalog, RuleScope, SectionTemplate, Severity};
use super::domain::{DocumentType, MatterDocument, PresenceStatus};
use super::evaluation::{assess_presence, filed_documents, EvaluationConfig};

/// Completeness of one expected document type inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub document_type: DocumentType,
    pub required: bool,
    pub status: PresenceStatus,
    pub reason: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

/// Forum-defined partition of the record with per-slot completeness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSection {
    pub section_id: String,
    pub title: String,
    pub instructions: String,
    pub required: bool,
    pub document_types: Vec<DocumentType>,
    pub slot_statuses: Vec<SlotStatus>,
    pub missing_document_types: Vec<DocumentType>,
    pub missing_reasons: Vec<String>,
    pub section_status: PresenceStatus,
}

impl RecordSection {
    pub fn is_missing_required(&self) -> bool {
        self.required && self.section_status == PresenceStatus::Missing
    }
}

pub struct RecordSectionBuilder {
    config: EvaluationConfig,
}

impl RecordSectionBuilder {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    /// A template slot is enforced only while the catalog still carries a base presence rule
    /// for its type, so a catalog that drops a rule also relaxes the matching slot.
    pub fn build(
        &self,
        profile: &CompilationProfile,
        catalog: &RuleCatalog,
        documents: &[MatterDocument],
    ) -> Vec<RecordSection> {
        let filed = filed_documents(documents);
        let enforced = enforced_types(profile, catalog);
        profile
            .sections
            .iter()
            .map(|template| self.build_section(template, &enforced, &filed))
            .collect()
    }

    fn build_section(
        &self,
        template: &SectionTemplate,
        enforced: &BTreeSet<&DocumentType>,
        filed: &[&MatterDocument],
    ) -> RecordSection {
        let is_enforced = |document_type: &DocumentType| {
            template.requires(document_type) && enforced.contains(document_type)
        };
        let slot_statuses: Vec<SlotStatus> = template
            .document_types
            .iter()
            .map(|document_type| {
                let assessment = assess_presence(document_type, filed, &self.config);
                let required = is_enforced(document_type);
                let reason = if !required && assessment.status == PresenceStatus::Missing {
                    format!("optional; {}", assessment.reason)
                } else {
                    assessment.reason
                };
                SlotStatus {
                    document_type: document_type.clone(),
                    required,
                    status: assessment.status,
                    reason,
                    file_ids: assessment.file_ids,
                }
            })
            .collect();

        // Required types absent from the listed slots still count against the section.
        let unlisted: Vec<SlotStatus> = template
            .required_document_types
            .iter()
            .filter(|document_type| !template.document_types.contains(document_type))
            .filter(|document_type| is_enforced(*document_type))
            .map(|document_type| {
                let assessment = assess_presence(document_type, filed, &self.config);
                SlotStatus {
                    document_type: document_type.clone(),
                    required: true,
                    status: assessment.status,
                    reason: assessment.reason,
                    file_ids: assessment.file_ids,
                }
            })
            .collect();
        let slot_statuses: Vec<SlotStatus> = slot_statuses.into_iter().chain(unlisted).collect();

        let missing: Vec<&SlotStatus> = slot_statuses
            .iter()
            .filter(|slot| slot.required && slot.status == PresenceStatus::Missing)
            .collect();

        RecordSection {
            section_id: template.section_id.clone(),
            title: template.title.clone(),
            instructions: template.instructions.clone(),
            required: slot_statuses.iter().any(|slot| slot.required),
            document_types: template.document_types.clone(),
            missing_document_types: missing
                .iter()
                .map(|slot| slot.document_type.clone())
                .collect(),
            missing_reasons: missing.iter().map(|slot| slot.reason.clone()).collect(),
            section_status: section_status(&slot_statuses),
            slot_statuses,
        }
    }
}

/// Sections without an enforced slot have nothing to miss and are always `present`.
fn section_status(slots: &[SlotStatus]) -> PresenceStatus {
    let required: Vec<&SlotStatus> = slots.iter().filter(|slot| slot.required).collect();
    if required
        .iter()
        .any(|slot| slot.status == PresenceStatus::Missing)
    {
        PresenceStatus::Missing
    } else if required
        .iter()
        .all(|slot| slot.status == PresenceStatus::Present)
    {
        PresenceStatus::Present
    } else {
        PresenceStatus::Warning
    }
}

fn enforced_types<'a>(
    profile: &'a CompilationProfile,
    catalog: &'a RuleCatalog,
) -> BTreeSet<&'a DocumentType> {
    catalog
        .rules_for(profile.subtype.as_deref())
        .filter(|rule| rule.scope == RuleScope::Base && rule.severity == Severity::Blocking)
        .filter_map(|rule| rule.predicate.required_document())
        .collect()
}
