use serde::{Deserialize, Serialize};

use super::catalog::Severity;
use super::domain::PresenceStatus;
use super::evaluation::{RequirementStatus, RuleViolation};
use super::repository::CompilationSnapshot;
use super::sections::RecordSection;

pub(crate) const SECTION_INCOMPLETE: &str = "SECTION_INCOMPLETE";
pub(crate) const DOCUMENT_REVIEW: &str = "DOCUMENT_REVIEW";

/// Itemised reason a record is blocked or needs attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub remediation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl From<&RuleViolation> for ReadinessIssue {
    fn from(violation: &RuleViolation) -> Self {
        Self {
            code: violation.code.clone(),
            severity: violation.severity,
            message: violation.message.clone(),
            remediation: violation.remediation.clone(),
            source_url: Some(violation.source_url.clone()),
            file_ids: violation.file_ids.clone(),
        }
    }
}

/// Profile reference echoed back so callers can tell which template was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRef {
    pub id: String,
    pub version: String,
}

/// The gate consumed by package generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessVerdict {
    pub is_ready: bool,
    pub missing_required_items: Vec<String>,
    pub blocking_issues: Vec<ReadinessIssue>,
    pub warnings: Vec<ReadinessIssue>,
}

/// Readiness view returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessState {
    pub is_ready: bool,
    pub profile: ProfileRef,
    pub catalog_version: String,
    pub document_set_hash: String,
    pub missing_required_items: Vec<String>,
    pub blocking_issues: Vec<ReadinessIssue>,
    pub warnings: Vec<ReadinessIssue>,
    pub requirement_statuses: Vec<RequirementStatus>,
    pub latest_compilation: Option<CompilationSnapshot>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessAggregator;

impl ReadinessAggregator {
    /// `is_ready` holds iff no base or blocking requirement is missing, no violation blocks,
    /// and no required section is missing.
    pub fn aggregate(
        &self,
        statuses: &[RequirementStatus],
        violations: &[RuleViolation],
        sections: &[RecordSection],
    ) -> ReadinessVerdict {
        let mut missing_required_items: Vec<String> = Vec::new();
        for status in statuses.iter().filter(|status| status.blocks_readiness()) {
            if !missing_required_items.contains(&status.item) {
                missing_required_items.push(status.item.clone());
            }
        }

        let mut blocking_issues: Vec<ReadinessIssue> = violations
            .iter()
            .filter(|violation| violation.is_blocking())
            .map(ReadinessIssue::from)
            .collect();
        let blocking_violations = blocking_issues.len();

        let incomplete: Vec<&RecordSection> = sections
            .iter()
            .filter(|section| section.is_missing_required())
            .collect();
        blocking_issues.extend(incomplete.iter().map(|section| ReadinessIssue {
            code: SECTION_INCOMPLETE.to_string(),
            severity: Severity::Blocking,
            message: format!(
                "section '{}' is missing {}",
                section.title,
                section
                    .missing_document_types
                    .iter()
                    .map(|document_type| document_type.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            remediation: section.instructions.clone(),
            source_url: None,
            file_ids: Vec::new(),
        }));

        let mut warnings: Vec<ReadinessIssue> = violations
            .iter()
            .filter(|violation| !violation.is_blocking())
            .map(ReadinessIssue::from)
            .collect();
        warnings.extend(
            statuses
                .iter()
                .filter(|status| status.status == PresenceStatus::Warning)
                .map(|status| ReadinessIssue {
                    code: status
                        .rule_code
                        .clone()
                        .unwrap_or_else(|| DOCUMENT_REVIEW.to_string()),
                    severity: Severity::Warning,
                    message: status.reason.clone(),
                    remediation: "Confirm the document's classification and legibility before filing."
                        .to_string(),
                    source_url: None,
                    file_ids: status.file_ids.clone(),
                }),
        );

        ReadinessVerdict {
            is_ready: missing_required_items.is_empty()
                && blocking_violations == 0
                && incomplete.is_empty(),
            missing_required_items,
            blocking_issues,
            warnings,
        }
    }
}
