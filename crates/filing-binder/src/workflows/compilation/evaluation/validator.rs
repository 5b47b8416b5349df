use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::super::catalog::{CompilationProfile, Rule, RuleCatalog, RulePredicate, Severity};
use super::super::domain::{MatterDocument, MatterFacts};
use super::super::planner::CompilationPlan;
use super::filed_documents;
use super::requirements::RequirementStatus;

/// A failed rule with its citation and the documents involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub remediation: String,
    pub source_url: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl RuleViolation {
    fn from_rule(rule: &Rule, severity: Severity, message: String, file_ids: Vec<String>) -> Self {
        Self {
            code: rule.code.clone(),
            severity,
            message,
            remediation: rule.remediation.clone(),
            source_url: rule.source_url.clone(),
            file_ids,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// Everything one validation pass reads. Borrowed from the request snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub profile: &'a CompilationProfile,
    pub catalog: &'a RuleCatalog,
    pub documents: &'a [MatterDocument],
    pub statuses: &'a [RequirementStatus],
    pub plan: &'a CompilationPlan,
    pub facts: &'a MatterFacts,
    pub as_of: Option<NaiveDate>,
}

/// Stateless interpreter for every predicate kind; emits violations in catalog rule order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl RuleValidator {
    pub fn validate(&self, context: &ValidationContext<'_>) -> Vec<RuleViolation> {
        let filed = filed_documents(context.documents);
        let mut violations = Vec::new();

        for rule in context.catalog.rules_for(context.profile.subtype.as_deref()) {
            match &rule.predicate {
                RulePredicate::DocumentPresent { .. }
                | RulePredicate::ConditionalOnClassification { .. }
                | RulePredicate::ConditionalOnLanguage { .. }
                | RulePredicate::DocumentListRequired { .. } => {
                    violations.extend(missing_presence(rule, context.statuses));
                }
                RulePredicate::ConsecutivePagination => {
                    violations.extend(pagination(rule, context.plan));
                }
                RulePredicate::MaxPages {
                    document_type,
                    max_pages,
                } => {
                    violations.extend(
                        filed
                            .iter()
                            .filter(|doc| &doc.classification == document_type)
                            .filter_map(|doc| {
                                let pages = doc.page_count?;
                                (pages > *max_pages).then(|| {
                                    RuleViolation::from_rule(
                                        rule,
                                        rule.severity,
                                        format!(
                                            "{} has {pages} pages; the limit for {document_type} is {max_pages}",
                                            doc.filename
                                        ),
                                        vec![doc.file_id.clone()],
                                    )
                                })
                            }),
                    );
                }
                RulePredicate::DisclosureDeadline {
                    days_before_hearing,
                } => {
                    let (Some(hearing), Some(as_of)) = (context.facts.hearing_date, context.as_of)
                    else {
                        continue;
                    };
                    if filed.is_empty() {
                        continue;
                    }
                    let deadline = hearing - Duration::days(i64::from(*days_before_hearing));
                    if as_of > deadline {
                        violations.push(RuleViolation::from_rule(
                            rule,
                            rule.severity,
                            format!(
                                "disclosure deadline {deadline} ({days_before_hearing} days before the {hearing} hearing) has passed as of {as_of}"
                            ),
                            filed.iter().map(|doc| doc.file_id.clone()).collect(),
                        ));
                    }
                }
            }
        }

        violations
    }
}

fn missing_presence(rule: &Rule, statuses: &[RequirementStatus]) -> Option<RuleViolation> {
    let status = statuses
        .iter()
        .find(|status| status.rule_code.as_deref() == Some(rule.code.as_str()))?;
    status.is_missing().then(|| {
        RuleViolation::from_rule(
            rule,
            rule.severity,
            format!("{} is missing: {}", status.item, status.reason),
            Vec::new(),
        )
    })
}

/// Gaps are reported at the rule's severity; placeholder page counts only warn.
fn pagination(rule: &Rule, plan: &CompilationPlan) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    if !plan.is_contiguous() {
        violations.push(RuleViolation::from_rule(
            rule,
            rule.severity,
            "page ranges are not consecutive from page 1".to_string(),
            plan.toc_entries
                .iter()
                .map(|entry| entry.file_id.clone())
                .collect(),
        ));
    }

    if plan.has_estimated_pages() {
        let estimated = &plan.pagination_summary.estimated_page_documents;
        violations.push(RuleViolation::from_rule(
            rule,
            Severity::Warning,
            format!(
                "page count unknown for {} document(s); a one-page placeholder was used",
                estimated.len()
            ),
            estimated.clone(),
        ));
    }

    violations
}
