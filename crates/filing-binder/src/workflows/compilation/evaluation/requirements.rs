use serde::{Deserialize, Serialize};

use super::super::catalog::{
    CompilationProfile, Rule, RuleCatalog, RulePredicate, RuleScope, Severity,
};
use super::super::domain::{DocumentType, MatterDocument, PresenceStatus, RequirementScope};
use super::{assess_presence, filed_documents, EvaluationConfig};

/// Resolution of one requirement target (or one unclassified document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementStatus {
    pub item: String,
    pub status: PresenceStatus,
    pub rule_scope: RequirementScope,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl RequirementStatus {
    pub fn is_missing(&self) -> bool {
        self.status == PresenceStatus::Missing
    }

    /// Missing base items and missing blocking conditionals both hold the record back.
    pub fn blocks_readiness(&self) -> bool {
        self.is_missing()
            && (self.rule_scope == RequirementScope::Base
                || self.severity == Some(Severity::Blocking))
    }
}

/// Resolves base and conditional presence rules against the filed document set.
pub struct RequirementEvaluator {
    config: EvaluationConfig,
}

impl RequirementEvaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    /// Statuses in catalog rule order, followed by one warning per unclassified document in
    /// upload order. Conditional rules whose trigger is absent produce no status.
    pub fn evaluate(
        &self,
        profile: &CompilationProfile,
        catalog: &RuleCatalog,
        documents: &[MatterDocument],
    ) -> Vec<RequirementStatus> {
        let filed = filed_documents(documents);
        let mut statuses = Vec::new();

        for rule in catalog.rules_for(profile.subtype.as_deref()) {
            let Some((target, trigger_reason)) = resolve_target(rule, &filed) else {
                continue;
            };

            let assessment = assess_presence(target, &filed, &self.config);
            let reason = match trigger_reason {
                Some(trigger) => format!("{}; required because {trigger}", assessment.reason),
                None => assessment.reason,
            };

            statuses.push(RequirementStatus {
                item: target.to_string(),
                status: assessment.status,
                rule_scope: match rule.scope {
                    RuleScope::Base => RequirementScope::Base,
                    RuleScope::Conditional => RequirementScope::Conditional,
                },
                reason,
                rule_code: Some(rule.code.clone()),
                severity: Some(rule.severity),
                file_ids: assessment.file_ids,
            });
        }

        statuses.extend(
            filed
                .iter()
                .filter(|doc| doc.classification.is_unclassified())
                .map(|doc| unclassified_status(doc)),
        );

        statuses
    }
}

/// Target document type for a presence rule, plus the trigger explanation when the rule is
/// conditional. `None` when the rule is structural or its condition does not hold.
fn resolve_target<'a>(
    rule: &'a Rule,
    filed: &[&MatterDocument],
) -> Option<(&'a DocumentType, Option<String>)> {
    match &rule.predicate {
        RulePredicate::DocumentPresent { document_type } => Some((document_type, None)),
        RulePredicate::ConditionalOnClassification { trigger, required } => filed
            .iter()
            .find(|doc| &doc.classification == trigger)
            .map(|doc| (required, Some(format!("{} is filed as {trigger}", doc.filename)))),
        RulePredicate::ConditionalOnLanguage { required } => filed
            .iter()
            .find(|doc| &doc.classification != required && !doc.is_official_language())
            .map(|doc| {
                let language = doc.language.as_deref().unwrap_or_default();
                (
                    required,
                    Some(format!("{} is in a non-official language ({language})", doc.filename)),
                )
            }),
        RulePredicate::DocumentListRequired {
            document_type,
            min_documents,
        } => {
            let listed = filed
                .iter()
                .filter(|doc| &doc.classification != document_type)
                .count();
            (listed >= *min_documents)
                .then(|| (document_type, Some(format!("{listed} documents are filed"))))
        }
        RulePredicate::ConsecutivePagination
        | RulePredicate::MaxPages { .. }
        | RulePredicate::DisclosureDeadline { .. } => None,
    }
}

fn unclassified_status(document: &MatterDocument) -> RequirementStatus {
    let suggestion = document
        .alternates
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .map(|alternate| format!("; closest candidate {}", alternate.document_type))
        .unwrap_or_default();

    RequirementStatus {
        item: document.filename.clone(),
        status: PresenceStatus::Warning,
        rule_scope: RequirementScope::Classification,
        reason: format!(
            "{} could not be classified{suggestion}; confirm its document type",
            document.filename
        ),
        rule_code: None,
        severity: Some(Severity::Warning),
        file_ids: vec![document.file_id.clone()],
    }
}
