use super::common::*;

use crate::workflows::compilation::catalog::{
    CompilationProfile, Rule, RuleCatalog, RulePredicate, RuleScope, SectionTemplate, Severity,
};
use crate::workflows::compilation::domain::{DocumentType, Forum, PresenceStatus, UploadStatus};
use crate::workflows::compilation::sections::{RecordSection, RecordSectionBuilder};

fn section<'a>(sections: &'a [RecordSection], section_id: &str) -> &'a RecordSection {
    sections
        .iter()
        .find(|section| section.section_id == section_id)
        .unwrap_or_else(|| panic!("section {section_id}"))
}

#[test]
fn sections_follow_profile_order() {
    let outcome = run_engine("rpd_claim", &rpd_documents_without_hearing_notice());
    let ids: Vec<&str> = outcome
        .record_sections
        .iter()
        .map(|section| section.section_id.as_str())
        .collect();
    assert_eq!(ids, vec!["index", "claim", "evidence", "translations"]);
}

#[test]
fn missing_required_slot_marks_section_missing() {
    let outcome = run_engine("rpd_claim", &rpd_documents_without_hearing_notice());
    let claim = section(&outcome.record_sections, "claim");

    assert!(claim.required);
    assert_eq!(claim.section_status, PresenceStatus::Missing);
    assert_eq!(
        claim.missing_document_types,
        vec![DocumentType::from("hearing_notice")]
    );
    assert_eq!(claim.missing_reasons.len(), 1);

    let issue = outcome
        .verdict
        .blocking_issues
        .iter()
        .find(|issue| issue.code == "SECTION_INCOMPLETE")
        .expect("section issue");
    assert!(issue.message.contains("Claim Documents"));
    assert!(issue.message.contains("hearing_notice"));
    assert_eq!(issue.remediation, claim.instructions);
}

#[test]
fn optional_slots_are_labelled_and_never_block() {
    let outcome = run_engine("rpd_claim", &rpd_documents_without_hearing_notice());
    let evidence = section(&outcome.record_sections, "evidence");

    assert!(!evidence.required);
    assert_eq!(evidence.section_status, PresenceStatus::Present);
    let affidavit = evidence
        .slot_statuses
        .iter()
        .find(|slot| slot.document_type.as_str() == "supporting_affidavit")
        .expect("affidavit slot");
    assert_eq!(affidavit.status, PresenceStatus::Missing);
    assert!(affidavit.reason.starts_with("optional; "));

    let translations = section(&outcome.record_sections, "translations");
    assert!(!translations.required);
    assert_eq!(translations.section_status, PresenceStatus::Present);
    assert!(!translations.is_missing_required());
}

#[test]
fn review_flag_turns_required_section_to_warning() {
    let mut documents = rpd_documents_without_hearing_notice();
    let mut notice = document("f-notice", "hearing_notice", 2, 4);
    notice.upload_status = UploadStatus::NeedsReview;
    documents.push(notice);

    let outcome = run_engine("rpd_claim", &documents);
    let claim = section(&outcome.record_sections, "claim");
    assert_eq!(claim.section_status, PresenceStatus::Warning);
    assert!(claim.missing_document_types.is_empty());
}

#[test]
fn required_types_outside_the_listed_slots_still_count() {
    let profile = CompilationProfile {
        id: "custom".to_string(),
        version: "1".to_string(),
        forum: Forum::Rad,
        subtype: None,
        sections: vec![SectionTemplate {
            section_id: "appeal".to_string(),
            title: "Appeal".to_string(),
            instructions: "File the notice and the decision.".to_string(),
            document_types: vec![DocumentType::from("notice_of_appeal")],
            required_document_types: vec![
                DocumentType::from("notice_of_appeal"),
                DocumentType::from("rpd_decision"),
            ],
        }],
    };
    let catalog = RuleCatalog {
        forum: Forum::Rad,
        profile_id: "custom".to_string(),
        version: "1".to_string(),
        effective_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        rules: vec![
            base_rule("C-1", "notice_of_appeal"),
            base_rule("C-2", "rpd_decision"),
        ],
    };
    let documents = vec![document("f-notice", "notice_of_appeal", 2, 1)];

    let sections =
        RecordSectionBuilder::new(evaluation_config()).build(&profile, &catalog, &documents);
    let appeal = &sections[0];
    assert_eq!(appeal.slot_statuses.len(), 2);
    assert_eq!(appeal.section_status, PresenceStatus::Missing);
    assert_eq!(
        appeal.missing_document_types,
        vec![DocumentType::from("rpd_decision")]
    );
}

fn base_rule(code: &str, document_type: &str) -> Rule {
    Rule {
        code: code.to_string(),
        scope: RuleScope::Base,
        predicate: RulePredicate::DocumentPresent {
            document_type: DocumentType::from(document_type),
        },
        severity: Severity::Blocking,
        remediation: format!("File the {document_type}."),
        source_url: "https://laws-lois.justice.gc.ca/eng/regulations/SOR-2012-257/".to_string(),
        applicable_subtypes: Vec::new(),
    }
}

#[test]
fn dropping_a_base_rule_relaxes_its_section_slot() {
    let store = standard_store();
    let (profile, _) = resolve(&store, "rpd_claim");
    let relaxed = relaxed_catalog(&store, "rpd_claim", "2025.1", &["RPD-002"]);

    let outcome = run_engine_with(&profile, &relaxed, &rpd_documents_without_hearing_notice());

    let claim = section(&outcome.record_sections, "claim");
    assert!(claim.required);
    assert_eq!(claim.section_status, PresenceStatus::Present);
    let notice = claim
        .slot_statuses
        .iter()
        .find(|slot| slot.document_type.as_str() == "hearing_notice")
        .expect("hearing notice slot");
    assert!(!notice.required);
    assert!(outcome.verdict.missing_required_items.is_empty());
    assert!(
        outcome.verdict.blocking_issues.is_empty(),
        "{:?}",
        outcome.verdict.blocking_issues
    );
    assert!(outcome.verdict.is_ready);
}

#[test]
fn section_without_enforced_slots_is_present_even_when_empty() {
    let outcome = run_engine("fc_jr_leave", &complete_fc_jr_leave_documents()[..4]);
    let index = section(&outcome.record_sections, "index");

    assert!(!index.required);
    assert!(index.slot_statuses.iter().all(|slot| slot.status == PresenceStatus::Missing));
    assert_eq!(index.section_status, PresenceStatus::Present);
}
