use chrono::NaiveDate;

use super::super::domain::{DocumentType, Forum};
use super::{
    CompilationProfile, Rule, RuleCatalog, RulePredicate, RuleScope, SectionTemplate, Severity,
};

const FC_IMMIGRATION_RULES: &str = "https://laws-lois.justice.gc.ca/eng/regulations/SOR-93-22/";
const FC_RULES: &str = "https://laws-lois.justice.gc.ca/eng/regulations/SOR-98-106/";
const RPD_RULES: &str = "https://laws-lois.justice.gc.ca/eng/regulations/SOR-2012-256/";
const RAD_RULES: &str = "https://laws-lois.justice.gc.ca/eng/regulations/SOR-2012-257/";
const ID_RULES: &str = "https://laws-lois.justice.gc.ca/eng/regulations/SOR-2002-229/";
const IAD_RULES: &str = "https://laws-lois.justice.gc.ca/eng/regulations/SOR-2022-277/";

pub(super) const BUILTIN_VERSION: &str = "2024.1";

pub(super) struct BuiltinProfile {
    pub profile: CompilationProfile,
    pub catalog: RuleCatalog,
}

/// Profile families callers may ask for that have no published catalog yet.
pub(super) const UNSUPPORTED_FAMILIES: &[(Forum, Option<&str>, &str)] = &[
    (
        Forum::Id,
        Some("id_detention_review"),
        "detention review packages follow hearing-day disclosure and are not compiled",
    ),
    (
        Forum::IrccApplication,
        None,
        "IRCC applications are submitted through the online portal, not as a paginated record",
    ),
    (
        Forum::Iad,
        None,
        "IAD appeals must name a subtype (sponsorship, residency obligation, removal order)",
    ),
];

pub(super) fn builtin_profiles() -> Vec<BuiltinProfile> {
    let effective = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();

    let mut profiles = vec![
        fc_jr_leave(effective),
        fc_jr_hearing(effective),
        rpd_claim(effective),
        rad_appeal(effective),
        id_admissibility(effective),
    ];
    for subtype in ["iad_sponsorship", "iad_residency_obligation", "iad_removal_order"] {
        profiles.push(iad_appeal(subtype, effective));
    }
    profiles
}

fn doc(label: &str) -> DocumentType {
    DocumentType::from(label)
}

fn docs(labels: &[&str]) -> Vec<DocumentType> {
    labels.iter().copied().map(doc).collect()
}

fn section(
    section_id: &str,
    title: &str,
    instructions: &str,
    document_types: &[&str],
    required: &[&str],
) -> SectionTemplate {
    SectionTemplate {
        section_id: section_id.to_string(),
        title: title.to_string(),
        instructions: instructions.to_string(),
        document_types: docs(document_types),
        required_document_types: docs(required),
    }
}

fn base(code: &str, document_type: &str, remediation: &str, source_url: &str) -> Rule {
    Rule {
        code: code.to_string(),
        scope: RuleScope::Base,
        predicate: RulePredicate::DocumentPresent {
            document_type: doc(document_type),
        },
        severity: Severity::Blocking,
        remediation: remediation.to_string(),
        source_url: source_url.to_string(),
        applicable_subtypes: Vec::new(),
    }
}

fn rule(
    code: &str,
    scope: RuleScope,
    predicate: RulePredicate,
    severity: Severity,
    remediation: &str,
    source_url: &str,
) -> Rule {
    Rule {
        code: code.to_string(),
        scope,
        predicate,
        severity,
        remediation: remediation.to_string(),
        source_url: source_url.to_string(),
        applicable_subtypes: Vec::new(),
    }
}

fn scoped(mut rule: Rule, subtypes: &[&str]) -> Rule {
    rule.applicable_subtypes = subtypes.iter().map(|s| s.to_string()).collect();
    rule
}

fn translation_rule(code: &str, required: &str, source_url: &str) -> Rule {
    rule(
        code,
        RuleScope::Conditional,
        RulePredicate::ConditionalOnLanguage {
            required: doc(required),
        },
        Severity::Blocking,
        "Provide an English or French translation of every foreign-language document together with the translator's declaration.",
        source_url,
    )
}

fn document_list_rule(code: &str, source_url: &str) -> Rule {
    rule(
        code,
        RuleScope::Conditional,
        RulePredicate::DocumentListRequired {
            document_type: doc("document_list"),
            min_documents: 2,
        },
        Severity::Blocking,
        "Add a list identifying every document filed when more than one document is provided.",
        source_url,
    )
}

fn pagination_rule(code: &str, source_url: &str) -> Rule {
    rule(
        code,
        RuleScope::Base,
        RulePredicate::ConsecutivePagination,
        Severity::Blocking,
        "Number all pages consecutively across the record and confirm the page count of every document.",
        source_url,
    )
}

fn package(
    id: &str,
    forum: Forum,
    subtype: Option<&str>,
    sections: Vec<SectionTemplate>,
    rules: Vec<Rule>,
    effective_date: NaiveDate,
) -> BuiltinProfile {
    BuiltinProfile {
        profile: CompilationProfile {
            id: id.to_string(),
            version: "1".to_string(),
            forum,
            subtype: subtype.map(str::to_string),
            sections,
        },
        catalog: RuleCatalog {
            forum,
            profile_id: id.to_string(),
            version: BUILTIN_VERSION.to_string(),
            effective_date,
            rules,
        },
    }
}

fn fc_jr_leave(effective: NaiveDate) -> BuiltinProfile {
    let sections = vec![
        section(
            "index",
            "Table of Contents",
            "List every document in the applicant's record with its page range.",
            &["document_list"],
            &[],
        ),
        section(
            "originating",
            "Application for Leave and for Judicial Review",
            "File the issued application (Form IR-1) as the first document of the record.",
            &["application_for_leave"],
            &["application_for_leave"],
        ),
        section(
            "decision",
            "Decision Under Review",
            "Include the decision and any written reasons received from the decision-maker.",
            &["decision_under_review", "reasons_for_decision"],
            &["decision_under_review"],
        ),
        section(
            "evidence",
            "Affidavits",
            "Affidavits must be confined to facts within the deponent's personal knowledge.",
            &["supporting_affidavit", "translator_affidavit", "exhibit"],
            &["supporting_affidavit"],
        ),
        section(
            "argument",
            "Memorandum of Argument",
            "Set out the facts, issues, law and relief sought.",
            &["memorandum_of_argument"],
            &["memorandum_of_argument"],
        ),
    ];

    let rules = vec![
        base(
            "FC-JR-LEAVE-001",
            "application_for_leave",
            "File the issued Application for Leave and for Judicial Review (Form IR-1).",
            FC_IMMIGRATION_RULES,
        ),
        base(
            "FC-JR-LEAVE-002",
            "decision_under_review",
            "Include a copy of the decision under review.",
            FC_IMMIGRATION_RULES,
        ),
        base(
            "FC-JR-LEAVE-003",
            "supporting_affidavit",
            "File at least one affidavit verifying the facts relied on.",
            FC_IMMIGRATION_RULES,
        ),
        base(
            "FC-JR-LEAVE-004",
            "memorandum_of_argument",
            "File a memorandum of argument with the applicant's record.",
            FC_IMMIGRATION_RULES,
        ),
        document_list_rule("FC-JR-LEAVE-005", FC_IMMIGRATION_RULES),
        pagination_rule("FC-JR-LEAVE-006", FC_IMMIGRATION_RULES),
        rule(
            "FC-JR-LEAVE-007",
            RuleScope::Base,
            RulePredicate::MaxPages {
                document_type: doc("memorandum_of_argument"),
                max_pages: 30,
            },
            Severity::Blocking,
            "Shorten the memorandum of argument to 30 pages or obtain leave to exceed the limit.",
            FC_RULES,
        ),
        translation_rule("FC-JR-LEAVE-008", "translator_affidavit", FC_IMMIGRATION_RULES),
    ];

    package(
        "fc_jr_leave",
        Forum::FederalCourtJrLeave,
        None,
        sections,
        rules,
        effective,
    )
}

fn fc_jr_hearing(effective: NaiveDate) -> BuiltinProfile {
    let sections = vec![
        section(
            "index",
            "Table of Contents",
            "List every document filed for the hearing.",
            &["document_list"],
            &[],
        ),
        section(
            "order",
            "Order Granting Leave",
            "Include the order granting leave and fixing the hearing.",
            &["order_granting_leave"],
            &["order_granting_leave"],
        ),
        section(
            "record",
            "Certified Tribunal Record",
            "Reference the certified tribunal record transmitted by the decision-maker.",
            &["certified_tribunal_record"],
            &["certified_tribunal_record"],
        ),
        section(
            "further",
            "Further Affidavits and Memorandum",
            "Further materials must be served and filed within the time fixed in the leave order.",
            &["further_affidavit", "further_memorandum"],
            &[],
        ),
    ];

    let rules = vec![
        base(
            "FC-JR-HEARING-001",
            "order_granting_leave",
            "Include the order granting leave.",
            FC_IMMIGRATION_RULES,
        ),
        base(
            "FC-JR-HEARING-002",
            "certified_tribunal_record",
            "Obtain and include the certified tribunal record.",
            FC_IMMIGRATION_RULES,
        ),
        rule(
            "FC-JR-HEARING-003",
            RuleScope::Conditional,
            RulePredicate::ConditionalOnClassification {
                trigger: doc("further_affidavit"),
                required: doc("further_memorandum"),
            },
            Severity::Warning,
            "A further affidavit is usually accompanied by a further memorandum of argument.",
            FC_IMMIGRATION_RULES,
        ),
        rule(
            "FC-JR-HEARING-004",
            RuleScope::Base,
            RulePredicate::MaxPages {
                document_type: doc("further_memorandum"),
                max_pages: 20,
            },
            Severity::Warning,
            "Keep the further memorandum within 20 pages.",
            FC_RULES,
        ),
        document_list_rule("FC-JR-HEARING-005", FC_IMMIGRATION_RULES),
        pagination_rule("FC-JR-HEARING-006", FC_IMMIGRATION_RULES),
    ];

    package(
        "fc_jr_hearing",
        Forum::FederalCourtJrHearing,
        None,
        sections,
        rules,
        effective,
    )
}

fn rpd_claim(effective: NaiveDate) -> BuiltinProfile {
    let sections = vec![
        section(
            "index",
            "List of Documents",
            "Identify every document disclosed to the Division.",
            &["document_list"],
            &[],
        ),
        section(
            "claim",
            "Claim Documents",
            "Include the claim for refugee protection and the notice to appear.",
            &["application_for_protection", "basis_of_claim_form", "hearing_notice"],
            &["application_for_protection", "hearing_notice"],
        ),
        section(
            "evidence",
            "Evidence",
            "Identity, personal and country-condition evidence relied on at the hearing.",
            &[
                "identity_document",
                "supporting_affidavit",
                "country_conditions",
                "exhibit",
            ],
            &[],
        ),
        section(
            "translations",
            "Translations",
            "Translations follow the documents they translate.",
            &["translation", "translator_declaration"],
            &[],
        ),
    ];

    let rules = vec![
        base(
            "RPD-001",
            "application_for_protection",
            "File the claim for refugee protection.",
            RPD_RULES,
        ),
        base(
            "RPD-002",
            "hearing_notice",
            "Include the notice to appear for the hearing issued by the Division.",
            RPD_RULES,
        ),
        translation_rule("RPD-003", "translator_declaration", RPD_RULES),
        document_list_rule("RPD-004", RPD_RULES),
        pagination_rule("RPD-005", RPD_RULES),
        rule(
            "RPD-006",
            RuleScope::Base,
            RulePredicate::DisclosureDeadline {
                days_before_hearing: 10,
            },
            Severity::Warning,
            "Documents disclosed less than 10 days before the hearing need the Division's permission to be used.",
            RPD_RULES,
        ),
    ];

    package("rpd_claim", Forum::Rpd, None, sections, rules, effective)
}

fn rad_appeal(effective: NaiveDate) -> BuiltinProfile {
    let sections = vec![
        section(
            "index",
            "List of Documents",
            "Identify every document in the appellant's record.",
            &["document_list"],
            &[],
        ),
        section(
            "appeal",
            "Notice of Appeal and Decision",
            "Include the notice of appeal and the RPD's notice of decision with written reasons.",
            &["notice_of_appeal", "rpd_decision"],
            &["notice_of_appeal", "rpd_decision"],
        ),
        section(
            "evidence",
            "Evidence",
            "New evidence must meet the admissibility conditions for appeals.",
            &["new_evidence", "new_evidence_submissions", "supporting_affidavit"],
            &[],
        ),
        section(
            "argument",
            "Memorandum",
            "State the errors alleged and where they are found in the record.",
            &["memorandum"],
            &["memorandum"],
        ),
        section(
            "translations",
            "Translations",
            "Translations follow the documents they translate.",
            &["translation", "translator_declaration"],
            &[],
        ),
    ];

    let rules = vec![
        base("RAD-001", "notice_of_appeal", "File the notice of appeal.", RAD_RULES),
        base(
            "RAD-002",
            "rpd_decision",
            "Include the RPD notice of decision and written reasons.",
            RAD_RULES,
        ),
        base("RAD-003", "memorandum", "File the appellant's memorandum.", RAD_RULES),
        rule(
            "RAD-004",
            RuleScope::Base,
            RulePredicate::MaxPages {
                document_type: doc("memorandum"),
                max_pages: 30,
            },
            Severity::Blocking,
            "Reduce the memorandum to no more than 30 pages.",
            RAD_RULES,
        ),
        rule(
            "RAD-005",
            RuleScope::Conditional,
            RulePredicate::ConditionalOnClassification {
                trigger: doc("new_evidence"),
                required: doc("new_evidence_submissions"),
            },
            Severity::Blocking,
            "Explain how any new evidence meets the admissibility requirements.",
            RAD_RULES,
        ),
        translation_rule("RAD-006", "translator_declaration", RAD_RULES),
        document_list_rule("RAD-007", RAD_RULES),
        pagination_rule("RAD-008", RAD_RULES),
    ];

    package("rad_appeal", Forum::Rad, None, sections, rules, effective)
}

fn id_admissibility(effective: NaiveDate) -> BuiltinProfile {
    let sections = vec![
        section(
            "index",
            "List of Documents",
            "Identify every document disclosed to the Division.",
            &["document_list"],
            &[],
        ),
        section(
            "referral",
            "Referral",
            "Include the admissibility report and the notice of hearing.",
            &["section_44_report", "hearing_notice"],
            &["section_44_report", "hearing_notice"],
        ),
        section(
            "evidence",
            "Evidence",
            "Evidence relied on by the person concerned.",
            &["identity_document", "supporting_affidavit", "exhibit"],
            &[],
        ),
        section(
            "translations",
            "Translations",
            "Translations follow the documents they translate.",
            &["translation", "translator_declaration"],
            &[],
        ),
    ];

    let rules = vec![
        base(
            "ID-001",
            "section_44_report",
            "Include the section 44 report referred to the Division.",
            ID_RULES,
        ),
        base(
            "ID-002",
            "hearing_notice",
            "Include the notice of admissibility hearing.",
            ID_RULES,
        ),
        translation_rule("ID-003", "translator_declaration", ID_RULES),
        document_list_rule("ID-004", ID_RULES),
        pagination_rule("ID-005", ID_RULES),
        rule(
            "ID-006",
            RuleScope::Base,
            RulePredicate::DisclosureDeadline {
                days_before_hearing: 5,
            },
            Severity::Warning,
            "Disclose documents at least five days before the hearing.",
            ID_RULES,
        ),
    ];

    package(
        "id_admissibility",
        Forum::Id,
        None,
        sections,
        rules,
        effective,
    )
}

fn iad_appeal(subtype: &str, effective: NaiveDate) -> BuiltinProfile {
    let required_appeal: &[&str] = match subtype {
        "iad_removal_order" => &["notice_of_appeal", "removal_order"],
        _ => &["notice_of_appeal", "refusal_decision"],
    };
    let required_evidence: &[&str] = match subtype {
        "iad_sponsorship" => &["relationship_evidence"],
        "iad_residency_obligation" => &["residency_evidence"],
        _ => &[],
    };

    let sections = vec![
        section(
            "index",
            "List of Documents",
            "Identify every document disclosed to the Division.",
            &["document_list"],
            &[],
        ),
        section(
            "appeal",
            "Notice of Appeal and Decision",
            "Include the notice of appeal and the decision or order appealed.",
            &[
                "notice_of_appeal",
                "refusal_decision",
                "removal_order",
                "appeal_record",
            ],
            required_appeal,
        ),
        section(
            "evidence",
            "Evidence",
            "Evidence supporting the appeal, including humanitarian and compassionate grounds.",
            &[
                "relationship_evidence",
                "residency_evidence",
                "supporting_affidavit",
                "written_submissions",
                "exhibit",
            ],
            required_evidence,
        ),
        section(
            "translations",
            "Translations",
            "Translations follow the documents they translate.",
            &["translation", "translator_declaration"],
            &[],
        ),
    ];

    let rules = iad_rules();
    package(subtype, Forum::Iad, Some(subtype), sections, rules, effective)
}

/// Shared IAD rule set; subtype-specific rules are narrowed with `applicable_subtypes`.
fn iad_rules() -> Vec<Rule> {
    vec![
        base("IAD-001", "notice_of_appeal", "File the notice of appeal.", IAD_RULES),
        scoped(
            base(
                "IAD-002",
                "refusal_decision",
                "Include the refusal decision being appealed.",
                IAD_RULES,
            ),
            &["iad_sponsorship", "iad_residency_obligation"],
        ),
        scoped(
            base(
                "IAD-003",
                "removal_order",
                "Include the removal order being appealed.",
                IAD_RULES,
            ),
            &["iad_removal_order"],
        ),
        scoped(
            base(
                "IAD-004",
                "relationship_evidence",
                "File evidence of the genuineness of the relationship.",
                IAD_RULES,
            ),
            &["iad_sponsorship"],
        ),
        scoped(
            base(
                "IAD-005",
                "residency_evidence",
                "File evidence of physical presence and ties to Canada.",
                IAD_RULES,
            ),
            &["iad_residency_obligation"],
        ),
        scoped(
            rule(
                "IAD-006",
                RuleScope::Base,
                RulePredicate::MaxPages {
                    document_type: doc("written_submissions"),
                    max_pages: 30,
                },
                Severity::Warning,
                "Written submissions beyond 30 pages should be condensed.",
                IAD_RULES,
            ),
            &["iad_residency_obligation", "iad_removal_order"],
        ),
        translation_rule("IAD-007", "translator_declaration", IAD_RULES),
        document_list_rule("IAD-008", IAD_RULES),
        pagination_rule("IAD-009", IAD_RULES),
        rule(
            "IAD-010",
            RuleScope::Base,
            RulePredicate::DisclosureDeadline {
                days_before_hearing: 20,
            },
            Severity::Warning,
            "Provide documents to the Division and the Minister at least 20 days before the hearing.",
            IAD_RULES,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_catalog_validates() {
        for builtin in builtin_profiles() {
            builtin
                .catalog
                .validate()
                .unwrap_or_else(|err| panic!("{} invalid: {err}", builtin.profile.id));
            assert_eq!(builtin.catalog.profile_id, builtin.profile.id);
            assert_eq!(builtin.catalog.forum, builtin.profile.forum);
        }
    }

    #[test]
    fn required_section_types_have_base_rules() {
        for builtin in builtin_profiles() {
            let subtype = builtin.profile.subtype.as_deref();
            for section in &builtin.profile.sections {
                for required in &section.required_document_types {
                    let covered = builtin.catalog.rules_for(subtype).any(|rule| {
                        rule.scope == RuleScope::Base
                            && rule.predicate.required_document() == Some(required)
                    });
                    assert!(covered, "{} has no base rule for {required}", builtin.profile.id);
                }
            }
        }
    }
}
