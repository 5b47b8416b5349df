//! Versioned, source-cited rule catalogs and the compilation profiles that select them.

mod builtin;
mod predicate;
mod store;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{DocumentType, Forum};

pub use predicate::RulePredicate;
pub use store::{
    ProfileSummary, RuleCatalogStore, StaticCatalogStore, SupportMatrix, UnsupportedProfileFamily,
};

/// Closed severity set. Unrecognized strings are rejected when a catalog is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    Warning,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Blocking => "blocking",
            Severity::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Base,
    Conditional,
}

/// A single catalog entry citing its legal source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub code: String,
    pub scope: RuleScope,
    pub predicate: RulePredicate,
    pub severity: Severity,
    pub remediation: String,
    pub source_url: String,
    /// Empty means the rule applies to every subtype of the profile's forum.
    #[serde(default)]
    pub applicable_subtypes: Vec<String>,
}

impl Rule {
    pub fn applies_to(&self, subtype: Option<&str>) -> bool {
        if self.applicable_subtypes.is_empty() {
            return true;
        }

        subtype
            .map(|subtype| {
                self.applicable_subtypes
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(subtype))
            })
            .unwrap_or(false)
    }
}

/// Published rule set for one profile. Never mutated after publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCatalog {
    pub forum: Forum,
    pub profile_id: String,
    pub version: String,
    pub effective_date: NaiveDate,
    pub rules: Vec<Rule>,
}

impl RuleCatalog {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let catalog: RuleCatalog =
            serde_json::from_reader(reader).map_err(|source| CatalogError::Malformed {
                origin: "reader".to_string(),
                reason: source.to_string(),
            })?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path).map_err(|source| CatalogError::Malformed {
            origin: path.display().to_string(),
            reason: source.to_string(),
        })?;
        Self::from_reader(BufReader::new(file)).map_err(|error| match error {
            CatalogError::Malformed { reason, .. } => CatalogError::Malformed {
                origin: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Rules applicable to `subtype`, in catalog order.
    pub fn rules_for<'a>(&'a self, subtype: Option<&'a str>) -> impl Iterator<Item = &'a Rule> {
        self.rules.iter().filter(move |rule| rule.applies_to(subtype))
    }

    /// Structural checks run before a catalog is accepted into a store.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.version.trim().is_empty() {
            return Err(self.invalid("<catalog>", "version must not be empty"));
        }

        let mut seen = std::collections::BTreeSet::new();
        for rule in &self.rules {
            if rule.code.trim().is_empty() {
                return Err(self.invalid("<rule>", "rule code must not be empty"));
            }
            if !seen.insert(rule.code.as_str()) {
                return Err(self.invalid(&rule.code, "duplicate rule code"));
            }
            if rule.source_url.trim().is_empty() {
                return Err(self.invalid(&rule.code, "source_url is required"));
            }
            if rule.remediation.trim().is_empty() {
                return Err(self.invalid(&rule.code, "remediation text is required"));
            }
            match rule.scope {
                RuleScope::Base if rule.predicate.is_conditional() => {
                    return Err(self.invalid(
                        &rule.code,
                        "conditional predicates must use conditional scope",
                    ));
                }
                RuleScope::Base
                    if rule.predicate.is_presence() && rule.severity != Severity::Blocking =>
                {
                    return Err(self.invalid(&rule.code, "base requirements must be blocking"));
                }
                RuleScope::Conditional if !rule.predicate.is_conditional() => {
                    return Err(self.invalid(
                        &rule.code,
                        "conditional scope requires a conditional predicate",
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn invalid(&self, rule_code: &str, reason: &str) -> CatalogError {
        CatalogError::InvalidRule {
            profile_id: self.profile_id.clone(),
            version: self.version.clone(),
            rule_code: rule_code.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Expected document slot inside a record section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTemplate {
    pub section_id: String,
    pub title: String,
    pub instructions: String,
    /// Filing order of types inside the section.
    pub document_types: Vec<DocumentType>,
    pub required_document_types: Vec<DocumentType>,
}

impl SectionTemplate {
    pub fn requires(&self, document_type: &DocumentType) -> bool {
        self.required_document_types.contains(document_type)
    }
}

/// Named, versioned configuration for a forum (optionally narrowed by subtype).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationProfile {
    pub id: String,
    pub version: String,
    pub forum: Forum,
    #[serde(default)]
    pub subtype: Option<String>,
    pub sections: Vec<SectionTemplate>,
}

impl CompilationProfile {
    /// Position of `document_type` as (section index, type index) in filing order.
    pub fn precedence_of(&self, document_type: &DocumentType) -> Option<(usize, usize)> {
        self.sections
            .iter()
            .enumerate()
            .find_map(|(section_index, section)| {
                section
                    .document_types
                    .iter()
                    .position(|candidate| candidate == document_type)
                    .map(|type_index| (section_index, type_index))
            })
    }

    pub fn section_for(&self, document_type: &DocumentType) -> Option<&SectionTemplate> {
        self.precedence_of(document_type)
            .map(|(section_index, _)| &self.sections[section_index])
    }
}

/// Errors raised while resolving profiles or loading catalogs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("no compilation profile for forum {forum}{}", subtype_suffix(.subtype))]
    ProfileNotFound {
        forum: Forum,
        subtype: Option<String>,
        supported: Vec<String>,
    },
    #[error("unknown compilation profile '{profile_id}'")]
    UnknownProfile {
        profile_id: String,
        supported: Vec<String>,
    },
    #[error("catalog version '{version}' is not published for profile '{profile_id}'")]
    VersionNotFound {
        profile_id: String,
        version: String,
        available: Vec<String>,
    },
    #[error("catalog {profile_id}@{version} is already published")]
    AlreadyPublished { profile_id: String, version: String },
    #[error("catalog {profile_id}@{version} rule {rule_code} is invalid: {reason}")]
    InvalidRule {
        profile_id: String,
        version: String,
        rule_code: String,
        reason: String,
    },
    #[error("catalog from {origin} could not be parsed: {reason}")]
    Malformed { origin: String, reason: String },
}

fn subtype_suffix(subtype: &Option<String>) -> String {
    subtype
        .as_deref()
        .map(|subtype| format!(" / subtype {subtype}"))
        .unwrap_or_default()
}

impl CatalogError {
    pub const fn code(&self) -> &'static str {
        match self {
            CatalogError::ProfileNotFound { .. } | CatalogError::UnknownProfile { .. } => {
                "PROFILE_NOT_FOUND"
            }
            CatalogError::VersionNotFound { .. } => "CATALOG_VERSION_NOT_FOUND",
            CatalogError::AlreadyPublished { .. } => "CATALOG_ALREADY_PUBLISHED",
            CatalogError::InvalidRule { .. } | CatalogError::Malformed { .. } => {
                "CATALOG_INVALID"
            }
        }
    }

    /// Alternatives callers can choose instead (profile ids or versions).
    pub fn alternatives(&self) -> &[String] {
        match self {
            CatalogError::ProfileNotFound { supported, .. }
            | CatalogError::UnknownProfile { supported, .. } => supported,
            CatalogError::VersionNotFound { available, .. } => available,
            _ => &[],
        }
    }
}
