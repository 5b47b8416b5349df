use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::super::domain::Forum;
use super::builtin::{builtin_profiles, UNSUPPORTED_FAMILIES};
use super::{CatalogError, CompilationProfile, RuleCatalog};

/// Read-only lookup of profiles and published catalogs.
pub trait RuleCatalogStore: Send + Sync {
    fn get_profile(
        &self,
        forum: Forum,
        subtype: Option<&str>,
    ) -> Result<CompilationProfile, CatalogError>;
    fn get_profile_by_id(&self, profile_id: &str) -> Result<CompilationProfile, CatalogError>;
    fn get_rules(&self, profile_id: &str, version: &str) -> Result<Arc<RuleCatalog>, CatalogError>;
    fn latest_version(&self, profile_id: &str) -> Result<String, CatalogError>;
    fn support_matrix(&self) -> SupportMatrix;
}

/// Supported profiles grouped by forum plus the families that are explicitly unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportMatrix {
    pub supported_profiles_by_forum: BTreeMap<Forum, Vec<ProfileSummary>>,
    pub unsupported_profile_families: Vec<UnsupportedProfileFamily>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub profile_id: String,
    pub profile_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub catalog_versions: Vec<String>,
    pub latest_catalog_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsupportedProfileFamily {
    pub forum: Forum,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub reason: String,
}

/// In-process catalog store. Catalogs are published before the store is shared; lookups take
/// no locks.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogStore {
    profiles: Vec<CompilationProfile>,
    catalogs: BTreeMap<String, Vec<Arc<RuleCatalog>>>,
}

impl StaticCatalogStore {
    pub fn standard() -> Self {
        let mut store = Self::default();
        for builtin in builtin_profiles() {
            store.profiles.push(builtin.profile);
            store
                .catalogs
                .entry(builtin.catalog.profile_id.clone())
                .or_default()
                .push(Arc::new(builtin.catalog));
        }
        store
    }

    /// Register an additional profile (e.g. a new subtype).
    pub fn register_profile(&mut self, profile: CompilationProfile) -> Result<(), CatalogError> {
        if self.profiles.iter().any(|existing| existing.id == profile.id) {
            return Err(CatalogError::AlreadyPublished {
                profile_id: profile.id,
                version: profile.version,
            });
        }
        self.profiles.push(profile);
        Ok(())
    }

    /// Append a new catalog version. Published versions are never replaced.
    pub fn publish(&mut self, catalog: RuleCatalog) -> Result<(), CatalogError> {
        catalog.validate()?;
        let profile = self.get_profile_by_id(&catalog.profile_id)?;
        if profile.forum != catalog.forum {
            return Err(CatalogError::InvalidRule {
                profile_id: catalog.profile_id.clone(),
                version: catalog.version.clone(),
                rule_code: "<catalog>".to_string(),
                reason: format!(
                    "catalog forum {} does not match profile forum {}",
                    catalog.forum, profile.forum
                ),
            });
        }

        let versions = self.catalogs.entry(catalog.profile_id.clone()).or_default();
        if versions.iter().any(|existing| existing.version == catalog.version) {
            return Err(CatalogError::AlreadyPublished {
                profile_id: catalog.profile_id,
                version: catalog.version,
            });
        }
        versions.push(Arc::new(catalog));
        Ok(())
    }

    /// Publish every `*.json` catalog in `dir`, in file-name order.
    pub fn publish_dir(&mut self, dir: &Path) -> Result<usize, CatalogError> {
        let entries = std::fs::read_dir(dir).map_err(|source| CatalogError::Malformed {
            origin: dir.display().to_string(),
            reason: source.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
            .collect();
        paths.sort();

        for path in &paths {
            self.publish(RuleCatalog::from_path(path)?)?;
        }
        Ok(paths.len())
    }

    fn profile_ids_for(&self, forum: Forum) -> Vec<String> {
        let ids: Vec<String> = self
            .profiles
            .iter()
            .filter(|profile| profile.forum == forum)
            .map(|profile| profile.id.clone())
            .collect();
        if ids.is_empty() {
            self.all_profile_ids()
        } else {
            ids
        }
    }

    fn all_profile_ids(&self) -> Vec<String> {
        self.profiles.iter().map(|profile| profile.id.clone()).collect()
    }

    fn versions_of(&self, profile_id: &str) -> &[Arc<RuleCatalog>] {
        self.catalogs
            .get(profile_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn latest_catalog(&self, profile_id: &str) -> Option<&Arc<RuleCatalog>> {
        self.versions_of(profile_id).iter().max_by(|a, b| {
            a.effective_date
                .cmp(&b.effective_date)
                .then_with(|| a.version.cmp(&b.version))
        })
    }
}

impl RuleCatalogStore for StaticCatalogStore {
    fn get_profile(
        &self,
        forum: Forum,
        subtype: Option<&str>,
    ) -> Result<CompilationProfile, CatalogError> {
        let subtype = subtype.map(str::trim).filter(|value| !value.is_empty());

        self.profiles
            .iter()
            .find(|profile| {
                profile.forum == forum
                    && match (profile.subtype.as_deref(), subtype) {
                        (None, None) => true,
                        (Some(expected), Some(requested)) => {
                            expected.eq_ignore_ascii_case(requested)
                        }
                        (None, Some(requested)) => profile.id.eq_ignore_ascii_case(requested),
                        _ => false,
                    }
            })
            .cloned()
            .ok_or_else(|| CatalogError::ProfileNotFound {
                forum,
                subtype: subtype.map(str::to_string),
                supported: self.profile_ids_for(forum),
            })
    }

    fn get_profile_by_id(&self, profile_id: &str) -> Result<CompilationProfile, CatalogError> {
        self.profiles
            .iter()
            .find(|profile| profile.id == profile_id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownProfile {
                profile_id: profile_id.to_string(),
                supported: self.all_profile_ids(),
            })
    }

    fn get_rules(&self, profile_id: &str, version: &str) -> Result<Arc<RuleCatalog>, CatalogError> {
        self.get_profile_by_id(profile_id)?;
        self.versions_of(profile_id)
            .iter()
            .find(|catalog| catalog.version == version)
            .cloned()
            .ok_or_else(|| CatalogError::VersionNotFound {
                profile_id: profile_id.to_string(),
                version: version.to_string(),
                available: self
                    .versions_of(profile_id)
                    .iter()
                    .map(|catalog| catalog.version.clone())
                    .collect(),
            })
    }

    fn latest_version(&self, profile_id: &str) -> Result<String, CatalogError> {
        self.get_profile_by_id(profile_id)?;
        self.latest_catalog(profile_id)
            .map(|catalog| catalog.version.clone())
            .ok_or_else(|| CatalogError::VersionNotFound {
                profile_id: profile_id.to_string(),
                version: "latest".to_string(),
                available: Vec::new(),
            })
    }

    fn support_matrix(&self) -> SupportMatrix {
        let mut supported_profiles_by_forum: BTreeMap<Forum, Vec<ProfileSummary>> =
            BTreeMap::new();

        for profile in &self.profiles {
            let Some(latest) = self.latest_catalog(&profile.id) else {
                continue;
            };
            supported_profiles_by_forum
                .entry(profile.forum)
                .or_default()
                .push(ProfileSummary {
                    profile_id: profile.id.clone(),
                    profile_version: profile.version.clone(),
                    subtype: profile.subtype.clone(),
                    catalog_versions: self
                        .versions_of(&profile.id)
                        .iter()
                        .map(|catalog| catalog.version.clone())
                        .collect(),
                    latest_catalog_version: latest.version.clone(),
                });
        }

        let unsupported_profile_families = UNSUPPORTED_FAMILIES
            .iter()
            .map(|(forum, subtype, reason)| UnsupportedProfileFamily {
                forum: *forum,
                subtype: subtype.map(str::to_string),
                reason: (*reason).to_string(),
            })
            .collect();

        SupportMatrix {
            supported_profiles_by_forum,
            unsupported_profile_families,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::compilation::catalog::{Rule, RulePredicate, RuleScope, Severity};
    use crate::workflows::compilation::domain::DocumentType;
    use chrono::NaiveDate;

    #[test]
    fn resolves_profiles_by_forum_and_subtype() {
        let store = StaticCatalogStore::standard();
        let rpd = store.get_profile(Forum::Rpd, None).expect("rpd profile");
        assert_eq!(rpd.id, "rpd_claim");

        let sponsorship = store
            .get_profile(Forum::Iad, Some("IAD_Sponsorship"))
            .expect("iad sponsorship profile");
        assert_eq!(sponsorship.id, "iad_sponsorship");
    }

    #[test]
    fn unsupported_subtype_lists_alternatives() {
        let store = StaticCatalogStore::standard();
        let error = store
            .get_profile(Forum::Iad, None)
            .expect_err("iad requires a subtype");
        match error {
            CatalogError::ProfileNotFound { supported, .. } => {
                assert_eq!(
                    supported,
                    vec![
                        "iad_sponsorship".to_string(),
                        "iad_residency_obligation".to_string(),
                        "iad_removal_order".to_string(),
                    ]
                );
            }
            other => panic!("unexpected error {other:?}"),
        }

        let ircc = store
            .get_profile(Forum::IrccApplication, None)
            .expect_err("ircc is unsupported");
        assert_eq!(ircc.code(), "PROFILE_NOT_FOUND");
        assert!(!ircc.alternatives().is_empty());
    }

    #[test]
    fn publish_appends_versions_and_rejects_duplicates() {
        let mut store = StaticCatalogStore::standard();
        let current = store
            .get_rules("rpd_claim", "2024.1")
            .expect("builtin catalog");

        let mut next = (*current).clone();
        next.version = "2025.1".to_string();
        next.effective_date = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
        next.rules.push(Rule {
            code: "RPD-100".to_string(),
            scope: RuleScope::Base,
            predicate: RulePredicate::DocumentPresent {
                document_type: DocumentType::from("basis_of_claim_form"),
            },
            severity: Severity::Blocking,
            remediation: "File the Basis of Claim form.".to_string(),
            source_url: "https://laws-lois.justice.gc.ca/eng/regulations/SOR-2012-256/"
                .to_string(),
            applicable_subtypes: Vec::new(),
        });

        store.publish(next.clone()).expect("new version publishes");
        assert_eq!(store.latest_version("rpd_claim").expect("latest"), "2025.1");
        assert_eq!(
            store.get_rules("rpd_claim", "2024.1").expect("v1 retained").rules,
            current.rules
        );

        let duplicate = store.publish(next).expect_err("versions are immutable");
        assert!(matches!(duplicate, CatalogError::AlreadyPublished { .. }));
    }

    #[test]
    fn unknown_version_reports_available_versions() {
        let store = StaticCatalogStore::standard();
        let error = store
            .get_rules("fc_jr_leave", "1999.1")
            .expect_err("version missing");
        assert_eq!(error.code(), "CATALOG_VERSION_NOT_FOUND");
        assert_eq!(error.alternatives(), ["2024.1".to_string()]);
    }

    #[test]
    fn support_matrix_groups_profiles_by_forum() {
        let matrix = StaticCatalogStore::standard().support_matrix();
        let iad = matrix
            .supported_profiles_by_forum
            .get(&Forum::Iad)
            .expect("iad supported");
        assert_eq!(iad.len(), 3);
        assert!(!matrix
            .supported_profiles_by_forum
            .contains_key(&Forum::IrccApplication));
        assert!(matrix
            .unsupported_profile_families
            .iter()
            .any(|family| family.forum == Forum::IrccApplication));
    }
}
