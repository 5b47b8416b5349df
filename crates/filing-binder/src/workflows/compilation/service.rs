use std::sync::{Arc, PoisonError};

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::binder::{BinderCapability, BinderOutput, CompiledArtifact};
use super::catalog::{
    CatalogError, CompilationProfile, RuleCatalog, RuleCatalogStore, Severity, SupportMatrix,
};
use super::domain::{Forum, MatterId};
use super::engine::{CompilationEngine, CompilationInput, CompilationOutcome};
use super::evaluation::{EvaluationConfig, RuleViolation};
use super::locks::MatterLocks;
use super::planner::{PaginationSummary, TocEntry};
use super::readiness::{ProfileRef, ReadinessIssue, ReadinessState};
use super::repository::{
    CompilationFingerprint, CompilationSnapshot, MatterRecord, MatterRepository, RepositoryError,
};
use super::sections::RecordSection;

const MAX_SNAPSHOT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilationOutputMode {
    #[default]
    MetadataPlanOnly,
    CompiledPdf,
}

impl CompilationOutputMode {
    pub const fn label(self) -> &'static str {
        match self {
            CompilationOutputMode::MetadataPlanOnly => "metadata_plan_only",
            CompilationOutputMode::CompiledPdf => "compiled_pdf",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metadata_plan_only" | "metadata" => Some(Self::MetadataPlanOnly),
            "compiled_pdf" | "pdf" => Some(Self::CompiledPdf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessRequest {
    #[serde(default)]
    pub forum: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub catalog_version: Option<String>,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    #[serde(default)]
    pub compilation_output_mode: Option<CompilationOutputMode>,
    #[serde(default)]
    pub catalog_version: Option<String>,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Package response. Violations are always surfaced, whatever the output mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageResponse {
    pub matter_id: MatterId,
    pub is_ready: bool,
    pub compilation_profile: ProfileRef,
    pub catalog_version: String,
    pub document_set_hash: String,
    pub compilation_output_mode: CompilationOutputMode,
    pub toc_entries: Vec<TocEntry>,
    pub pagination_summary: PaginationSummary,
    pub rule_violations: Vec<RuleViolation>,
    pub record_sections: Vec<RecordSection>,
    pub compiled_artifact: Option<CompiledArtifact>,
    pub warnings: Vec<ReadinessIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedBinder {
    pub filename: String,
    pub sha256: String,
    pub bytes: Vec<u8>,
}

/// How the caller asked for a profile.
enum ProfileSelection {
    ById {
        profile_id: String,
        forum: Option<Forum>,
    },
    ByForum {
        forum: Forum,
        subtype: Option<String>,
    },
    FromMatter,
}

impl ProfileSelection {
    fn from_request(request: &ReadinessRequest) -> Result<Self, CompilationError> {
        let forum = request
            .forum
            .as_deref()
            .map(|raw| {
                Forum::parse(raw).ok_or_else(|| {
                    let expected: Vec<&str> = Forum::ordered().iter().map(|f| f.as_str()).collect();
                    CompilationError::ValidationInput(format!(
                        "unknown forum '{raw}'; expected one of {}",
                        expected.join(", ")
                    ))
                })
            })
            .transpose()?;

        let selection = match (request.profile_id.as_deref(), forum) {
            (Some(profile_id), forum) => ProfileSelection::ById {
                profile_id: profile_id.trim().to_string(),
                forum,
            },
            (None, Some(forum)) => ProfileSelection::ByForum {
                forum,
                subtype: request.subtype.clone(),
            },
            (None, None) if request.subtype.is_some() => {
                return Err(CompilationError::ValidationInput(
                    "subtype requires a forum".to_string(),
                ));
            }
            (None, None) => ProfileSelection::FromMatter,
        };
        Ok(selection)
    }
}

struct Resolved {
    profile: CompilationProfile,
    catalog: Arc<RuleCatalog>,
}

impl Resolved {
    fn profile_ref(&self) -> ProfileRef {
        ProfileRef {
            id: self.profile.id.clone(),
            version: self.profile.version.clone(),
        }
    }

    fn fingerprint(&self, document_set_hash: &str) -> CompilationFingerprint {
        CompilationFingerprint {
            profile_id: self.profile.id.clone(),
            catalog_version: self.catalog.version.clone(),
            document_set_hash: document_set_hash.to_string(),
        }
    }
}

/// Service composing the catalog store, matter repository, engine and optional binder.
pub struct CompilationService<R, S> {
    repository: Arc<R>,
    catalogs: Arc<S>,
    engine: Arc<CompilationEngine>,
    binder: Option<BinderCapability>,
    locks: MatterLocks,
}

impl<R, S> CompilationService<R, S>
where
    R: MatterRepository + 'static,
    S: RuleCatalogStore + 'static,
{
    pub fn new(repository: Arc<R>, catalogs: Arc<S>, config: EvaluationConfig) -> Self {
        Self {
            repository,
            catalogs,
            engine: Arc::new(CompilationEngine::new(config)),
            binder: None,
            locks: MatterLocks::default(),
        }
    }

    pub fn with_binder(mut self, capability: BinderCapability) -> Self {
        self.binder = Some(capability);
        self
    }

    pub fn binder_enabled(&self) -> bool {
        self.binder.is_some()
    }

    pub fn support_matrix(&self) -> SupportMatrix {
        self.catalogs.support_matrix()
    }

    /// Evaluate readiness against the requested (or the matter's) profile and catalog version.
    pub fn readiness(
        &self,
        matter_id: &MatterId,
        request: &ReadinessRequest,
    ) -> Result<ReadinessState, CompilationError> {
        let selection = ProfileSelection::from_request(request)?;
        let lock = self.locks.lock_for(matter_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let record = self.fetch_record(matter_id)?;
        let document_set_hash = record.document_set_hash();
        let resolved = self.resolve(&record, &selection, request.catalog_version.as_deref())?;
        let outcome = self.run_engine(&record, &resolved, request.as_of)?;

        let fingerprint = resolved.fingerprint(&document_set_hash);
        let latest_compilation = record
            .latest_compilation
            .filter(|snapshot| snapshot.fingerprint == fingerprint);

        info!(
            matter_id = %matter_id,
            profile = %resolved.profile.id,
            catalog_version = %resolved.catalog.version,
            is_ready = outcome.verdict.is_ready,
            blocking = outcome.verdict.blocking_issues.len(),
            "readiness evaluated"
        );

        Ok(ReadinessState {
            is_ready: outcome.verdict.is_ready,
            profile: resolved.profile_ref(),
            catalog_version: resolved.catalog.version.clone(),
            document_set_hash,
            missing_required_items: outcome.verdict.missing_required_items,
            blocking_issues: outcome.verdict.blocking_issues,
            warnings: outcome.verdict.warnings,
            requirement_statuses: outcome.requirement_statuses,
            latest_compilation,
        })
    }

    /// Plan the package and, when requested and ready, assemble the binder. The snapshot is
    /// stored only if the document set did not change while compiling.
    pub fn package(
        &self,
        matter_id: &MatterId,
        request: &PackageRequest,
    ) -> Result<PackageResponse, CompilationError> {
        let requested_mode = request.compilation_output_mode.unwrap_or_default();
        let lock = self.locks.lock_for(matter_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        for attempt in 1..=MAX_SNAPSHOT_ATTEMPTS {
            let record = self.fetch_record(matter_id)?;
            let document_set_hash = record.document_set_hash();
            let resolved = self.resolve(
                &record,
                &ProfileSelection::FromMatter,
                request.catalog_version.as_deref(),
            )?;
            let outcome = self.run_engine(&record, &resolved, request.as_of)?;

            let mut warnings = outcome.verdict.warnings.clone();
            let mut output_mode = requested_mode;
            let mut binder_output: Option<BinderOutput> = None;

            if requested_mode == CompilationOutputMode::CompiledPdf {
                if !outcome.verdict.is_ready {
                    warn!(
                        matter_id = %matter_id,
                        blocking = outcome.verdict.blocking_issues.len(),
                        "compiled_pdf requested while blocking issues remain"
                    );
                    return Err(CompilationError::PolicyBlocked {
                        blocking_issues: outcome.verdict.blocking_issues,
                    });
                }

                let capability = self
                    .binder
                    .as_ref()
                    .ok_or(CompilationError::BinderUnavailable)?;
                match capability.compile(matter_id, &outcome.plan) {
                    Ok(output) => binder_output = Some(output),
                    Err(error) => {
                        warn!(
                            matter_id = %matter_id,
                            error = %error,
                            "binder assembly failed; falling back to metadata plan"
                        );
                        output_mode = CompilationOutputMode::MetadataPlanOnly;
                        warnings.push(ReadinessIssue {
                            code: error.code().to_string(),
                            severity: Severity::Warning,
                            message: error.to_string(),
                            remediation: "Replace the affected source PDF or confirm its page count, then request compiled_pdf again.".to_string(),
                            source_url: None,
                            file_ids: Vec::new(),
                        });
                    }
                }
            }

            let (compiled_artifact, artifact_bytes) = match binder_output {
                Some(BinderOutput { artifact, bytes }) => (Some(artifact), Some(bytes)),
                None => (None, None),
            };
            let snapshot = CompilationSnapshot {
                fingerprint: resolved.fingerprint(&document_set_hash),
                compilation_output_mode: output_mode,
                toc_entries: outcome.plan.toc_entries.clone(),
                pagination_summary: outcome.plan.pagination_summary.clone(),
                compiled_artifact: compiled_artifact.clone(),
            };

            match self.repository.store_compilation(
                matter_id,
                &document_set_hash,
                snapshot,
                artifact_bytes,
            ) {
                Ok(()) => {
                    info!(
                        matter_id = %matter_id,
                        mode = output_mode.label(),
                        documents = outcome.plan.pagination_summary.total_documents,
                        pages = outcome.plan.pagination_summary.total_pages,
                        "package compiled"
                    );
                    return Ok(PackageResponse {
                        matter_id: matter_id.clone(),
                        is_ready: outcome.verdict.is_ready,
                        compilation_profile: resolved.profile_ref(),
                        catalog_version: resolved.catalog.version.clone(),
                        document_set_hash,
                        compilation_output_mode: output_mode,
                        toc_entries: outcome.plan.toc_entries,
                        pagination_summary: outcome.plan.pagination_summary,
                        rule_violations: outcome.rule_violations,
                        record_sections: outcome.record_sections,
                        compiled_artifact,
                        warnings,
                    });
                }
                Err(RepositoryError::Conflict) => {
                    warn!(
                        matter_id = %matter_id,
                        attempt,
                        "document set changed during compilation; recomputing"
                    );
                }
                Err(RepositoryError::NotFound) => {
                    return Err(CompilationError::MatterNotFound(matter_id.clone()));
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(CompilationError::StaleSnapshot {
            attempts: MAX_SNAPSHOT_ATTEMPTS,
        })
    }

    /// Binder bytes for the latest compilation, if it is a current compiled PDF.
    pub fn download(&self, matter_id: &MatterId) -> Result<DownloadedBinder, CompilationError> {
        let lock = self.locks.lock_for(matter_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let record = self.fetch_record(matter_id)?;
        let metadata_only = || CompilationError::MetadataOnly(matter_id.clone());
        let snapshot = record.latest_compilation.as_ref().ok_or_else(metadata_only)?;
        let artifact = match (&snapshot.compilation_output_mode, &snapshot.compiled_artifact) {
            (CompilationOutputMode::CompiledPdf, Some(artifact)) => artifact,
            _ => return Err(metadata_only()),
        };

        let stale_hash = snapshot.fingerprint.document_set_hash != record.document_set_hash();
        let stale_catalog = record
            .catalog_version
            .as_deref()
            .is_some_and(|pinned| pinned != snapshot.fingerprint.catalog_version);
        if stale_hash || stale_catalog {
            return Err(CompilationError::StaleCompilation(matter_id.clone()));
        }

        let bytes = self
            .repository
            .fetch_artifact(matter_id)?
            .ok_or_else(metadata_only)?;
        Ok(DownloadedBinder {
            filename: artifact.filename.clone(),
            sha256: artifact.sha256.clone(),
            bytes,
        })
    }

    fn fetch_record(&self, matter_id: &MatterId) -> Result<MatterRecord, CompilationError> {
        match self.repository.fetch(matter_id) {
            Ok(Some(record)) => Ok(record),
            Ok(None) | Err(RepositoryError::NotFound) => {
                Err(CompilationError::MatterNotFound(matter_id.clone()))
            }
            Err(other) => Err(other.into()),
        }
    }

    fn resolve(
        &self,
        record: &MatterRecord,
        selection: &ProfileSelection,
        catalog_version: Option<&str>,
    ) -> Result<Resolved, CompilationError> {
        let profile = match selection {
            ProfileSelection::ById { profile_id, forum } => {
                let profile = self.catalogs.get_profile_by_id(profile_id)?;
                let expected_forum = forum.unwrap_or(record.forum);
                if profile.forum != expected_forum {
                    return Err(CompilationError::ValidationInput(format!(
                        "profile '{}' belongs to forum {}, not {}",
                        profile.id, profile.forum, expected_forum
                    )));
                }
                profile
            }
            ProfileSelection::ByForum { forum, subtype } => {
                let subtype = subtype.as_deref().or(if *forum == record.forum {
                    record.subtype.as_deref()
                } else {
                    None
                });
                self.catalogs.get_profile(*forum, subtype)?
            }
            ProfileSelection::FromMatter => match record.compilation_profile_id.as_deref() {
                Some(profile_id) => self.catalogs.get_profile_by_id(profile_id)?,
                None => self
                    .catalogs
                    .get_profile(record.forum, record.subtype.as_deref())?,
            },
        };

        let version = match catalog_version.or(record.catalog_version.as_deref()) {
            Some(version) => version.trim().to_string(),
            None => self.catalogs.latest_version(&profile.id)?,
        };
        let catalog = self.catalogs.get_rules(&profile.id, &version)?;

        Ok(Resolved { profile, catalog })
    }

    fn run_engine(
        &self,
        record: &MatterRecord,
        resolved: &Resolved,
        as_of: Option<NaiveDate>,
    ) -> Result<CompilationOutcome, CompilationError> {
        self.engine
            .run(&CompilationInput {
                profile: &resolved.profile,
                catalog: &resolved.catalog,
                documents: &record.documents,
                facts: &record.facts,
                as_of,
            })
            .map_err(|err| CompilationError::ValidationInput(err.to_string()))
    }
}

/// Error raised by the compilation service. Every variant maps to a stable code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompilationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("invalid request: {0}")]
    ValidationInput(String),
    #[error("matter {0} not found")]
    MatterNotFound(MatterId),
    #[error("compiled binder blocked by {} unresolved issue(s)", .blocking_issues.len())]
    PolicyBlocked { blocking_issues: Vec<ReadinessIssue> },
    #[error("binder assembly is not enabled on this deployment")]
    BinderUnavailable,
    #[error("latest compilation for matter {0} is metadata-only")]
    MetadataOnly(MatterId),
    #[error("documents for matter {0} changed since the binder was compiled")]
    StaleCompilation(MatterId),
    #[error("document set kept changing; gave up after {attempts} attempts")]
    StaleSnapshot { attempts: usize },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CompilationError {
    pub fn code(&self) -> &'static str {
        match self {
            CompilationError::Catalog(error) => error.code(),
            CompilationError::ValidationInput(_) => "VALIDATION_INPUT",
            CompilationError::MatterNotFound(_) => "MATTER_NOT_FOUND",
            CompilationError::PolicyBlocked { .. } => "POLICY_BLOCKED",
            CompilationError::BinderUnavailable => "BINDER_UNAVAILABLE",
            CompilationError::MetadataOnly(_) => "METADATA_ONLY",
            CompilationError::StaleCompilation(_) => "STALE_COMPILATION",
            CompilationError::StaleSnapshot { .. } => "STALE_SNAPSHOT",
            CompilationError::Repository(RepositoryError::NotFound) => "MATTER_NOT_FOUND",
            CompilationError::Repository(RepositoryError::Conflict) => "STALE_SNAPSHOT",
            CompilationError::Repository(RepositoryError::Unavailable(_)) => {
                "REPOSITORY_UNAVAILABLE"
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CompilationError::Catalog(
                CatalogError::ProfileNotFound { .. }
                | CatalogError::UnknownProfile { .. }
                | CatalogError::VersionNotFound { .. },
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            CompilationError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CompilationError::ValidationInput(_) => StatusCode::BAD_REQUEST,
            CompilationError::MatterNotFound(_)
            | CompilationError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            CompilationError::PolicyBlocked { .. }
            | CompilationError::MetadataOnly(_)
            | CompilationError::StaleCompilation(_)
            | CompilationError::StaleSnapshot { .. }
            | CompilationError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            CompilationError::BinderUnavailable => StatusCode::NOT_IMPLEMENTED,
            CompilationError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    pub fn remediation(&self) -> String {
        match self {
            CompilationError::Catalog(CatalogError::VersionNotFound { available, .. }) => {
                format!("Request one of the published catalog versions: {}.", available.join(", "))
            }
            CompilationError::Catalog(error) => match error.alternatives() {
                [] => "Check the catalog configuration and reload.".to_string(),
                supported => format!(
                    "Choose a supported compilation profile: {}.",
                    supported.join(", ")
                ),
            },
            CompilationError::ValidationInput(_) => {
                "Correct the request body and retry.".to_string()
            }
            CompilationError::MatterNotFound(_)
            | CompilationError::Repository(RepositoryError::NotFound) => {
                "Create the matter through intake before requesting compilation.".to_string()
            }
            CompilationError::PolicyBlocked { .. } => {
                "Resolve every blocking issue listed, or request metadata_plan_only for a preview."
                    .to_string()
            }
            CompilationError::BinderUnavailable => {
                "Request metadata_plan_only or enable the binder on this deployment.".to_string()
            }
            CompilationError::MetadataOnly(_) => {
                "Request a compiled_pdf package before downloading.".to_string()
            }
            CompilationError::StaleCompilation(_) => {
                "Documents changed since compilation; request a new compiled_pdf package."
                    .to_string()
            }
            CompilationError::StaleSnapshot { .. }
            | CompilationError::Repository(RepositoryError::Conflict) => {
                "Uploads are still in progress; retry once they settle.".to_string()
            }
            CompilationError::Repository(RepositoryError::Unavailable(_)) => {
                "The matter store is unavailable; retry shortly.".to_string()
            }
        }
    }

    /// Citation for the first blocking rule, when the failure stems from one.
    pub fn source_url(&self) -> Option<&str> {
        match self {
            CompilationError::PolicyBlocked { blocking_issues } => blocking_issues
                .iter()
                .find_map(|issue| issue.source_url.as_deref()),
            _ => None,
        }
    }

    pub fn alternatives(&self) -> &[String] {
        match self {
            CompilationError::Catalog(error) => error.alternatives(),
            _ => &[],
        }
    }
}
