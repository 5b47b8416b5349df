//! Rule-aware compilation of immigration filing packages.
//!
//! A pass takes a matter's classified documents, resolves the forum's compilation profile and
//! a pinned catalog version, then derives requirement statuses, rule violations, record
//! sections, a paginated table of contents and a readiness verdict. When the record is ready
//! and a binder capability is configured, the plan can be assembled into a single PDF.

pub mod binder;
pub mod catalog;
pub mod domain;
pub mod engine;
pub mod evaluation;
mod locks;
pub mod planner;
pub mod readiness;
pub mod repository;
pub mod router;
pub mod sections;
pub mod service;

#[cfg(test)]
mod tests;

pub use binder::{
    BinderAssembler, BinderAssemblyError, BinderCapability, CompiledArtifact, SourceDocumentStore,
};
#[cfg(feature = "pdf-binder")]
pub use binder::PdfBinderAssembler;
pub use catalog::{
    CatalogError, CompilationProfile, Rule, RuleCatalog, RuleCatalogStore, RulePredicate,
    Severity, StaticCatalogStore, SupportMatrix,
};
pub use domain::{
    DocumentType, Forum, MatterDocument, MatterFacts, MatterId, PresenceStatus, RequirementScope,
    UploadStatus,
};
pub use engine::{CompilationEngine, CompilationInput, CompilationOutcome};
pub use evaluation::{EvaluationConfig, RequirementStatus, RuleViolation};
pub use planner::{CompilationPlan, PaginationSummary, PlanningError, TocEntry};
pub use readiness::{ProfileRef, ReadinessIssue, ReadinessState, ReadinessVerdict};
pub use repository::{
    CompilationFingerprint, CompilationSnapshot, MatterRecord, MatterRepository, RepositoryError,
};
pub use router::compilation_router;
pub use sections::{RecordSection, SlotStatus};
pub use service::{
    CompilationError, CompilationOutputMode, CompilationService, DownloadedBinder,
    PackageRequest, PackageResponse, ReadinessRequest,
};
