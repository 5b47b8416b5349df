use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::compilation::binder::{
    AssembledBinder, BinderAssembler, BinderAssemblyError, BinderCapability, BinderRequest,
    CancellationFlag, SourceDocumentStore,
};
use crate::workflows::compilation::catalog::{
    CompilationProfile, RuleCatalog, RuleCatalogStore, StaticCatalogStore,
};
use crate::workflows::compilation::domain::{
    DocumentType, Forum, MatterDocument, MatterId, UploadStatus,
};
use crate::workflows::compilation::engine::{
    CompilationEngine, CompilationInput, CompilationOutcome,
};
use crate::workflows::compilation::evaluation::EvaluationConfig;
use crate::workflows::compilation::repository::{
    CompilationSnapshot, MatterRecord, MatterRepository, RepositoryError,
};
use crate::workflows::compilation::service::CompilationService;
use crate::workflows::compilation::{compilation_router, MatterFacts};

pub(super) fn evaluation_config() -> EvaluationConfig {
    EvaluationConfig {
        min_classification_confidence: 0.75,
        min_ocr_confidence: 0.6,
    }
}

pub(super) fn document(
    file_id: &str,
    document_type: &str,
    pages: u32,
    sequence: u64,
) -> MatterDocument {
    MatterDocument {
        file_id: file_id.to_string(),
        filename: format!("{file_id}-{document_type}.pdf"),
        classification: DocumentType::from(document_type),
        classification_confidence: 0.95,
        alternates: Vec::new(),
        ocr_confidence: Some(0.92),
        page_count: Some(pages),
        upload_status: UploadStatus::Uploaded,
        issue_details: Vec::new(),
        upload_sequence: sequence,
        language: Some("en".to_string()),
    }
}

pub(super) fn complete_fc_jr_leave_documents() -> Vec<MatterDocument> {
    vec![
        document("f-memo", "memorandum_of_argument", 12, 5),
        document("f-ir1", "application_for_leave", 3, 1),
        document("f-affidavit", "supporting_affidavit", 6, 3),
        document("f-decision", "decision_under_review", 4, 2),
        document("f-index", "document_list", 1, 4),
    ]
}

pub(super) fn rpd_documents_without_hearing_notice() -> Vec<MatterDocument> {
    vec![
        document("f-claim", "application_for_protection", 10, 1),
        document("f-passport", "identity_document", 2, 2),
        document("f-index", "document_list", 1, 3),
    ]
}

pub(super) fn record(
    matter_id: &str,
    forum: Forum,
    documents: Vec<MatterDocument>,
) -> MatterRecord {
    let mut record = MatterRecord::new(MatterId::new(matter_id), forum);
    record.documents = documents;
    record
}

pub(super) fn standard_store() -> StaticCatalogStore {
    StaticCatalogStore::standard()
}

pub(super) fn resolve(
    store: &StaticCatalogStore,
    profile_id: &str,
) -> (CompilationProfile, Arc<RuleCatalog>) {
    let profile = store.get_profile_by_id(profile_id).expect("builtin profile");
    let version = store.latest_version(profile_id).expect("published catalog");
    let catalog = store.get_rules(profile_id, &version).expect("catalog rules");
    (profile, catalog)
}

pub(super) fn run_engine(profile_id: &str, documents: &[MatterDocument]) -> CompilationOutcome {
    let store = standard_store();
    let (profile, catalog) = resolve(&store, profile_id);
    run_engine_with(&profile, &catalog, documents)
}

pub(super) fn run_engine_with(
    profile: &CompilationProfile,
    catalog: &RuleCatalog,
    documents: &[MatterDocument],
) -> CompilationOutcome {
    let facts = MatterFacts::default();
    CompilationEngine::new(evaluation_config()).run(&CompilationInput {
        profile,
        catalog,
        documents,
        facts: &facts,
        as_of: None,
    })
    .expect("plan fits")
}

/// Next version of a builtin catalog with the rules named in `dropped` removed.
pub(super) fn relaxed_catalog(
    store: &StaticCatalogStore,
    profile_id: &str,
    version: &str,
    dropped: &[&str],
) -> RuleCatalog {
    let (_, current) = resolve(store, profile_id);
    let mut next = (*current).clone();
    next.version = version.to_string();
    next.rules.retain(|rule| !dropped.contains(&rule.code.as_str()));
    next
}

/// In-memory matter store. `pending_uploads` lands one document per store attempt before the
/// hash check, the way a concurrent upload would.
#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<MatterId, MatterRecord>>>,
    pub(super) artifacts: Arc<Mutex<HashMap<MatterId, Vec<u8>>>>,
    pub(super) pending_uploads: Arc<Mutex<Vec<MatterDocument>>>,
}

impl MemoryRepository {
    pub(super) fn seed(&self, record: MatterRecord) {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(record.matter_id.clone(), record);
    }

    pub(super) fn queue_upload(&self, document: MatterDocument) {
        self.pending_uploads
            .lock()
            .expect("upload mutex poisoned")
            .push(document);
    }

    pub(super) fn add_document(&self, matter_id: &MatterId, document: MatterDocument) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(record) = guard.get_mut(matter_id) {
            record.documents.push(document);
        }
    }

    pub(super) fn record(&self, matter_id: &MatterId) -> Option<MatterRecord> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(matter_id)
            .cloned()
    }
}

impl MatterRepository for MemoryRepository {
    fn fetch(&self, matter_id: &MatterId) -> Result<Option<MatterRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(matter_id).cloned())
    }

    fn store_compilation(
        &self,
        matter_id: &MatterId,
        expected_document_set_hash: &str,
        snapshot: CompilationSnapshot,
        artifact: Option<Vec<u8>>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(matter_id).ok_or(RepositoryError::NotFound)?;

        let upload = self.pending_uploads.lock().expect("upload mutex poisoned").pop();
        if let Some(document) = upload {
            record.documents.push(document);
        }

        if record.document_set_hash() != expected_document_set_hash {
            return Err(RepositoryError::Conflict);
        }
        record.latest_compilation = Some(snapshot);

        let mut artifacts = self.artifacts.lock().expect("artifact mutex poisoned");
        match artifact {
            Some(bytes) => {
                artifacts.insert(matter_id.clone(), bytes);
            }
            None => {
                artifacts.remove(matter_id);
            }
        }
        Ok(())
    }

    fn fetch_artifact(&self, matter_id: &MatterId) -> Result<Option<Vec<u8>>, RepositoryError> {
        let guard = self.artifacts.lock().expect("artifact mutex poisoned");
        Ok(guard.get(matter_id).cloned())
    }
}

pub(super) struct UnavailableRepository;

impl MatterRepository for UnavailableRepository {
    fn fetch(&self, _matter_id: &MatterId) -> Result<Option<MatterRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("matter store offline".to_string()))
    }

    fn store_compilation(
        &self,
        _matter_id: &MatterId,
        _expected_document_set_hash: &str,
        _snapshot: CompilationSnapshot,
        _artifact: Option<Vec<u8>>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("matter store offline".to_string()))
    }

    fn fetch_artifact(&self, _matter_id: &MatterId) -> Result<Option<Vec<u8>>, RepositoryError> {
        Err(RepositoryError::Unavailable("matter store offline".to_string()))
    }
}

/// Source bytes keyed by file id; every matter shares them.
#[derive(Default)]
pub(super) struct MemorySources {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySources {
    pub(super) fn for_documents(documents: &[MatterDocument]) -> Self {
        let files = documents
            .iter()
            .map(|doc| (doc.file_id.clone(), doc.file_id.as_bytes().to_vec()))
            .collect();
        Self {
            files: Mutex::new(files),
        }
    }
}

impl SourceDocumentStore for MemorySources {
    fn fetch(
        &self,
        _matter_id: &MatterId,
        file_id: &str,
    ) -> Result<Option<Vec<u8>>, RepositoryError> {
        let guard = self.files.lock().expect("sources mutex poisoned");
        Ok(guard.get(file_id).cloned())
    }
}

/// Concatenates source bytes and reports the planned page count.
pub(super) struct ConcatAssembler;

impl BinderAssembler for ConcatAssembler {
    fn assemble(
        &self,
        request: &BinderRequest,
        cancel: &CancellationFlag,
    ) -> Result<AssembledBinder, BinderAssemblyError> {
        cancel.check()?;
        Ok(AssembledBinder {
            bytes: request
                .sources
                .iter()
                .flat_map(|source| source.bytes.iter().copied())
                .collect(),
            page_count: request
                .sources
                .iter()
                .map(|source| source.entry.page_count())
                .sum(),
        })
    }
}

pub(super) struct BrokenAssembler;

impl BinderAssembler for BrokenAssembler {
    fn assemble(
        &self,
        request: &BinderRequest,
        _cancel: &CancellationFlag,
    ) -> Result<AssembledBinder, BinderAssemblyError> {
        let file_id = request
            .sources
            .first()
            .map(|source| source.entry.file_id.clone())
            .unwrap_or_default();
        Err(BinderAssemblyError::Malformed {
            file_id,
            reason: "invalid xref table".to_string(),
        })
    }
}

pub(super) type MemoryService = CompilationService<MemoryRepository, StaticCatalogStore>;

pub(super) fn build_service() -> (MemoryService, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = CompilationService::new(
        Arc::clone(&repository),
        Arc::new(standard_store()),
        evaluation_config(),
    );
    (service, repository)
}

pub(super) fn build_service_with_binder(
    assembler: Arc<dyn BinderAssembler>,
    documents: &[MatterDocument],
) -> (MemoryService, Arc<MemoryRepository>) {
    let (service, repository) = build_service();
    let capability = BinderCapability::new(
        assembler,
        Arc::new(MemorySources::for_documents(documents)),
        Duration::from_secs(5),
    );
    (service.with_binder(capability), repository)
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    compilation_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
