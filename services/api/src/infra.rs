use chrono::NaiveDate;
use filing_binder::workflows::compilation::{
    CompilationSnapshot, MatterId, MatterRecord, MatterRepository, RepositoryError,
    SourceDocumentStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Matter store backing the development intake endpoints and offline compiles.
#[derive(Default, Clone)]
pub(crate) struct InMemoryMatterRepository {
    records: Arc<Mutex<HashMap<MatterId, MatterRecord>>>,
    artifacts: Arc<Mutex<HashMap<MatterId, Vec<u8>>>>,
}

impl InMemoryMatterRepository {
    /// Replace the matter's intake fields, keeping its latest compilation so staleness can
    /// still be detected.
    pub(crate) fn upsert(&self, mut record: MatterRecord) {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = guard.remove(&record.matter_id) {
            record.latest_compilation = existing.latest_compilation;
        }
        guard.insert(record.matter_id.clone(), record);
    }
}

impl MatterRepository for InMemoryMatterRepository {
    fn fetch(&self, matter_id: &MatterId) -> Result<Option<MatterRecord>, RepositoryError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(matter_id).cloned())
    }

    fn store_compilation(
        &self,
        matter_id: &MatterId,
        expected_document_set_hash: &str,
        snapshot: CompilationSnapshot,
        artifact: Option<Vec<u8>>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = guard.get_mut(matter_id).ok_or(RepositoryError::NotFound)?;
        if record.document_set_hash() != expected_document_set_hash {
            return Err(RepositoryError::Conflict);
        }
        record.latest_compilation = Some(snapshot);

        let mut artifacts = self
            .artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
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
        let guard = self
            .artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(matter_id).cloned())
    }
}

/// Source PDF bytes keyed by matter and file id.
#[derive(Default, Clone)]
pub(crate) struct InMemorySourceStore {
    files: Arc<Mutex<HashMap<(MatterId, String), Vec<u8>>>>,
}

impl InMemorySourceStore {
    pub(crate) fn put(&self, matter_id: MatterId, file_id: String, bytes: Vec<u8>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((matter_id, file_id), bytes);
    }
}

impl SourceDocumentStore for InMemorySourceStore {
    fn fetch(
        &self,
        matter_id: &MatterId,
        file_id: &str,
    ) -> Result<Option<Vec<u8>>, RepositoryError> {
        let guard = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .get(&(matter_id.clone(), file_id.to_string()))
            .cloned())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filing_binder::workflows::compilation::Forum;

    #[test]
    fn upsert_keeps_the_latest_compilation() {
        let repository = InMemoryMatterRepository::default();
        let matter_id = MatterId::new("m-1");
        repository.upsert(MatterRecord::new(matter_id.clone(), Forum::Rpd));

        let hash = repository
            .fetch(&matter_id)
            .expect("fetch")
            .expect("record")
            .document_set_hash();
        let snapshot: CompilationSnapshot = serde_json::from_value(serde_json::json!({
            "fingerprint": {
                "profile_id": "rpd_claim",
                "catalog_version": "2024.1",
                "document_set_hash": hash,
            },
            "compilation_output_mode": "metadata_plan_only",
            "toc_entries": [],
            "pagination_summary": {
                "total_documents": 0,
                "total_pages": 0,
                "last_assigned_page": 0,
            },
        }))
        .expect("snapshot json");
        repository
            .store_compilation(&matter_id, &hash, snapshot, None)
            .expect("stored");

        let mut updated = MatterRecord::new(matter_id.clone(), Forum::Rpd);
        updated.catalog_version = Some("2024.1".to_string());
        repository.upsert(updated);
        let record = repository.fetch(&matter_id).expect("fetch").expect("record");
        assert!(record.latest_compilation.is_some());
    }

    #[test]
    fn stale_hash_is_a_conflict() {
        let repository = InMemoryMatterRepository::default();
        let matter_id = MatterId::new("m-2");
        repository.upsert(MatterRecord::new(matter_id.clone(), Forum::Rad));

        let snapshot: CompilationSnapshot = serde_json::from_value(serde_json::json!({
            "fingerprint": {
                "profile_id": "rad_appeal",
                "catalog_version": "2024.1",
                "document_set_hash": "0",
            },
            "compilation_output_mode": "metadata_plan_only",
            "toc_entries": [],
            "pagination_summary": {
                "total_documents": 0,
                "total_pages": 0,
                "last_assigned_page": 0,
            },
        }))
        .expect("snapshot json");
        let result = repository.store_compilation(&matter_id, "0", snapshot, None);
        assert_eq!(result, Err(RepositoryError::Conflict));
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("2025-02-30").is_err());
        assert_eq!(
            parse_date(" 2025-02-03 "),
            Ok(NaiveDate::from_ymd_opt(2025, 2, 3).expect("valid"))
        );
    }
}
