use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::binder::CompiledArtifact;
use super::domain::{Forum, MatterDocument, MatterFacts, MatterId};
use super::planner::{PaginationSummary, TocEntry};
use super::service::CompilationOutputMode;

/// Per-matter record owned by the matter store. The engine reads it and only writes the
/// latest compilation snapshot back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatterRecord {
    pub matter_id: MatterId,
    pub forum: Forum,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub compilation_profile_id: Option<String>,
    /// Catalog version pinned for reproducible compilations.
    #[serde(default)]
    pub catalog_version: Option<String>,
    #[serde(default)]
    pub facts: MatterFacts,
    #[serde(default)]
    pub documents: Vec<MatterDocument>,
    #[serde(default)]
    pub latest_compilation: Option<CompilationSnapshot>,
}

#[derive(Serialize)]
struct HashInput<'a> {
    forum: Forum,
    subtype: Option<&'a str>,
    compilation_profile_id: Option<&'a str>,
    facts: &'a MatterFacts,
    documents: Vec<&'a MatterDocument>,
}

impl MatterRecord {
    pub fn new(matter_id: MatterId, forum: Forum) -> Self {
        Self {
            matter_id,
            forum,
            subtype: None,
            compilation_profile_id: None,
            catalog_version: None,
            facts: MatterFacts::default(),
            documents: Vec::new(),
            latest_compilation: None,
        }
    }

    /// SHA-256 over the inputs that affect compilation, independent of document order.
    pub fn document_set_hash(&self) -> String {
        let mut documents: Vec<&MatterDocument> = self.documents.iter().collect();
        documents.sort_by(|a, b| a.file_id.cmp(&b.file_id));

        let input = HashInput {
            forum: self.forum,
            subtype: self.subtype.as_deref(),
            compilation_profile_id: self.compilation_profile_id.as_deref(),
            facts: &self.facts,
            documents,
        };
        // Serializing plain structs, strings and numbers cannot fail.
        let canonical = serde_json::to_vec(&input).unwrap_or_default();
        format!("{:x}", Sha256::digest(&canonical))
    }
}

/// Cache key for derived views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationFingerprint {
    pub profile_id: String,
    pub catalog_version: String,
    pub document_set_hash: String,
}

/// Persisted result of the most recent package request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationSnapshot {
    pub fingerprint: CompilationFingerprint,
    pub compilation_output_mode: CompilationOutputMode,
    pub toc_entries: Vec<TocEntry>,
    pub pagination_summary: PaginationSummary,
    #[serde(default)]
    pub compiled_artifact: Option<CompiledArtifact>,
}

/// Matter store consumed by the compilation service.
pub trait MatterRepository: Send + Sync {
    fn fetch(&self, matter_id: &MatterId) -> Result<Option<MatterRecord>, RepositoryError>;

    /// Persist `snapshot` (and binder bytes, when compiled) only if the stored document set
    /// still hashes to `expected_document_set_hash`; otherwise `Conflict`.
    fn store_compilation(
        &self,
        matter_id: &MatterId,
        expected_document_set_hash: &str,
        snapshot: CompilationSnapshot,
        artifact: Option<Vec<u8>>,
    ) -> Result<(), RepositoryError>;

    fn fetch_artifact(&self, matter_id: &MatterId) -> Result<Option<Vec<u8>>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record changed concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::compilation::domain::{DocumentType, UploadStatus};

    fn document(file_id: &str) -> MatterDocument {
        MatterDocument {
            file_id: file_id.to_string(),
            filename: format!("{file_id}.pdf"),
            classification: DocumentType::from("exhibit"),
            classification_confidence: 0.9,
            alternates: Vec::new(),
            ocr_confidence: Some(0.9),
            page_count: Some(1),
            upload_status: UploadStatus::Uploaded,
            issue_details: Vec::new(),
            upload_sequence: 0,
            language: None,
        }
    }

    #[test]
    fn hash_ignores_document_order() {
        let mut first = MatterRecord::new(MatterId::new("m-1"), Forum::Rpd);
        first.documents = vec![document("a"), document("b")];
        let mut second = first.clone();
        second.documents.reverse();

        assert_eq!(first.document_set_hash(), second.document_set_hash());
        assert_eq!(first.document_set_hash().len(), 64);
    }

    #[test]
    fn hash_tracks_document_changes() {
        let mut record = MatterRecord::new(MatterId::new("m-1"), Forum::Rpd);
        record.documents = vec![document("a")];
        let before = record.document_set_hash();

        record.documents[0].upload_status = UploadStatus::NeedsReview;
        assert_ne!(before, record.document_set_hash());
    }
}
