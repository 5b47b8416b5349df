//! Binder capability: the engine only holds trait objects, so the metadata-only build has no
//! dependency on any PDF library.

#[cfg(feature = "pdf-binder")]
mod pdf;

#[cfg(feature = "pdf-binder")]
pub use pdf::PdfBinderAssembler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::domain::MatterId;
use super::planner::{CompilationPlan, TocEntry};
use super::repository::RepositoryError;

/// Metadata describing a compiled binder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub filename: String,
    pub byte_size: u64,
    /// Lower-case hex digest of the binder bytes.
    pub sha256: String,
    pub page_count: u32,
}

impl CompiledArtifact {
    pub fn describe(filename: impl Into<String>, bytes: &[u8], page_count: u32) -> Self {
        Self {
            filename: filename.into(),
            byte_size: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(bytes)),
            page_count,
        }
    }
}

/// One planned document with its source bytes.
#[derive(Debug, Clone)]
pub struct BinderSource {
    pub entry: TocEntry,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BinderRequest {
    pub matter_id: MatterId,
    pub filename: String,
    /// Sources in table-of-contents order.
    pub sources: Vec<BinderSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledBinder {
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

/// Shared cancellation signal checked by assemblers between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), BinderAssemblyError> {
        if self.is_cancelled() {
            Err(BinderAssemblyError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Merges source PDFs into one bookmarked, paginated binder.
pub trait BinderAssembler: Send + Sync {
    fn assemble(
        &self,
        request: &BinderRequest,
        cancel: &CancellationFlag,
    ) -> Result<AssembledBinder, BinderAssemblyError>;
}

/// Supplies the original bytes of uploaded documents.
pub trait SourceDocumentStore: Send + Sync {
    fn fetch(
        &self,
        matter_id: &MatterId,
        file_id: &str,
    ) -> Result<Option<Vec<u8>>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BinderAssemblyError {
    #[error("source document {file_id} is not available")]
    MissingSource { file_id: String },
    #[error("source store unavailable: {0}")]
    SourceUnavailable(String),
    #[error("source document {file_id} could not be merged: {reason}")]
    Malformed { file_id: String, reason: String },
    #[error("{scope} has {actual} pages but the plan expects {expected}")]
    PageCountMismatch {
        scope: String,
        expected: u32,
        actual: u32,
    },
    #[error("binder assembly exceeded {seconds}s")]
    TimedOut { seconds: u64 },
    #[error("binder assembly was cancelled")]
    Cancelled,
    #[error("binder worker failed: {0}")]
    Worker(String),
}

impl BinderAssemblyError {
    pub const fn code(&self) -> &'static str {
        "BINDER_ASSEMBLY_FAILED"
    }
}

/// Runs an assembler on a worker thread, bounded by `timeout`.
#[derive(Clone)]
pub struct BinderRunner {
    assembler: Arc<dyn BinderAssembler>,
    timeout: Duration,
}

impl BinderRunner {
    pub fn new(assembler: Arc<dyn BinderAssembler>, timeout: Duration) -> Self {
        Self { assembler, timeout }
    }

    pub fn run(&self, request: BinderRequest) -> Result<AssembledBinder, BinderAssemblyError> {
        let (sender, receiver) = mpsc::channel();
        let cancel = CancellationFlag::default();
        let worker_cancel = cancel.clone();
        let assembler = Arc::clone(&self.assembler);
        let matter_id = request.matter_id.clone();

        thread::Builder::new()
            .name(format!("binder-{matter_id}"))
            .spawn(move || {
                let result = assembler.assemble(&request, &worker_cancel);
                // The receiver is gone once the runner gave up waiting.
                let _ = sender.send(result);
            })
            .map_err(|err| BinderAssemblyError::Worker(err.to_string()))?;

        match receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                warn!(
                    matter_id = %matter_id,
                    timeout_secs = self.timeout.as_secs(),
                    "binder assembly timed out; cancellation requested"
                );
                Err(BinderAssemblyError::TimedOut {
                    seconds: self.timeout.as_secs(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(BinderAssemblyError::Worker(
                "assembler exited without a result".to_string(),
            )),
        }
    }
}

/// Compiled binder bytes and their metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderOutput {
    pub artifact: CompiledArtifact,
    pub bytes: Vec<u8>,
}

/// Opaque handle the service holds when binder generation is enabled.
#[derive(Clone)]
pub struct BinderCapability {
    runner: BinderRunner,
    sources: Arc<dyn SourceDocumentStore>,
}

impl BinderCapability {
    pub fn new(
        assembler: Arc<dyn BinderAssembler>,
        sources: Arc<dyn SourceDocumentStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner: BinderRunner::new(assembler, timeout),
            sources,
        }
    }

    /// Load sources in plan order, assemble, and check the result against the plan.
    pub fn compile(
        &self,
        matter_id: &MatterId,
        plan: &CompilationPlan,
    ) -> Result<BinderOutput, BinderAssemblyError> {
        let mut sources = Vec::with_capacity(plan.toc_entries.len());
        for entry in &plan.toc_entries {
            let bytes = self
                .sources
                .fetch(matter_id, &entry.file_id)
                .map_err(|err| BinderAssemblyError::SourceUnavailable(err.to_string()))?
                .ok_or_else(|| BinderAssemblyError::MissingSource {
                    file_id: entry.file_id.clone(),
                })?;
            sources.push(BinderSource {
                entry: entry.clone(),
                bytes,
            });
        }

        let filename = format!("{matter_id}-binder.pdf");
        debug!(matter_id = %matter_id, documents = sources.len(), "assembling binder");
        let assembled = self.runner.run(BinderRequest {
            matter_id: matter_id.clone(),
            filename: filename.clone(),
            sources,
        })?;

        let expected = plan.pagination_summary.total_pages;
        if assembled.page_count != expected {
            return Err(BinderAssemblyError::PageCountMismatch {
                scope: "binder".to_string(),
                expected,
                actual: assembled.page_count,
            });
        }

        Ok(BinderOutput {
            artifact: CompiledArtifact::describe(filename, &assembled.bytes, assembled.page_count),
            bytes: assembled.bytes,
        })
    }
}
