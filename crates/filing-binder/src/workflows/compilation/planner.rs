use serde::{Deserialize, Serialize};

use super::catalog::CompilationProfile;
use super::domain::{DocumentType, MatterDocument};
use super::evaluation::filed_documents;

/// One line of the record's table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub position: usize,
    pub file_id: String,
    pub document_type: DocumentType,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    pub start_page: u32,
    pub end_page: u32,
    /// Page count was unknown; a one-page placeholder was assigned.
    #[serde(default)]
    pub page_count_estimated: bool,
}

impl TocEntry {
    pub fn page_count(&self) -> u32 {
        self.end_page - self.start_page + 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSummary {
    pub total_documents: usize,
    pub total_pages: u32,
    pub last_assigned_page: u32,
    #[serde(default)]
    pub estimated_page_documents: Vec<String>,
}

/// Ordered table of contents plus pagination totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationPlan {
    pub toc_entries: Vec<TocEntry>,
    pub pagination_summary: PaginationSummary,
}

impl CompilationPlan {
    /// Entries start at page 1 and each begins where the previous one ended.
    pub fn is_contiguous(&self) -> bool {
        let mut last_page: u32 = 0;
        for entry in &self.toc_entries {
            let follows = last_page.checked_add(1) == Some(entry.start_page);
            if !follows || entry.end_page < entry.start_page {
                return false;
            }
            last_page = entry.end_page;
        }
        true
    }

    pub fn has_estimated_pages(&self) -> bool {
        !self.pagination_summary.estimated_page_documents.is_empty()
    }
}

/// Page numbering cannot represent the record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanningError {
    #[error("document {file_id} ({page_count} pages) pushes the record past page {}", u32::MAX)]
    PageOverflow { file_id: String, page_count: u32 },
}

/// Orders the filed set by section/type precedence and assigns consecutive page ranges.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilationPlanner;

const PLACEHOLDER_PAGES: u32 = 1;

impl CompilationPlanner {
    pub fn plan(
        &self,
        profile: &CompilationProfile,
        documents: &[MatterDocument],
    ) -> Result<CompilationPlan, PlanningError> {
        let unplaced = (profile.sections.len(), 0);
        let mut ordered: Vec<((usize, usize), &MatterDocument)> = filed_documents(documents)
            .into_iter()
            .map(|doc| {
                let precedence = profile
                    .precedence_of(&doc.classification)
                    .unwrap_or(unplaced);
                (precedence, doc)
            })
            .collect();

        ordered.sort_by(|(left_rank, left), (right_rank, right)| {
            left_rank
                .cmp(right_rank)
                .then_with(|| left.upload_sequence.cmp(&right.upload_sequence))
                .then_with(|| left.filename.cmp(&right.filename))
                .then_with(|| left.file_id.cmp(&right.file_id))
        });

        let mut toc_entries = Vec::with_capacity(ordered.len());
        let mut estimated_page_documents = Vec::new();
        let mut last_assigned_page: u32 = 0;

        for (index, ((section_index, _), doc)) in ordered.into_iter().enumerate() {
            let (pages, estimated) = match doc.page_count {
                Some(count) if count > 0 => (count, false),
                _ => (PLACEHOLDER_PAGES, true),
            };
            if estimated {
                estimated_page_documents.push(doc.file_id.clone());
            }

            let overflow = || PlanningError::PageOverflow {
                file_id: doc.file_id.clone(),
                page_count: pages,
            };
            let start_page = last_assigned_page.checked_add(1).ok_or_else(overflow)?;
            let end_page = last_assigned_page.checked_add(pages).ok_or_else(overflow)?;
            last_assigned_page = end_page;

            toc_entries.push(TocEntry {
                position: index + 1,
                file_id: doc.file_id.clone(),
                document_type: doc.classification.clone(),
                filename: doc.filename.clone(),
                section_id: profile
                    .sections
                    .get(section_index)
                    .map(|section| section.section_id.clone()),
                start_page,
                end_page,
                page_count_estimated: estimated,
            });
        }

        Ok(CompilationPlan {
            pagination_summary: PaginationSummary {
                total_documents: toc_entries.len(),
                total_pages: last_assigned_page,
                last_assigned_page,
                estimated_page_documents,
            },
            toc_entries,
        })
    }
}
