//! Per-run handle on one job record.

use std::path::PathBuf;
use std::sync::Arc;

use super::{BookMetadata, ChapterAnalysis, JobError, JobStatus, JobStore};

/// The single writer for one job during a processing run.
///
/// Log lines carry the first 8 characters of the job id.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<JobStore>,
    id: String,
}

impl JobTracker {
    pub fn new(store: Arc<JobStore>, id: &str) -> Self {
        Self {
            store,
            id: id.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Short id used as a log prefix.
    pub fn tag(&self) -> &str {
        short_id(&self.id)
    }

    pub fn advance(&self, status: JobStatus, progress: f32, step: &str) -> Result<(), JobError> {
        log::info!("[{}] {} ({:.0}%)", self.tag(), step, progress);
        self.store
            .update(&self.id, |job| job.advance(status, progress, step))
    }

    pub fn set_metadata(&self, metadata: BookMetadata) -> Result<(), JobError> {
        self.store
            .update(&self.id, move |job| job.set_metadata(metadata))
    }

    pub fn record_chapter(&self, analysis: ChapterAnalysis) -> Result<(), JobError> {
        if let Some(error) = &analysis.error {
            log::warn!(
                "[{}] Chapter {} failed: {}",
                self.tag(),
                analysis.chapter_number,
                error
            );
        }
        self.store
            .update(&self.id, move |job| job.record_chapter(analysis))
    }

    pub fn set_markdown_path(&self, path: PathBuf) -> Result<(), JobError> {
        self.store
            .update(&self.id, move |job| job.set_markdown_path(path))
    }

    pub fn complete(&self, markdown_path: PathBuf, pdf_path: PathBuf) -> Result<(), JobError> {
        log::info!("[{}] Completed: {}", self.tag(), markdown_path.display());
        self.store
            .update(&self.id, move |job| job.complete(markdown_path, pdf_path))
    }

    pub fn fail(&self, message: &str) -> Result<(), JobError> {
        log::error!("[{}] Failed: {}", self.tag(), message);
        self.store.update(&self.id, |job| job.fail(message))
    }
}

/// First 8 characters of a job id.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
