//! Job data types and transition rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::JobError;
use crate::extract::BookType;

/// Phase of a job. Phases only move forward; `Failed` is reachable from any
/// non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Extracting,
    Splitting,
    Analyzing,
    Generating,
    Completed,
    Failed,
}

impl JobStatus {
    /// Position in the forward phase order.
    pub fn order(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Extracting => 1,
            Self::Splitting => 2,
            Self::Analyzing => 3,
            Self::Generating => 4,
            Self::Completed => 5,
            Self::Failed => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Splitting => "splitting",
            Self::Analyzing => "analyzing",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Book-level facts, written once segmentation is done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub language: String,
    pub total_chapters: usize,
    pub total_words: usize,
}

/// Result of processing one chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterAnalysis {
    pub chapter_number: usize,
    pub chapter_title: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub tokens_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_summary: Option<String>,
}

impl ChapterAnalysis {
    pub fn succeeded(
        chapter_number: usize,
        chapter_title: &str,
        analysis: String,
        tokens_used: u32,
        context_summary: Option<String>,
    ) -> Self {
        Self {
            chapter_number,
            chapter_title: chapter_title.to_string(),
            success: true,
            analysis: Some(analysis),
            error: None,
            tokens_used,
            context_summary,
        }
    }

    pub fn failed(chapter_number: usize, chapter_title: &str, error: String) -> Self {
        Self {
            chapter_number,
            chapter_title: chapter_title.to_string(),
            success: false,
            analysis: None,
            error: Some(error),
            tokens_used: 0,
            context_summary: None,
        }
    }
}

/// A book-processing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Original file name as submitted
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_type: Option<BookType>,
    pub status: JobStatus,
    /// 0-100, never decreases
    pub progress: f32,
    pub current_step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BookMetadata>,
    #[serde(default)]
    pub chapters: Vec<ChapterAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Listing view of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub filename: String,
    pub status: JobStatus,
    pub progress: f32,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// A new job in `Pending`.
    pub fn new(id: String, filename: String, book_type: Option<BookType>) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename,
            book_type,
            status: JobStatus::Pending,
            progress: 0.0,
            current_step: "Queued".to_string(),
            metadata: None,
            chapters: Vec::new(),
            error_message: None,
            markdown_path: None,
            pdf_path: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move to `status` (or stay in the current phase) and raise progress.
    ///
    /// Terminal phases are entered through [`Job::complete`] and [`Job::fail`].
    pub fn advance(&mut self, status: JobStatus, progress: f32, step: &str) -> Result<(), JobError> {
        self.ensure_active()?;
        if status.is_terminal() || status.order() < self.status.order() {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }

        self.status = status;
        self.raise_progress(progress);
        self.current_step = step.to_string();
        self.touch();
        Ok(())
    }

    pub fn set_metadata(&mut self, metadata: BookMetadata) -> Result<(), JobError> {
        self.ensure_active()?;
        self.metadata = Some(metadata);
        self.touch();
        Ok(())
    }

    /// Append one chapter result.
    pub fn record_chapter(&mut self, analysis: ChapterAnalysis) -> Result<(), JobError> {
        self.ensure_active()?;
        if self.status != JobStatus::Analyzing {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Analyzing,
            });
        }
        self.chapters.push(analysis);
        self.touch();
        Ok(())
    }

    /// Record the Markdown document as soon as it exists on disk.
    pub fn set_markdown_path(&mut self, path: PathBuf) -> Result<(), JobError> {
        self.ensure_active()?;
        if self.status != JobStatus::Generating {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Generating,
            });
        }
        self.markdown_path = Some(path);
        self.touch();
        Ok(())
    }

    /// `Generating` -> `Completed`, recording both artifacts.
    pub fn complete(&mut self, markdown_path: PathBuf, pdf_path: PathBuf) -> Result<(), JobError> {
        self.ensure_active()?;
        if self.status != JobStatus::Generating {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Completed,
            });
        }

        self.status = JobStatus::Completed;
        self.progress = 100.0;
        self.current_step = "Done".to_string();
        self.markdown_path = Some(markdown_path);
        self.pdf_path = Some(pdf_path);
        self.touch();
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// Any non-terminal phase -> `Failed`. Recorded chapters are kept.
    pub fn fail(&mut self, message: &str) -> Result<(), JobError> {
        self.ensure_active()?;
        self.status = JobStatus::Failed;
        self.current_step = "Failed".to_string();
        self.error_message = Some(message.to_string());
        self.touch();
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            status: self.status,
            progress: self.progress,
            title: self.metadata.as_ref().map(|m| m.title.clone()),
            created_at: self.created_at,
        }
    }

    fn ensure_active(&self) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::Finished(self.status));
        }
        Ok(())
    }

    fn raise_progress(&mut self, progress: f32) {
        self.progress = self.progress.max(progress.clamp(0.0, 100.0));
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("job-1".to_string(), "book.txt".to_string(), Some(BookType::Txt))
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
        assert!(job.chapters.is_empty());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_forward_transitions() {
        let mut job = job();
        job.advance(JobStatus::Extracting, 5.0, "Extracting").unwrap();
        job.advance(JobStatus::Splitting, 15.0, "Splitting").unwrap();
        job.advance(JobStatus::Analyzing, 20.0, "Analyzing").unwrap();
        job.advance(JobStatus::Analyzing, 50.0, "Chapter 2").unwrap();
        job.advance(JobStatus::Generating, 85.0, "Generating").unwrap();
        job.complete(PathBuf::from("a.md"), PathBuf::from("a.pdf")).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert!(job.completed_at.is_some());
        assert_eq!(job.pdf_path, Some(PathBuf::from("a.pdf")));
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut job = job();
        job.advance(JobStatus::Analyzing, 20.0, "Analyzing").unwrap();
        let err = job.advance(JobStatus::Splitting, 30.0, "Splitting").unwrap_err();
        assert_eq!(
            err,
            JobError::InvalidTransition {
                from: JobStatus::Analyzing,
                to: JobStatus::Splitting
            }
        );
        assert_eq!(job.status, JobStatus::Analyzing);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = job();
        job.advance(JobStatus::Extracting, 40.0, "a").unwrap();
        job.advance(JobStatus::Splitting, 15.0, "b").unwrap();
        assert_eq!(job.progress, 40.0);
        job.advance(JobStatus::Splitting, 250.0, "c").unwrap();
        assert_eq!(job.progress, 100.0);
    }

    #[test]
    fn test_complete_requires_generating() {
        let mut job = job();
        job.advance(JobStatus::Analyzing, 20.0, "a").unwrap();
        assert!(job.complete(PathBuf::from("a.md"), PathBuf::from("a.pdf")).is_err());
        assert!(job.advance(JobStatus::Completed, 100.0, "done").is_err());
    }

    #[test]
    fn test_markdown_path_recorded_while_generating() {
        let mut job = job();
        job.advance(JobStatus::Analyzing, 20.0, "a").unwrap();
        assert!(job.set_markdown_path(PathBuf::from("a.md")).is_err());

        job.advance(JobStatus::Generating, 90.0, "b").unwrap();
        job.set_markdown_path(PathBuf::from("a.md")).unwrap();
        assert_eq!(job.markdown_path, Some(PathBuf::from("a.md")));
        assert_eq!(job.status, JobStatus::Generating);
        assert!(job.pdf_path.is_none());
    }

    #[test]
    fn test_fail_keeps_partial_chapters() {
        let mut job = job();
        job.advance(JobStatus::Analyzing, 20.0, "a").unwrap();
        job.record_chapter(ChapterAnalysis::succeeded(1, "One", "text".into(), 10, None))
            .unwrap();
        job.fail("render failed").unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("render failed"));
        assert_eq!(job.chapters.len(), 1);
        assert!(job.markdown_path.is_none());
    }

    #[test]
    fn test_terminal_jobs_are_frozen() {
        let mut job = job();
        job.fail("boom").unwrap();
        assert_eq!(job.fail("again"), Err(JobError::Finished(JobStatus::Failed)));
        assert!(job.advance(JobStatus::Extracting, 5.0, "x").is_err());
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_record_chapter_only_while_analyzing() {
        let mut job = job();
        let result = job.record_chapter(ChapterAnalysis::failed(1, "One", "err".into()));
        assert!(result.is_err());
        assert!(job.chapters.is_empty());
    }

    #[test]
    fn test_job_json_roundtrip_uses_lowercase_status() {
        let mut job = job();
        job.advance(JobStatus::Extracting, 5.0, "Extracting").unwrap();
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"status\":\"extracting\""));
        assert!(json.contains("\"book_type\":\"txt\""));

        let parsed: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, JobStatus::Extracting);
        assert_eq!(parsed.id, job.id);
    }

    #[test]
    fn test_summary_uses_metadata_title() {
        let mut job = job();
        job.set_metadata(BookMetadata {
            title: "A Book".into(),
            author: "Someone".into(),
            language: "en".into(),
            total_chapters: 3,
            total_words: 1000,
        })
        .unwrap();
        assert_eq!(job.summary().title.as_deref(), Some("A Book"));
    }
}
