//! Job records, their lifecycle rules and persistence.

mod store;
mod tracker;
mod types;

pub use store::JobStore;
pub use tracker::{JobTracker, short_id};
pub use types::{BookMetadata, ChapterAnalysis, Job, JobStatus, JobSummary};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("job is already {0}")]
    Finished(JobStatus),
}
