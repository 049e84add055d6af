//! Job submission, polling and artifact lookup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::BookProcessor;
use crate::extract::BookType;
use crate::job::{Job, JobStatus, JobStore, JobSummary, short_id};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {id} is still {status}")]
    NotReady { id: String, status: JobStatus },

    #[error("job {id} failed: {message}")]
    Failed { id: String, message: String },

    #[error("no text-generation backend configured")]
    NoProcessor,

    #[error("failed to store upload {path}: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Output documents of a completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Markdown,
    Pdf,
}

/// Entry point for callers: submit books, poll jobs, fetch results.
pub struct JobService {
    store: Arc<JobStore>,
    processor: Option<Arc<BookProcessor>>,
    uploads_dir: PathBuf,
}

impl JobService {
    /// A service over `store`. Submitting needs [`JobService::with_processor`].
    pub fn new(store: Arc<JobStore>, data_dir: &Path) -> Self {
        Self {
            store,
            processor: None,
            uploads_dir: data_dir.join("uploads"),
        }
    }

    pub fn with_processor(mut self, processor: Arc<BookProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    fn store(&self) -> &JobStore {
        &self.store
    }

    /// Register a job for `source` and start processing it in the background.
    ///
    /// Returns the job id straight away. An unsupported format still gets a
    /// job, which is failed on the spot.
    pub async fn submit(&self, source: &Path, filename: &str) -> Result<String, ServiceError> {
        let processor = self.processor.clone().ok_or(ServiceError::NoProcessor)?;
        let id = Uuid::new_v4().to_string();
        let book_type = BookType::from_path(Path::new(filename));
        self.store()
            .insert(Job::new(id.clone(), filename.to_string(), book_type));
        log::info!("[{}] Submitted {}", short_id(&id), filename);

        if book_type.is_none() {
            self.fail(&id, &format!("Unsupported file format: {filename}"));
            return Ok(id);
        }

        let upload = self.upload_path(&id, filename);
        if let Err(source) = self.store_upload(source, &upload).await {
            self.fail(&id, &format!("Failed to store upload: {source}"));
            return Err(ServiceError::Upload {
                path: upload,
                source,
            });
        }

        let job_id = id.clone();
        tokio::spawn(async move {
            processor.process(&job_id, &upload).await;
        });

        Ok(id)
    }

    pub fn status(&self, id: &str) -> Result<Job, ServiceError> {
        self.store()
            .get(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<JobSummary> {
        self.store().list()
    }

    /// Path of an output document, once the job has completed.
    pub fn artifact(&self, id: &str, artifact: Artifact) -> Result<PathBuf, ServiceError> {
        let job = self.status(id)?;
        match job.status {
            JobStatus::Completed => {}
            JobStatus::Failed => {
                return Err(ServiceError::Failed {
                    id: job.id,
                    message: job.error_message.unwrap_or_default(),
                });
            }
            status => {
                return Err(ServiceError::NotReady {
                    id: job.id,
                    status,
                });
            }
        }

        let path = match artifact {
            Artifact::Markdown => job.markdown_path,
            Artifact::Pdf => job.pdf_path,
        };
        path.filter(|p| p.exists())
            .ok_or_else(|| ServiceError::NotFound(format!("{id} ({artifact:?} missing)")))
    }

    /// Forget a job and remove its files.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let job = self
            .store()
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        // A job deleted mid-generation has its Markdown recorded but not yet its PDF.
        let pdf_path = job
            .pdf_path
            .or_else(|| job.markdown_path.as_ref().map(|md| md.with_extension("pdf")));
        let files = [
            job.markdown_path,
            pdf_path,
            Some(self.upload_path(id, &job.filename)),
        ];
        for path in files.into_iter().flatten() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => log::debug!("[{}] Removed {}", short_id(id), path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("[{}] Could not remove {}: {}", short_id(id), path.display(), e),
            }
        }
        Ok(())
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait(&self, id: &str, poll: Duration) -> Result<Job, ServiceError> {
        loop {
            let job = self.status(id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    fn upload_path(&self, id: &str, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        self.uploads_dir.join(format!("{id}_{name}"))
    }

    async fn store_upload(&self, source: &Path, upload: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        tokio::fs::copy(source, upload).await?;
        Ok(())
    }

    fn fail(&self, id: &str, message: &str) {
        log::error!("[{}] Failed: {}", short_id(id), message);
        if let Err(e) = self.store().update(id, |job| job.fail(message)) {
            log::error!("[{}] Could not record failure: {}", short_id(id), e);
        }
    }
}
