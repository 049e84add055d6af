//! JSON-backed job store.
//!
//! All jobs live in a single document, `<data_dir>/jobs.json`. Every
//! read-modify-write runs under one store-wide lock, which also takes the
//! JSON snapshot. The file write happens after that lock is released, under
//! a separate write lock, through a temp file plus rename so a crash never
//! leaves a torn file. Snapshots carry a revision and a stale one is never
//! written over a newer one.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{Job, JobError, JobSummary};

const STORE_FILE: &str = "jobs.json";

#[derive(Default)]
struct Jobs {
    by_id: HashMap<String, Job>,
    revision: u64,
}

/// Serialised state of the store at one revision.
struct Snapshot {
    revision: u64,
    json: Result<Vec<u8>>,
}

pub struct JobStore {
    path: PathBuf,
    jobs: Mutex<Jobs>,
    /// Revision of the last snapshot written to disk.
    written: Mutex<u64>,
}

impl JobStore {
    /// Open the store under `data_dir`, loading any jobs saved earlier.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and replaced on the next save.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let path = data_dir.join(STORE_FILE);
        let by_id = load_jobs(&path);
        log::debug!("Loaded {} job(s) from {}", by_id.len(), path.display());

        Ok(Self {
            path,
            jobs: Mutex::new(Jobs { by_id, revision: 0 }),
            written: Mutex::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert(&self, job: Job) {
        let snapshot = {
            let mut jobs = self.lock();
            jobs.by_id.insert(job.id.clone(), job);
            snapshot(&mut jobs)
        };
        self.persist(snapshot);
    }

    /// Snapshot of one job.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().by_id.get(id).cloned()
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<JobSummary> {
        let mut summaries: Vec<JobSummary> = self.lock().by_id.values().map(Job::summary).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Apply `f` to a job and save the result.
    ///
    /// Nothing is saved when `f` fails; the in-memory record is left as `f`
    /// left it, which for [`Job`] methods means unchanged.
    pub fn update<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Job) -> Result<T, JobError>,
    ) -> Result<T, JobError> {
        let (value, snapshot) = {
            let mut jobs = self.lock();
            let job = jobs
                .by_id
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            let value = f(job)?;
            (value, snapshot(&mut jobs))
        };
        self.persist(snapshot);
        Ok(value)
    }

    pub fn remove(&self, id: &str) -> Option<Job> {
        let (removed, snapshot) = {
            let mut jobs = self.lock();
            let removed = jobs.by_id.remove(id)?;
            (removed, snapshot(&mut jobs))
        };
        self.persist(snapshot);
        Some(removed)
    }

    fn lock(&self) -> MutexGuard<'_, Jobs> {
        // A panic mid-update leaves a consistent map; keep serving it.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, snapshot: Snapshot) {
        let mut written = self.written.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *written >= snapshot.revision {
            log::trace!("Skipping stale job store revision {}", snapshot.revision);
            return;
        }

        match snapshot.json.and_then(|json| save_jobs(&self.path, &json)) {
            Ok(()) => *written = snapshot.revision,
            Err(e) => log::error!("Failed to save jobs to {}: {:#}", self.path.display(), e),
        }
    }
}

fn snapshot(jobs: &mut Jobs) -> Snapshot {
    jobs.revision += 1;
    Snapshot {
        revision: jobs.revision,
        json: serde_json::to_vec_pretty(&jobs.by_id).context("Failed to serialise jobs"),
    }
}

fn load_jobs(path: &Path) -> HashMap<String, Job> {
    if !path.exists() {
        return HashMap::new();
    }

    let parsed = fs::read_to_string(path)
        .context("Failed to read job store")
        .and_then(|content| {
            serde_json::from_str::<HashMap<String, Job>>(&content).context("Invalid job store JSON")
        });

    match parsed {
        Ok(jobs) => jobs,
        Err(e) => {
            log::error!("Resetting job store {}: {:#}", path.display(), e);
            HashMap::new()
        }
    }
}

fn save_jobs(path: &Path, json: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Job store path has no parent directory"))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).context("Failed to create temp file")?;
    tmp.write_all(json).context("Failed to write jobs JSON")?;
    tmp.flush()?;
    tmp.persist(path).context("Failed to replace job store")?;
    Ok(())
}
