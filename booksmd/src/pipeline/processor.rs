//! The per-job pipeline.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::RollingContext;
use crate::analyzer::BookAnalyzer;
use crate::extract::{self, detect_language};
use crate::job::{BookMetadata, ChapterAnalysis, JobStatus, JobStore, JobTracker};
use crate::render::{self, BookDocument};
use crate::segment::{BookStats, Chapter, ChapterSplitter, SplitterConfig};

/// Extracted text shorter than this fails the job.
const MIN_TEXT_CHARS: usize = 100;

const PROGRESS_EXTRACTING: f32 = 5.0;
const PROGRESS_SPLITTING: f32 = 15.0;
const PROGRESS_ANALYZING: f32 = 20.0;
const PROGRESS_ANALYZING_SPAN: f32 = 60.0;
const PROGRESS_GENERATING: f32 = 85.0;
const PROGRESS_MARKDOWN: f32 = 90.0;
const PROGRESS_PDF: f32 = 95.0;

const UNKNOWN_AUTHOR: &str = "Unknown";

/// Runs jobs through extraction, segmentation, analysis and rendering.
pub struct BookProcessor {
    store: Arc<JobStore>,
    analyzer: Arc<dyn BookAnalyzer>,
    splitter: SplitterConfig,
    context_window: usize,
    output_dir: PathBuf,
}

impl BookProcessor {
    pub fn new(
        store: Arc<JobStore>,
        analyzer: Arc<dyn BookAnalyzer>,
        splitter: SplitterConfig,
        context_window: usize,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            analyzer,
            splitter,
            context_window,
            output_dir,
        }
    }

    /// Process the uploaded file for `job_id` to a terminal state.
    ///
    /// Failures end up in the job record, not in the return value. The
    /// upload is removed once the job completes.
    pub async fn process(&self, job_id: &str, upload: &Path) {
        let tracker = JobTracker::new(self.store.clone(), job_id);
        log::info!("[{}] Processing {}", tracker.tag(), upload.display());

        match self.run(&tracker, upload).await {
            Ok(()) => {
                if let Err(e) = tokio::fs::remove_file(upload).await {
                    log::warn!("[{}] Could not remove upload {}: {}", tracker.tag(), upload.display(), e);
                }
            }
            Err(e) => {
                if let Err(store_err) = tracker.fail(&format!("{e:#}")) {
                    log::error!("[{}] Could not record failure: {}", tracker.tag(), store_err);
                }
            }
        }
    }

    async fn run(&self, tracker: &JobTracker, upload: &Path) -> Result<()> {
        let tag = tracker.tag();
        let filename = self
            .store
            .get(tracker.id())
            .map(|job| job.filename)
            .with_context(|| format!("Job {} disappeared", tracker.id()))?;

        tracker.advance(JobStatus::Extracting, PROGRESS_EXTRACTING, "Extracting text")?;
        let path = upload.to_path_buf();
        let book = tokio::task::spawn_blocking(move || extract::extract(&path))
            .await
            .context("Extraction task panicked")??;
        let language = detect_language(&book.text);
        log::info!(
            "[{}] Extracted {} chars ({}, language {})",
            tag,
            book.text.len(),
            book.book_type,
            language
        );

        let text_chars = book.text.chars().count();
        if text_chars < MIN_TEXT_CHARS {
            bail!("Insufficient content: extracted text has {text_chars} characters");
        }

        tracker.advance(JobStatus::Splitting, PROGRESS_SPLITTING, "Identifying chapters")?;
        let config = self.splitter;
        let text = book.text;
        let chapters = tokio::task::spawn_blocking(move || ChapterSplitter::new(config).split(&text))
            .await
            .context("Segmentation task panicked")?;
        if chapters.is_empty() {
            bail!("No chapters could be built from the extracted text");
        }

        let stats = BookStats::from_chapters(&chapters);
        log::info!(
            "[{}] {} chapters, {} tokens, {} words",
            tag,
            stats.total_chapters,
            stats.total_tokens,
            stats.total_words
        );
        for chapter in chapters.iter().take(5) {
            log::debug!("[{}]   {}: {} ({} tokens)", tag, chapter.number, chapter.title, chapter.token_count);
        }

        let metadata = BookMetadata {
            title: book.title.unwrap_or_else(|| file_stem(&filename)),
            author: book.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            language: language.to_string(),
            total_chapters: chapters.len(),
            total_words: stats.total_words,
        };
        tracker.set_metadata(metadata.clone())?;

        tracker.advance(
            JobStatus::Analyzing,
            PROGRESS_ANALYZING,
            &format!("Starting analysis with {}", self.analyzer.name()),
        )?;
        let results = self.analyze(tracker, &chapters).await?;

        tracker.advance(JobStatus::Generating, PROGRESS_GENERATING, "Generating glossary and conclusions")?;
        let glossary = match self.analyzer.generate_glossary(&results).await {
            Ok(glossary) => glossary,
            Err(e) => {
                log::warn!("[{}] Glossary generation failed: {}", tag, e);
                None
            }
        };
        let conclusions = match self
            .analyzer
            .generate_summary(&results, &metadata.title, &metadata.author)
            .await
        {
            Ok(summary) => Some(summary),
            Err(e) => {
                log::warn!("[{}] Book summary generation failed: {}", tag, e);
                None
            }
        };

        tracker.advance(JobStatus::Generating, PROGRESS_MARKDOWN, "Writing Markdown")?;
        let document = BookDocument {
            job_id: tracker.id(),
            title: &metadata.title,
            author: &metadata.author,
            language: &metadata.language,
            date: chrono::Local::now().format("%d/%m/%Y").to_string(),
            chapters: &results,
            glossary: glossary.as_deref(),
            conclusions: conclusions.as_deref(),
        };
        let md_path = render::write_markdown(&self.output_dir, &document)
            .context("Failed to write Markdown document")?;
        if let Err(e) = tracker.set_markdown_path(md_path.clone()) {
            discard_outputs(tag, &[md_path.as_path()]).await;
            return Err(e.into());
        }

        tracker.advance(JobStatus::Generating, PROGRESS_PDF, "Converting to PDF")?;
        let md = md_path.clone();
        let pdf_path = tokio::task::spawn_blocking(move || render::write_pdf(&md))
            .await
            .context("PDF task panicked")?
            .context("Failed to write PDF document")?;

        // The job may have been deleted while the PDF was rendering.
        if let Err(e) = tracker.complete(md_path.clone(), pdf_path.clone()) {
            discard_outputs(tag, &[md_path.as_path(), pdf_path.as_path()]).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Analyse chapters in order, carrying the rolling context forward.
    ///
    /// A chapter whose analysis fails is recorded as failed and skipped for
    /// context purposes; the remaining chapters still run.
    async fn analyze(&self, tracker: &JobTracker, chapters: &[Chapter]) -> Result<Vec<ChapterAnalysis>> {
        let total = chapters.len();
        let mut context = RollingContext::new(self.context_window);
        let mut results = Vec::with_capacity(total);

        for (i, chapter) in chapters.iter().enumerate() {
            tracker.advance(
                JobStatus::Analyzing,
                analysis_progress(i, total),
                &format!("Analyzing chapter {} of {}", i + 1, total),
            )?;

            let previous = context.render();
            let result = match self.analyzer.analyze_chapter(chapter, previous.as_deref()).await {
                Ok(outcome) => {
                    context.push(outcome.context_summary.clone());
                    ChapterAnalysis::succeeded(
                        chapter.number,
                        &chapter.title,
                        outcome.analysis,
                        outcome.tokens_used,
                        Some(outcome.context_summary),
                    )
                }
                Err(e) => ChapterAnalysis::failed(chapter.number, &chapter.title, e.to_string()),
            };

            tracker.record_chapter(result.clone())?;
            tracker.advance(
                JobStatus::Analyzing,
                analysis_progress(i + 1, total),
                &format!("Analyzed chapter {} of {}", i + 1, total),
            )?;
            results.push(result);
        }

        Ok(results)
    }
}

/// Progress once `done` of `total` chapters have been analysed.
fn analysis_progress(done: usize, total: usize) -> f32 {
    PROGRESS_ANALYZING + PROGRESS_ANALYZING_SPAN * done as f32 / total.max(1) as f32
}

/// Remove output files of a job that can no longer reference them.
async fn discard_outputs(tag: &str, paths: &[&Path]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => log::warn!("[{}] Discarded {}", tag, path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("[{}] Could not remove {}: {}", tag, path.display(), e),
        }
    }
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ChapterOutcome;
    use crate::extract::BookType;
    use crate::job::Job;
    use async_trait::async_trait;
    use llm_client::LlmError;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const JOB_ID: &str = "job-1";
    const TITLES: [&str; 5] = ["Origins", "Growth", "Reckoning", "Exile", "Return"];

    fn book_text() -> String {
        TITLES
            .iter()
            .enumerate()
            .map(|(i, title)| {
                let sentence = format!(
                    "The {title} season brought merchants, farmers and weary travellers along the river road toward the old harbour town. "
                );
                format!("Chapter {}: {}\n\n{}\n", i + 1, title, sentence.repeat(15))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Analyzer that looks at the job record while the pipeline runs.
    struct ObservingAnalyzer {
        store: Arc<JobStore>,
        progress_seen: Mutex<Vec<f32>>,
        delete_before_render: bool,
    }

    #[async_trait]
    impl BookAnalyzer for ObservingAnalyzer {
        async fn analyze_chapter(
            &self,
            chapter: &Chapter,
            _previous_context: Option<&str>,
        ) -> Result<ChapterOutcome, LlmError> {
            if let Some(job) = self.store.get(JOB_ID) {
                self.progress_seen.lock().unwrap().push(job.progress);
            }
            Ok(ChapterOutcome {
                analysis: format!("## {}\n\nAnalysis.", chapter.title),
                tokens_used: 10,
                context_summary: format!("Summary of {}", chapter.title),
            })
        }

        async fn generate_glossary(
            &self,
            _chapters: &[ChapterAnalysis],
        ) -> Result<Option<String>, LlmError> {
            Ok(None)
        }

        async fn generate_summary(
            &self,
            _chapters: &[ChapterAnalysis],
            _title: &str,
            _author: &str,
        ) -> Result<String, LlmError> {
            if self.delete_before_render {
                self.store.remove(JOB_ID);
            }
            Ok("Conclusions.".to_string())
        }

        fn name(&self) -> &'static str {
            "observer"
        }
    }

    struct Setup {
        dir: TempDir,
        store: Arc<JobStore>,
        analyzer: Arc<ObservingAnalyzer>,
        processor: BookProcessor,
    }

    fn setup(delete_before_render: bool) -> Setup {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JobStore::open(&dir.path().join("data")).unwrap());
        store.insert(Job::new(JOB_ID.to_string(), "book.txt".to_string(), Some(BookType::Txt)));
        let analyzer = Arc::new(ObservingAnalyzer {
            store: store.clone(),
            progress_seen: Mutex::new(Vec::new()),
            delete_before_render,
        });
        let processor = BookProcessor::new(
            store.clone(),
            analyzer.clone(),
            SplitterConfig::default(),
            50,
            dir.path().join("out"),
        );
        Setup {
            dir,
            store,
            analyzer,
            processor,
        }
    }

    async fn process(setup: &Setup) {
        let upload = setup.dir.path().join("book.txt");
        fs::write(&upload, book_text()).unwrap();
        setup.processor.process(JOB_ID, &upload).await;
    }

    #[tokio::test]
    async fn test_progress_counts_only_finished_chapters() {
        let setup = setup(false);
        process(&setup).await;

        let job = setup.store.get(JOB_ID).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.chapters.len(), 5);

        let seen = setup.analyzer.progress_seen.lock().unwrap().clone();
        assert_eq!(seen, vec![20.0, 32.0, 44.0, 56.0, 68.0]);
    }

    #[tokio::test]
    async fn test_job_deleted_during_generation_leaves_no_output() {
        let setup = setup(true);
        process(&setup).await;

        assert!(setup.store.get(JOB_ID).is_none());
        let out = setup.dir.path().join("out");
        let leftovers = fs::read_dir(&out).map(|entries| entries.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_analysis_progress() {
        assert_eq!(analysis_progress(0, 4), 20.0);
        assert_eq!(analysis_progress(2, 4), 50.0);
        assert_eq!(analysis_progress(4, 4), 80.0);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("My Book.epub"), "My Book");
        assert_eq!(file_stem("notes"), "notes");
        assert_eq!(file_stem("archive.tar.txt"), "archive.tar");
    }
}
