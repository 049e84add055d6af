//! booksmd - Turn PDF/EPUB/TXT books into chapter-by-chapter explanatory documents

mod analyzer;
mod config;
mod extract;
mod job;
mod pipeline;
mod render;
mod segment;
mod text;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::BooksConfig;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use analyzer::LlmAnalyzer;
use job::{JobStatus, JobStore};
use pipeline::{Artifact, BookProcessor, JobService};
use segment::{BookStats, ChapterSplitter};

const PROGRAM: &str = "booksmd";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "booksmd")]
#[command(about = "Turn PDF/EPUB/TXT books into chapter-by-chapter explanatory documents", long_about = None)]
#[command(version)]
struct Args {
    /// Book to process (.pdf, .epub or .txt)
    file: Option<PathBuf>,

    /// Directory for the Markdown and PDF output (default: next to the book)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// LLM preset from llm.toml (overrides the configured model)
    #[arg(short, long)]
    model: Option<String>,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Segment a book into chapters without calling the backend
    Split {
        /// Book to segment
        file: PathBuf,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect and manage stored jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum JobsAction {
    /// List all jobs, newest first
    List,
    /// Show one job in detail
    Status {
        /// Job id
        id: String,
    },
    /// Print the path of a completed job's output
    Path {
        /// Job id
        id: String,

        /// Print the PDF instead of the Markdown document
        #[arg(long)]
        pdf: bool,
    },
    /// Delete a job and its output files
    Delete {
        /// Job id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the token budget per chapter
    SetMaxTokens {
        /// Tokens (at least 500)
        value: usize,
    },
    /// Set the paragraph overlap between size-based chunks
    SetOverlap {
        /// Tokens
        value: usize,
    },
    /// Set how many earlier chapter summaries are carried forward
    SetContextWindow {
        /// Number of summaries
        value: usize,
    },
    /// Set the default LLM preset
    SetModel {
        /// Preset name from llm.toml
        preset: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    match &args.command {
        Some(Commands::Split { file, json }) => return split_command(file, *json).await,
        Some(Commands::Jobs { action }) => return jobs_command(action).await,
        Some(Commands::Config { action }) => return handle_config_command(action),
        None => {}
    }

    let book_path = args
        .file
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Book file path is required. Run 'booksmd --help' for usage."))?;

    if !book_path.exists() {
        anyhow::bail!("Book file not found: {}", book_path.display());
    }

    process_book(&args, &book_path).await
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn process_book(args: &Args, book_path: &Path) -> Result<()> {
    let config = BooksConfig::load().context("Failed to load configuration")?;
    let data_dir = config.data_dir()?;
    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        book_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let llm_config = llm_client::Config::load().context("Failed to load LLM configuration")?;
    let preset_name = args
        .model
        .clone()
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| llm_config.get_default_for_program(PROGRAM).to_string());
    let preset = llm_config.get_preset(&preset_name)?;
    let provider = llm_client::get_provider(preset, llm_config.get_provider_config(&preset.provider))?;
    provider.is_available()?;

    if args.debug {
        eprintln!("Book: {}", book_path.display());
        eprintln!("Output dir: {}", output_dir.display());
        eprintln!("Data dir: {}", data_dir.display());
        eprintln!("Model: {} ({} / {})", preset_name, preset.provider, preset.model);
    }

    let store = Arc::new(JobStore::open(&data_dir)?);
    let analyzer = Arc::new(LlmAnalyzer::new(Arc::from(provider), config.retry_delay()));
    let processor = Arc::new(BookProcessor::new(
        store.clone(),
        analyzer,
        config.splitter(),
        config.context_window,
        output_dir,
    ));
    let service = JobService::new(store, &data_dir).with_processor(processor);

    let filename = book_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("Invalid book path: {}", book_path.display()))?;
    let id = service.submit(book_path, &filename).await?;
    eprintln!("Job {} started for {}", id, filename);

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% ({elapsed}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let job = loop {
        let job = service.status(&id)?;
        pb.set_position(job.progress as u64);
        pb.set_message(job.current_step.clone());
        if job.status.is_terminal() {
            break job;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };
    pb.finish_and_clear();

    match job.status {
        JobStatus::Completed => {
            let failed = job.chapters.iter().filter(|c| !c.success).count();
            eprintln!(
                "Done: {} chapters analysed ({} failed)",
                job.chapters.len(),
                failed
            );
            if let Some(md) = &job.markdown_path {
                eprintln!("Markdown: {}", md.display());
            }
            if let Some(pdf) = &job.pdf_path {
                eprintln!("PDF: {}", pdf.display());
            }
            Ok(())
        }
        _ => anyhow::bail!(
            "Processing failed: {}",
            job.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}

async fn split_command(path: &Path, json: bool) -> Result<()> {
    let config = BooksConfig::load().context("Failed to load configuration")?;
    let source = path.to_path_buf();
    let (book, chapters) = tokio::task::spawn_blocking(move || -> Result<_> {
        let book = extract::extract(&source)?;
        let chapters = ChapterSplitter::new(config.splitter()).split(&book.text);
        Ok((book, chapters))
    })
    .await
    .context("Segmentation task panicked")??;

    let stats = BookStats::from_chapters(&chapters);
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "{} ({}, language {})",
        path.display(),
        book.book_type,
        extract::detect_language(&book.text)
    );
    if let Some(title) = &book.title {
        println!(
            "\"{}\" by {}",
            title,
            book.author.as_deref().unwrap_or("Unknown")
        );
    }
    println!();
    for chapter in &chapters {
        let flag = if chapter.oversized { " (oversized)" } else { "" };
        println!(
            "{:>4}  {:<60}  {:>7} tokens{}",
            chapter.number, chapter.title, chapter.token_count, flag
        );
    }
    println!();
    println!(
        "Chapters: {}, tokens: {}, words: {}, avg tokens/chapter: {}",
        stats.total_chapters, stats.total_tokens, stats.total_words, stats.avg_tokens_per_chapter
    );
    Ok(())
}

async fn jobs_command(action: &JobsAction) -> Result<()> {
    let data_dir = BooksConfig::load()?.data_dir()?;
    let store = Arc::new(JobStore::open(&data_dir)?);
    let service = JobService::new(store, &data_dir);

    match action {
        JobsAction::List => {
            let jobs = service.list();
            if jobs.is_empty() {
                println!("No jobs.");
            }
            for job in jobs {
                println!(
                    "{}  {:<10}  {:>5.1}%  {}  {}",
                    job.id,
                    job.status,
                    job.progress,
                    job.created_at.format("%Y-%m-%d %H:%M"),
                    job.title.as_deref().unwrap_or(&job.filename)
                );
            }
        }
        JobsAction::Status { id } => {
            let job = service.status(id)?;
            println!("Job:      {}", job.id);
            println!("File:     {}", job.filename);
            println!("Status:   {}", job.status);
            println!("Progress: {:.1}%", job.progress);
            println!("Step:     {}", job.current_step);
            if let Some(metadata) = &job.metadata {
                println!(
                    "Book:     \"{}\" by {} ({}, {} chapters, {} words)",
                    metadata.title,
                    metadata.author,
                    metadata.language,
                    metadata.total_chapters,
                    metadata.total_words
                );
            }
            if !job.chapters.is_empty() {
                let ok = job.chapters.iter().filter(|c| c.success).count();
                println!(
                    "Chapters: {} analysed, {} failed",
                    ok,
                    job.chapters.len() - ok
                );
            }
            if let Some(error) = &job.error_message {
                println!("Error:    {}", error);
            }
            if let Some(md) = &job.markdown_path {
                println!("Markdown: {}", md.display());
            }
            if let Some(pdf) = &job.pdf_path {
                println!("PDF:      {}", pdf.display());
            }
        }
        JobsAction::Path { id, pdf } => {
            let artifact = if *pdf { Artifact::Pdf } else { Artifact::Markdown };
            println!("{}", service.artifact(id, artifact)?.display());
        }
        JobsAction::Delete { id } => {
            service.delete(id).await?;
            println!("Deleted job {}", id);
        }
    }
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = BooksConfig::load()?;
            println!("Configuration file: {:?}", BooksConfig::config_path()?);
            println!();
            println!("max_tokens_per_chunk = {}", config.max_tokens_per_chunk);
            println!("overlap_tokens = {}", config.overlap_tokens);
            println!("min_chapter_tokens = {}", config.min_chapter_tokens);
            println!("context_window = {}", config.context_window);
            println!("retry_delay_secs = {}", config.retry_delay_secs);
            println!("data_dir = \"{}\"", config.data_dir()?.display());
            match &config.model {
                Some(model) => println!("model = \"{}\"", model),
                None => println!("model = (llm-client default)"),
            }
        }
        ConfigAction::SetMaxTokens { value } => {
            let mut config = BooksConfig::load()?;
            config.max_tokens_per_chunk = (*value).max(500);
            config.save()?;
            println!("Max tokens per chunk set to: {}", config.max_tokens_per_chunk);
        }
        ConfigAction::SetOverlap { value } => {
            let mut config = BooksConfig::load()?;
            config.overlap_tokens = (*value).min(config.max_tokens_per_chunk / 2);
            config.save()?;
            println!("Overlap set to: {} tokens", config.overlap_tokens);
        }
        ConfigAction::SetContextWindow { value } => {
            let mut config = BooksConfig::load()?;
            config.context_window = *value;
            config.save()?;
            println!("Context window set to: {} summaries", config.context_window);
        }
        ConfigAction::SetModel { preset } => {
            llm_client::Config::load()?.get_preset(preset)?;
            let mut config = BooksConfig::load()?;
            config.model = Some(preset.clone());
            config.save()?;
            println!("Default model preset set to: {}", preset);
        }
    }
    Ok(())
}
