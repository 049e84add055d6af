//! booksmd configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::segment::SplitterConfig;

const DEFAULT_MAX_TOKENS: usize = 12_000;
const DEFAULT_OVERLAP_TOKENS: usize = 200;
const DEFAULT_MIN_CHAPTER_TOKENS: usize = 30;
const DEFAULT_CONTEXT_WINDOW: usize = 50;
const DEFAULT_RETRY_DELAY_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooksConfig {
    /// Token budget per chapter before it is subdivided
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_chunk: usize,

    /// Tokens of trailing paragraphs repeated at the start of the next chunk
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Chapters below this are dropped
    #[serde(default = "default_min_chapter_tokens")]
    pub min_chapter_tokens: usize,

    /// Rolling context size (previous chapter summaries)
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Pause before retrying a rate-limited request
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Job store, uploads and default output location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// LLM preset name from llm.toml. None means the llm-client default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_overlap_tokens() -> usize {
    DEFAULT_OVERLAP_TOKENS
}

fn default_min_chapter_tokens() -> usize {
    DEFAULT_MIN_CHAPTER_TOKENS
}

fn default_context_window() -> usize {
    DEFAULT_CONTEXT_WINDOW
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

impl Default for BooksConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
            min_chapter_tokens: default_min_chapter_tokens(),
            context_window: default_context_window(),
            retry_delay_secs: default_retry_delay_secs(),
            data_dir: None,
            model: None,
        }
    }
}

impl BooksConfig {
    /// Get the config file path: ~/.config/cli-programs/booksmd.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("booksmd.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: BooksConfig =
            toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Configured data directory, else the platform data dir plus `booksmd`.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .map(|d| d.join("booksmd"))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
    }

    pub fn splitter(&self) -> SplitterConfig {
        SplitterConfig {
            max_tokens: self.max_tokens_per_chunk,
            overlap_tokens: self.overlap_tokens,
            min_chapter_tokens: self.min_chapter_tokens,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BooksConfig::default();
        assert_eq!(config.max_tokens_per_chunk, 12_000);
        assert_eq!(config.overlap_tokens, 200);
        assert_eq!(config.min_chapter_tokens, 30);
        assert_eq!(config.context_window, 50);
        assert_eq!(config.retry_delay(), Duration::from_secs(60));
        assert!(config.model.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: BooksConfig = toml::from_str("max_tokens_per_chunk = 8000\nmodel = \"openai\"").unwrap();
        assert_eq!(config.max_tokens_per_chunk, 8000);
        assert_eq!(config.overlap_tokens, 200);
        assert_eq!(config.model.as_deref(), Some("openai"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("booksmd.toml");
        let config = BooksConfig {
            context_window: 10,
            data_dir: Some(dir.path().to_path_buf()),
            ..BooksConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(BooksConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = BooksConfig::load_from(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, BooksConfig::default());
    }

    #[test]
    fn test_splitter_config() {
        let config = BooksConfig {
            max_tokens_per_chunk: 500,
            overlap_tokens: 20,
            min_chapter_tokens: 5,
            ..BooksConfig::default()
        };
        let splitter = config.splitter();
        assert_eq!(splitter.max_tokens, 500);
        assert_eq!(splitter.overlap_tokens, 20);
        assert_eq!(splitter.min_chapter_tokens, 5);
    }

    #[test]
    fn test_explicit_data_dir() {
        let config = BooksConfig {
            data_dir: Some(PathBuf::from("/tmp/books")),
            ..BooksConfig::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/books"));
    }
}
