//! Text extraction from book files.
//!
//! The format is chosen from the file extension. Every extractor's output is
//! normalised before it is returned, so segmentation always sees clean lines.

mod epub;
mod language;
mod pdf;
mod txt;

pub use language::detect_language;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::text::normalize;

/// Supported book formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookType {
    Pdf,
    Epub,
    Txt,
}

impl BookType {
    /// Format for a file name, from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "epub" => Some(Self::Epub),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Txt => "txt",
        }
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse EPUB: {0}")]
    Epub(String),

    #[error("failed to parse PDF: {0}")]
    Pdf(String),
}

impl ExtractionError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Text and metadata extracted from a book file.
#[derive(Debug, Clone)]
pub struct ExtractedBook {
    /// Normalised text
    pub text: String,
    pub book_type: BookType,
    /// Title from the file's own metadata, when the format has any
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Extract normalised text from `path`.
pub fn extract(path: &Path) -> Result<ExtractedBook, ExtractionError> {
    let book_type = BookType::from_path(path)
        .ok_or_else(|| ExtractionError::Unsupported(path.display().to_string()))?;

    let (raw, title, author) = match book_type {
        BookType::Txt => (txt::extract_txt(path)?, None, None),
        BookType::Pdf => (pdf::extract_pdf(path)?, None, None),
        BookType::Epub => {
            let book = epub::extract_epub(path)?;
            (book.text, book.title, book.author)
        }
    };

    Ok(ExtractedBook {
        text: normalize(&raw),
        book_type,
        title,
        author,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_book_type_from_path() {
        assert_eq!(BookType::from_path(Path::new("a/b.PDF")), Some(BookType::Pdf));
        assert_eq!(BookType::from_path(Path::new("book.epub")), Some(BookType::Epub));
        assert_eq!(BookType::from_path(Path::new("notes.txt")), Some(BookType::Txt));
        assert_eq!(BookType::from_path(Path::new("scan.docx")), None);
        assert_eq!(BookType::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = extract(Path::new("/tmp/book.docx"));
        assert!(matches!(result, Err(ExtractionError::Unsupported(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = extract(&dir.path().join("missing.txt"));
        assert!(matches!(result, Err(ExtractionError::Io { .. })));
    }

    #[test]
    fn test_extract_txt_is_normalised() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, "Chapter 1: Start\r\n\r\n\r\n\r\nSome   text\r\n12\r\n").unwrap();

        let book = extract(&path).unwrap();
        assert_eq!(book.book_type, BookType::Txt);
        assert_eq!(book.text, "Chapter 1: Start\n\nSome text");
        assert!(book.title.is_none());
    }

    #[test]
    fn test_book_type_serde() {
        assert_eq!(serde_json::to_string(&BookType::Epub).unwrap(), "\"epub\"");
        let parsed: BookType = serde_json::from_str("\"pdf\"").unwrap();
        assert_eq!(parsed, BookType::Pdf);
    }
}
