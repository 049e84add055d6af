//! Output documents: the Markdown analysis and a PDF derived from it.

mod markdown;
mod pdf;

pub use markdown::{BookDocument, output_filename, render_markdown, write_markdown};
pub use pdf::write_pdf;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF encoding failed: {0}")]
    Pdf(String),
}

impl RenderError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
