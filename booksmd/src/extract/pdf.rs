//! PDF text extraction.

use std::path::Path;

use super::ExtractionError;

/// Extract the text layer of a PDF. Page breaks (form feeds) become blank lines.
pub fn extract_pdf(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractionError::io(path, e))?;
    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    Ok(text.replace('\x0C', "\n\n"))
}
