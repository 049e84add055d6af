// EPUB parsing and text extraction

use std::path::Path;

use super::ExtractionError;

/// Text of an EPUB in spine order, plus its metadata.
#[derive(Debug)]
pub struct EpubText {
    pub title: Option<String>,
    pub author: Option<String>,
    pub text: String,
}

/// Parse an EPUB file and concatenate its spine documents as plain text
pub fn extract_epub(path: &Path) -> Result<EpubText, ExtractionError> {
    let mut doc =
        epub::doc::EpubDoc::new(path).map_err(|e| ExtractionError::Epub(e.to_string()))?;

    let title = doc
        .mdata("title")
        .map(|m| m.value.clone())
        .filter(|t| !t.trim().is_empty());
    let author = doc
        .mdata("creator")
        .map(|m| m.value.clone())
        .filter(|a| !a.trim().is_empty());

    let mut sections = Vec::new();
    let spine = doc.spine.clone();

    for spine_item in spine.iter() {
        if let Some((content_bytes, _mime)) = doc.get_resource(&spine_item.idref) {
            let html = String::from_utf8_lossy(&content_bytes);
            let plain_text = html_to_text(&html);

            // Skip empty documents (cover pages, image-only sections)
            if plain_text.trim().is_empty() {
                continue;
            }
            sections.push(plain_text);
        }
    }

    if sections.is_empty() {
        log::warn!("EPUB {} has no text in its spine", path.display());
    }

    Ok(EpubText {
        title,
        author,
        text: sections.join("\n\n"),
    })
}

/// Convert HTML to plain text, keeping block structure as lines
fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 10_000);
    decode_entities(&text)
}

/// Decode entities html2text leaves behind
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&mdash;", "—")
        .replace("&ndash;", "–")
        .replace("&hellip;", "...")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&rdquo;", "\"")
        .replace("&ldquo;", "\"")
        .replace("&amp;", "&")
}
