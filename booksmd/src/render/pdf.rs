//! Plain PDF rendition of the Markdown document.
//!
//! Uses the standard Helvetica fonts with WinAnsi encoding, so characters
//! outside that set (emoji, most symbols) are dropped. Layout is line based:
//! headings get a larger bold font, everything else is word-wrapped body text.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::fs;
use std::path::{Path, PathBuf};

use super::RenderError;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 56.0;
const BODY_SIZE: f32 = 10.5;
const LEADING: f32 = 1.4;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    size: f32,
    bold: bool,
}

/// Convert the Markdown file at `md_path` into a PDF beside it.
pub fn write_pdf(md_path: &Path) -> Result<PathBuf, RenderError> {
    let markdown = fs::read_to_string(md_path).map_err(|e| RenderError::io(md_path, e))?;
    let pdf_path = md_path.with_extension("pdf");

    let mut doc = build_document(&layout(&markdown))?;
    doc.compress();
    doc.save(&pdf_path).map_err(|e| RenderError::io(&pdf_path, e))?;
    Ok(pdf_path)
}

/// Turn Markdown into styled, wrapped lines.
fn layout(markdown: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    for raw in markdown.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().all(|c| matches!(c, '-' | '*' | '_' | '═')) {
            lines.push(Line {
                text: String::new(),
                size: BODY_SIZE,
                bold: false,
            });
            continue;
        }

        let level = trimmed.chars().take_while(|&c| c == '#').count();
        let (text, size, bold) = match level {
            1 => (&trimmed[1..], 18.0, true),
            2 => (&trimmed[2..], 14.0, true),
            3..=6 => (&trimmed[level..], 12.0, true),
            _ => (trimmed, BODY_SIZE, false),
        };
        let text = plain_text(text.trim());
        for wrapped in wrap(&text, chars_per_line(size)) {
            lines.push(Line {
                text: wrapped,
                size,
                bold,
            });
        }
    }
    lines
}

/// Strip inline Markdown markup.
fn plain_text(text: &str) -> String {
    let text = text.strip_prefix("> ").unwrap_or(text);
    let text = match text.strip_prefix("- ").or_else(|| text.strip_prefix("* ")) {
        Some(item) => format!("• {item}"),
        None => text.to_string(),
    };
    text.replace("**", "").replace('`', "")
}

fn chars_per_line(size: f32) -> usize {
    ((PAGE_WIDTH - 2.0 * MARGIN) / (size * AVG_GLYPH_WIDTH)) as usize
}

/// Greedy word wrap; words longer than `width` get a line to themselves.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if !current.is_empty() && needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Map a string onto WinAnsi bytes, dropping what the encoding lacks.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|c| match c {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => Some(c as u8),
            '€' => Some(0x80),
            '…' => Some(0x85),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '→' => Some(b'>'),
            _ => None,
        })
        .collect()
}

fn build_document(lines: &[Line]) -> Result<Document, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(font("Helvetica"));
    let bold = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in paginate(lines) {
        let content = page_content(page)
            .encode()
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id: ObjectId = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Split lines into pages by vertical space. Always yields at least one page.
fn paginate(lines: &[Line]) -> Vec<&[Line]> {
    let usable = PAGE_HEIGHT - 2.0 * MARGIN;
    let mut pages = Vec::new();
    let mut start = 0;
    let mut used = 0.0;

    for (i, line) in lines.iter().enumerate() {
        let height = line.size * LEADING;
        if used + height > usable && i > start {
            pages.push(&lines[start..i]);
            start = i;
            used = 0.0;
        }
        used += height;
    }
    pages.push(&lines[start..]);
    pages
}

fn page_content(lines: &[Line]) -> Content {
    let mut operations = vec![Operation::new("BT", vec![])];
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        y -= line.size * LEADING;
        if line.text.is_empty() {
            continue;
        }
        let font = if line.bold { "F2" } else { "F1" };
        operations.push(Operation::new("Tf", vec![font.into(), line.size.into()]));
        operations.push(Operation::new(
            "Tm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), MARGIN.into(), y.into()],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(win_ansi(&line.text))],
        ));
    }

    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_styles_headings() {
        let lines = layout("# Title\n\n## Section\nSome **bold** body.\n---\n- item");
        assert_eq!(lines[0], Line { text: "Title".into(), size: 18.0, bold: true });
        assert!(lines[1].text.is_empty());
        assert_eq!(lines[2].size, 14.0);
        assert_eq!(lines[3].text, "Some bold body.");
        assert!(!lines[3].bold);
        assert!(lines[4].text.is_empty());
        assert_eq!(lines[5].text, "• item");
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap("abcdefghij xy", 4), vec!["abcdefghij", "xy"]);
        assert!(wrap("   ", 10).is_empty());
    }

    #[test]
    fn test_win_ansi_drops_unmappable() {
        assert_eq!(win_ansi("ação"), vec![b'a', 0xE7, 0xE3, b'o']);
        assert_eq!(win_ansi("📌 ok — fim"), b" ok \x97 fim".to_vec());
    }

    #[test]
    fn test_paginate() {
        let line = Line { text: "x".into(), size: BODY_SIZE, bold: false };
        let lines = vec![line; 200];
        let pages = paginate(&lines);
        assert!(pages.len() > 1);
        assert_eq!(pages.iter().map(|p| p.len()).sum::<usize>(), 200);
        assert_eq!(paginate(&[]).len(), 1);
    }

    #[test]
    fn test_write_pdf_next_to_markdown() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("book_01234567.md");
        let body = "Parágrafo de teste com acentuação. ".repeat(400);
        fs::write(&md, format!("# Título\n\n{body}\n")).unwrap();

        let pdf = write_pdf(&md).unwrap();
        assert_eq!(pdf, dir.path().join("book_01234567.pdf"));
        let bytes = fs::read(&pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let parsed = Document::load(&pdf).unwrap();
        assert!(parsed.get_pages().len() >= 2);
    }

    #[test]
    fn test_missing_markdown_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = write_pdf(&dir.path().join("missing.md"));
        assert!(matches!(result, Err(RenderError::Io { .. })));
    }
}
