//! Chapter segmentation: boundary detection, chapter assembly and size-based splitting.
//!
//! Raw text flows through a [`BoundaryDetector`] into the [`ChapterSplitter`],
//! which either slices the text at the detected boundaries or falls back to
//! paragraph packing when detection is inconclusive.

mod assembler;
mod detector;
mod patterns;
mod sizing;

pub use assembler::ChapterSplitter;
pub use detector::PatternDetector;
pub use sizing::split_by_size;

use serde::{Deserialize, Serialize};

use crate::text::count_tokens;

/// Titles longer than this are truncated.
pub const MAX_TITLE_CHARS: usize = 100;

/// Base label for chapters produced by size-based splitting of a whole book.
pub const FALLBACK_BASE_TITLE: &str = "Seção";

/// A finished chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Position in the final list, 1-based, unique
    pub number: usize,
    /// Display title
    pub title: String,
    /// The exact text span of this chapter
    pub content: String,
    /// Byte offset into the source text (0 for size-based chunks)
    pub start_position: usize,
    /// Token count of `content`
    pub token_count: usize,
    /// Set when this chapter is one piece of a subdivided chapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<ChapterPart>,
    /// A single paragraph larger than the token budget
    #[serde(default)]
    pub oversized: bool,
}

/// Grouping record for the pieces of a subdivided chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPart {
    pub parent_title: String,
    /// 1-based index of this piece
    pub index: usize,
    pub count: usize,
}

impl Chapter {
    /// Build a chapter, counting tokens once.
    pub fn new(number: usize, title: &str, content: String, start_position: usize) -> Self {
        let token_count = count_tokens(&content);
        Self {
            number,
            title: display_title(title, number),
            content,
            start_position,
            token_count,
            part: None,
            oversized: false,
        }
    }
}

/// Truncate a title for display, or produce a placeholder for an empty one.
pub fn display_title(title: &str, number: usize) -> String {
    let title = title.trim();
    if title.is_empty() {
        return format!("Capítulo {}", number);
    }
    title.chars().take(MAX_TITLE_CHARS).collect()
}

/// A tentative chapter start found by a detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryCandidate {
    /// Sequence number assigned by the detector (1-based)
    pub number: usize,
    /// Number written in the heading itself, when it has one
    pub marker: Option<u32>,
    pub title: String,
    /// Byte offset of the heading line in the source text
    pub offset: usize,
}

/// Finds chapter starts in a document.
///
/// Returns candidates ordered by offset, or an empty list when the text has
/// no reliable chapter structure.
pub trait BoundaryDetector: Send + Sync {
    fn detect(&self, text: &str) -> Vec<BoundaryCandidate>;
}

/// Sizing parameters for segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_chapter_tokens: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 12_000,
            overlap_tokens: 200,
            min_chapter_tokens: 30,
        }
    }
}

/// Summary figures for a segmented book.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookStats {
    pub total_chapters: usize,
    pub total_tokens: usize,
    pub total_words: usize,
    pub avg_tokens_per_chapter: usize,
    pub chapters: Vec<ChapterStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterStat {
    pub number: usize,
    pub title: String,
    pub tokens: usize,
}

impl BookStats {
    pub fn from_chapters(chapters: &[Chapter]) -> Self {
        let total_tokens: usize = chapters.iter().map(|c| c.token_count).sum();
        let total_words: usize = chapters
            .iter()
            .map(|c| crate::text::word_count(&c.content))
            .sum();
        let avg_tokens_per_chapter = if chapters.is_empty() {
            0
        } else {
            total_tokens / chapters.len()
        };

        Self {
            total_chapters: chapters.len(),
            total_tokens,
            total_words,
            avg_tokens_per_chapter,
            chapters: chapters
                .iter()
                .map(|c| ChapterStat {
                    number: c.number,
                    title: c.title.clone(),
                    tokens: c.token_count,
                })
                .collect(),
        }
    }
}
