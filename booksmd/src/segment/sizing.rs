//! Size-based splitting: greedy paragraph packing with a trailing overlap.

use super::{Chapter, SplitterConfig};
use crate::text::count_tokens;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Most paragraphs carried from one chunk into the next.
const MAX_OVERLAP_PARAGRAPHS: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Paragraph<'a> {
    text: &'a str,
    tokens: usize,
}

/// Paragraphs packed into one chunk. The first `carried` repeat the tail of
/// the previous chunk.
#[derive(Debug, Default)]
struct Chunk<'a> {
    paragraphs: Vec<Paragraph<'a>>,
    carried: usize,
}

impl<'a> Chunk<'a> {
    fn content(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join(PARAGRAPH_SEPARATOR)
    }

    fn fresh(&self) -> &[Paragraph<'a>] {
        &self.paragraphs[self.carried..]
    }
}

/// Split `text` into chunks of at most `config.max_tokens`, titled `"{base_title} {n}"`.
///
/// Paragraphs are never split: a paragraph larger than the budget becomes a
/// chunk of its own and is flagged `oversized`. Each new chunk opens with up
/// to two trailing paragraphs of the previous one, as long as they fit in
/// `config.overlap_tokens`. A chunk under `config.min_chapter_tokens` is
/// folded into its neighbour instead of being emitted, so no paragraph is
/// lost unless the whole text is under the minimum.
pub fn split_by_size(text: &str, base_title: &str, config: &SplitterConfig) -> Vec<Chapter> {
    let chunks = absorb_undersized(pack(text, config), config.min_chapter_tokens);

    let mut chapters: Vec<Chapter> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let content = chunk.content();
        let token_count = count_tokens(&content);
        let number = chapters.len() + 1;
        chapters.push(Chapter {
            number,
            title: format!("{} {}", base_title, number),
            content,
            start_position: 0,
            token_count,
            part: None,
            oversized: token_count > config.max_tokens,
        });
    }

    chapters
}

/// Greedy packing of paragraphs under the token budget.
fn pack<'a>(text: &'a str, config: &SplitterConfig) -> Vec<Chunk<'a>> {
    let separator_tokens = count_tokens(PARAGRAPH_SEPARATOR);

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current = Chunk::default();
    let mut current_tokens = 0;

    for para in text
        .split(PARAGRAPH_SEPARATOR)
        .filter(|p| !p.trim().is_empty())
    {
        let paragraph = Paragraph {
            text: para,
            tokens: count_tokens(para),
        };

        if !current.paragraphs.is_empty()
            && current_tokens + separator_tokens + paragraph.tokens > config.max_tokens
        {
            let overlap = overlap_tail(&current.paragraphs, config.overlap_tokens);
            chunks.push(std::mem::take(&mut current));

            let overlap_tokens = packed_tokens(&overlap, separator_tokens);
            current_tokens = 0;
            if !overlap.is_empty()
                && overlap_tokens + separator_tokens + paragraph.tokens <= config.max_tokens
            {
                current = Chunk {
                    carried: overlap.len(),
                    paragraphs: overlap,
                };
                current_tokens = overlap_tokens;
            }
        }

        let separator = if current.paragraphs.is_empty() { 0 } else { separator_tokens };
        current_tokens += separator + paragraph.tokens;
        current.paragraphs.push(paragraph);
    }

    if !current.paragraphs.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Fold chunks under `min_tokens` into a neighbour.
///
/// An undersized chunk appends its own paragraphs to the previous kept chunk.
/// With no previous chunk, it is carried forward and prepended to the next.
/// Overlap paragraphs already present in the neighbour are not repeated.
fn absorb_undersized(chunks: Vec<Chunk<'_>>, min_tokens: usize) -> Vec<Chunk<'_>> {
    let mut kept: Vec<Chunk> = Vec::with_capacity(chunks.len());
    let mut pending = Vec::new();

    for mut chunk in chunks {
        if !pending.is_empty() {
            // The carried head of this chunk is the tail of `pending`.
            let fresh = chunk.paragraphs.split_off(chunk.carried);
            let mut paragraphs: Vec<Paragraph> = std::mem::take(&mut pending);
            paragraphs.extend(fresh);
            chunk = Chunk {
                paragraphs,
                carried: 0,
            };
        }

        let tokens = count_tokens(&chunk.content());
        if tokens >= min_tokens {
            kept.push(chunk);
        } else if let Some(previous) = kept.last_mut() {
            log::debug!(
                "Merging chunk of {} tokens (minimum {}) into the previous one",
                tokens,
                min_tokens
            );
            previous.paragraphs.extend_from_slice(chunk.fresh());
        } else {
            log::debug!(
                "Carrying chunk of {} tokens (minimum {}) into the next one",
                tokens,
                min_tokens
            );
            pending = chunk.paragraphs;
        }
    }

    if !pending.is_empty() {
        log::debug!(
            "Skipping text of {} paragraph(s) below the minimum of {} tokens",
            pending.len(),
            min_tokens
        );
    }
    kept
}

/// Trailing paragraphs that fit in the overlap budget, in original order.
fn overlap_tail<'a>(paragraphs: &[Paragraph<'a>], budget: usize) -> Vec<Paragraph<'a>> {
    let mut tail = Vec::with_capacity(MAX_OVERLAP_PARAGRAPHS);
    let mut total = 0;

    for para in paragraphs.iter().rev().take(MAX_OVERLAP_PARAGRAPHS) {
        if total + para.tokens > budget {
            break;
        }
        total += para.tokens;
        tail.push(*para);
    }

    tail.reverse();
    tail
}

fn packed_tokens(paragraphs: &[Paragraph], separator_tokens: usize) -> usize {
    let text_tokens: usize = paragraphs.iter().map(|p| p.tokens).sum();
    text_tokens + separator_tokens * paragraphs.len().saturating_sub(1)
}
