//! Text preparation shared by extraction and segmentation: normalisation and token counting.

pub mod cleaner;
pub mod tokenizer;

pub use cleaner::normalize;
pub use tokenizer::count_tokens;

/// Approximate word count (whitespace separated).
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
