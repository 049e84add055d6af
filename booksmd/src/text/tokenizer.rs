//! Token counting for sizing decisions.
//!
//! One BPE vocabulary (`o200k_base`) is used for the whole process. Counts are
//! only compared against each other, never against an external model limit.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

/// Count tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    match encoder() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => fallback_count(text),
    }
}

/// Whitespace word count, used only if the vocabulary fails to load.
fn fallback_count(text: &str) -> usize {
    let count = text.split_whitespace().count();
    if count == 0 && !text.is_empty() { 1 } else { count }
}

fn encoder() -> Option<&'static CoreBPE> {
    static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();
    ENCODER
        .get_or_init(|| match tiktoken_rs::o200k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                log::warn!("Tokenizer vocabulary unavailable, counting words instead: {}", e);
                None
            }
        })
        .as_ref()
}
