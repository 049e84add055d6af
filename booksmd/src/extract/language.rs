//! Best-effort language guess from stop-word frequencies.

use once_cell::sync::Lazy;
use regex::Regex;

const PORTUGUESE: &[&str] = &[
    "de", "que", "não", "para", "uma", "com", "são", "está", "isso", "como", "mais", "você",
];
const ENGLISH: &[&str] = &[
    "the", "and", "that", "have", "for", "not", "with", "you", "this", "but", "from", "they",
];
const SPANISH: &[&str] = &[
    "que", "los", "del", "las", "una", "con", "para", "está", "pero", "más", "como", "hay",
];

/// Fallback when the text has no words.
const DEFAULT_LANGUAGE: &str = "pt";

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// Guess the language code (`pt`, `en` or `es`) of `text`.
///
/// Ties go to the earlier language in that order.
pub fn detect_language(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let mut scores = [("pt", 0usize), ("en", 0), ("es", 0)];
    let mut total = 0;

    for word in WORD.find_iter(&lower).map(|m| m.as_str()) {
        total += 1;
        for (score, list) in scores.iter_mut().zip([PORTUGUESE, ENGLISH, SPANISH]) {
            if list.contains(&word) {
                score.1 += 1;
            }
        }
    }

    if total == 0 {
        return DEFAULT_LANGUAGE;
    }

    let mut best = scores[0];
    for candidate in &scores[1..] {
        if candidate.1 > best.1 {
            best = *candidate;
        }
    }
    best.0
}
