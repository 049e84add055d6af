//! Heading pattern tables and the title heuristics used to validate matches.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Family of a heading marker. Numbering sequences are tracked per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Chapter,
    Part,
    Roman,
    Numbered,
}

/// A heading regex with two captures: the marker number and the inline title.
pub struct HeadingPattern {
    pub kind: MarkerKind,
    pub regex: Regex,
}

impl HeadingPattern {
    fn new(kind: MarkerKind, pattern: &str) -> Self {
        Self {
            kind,
            regex: Regex::new(pattern).expect("valid heading pattern"),
        }
    }
}

/// Explicit chapter/part markers followed by a number.
pub static STRONG_PATTERNS: Lazy<Vec<HeadingPattern>> = Lazy::new(|| {
    vec![
        HeadingPattern::new(
            MarkerKind::Chapter,
            r"(?i)^[#\s]*cap[íi]tulo\s+(\d+)\b[:.\s\-—]*(.*)$",
        ),
        HeadingPattern::new(MarkerKind::Chapter, r"(?i)^[#\s]*cap\.\s*(\d+)\b[:.\s\-—]*(.*)$"),
        HeadingPattern::new(MarkerKind::Chapter, r"(?i)^[#\s]*chapter\s+(\d+)\b[:.\s\-—]*(.*)$"),
        HeadingPattern::new(
            MarkerKind::Part,
            r"(?i)^[#\s]*parte?\s+(\d+|[ivx]+)\b[:.\s\-—]*(.*)$",
        ),
    ]
});

/// Bare numbering, only tried when the strong set is inconclusive.
pub static WEAK_PATTERNS: Lazy<Vec<HeadingPattern>> = Lazy::new(|| {
    vec![
        HeadingPattern::new(
            MarkerKind::Roman,
            r"^(I{1,3}|IV|V|VI{1,3}|IX|X|XI{1,3}|XIV|XV)\.\s+(.+)$",
        ),
        HeadingPattern::new(MarkerKind::Numbered, r"^(\d{1,2})\.\s+([A-Z][a-zA-Z\s]{20,})$"),
    ]
});

/// Keyword plus number near a candidate, used to confirm it when a pass overproduces.
pub static NUMBERED_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:chapter|cap[íi]tulo|parte?)\s*\d+").expect("valid keyword regex")
});

static QUESTION_OPENERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:",
        r"are the (?:customers|users|people|clients)",
        r"|are (?:you|they|we)",
        r"|do you|have you",
        r"|is (?:this|that|it)",
        r"|what (?:is|are)",
        r"|how (?:do|does|can|will)",
        r"|why (?:do|does|is|are)",
        r"|when (?:do|does|will|is)",
        r"|where (?:do|does|is|are)",
        r"|who (?:is|are|do|does)",
        r"|which (?:is|are|do|does)",
        r")",
    ))
    .expect("valid question regex")
});

/// Function words that do not count as substantive.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Characters kept when normalising a title for comparison.
const NORMALIZED_TITLE_CHARS: usize = 50;

/// A line recognised as a heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    pub kind: MarkerKind,
    pub marker: Option<u32>,
    pub title: String,
}

/// Match a trimmed line against `patterns`; the first matching pattern decides.
///
/// The title is the trailing text after the marker, or the whole line when
/// the heading carries no inline title.
pub fn match_heading(line: &str, patterns: &[&HeadingPattern]) -> Option<HeadingMatch> {
    patterns.iter().find_map(|pattern| {
        let caps = pattern.regex.captures(line)?;
        let marker = caps.get(1).and_then(|m| parse_marker(m.as_str()));
        let title = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .filter(|t| !t.is_empty())
            .unwrap_or(line);

        Some(HeadingMatch {
            kind: pattern.kind,
            marker,
            title: title.to_string(),
        })
    })
}

/// Parse an arabic or roman marker.
pub fn parse_marker(marker: &str) -> Option<u32> {
    if let Ok(n) = marker.parse::<u32>() {
        return Some(n);
    }
    parse_roman(marker)
}

fn parse_roman(numeral: &str) -> Option<u32> {
    let mut total = 0u32;
    let mut prev = 0u32;

    for c in numeral.chars().rev() {
        let value = match c.to_ascii_uppercase() {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            _ => return None,
        };
        if value < prev {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            prev = value;
        }
    }

    (total > 0).then_some(total)
}

/// Lowercased, trimmed prefix of a title, used for duplicate detection.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .take(NORMALIZED_TITLE_CHARS)
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Jaccard similarity of the word sets of two titles.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

/// True for short interrogative sentences lifted from body text.
pub fn is_question_only(title: &str) -> bool {
    let len = title.chars().count();
    if len < 80 && QUESTION_OPENERS.is_match(title) {
        return true;
    }
    title.trim().ends_with('?') && len < 100
}

/// True when a title has at least two substantive words or is long.
pub fn has_substantive_content(title: &str) -> bool {
    let substantive = title
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w) && w.chars().count() > 3)
        .count();

    substantive >= 2 || title.chars().count() > 40
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong() -> Vec<&'static HeadingPattern> {
        STRONG_PATTERNS.iter().collect()
    }

    fn all() -> Vec<&'static HeadingPattern> {
        STRONG_PATTERNS.iter().chain(WEAK_PATTERNS.iter()).collect()
    }

    #[test]
    fn test_chapter_with_inline_title() {
        let m = match_heading("Chapter 12: The Long Road Home", &strong()).unwrap();
        assert_eq!(m.kind, MarkerKind::Chapter);
        assert_eq!(m.marker, Some(12));
        assert_eq!(m.title, "The Long Road Home");
    }

    #[test]
    fn test_portuguese_markers() {
        let m = match_heading("CAPÍTULO 3 — A Travessia", &strong()).unwrap();
        assert_eq!(m.marker, Some(3));
        assert_eq!(m.title, "A Travessia");

        let m = match_heading("## Cap. 7 - Fim", &strong()).unwrap();
        assert_eq!(m.marker, Some(7));
        assert_eq!(m.title, "Fim");
    }

    #[test]
    fn test_bare_marker_uses_whole_line() {
        let m = match_heading("Chapter 4", &strong()).unwrap();
        assert_eq!(m.title, "Chapter 4");
    }

    #[test]
    fn test_roman_part() {
        let m = match_heading("Parte IV: O Retorno", &strong()).unwrap();
        assert_eq!(m.kind, MarkerKind::Part);
        assert_eq!(m.marker, Some(4));
        assert_eq!(m.title, "O Retorno");
    }

    #[test]
    fn test_part_requires_whole_numeral() {
        assert!(match_heading("Parte vivida da nossa história", &strong()).is_none());
    }

    #[test]
    fn test_chapter_word_in_prose_does_not_match() {
        assert!(match_heading("In this chapter 3 ideas are discussed", &strong()).is_none());
    }

    #[test]
    fn test_weak_patterns_only_in_weak_tier() {
        let line = "IV. The Architecture of Choice";
        assert!(match_heading(line, &strong()).is_none());
        let m = match_heading(line, &all()).unwrap();
        assert_eq!(m.kind, MarkerKind::Roman);
        assert_eq!(m.marker, Some(4));
        assert_eq!(m.title, "The Architecture of Choice");
    }

    #[test]
    fn test_weak_numbered_needs_long_capitalised_title() {
        let m = match_heading("12. Building Systems That Last Forever", &all()).unwrap();
        assert_eq!(m.kind, MarkerKind::Numbered);
        assert!(match_heading("12. Short one", &all()).is_none());
        assert!(match_heading("12. lowercase words that go on and on", &all()).is_none());
    }

    #[test]
    fn test_parse_marker() {
        assert_eq!(parse_marker("42"), Some(42));
        assert_eq!(parse_marker("XIV"), Some(14));
        assert_eq!(parse_marker("ix"), Some(9));
        assert_eq!(parse_marker("abc"), None);
    }

    #[test]
    fn test_normalize_title() {
        let long = format!("  {}", "A".repeat(80));
        assert_eq!(normalize_title(&long).chars().count(), 48);
        assert_eq!(normalize_title("The Origins "), "the origins");
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard("a b c", "a b c"), 1.0);
        assert_eq!(jaccard("a b", "c d"), 0.0);
        assert!((jaccard("a b c", "a b d") - 0.5).abs() < 1e-9);
        assert_eq!(jaccard("", "a"), 0.0);
    }

    #[test]
    fn test_question_titles() {
        assert!(is_question_only("What is the point of all this"));
        assert!(is_question_only("Should we keep going?"));
        assert!(!is_question_only("The Question of Method"));
    }

    #[test]
    fn test_substantive_content() {
        assert!(has_substantive_content("Foundations of Economic Thought"));
        assert!(!has_substantive_content("On the Way"));
        assert!(!has_substantive_content("Origins"));
        assert!(has_substantive_content(
            "a an the of to in on at by with for and or but"
        ));
    }
}
