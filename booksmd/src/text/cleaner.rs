//! Normalisation of extracted text before boundary detection.
//!
//! Heading patterns are matched line by line, so the text has to arrive with
//! clean line structure: no invisible characters, single spaces, at most one
//! blank line between paragraphs, no page furniture and no words broken
//! across lines.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters rewritten before line processing.
const REPLACED_CHARS: &[(char, &str)] = &[
    ('\u{00a0}', " "), // Non-breaking space
    ('\u{2007}', " "), // Figure space
    ('\u{202f}', " "), // Narrow no-break space
    ('\u{200b}', ""),  // Zero-width space
    ('\u{200c}', ""),  // Zero-width non-joiner
    ('\u{200d}', ""),  // Zero-width joiner
    ('\u{00ad}', ""),  // Soft hyphen
    ('\u{feff}', ""),  // BOM
    ('\t', " "),
];

/// Longest line still treated as a running header/footer.
const MAX_HEADER_LINE_CHARS: usize = 60;

static PAGE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:p[áa]gina|page)\s+\d+\b").expect("valid page header regex"));

/// Normalise extracted text.
///
/// - Line endings become `\n`; control and zero-width characters are removed
/// - Runs of spaces collapse to one; lines are trimmed
/// - Lines holding only a page number, and short "page N" headers, are dropped
/// - A word hyphenated across a line break is rejoined
/// - Runs of blank lines collapse to a single blank line
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = replace_chars(&text);

    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n') {
        let line = collapse_spaces(raw);

        if is_page_furniture(&line) {
            continue;
        }

        if let Some(prev) = lines.last_mut() {
            if ends_with_broken_word(prev) && starts_lowercase(&line) {
                prev.pop();
                prev.push_str(&line);
                continue;
            }
        }

        lines.push(line);
    }

    let mut result = String::with_capacity(text.len());
    let mut prev_blank = false;
    for line in lines {
        let blank = line.is_empty();
        if blank && prev_blank {
            continue;
        }
        prev_blank = blank;
        result.push_str(&line);
        result.push('\n');
    }

    result.trim().to_string()
}

fn replace_chars(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        if let Some((_, r)) = REPLACED_CHARS.iter().find(|(ch, _)| *ch == c) {
            result.push_str(r);
        } else if c == '\n' || !c.is_control() {
            result.push(c);
        }
    }

    result
}

fn collapse_spaces(line: &str) -> String {
    line.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_page_furniture(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    if line.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    line.chars().count() <= MAX_HEADER_LINE_CHARS && PAGE_HEADER.is_match(line)
}

fn ends_with_broken_word(line: &str) -> bool {
    let mut chars = line.chars().rev();
    matches!(
        (chars.next(), chars.next()),
        (Some('-'), Some(c)) if c.is_alphabetic()
    )
}

fn starts_lowercase(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_blank_line_runs() {
        let text = "First paragraph\n\n\n\n\nSecond paragraph";
        assert_eq!(normalize(text), "First paragraph\n\nSecond paragraph");
    }

    #[test]
    fn test_whitespace_only_lines_count_as_blank() {
        let text = "One\n   \n \t \nTwo";
        assert_eq!(normalize(text), "One\n\nTwo");
    }

    #[test]
    fn test_collapses_spaces() {
        assert_eq!(normalize("Hello    world\tagain"), "Hello world again");
    }

    #[test]
    fn test_windows_line_endings() {
        assert_eq!(normalize("One\r\nTwo\rThree"), "One\nTwo\nThree");
    }

    #[test]
    fn test_removes_invisible_characters() {
        let text = "\u{feff}Hello\u{200b}World\x07\u{00a0}Test";
        assert_eq!(normalize(text), "HelloWorld Test");
    }

    #[test]
    fn test_drops_bare_page_numbers() {
        let text = "end of a page\n\n42\n\nstart of the next";
        assert_eq!(normalize(text), "end of a page\n\nstart of the next");
    }

    #[test]
    fn test_drops_short_page_headers() {
        let text = "Some text\nThe Book Title - Page 12\nMore text\nPágina 7";
        assert_eq!(normalize(text), "Some text\nMore text");
    }

    #[test]
    fn test_keeps_long_lines_mentioning_pages() {
        let text = "As discussed on page 12, the argument rests on three observations that the author develops further.";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn test_rejoins_hyphenated_words() {
        let text = "a long argu-\nment about things";
        assert_eq!(normalize(text), "a long argument about things");
    }

    #[test]
    fn test_keeps_dash_before_capitalised_line() {
        let text = "Part one -\nChapter 2";
        assert_eq!(normalize(text), "Part one -\nChapter 2");
    }

    #[test]
    fn test_rejoin_across_removed_page_number() {
        let text = "incom-\n17\nplete sentence";
        assert_eq!(normalize(text), "incomplete sentence");
    }

    #[test]
    fn test_preserves_heading_lines() {
        let text = "Chapter 1: Origins\n\nIt began quietly.";
        assert_eq!(normalize(text), text);
    }
}
