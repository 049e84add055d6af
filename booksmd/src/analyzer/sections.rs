//! Pulls named sections out of generated analyses.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::job::ChapterAnalysis;

const MIN_SECTION_CHARS: usize = 50;
const MAX_SECTION_CHARS: usize = 8000;
const MAX_FALLBACK_SECTION_CHARS: usize = 5000;
const MAX_LEAD_CHARS: usize = 500;
const MAX_GLOSSARY_SECTIONS: usize = 15;

fn section(heading: &str) -> Regex {
    Regex::new(&format!(r"(?is)##\s*{heading}[^\n]*\n(.*?)(?:\n#|\z)")).expect("valid section regex")
}

/// Sections that summarise a chapter for the next ones, best first.
static CONTINUITY_SECTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        section(r"📌?\s*Síntese para Continuidade"),
        section(r"📊?\s*Resumo para Contexto"),
        section(r"🎯?\s*Aplicações Práticas"),
        section(r"💎?\s*Insights"),
    ]
});

static OPENING_SECTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        section(r"📖?\s*Contexto e Propósito"),
        section(r"🧠?\s*Análise Profunda"),
    ]
});

static GLOSSARY_SECTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        section(r"📝?\s*Glossário Técnico"),
        section(r"📝?\s*Termos Técnicos"),
    ]
});

static HEADING_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[^\n]*\n").expect("valid heading regex"));

/// Rolling-context entry for one analysed chapter.
pub fn context_summary(analysis: &str, number: usize, title: &str) -> String {
    let summary = CONTINUITY_SECTIONS
        .iter()
        .filter_map(|re| first_section(re, analysis))
        .find(|s| s.chars().count() > MIN_SECTION_CHARS)
        .map(|s| truncate_chars(s, MAX_SECTION_CHARS))
        .or_else(|| {
            OPENING_SECTIONS
                .iter()
                .find_map(|re| first_section(re, analysis))
                .map(|s| truncate_chars(s, MAX_FALLBACK_SECTION_CHARS))
        })
        .unwrap_or_else(|| {
            let stripped = HEADING_LINE.replace_all(analysis, "");
            truncate_chars(&stripped, MAX_LEAD_CHARS).trim().to_string()
        });

    format!("**Cap {number} ({title}):** {summary}")
}

/// Key-term sections of the successful analyses, joined for the glossary
/// prompt. `None` when no analysis has one.
pub fn glossary_material(chapters: &[ChapterAnalysis]) -> Option<String> {
    let sections: Vec<&str> = chapters
        .iter()
        .filter(|c| c.success)
        .filter_map(|c| c.analysis.as_deref())
        .filter_map(|text| GLOSSARY_SECTIONS.iter().find_map(|re| first_section(re, text)))
        .filter(|s| !s.is_empty())
        .take(MAX_GLOSSARY_SECTIONS)
        .collect();

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n---\n\n"))
    }
}

fn first_section<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
