use std::fs;
use std::path::{Path, PathBuf};

use super::RenderError;
use crate::job::{ChapterAnalysis, short_id};

const GLOSSARY_PLACEHOLDER: &str = "# Glossário\n\n*Glossário não disponível para este livro.*\n";
const CONCLUSIONS_PLACEHOLDER: &str =
    "# Conclusões Gerais da Obra\n\n*Conclusões não disponíveis para este livro.*\n";
const MAX_FILENAME_TITLE_CHARS: usize = 50;

/// Everything that goes into the final document.
pub struct BookDocument<'a> {
    pub job_id: &'a str,
    pub title: &'a str,
    pub author: &'a str,
    pub language: &'a str,
    /// dd/mm/yyyy
    pub date: String,
    pub chapters: &'a [ChapterAnalysis],
    pub glossary: Option<&'a str>,
    pub conclusions: Option<&'a str>,
}

pub fn render_markdown(doc: &BookDocument<'_>) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Análise Completa do Livro: {}\n\n", doc.title));
    out.push_str(&format!("**Autor:** {}  \n", doc.author));
    out.push_str(&format!("**Idioma Original:** {}  \n", doc.language));
    out.push_str(&format!("**Data da Análise:** {}  \n", doc.date));
    out.push_str("**Gerado por:** booksmd\n\n---\n\n");

    out.push_str(&table_of_contents(doc.chapters));
    out.push_str("\n\n---\n\n");

    for chapter in doc.chapters {
        out.push_str(&chapter_section(chapter));
    }

    out.push_str("\n---\n\n");
    out.push_str(non_empty(doc.glossary).unwrap_or(GLOSSARY_PLACEHOLDER));
    out.push_str("\n\n---\n\n");
    out.push_str(non_empty(doc.conclusions).unwrap_or(CONCLUSIONS_PLACEHOLDER));
    out.push_str("\n\n---\n\n*Documento gerado automaticamente pelo booksmd*\n");
    out
}

/// Render and write `<output_dir>/<safe title>_<id8>.md`.
pub fn write_markdown(output_dir: &Path, doc: &BookDocument<'_>) -> Result<PathBuf, RenderError> {
    fs::create_dir_all(output_dir).map_err(|e| RenderError::io(output_dir, e))?;
    let path = output_dir.join(output_filename(doc.title, doc.job_id));
    fs::write(&path, render_markdown(doc)).map_err(|e| RenderError::io(&path, e))?;
    Ok(path)
}

pub fn output_filename(title: &str, job_id: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .take(MAX_FILENAME_TITLE_CHARS)
        .collect();
    let safe = match cleaned.trim() {
        "" => "analise",
        t => t,
    };
    format!("{}_{}.md", safe, short_id(job_id))
}

fn table_of_contents(chapters: &[ChapterAnalysis]) -> String {
    let mut lines = vec!["# Sumário\n".to_string()];
    for chapter in chapters.iter().filter(|c| c.success) {
        let n = chapter.chapter_number;
        let title = &chapter.chapter_title;
        lines.push(format!(
            "- [Capítulo {n} — {title}](#{})",
            anchor(&format!("capítulo {n} {title}"))
        ));
    }
    lines.push("- [Glossário](#glossario)".to_string());
    lines.push("- [Conclusões Gerais](#conclusoes-gerais-da-obra)".to_string());
    lines.join("\n")
}

fn chapter_section(chapter: &ChapterAnalysis) -> String {
    let n = chapter.chapter_number;
    if chapter.success {
        let analysis = chapter.analysis.as_deref().unwrap_or("Análise não disponível");
        format!("\n# Capítulo {n} — {}\n\n{analysis}\n\n---\n", chapter.chapter_title)
    } else {
        let error = chapter.error.as_deref().unwrap_or("Erro desconhecido");
        format!(
            "\n# Capítulo {n} — {}\n\n> ⚠️ **Erro na análise:** {error}\n\n---\n",
            chapter.chapter_title
        )
    }
}

/// Heading anchor with accents folded to ASCII.
fn anchor(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ê' => 'e',
            'í' | 'ì' | 'î' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'û' => 'u',
            'ç' => 'c',
            other => other,
        })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join("-")
}

fn non_empty(section: Option<&str>) -> Option<&str> {
    section.filter(|s| !s.trim().is_empty())
}
