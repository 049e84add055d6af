//! Prompt text sent to the text-generation backend.

use crate::job::ChapterAnalysis;

pub const CHAPTER_SYSTEM: &str = "\
Você é um professor universitário e analista experiente. Sua tarefa é \
transformar um capítulo de livro em uma aula completa em português \
brasileiro: explique cada ideia em profundidade em vez de resumir, mantenha \
termos técnicos em inglês entre parênteses e conecte o capítulo ao contexto \
dos capítulos anteriores quando ele for fornecido.

Estruture a resposta em Markdown com as seções:
## 📖 Contexto e Propósito do Capítulo
## 🧠 Análise Profunda das Ideias Centrais
## 🛠️ Frameworks, Metodologias e Ferramentas
## 🏢 Casos de Estudo e Exemplos do Livro
## 🔗 Conexões com Capítulos Anteriores
## 🎯 Aplicações Práticas Imediatas
## 📝 Glossário Técnico do Capítulo
## ⚠️ Armadilhas e Erros Comuns
## 💎 Insights Não Óbvios
## 📌 Síntese para Continuidade
A última seção deve ter de 3 a 5 frases com os pontos essenciais para os \
próximos capítulos. Não invente informações ausentes do texto.";

pub const SUMMARY_SYSTEM: &str = "\
Você é um crítico literário e consultor experiente. Suas análises são \
profundas e úteis, nunca resumos superficiais. Escreva sempre em português \
brasileiro.";

pub const GLOSSARY_SYSTEM: &str = "\
Você é um lexicógrafo especialista em glossários técnicos. Cada termo deve \
ser explicado de forma clara e com exemplos práticos. Escreva sempre em \
português brasileiro.";

pub fn chapter(content: &str, title: &str, number: usize, previous_context: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(context) = previous_context {
        prompt.push_str("## Contexto acumulado dos capítulos anteriores\n\n");
        prompt.push_str(context);
        prompt.push_str(
            "\n\nFaça conexões explícitas com os capítulos anteriores: mostre como as ideias evoluem.\n\n",
        );
    }
    prompt.push_str(&format!("## Capítulo {number}: {title}\n\n{content}\n\n"));
    prompt.push_str("Analise cada parágrafo do capítulo acima seguindo a estrutura pedida.");
    prompt
}

pub fn book_summary(chapters: &[ChapterAnalysis], title: &str, author: &str, max_summaries: usize) -> String {
    let succeeded = chapters.iter().filter(|c| c.success);
    let titles: Vec<String> = succeeded
        .clone()
        .map(|c| format!("• Cap {}: {}", c.chapter_number, c.chapter_title))
        .collect();
    let knowledge: Vec<&str> = succeeded
        .filter_map(|c| c.context_summary.as_deref())
        .take(max_summaries)
        .collect();

    format!(
        "Livro: \"{title}\"\nAutor: {author}\n\n\
         ## Capítulos analisados\n\n{}\n\n\
         ## Conhecimento acumulado\n\n{}\n\n\
         Escreva as conclusões gerais da obra começando com o título \
         \"# Conclusões Gerais da Obra\": visão geral, grandes temas, tese \
         central do autor, como os capítulos se conectam, aplicações práticas, \
         forças e limitações, veredicto final.",
        titles.join("\n"),
        knowledge.join("\n\n"),
    )
}

pub fn glossary(material: &str) -> String {
    format!(
        "Consolide os termos técnicos abaixo em um glossário único, em ordem \
         alfabética, agrupado por letra (## A, ## B, ...), sem repetições. \
         Comece com o título \"# Glossário\". Formato de cada entrada: \
         **Termo (Tradução)** — definição em 2-3 frases.\n\n{material}"
    )
}
