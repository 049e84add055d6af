//! Chapter analysis over a text-generation backend.

mod prompts;
pub mod sections;

use async_trait::async_trait;
use llm_client::{LlmError, LlmProvider, LlmRequest};
use std::sync::Arc;
use std::time::Duration;

use crate::job::ChapterAnalysis;
use crate::segment::Chapter;

/// Context summaries considered for the overall book summary.
const MAX_SUMMARY_INPUTS: usize = 100;

/// Output of one successful chapter analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterOutcome {
    pub analysis: String,
    pub tokens_used: u32,
    pub context_summary: String,
}

/// Generation steps of the pipeline.
#[async_trait]
pub trait BookAnalyzer: Send + Sync {
    /// Analyse one chapter given the rolling context of earlier ones.
    async fn analyze_chapter(
        &self,
        chapter: &Chapter,
        previous_context: Option<&str>,
    ) -> Result<ChapterOutcome, LlmError>;

    /// Glossary section, or `None` when no chapter produced key terms.
    async fn generate_glossary(
        &self,
        chapters: &[ChapterAnalysis],
    ) -> Result<Option<String>, LlmError>;

    /// Conclusions section for the whole book.
    async fn generate_summary(
        &self,
        chapters: &[ChapterAnalysis],
        title: &str,
        author: &str,
    ) -> Result<String, LlmError>;

    fn name(&self) -> &'static str;
}

/// [`BookAnalyzer`] backed by an `llm-client` provider.
pub struct LlmAnalyzer {
    provider: Arc<dyn LlmProvider>,
    retry_delay: Duration,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, retry_delay: Duration) -> Self {
        Self {
            provider,
            retry_delay,
        }
    }

    /// Send a request, retrying once after a pause on rate-limit class errors.
    async fn complete(&self, request: LlmRequest) -> Result<(String, u32), LlmError> {
        let response = match self.provider.complete(request.clone()).await {
            Err(e) if e.is_transient() => {
                let delay = e
                    .retry_after()
                    .map(Duration::from_secs)
                    .unwrap_or(self.retry_delay);
                log::warn!("{}; retrying once in {}s", e, delay.as_secs());
                tokio::time::sleep(delay).await;
                self.provider.complete(request).await?
            }
            other => other?,
        };

        let tokens = response.usage.map(|u| u.output_tokens).unwrap_or(0);
        Ok((response.content, tokens))
    }
}

#[async_trait]
impl BookAnalyzer for LlmAnalyzer {
    async fn analyze_chapter(
        &self,
        chapter: &Chapter,
        previous_context: Option<&str>,
    ) -> Result<ChapterOutcome, LlmError> {
        let prompt = prompts::chapter(
            &chapter.content,
            &chapter.title,
            chapter.number,
            previous_context,
        );
        log::debug!(
            "Chapter {}: prompt of {} chars via {}",
            chapter.number,
            prompt.len(),
            self.provider.name()
        );

        let request = LlmRequest::new(prompt)
            .with_system(prompts::CHAPTER_SYSTEM)
            .with_max_tokens(16_000);
        let (analysis, tokens_used) = self.complete(request).await?;
        let context_summary = sections::context_summary(&analysis, chapter.number, &chapter.title);

        Ok(ChapterOutcome {
            analysis,
            tokens_used,
            context_summary,
        })
    }

    async fn generate_glossary(
        &self,
        chapters: &[ChapterAnalysis],
    ) -> Result<Option<String>, LlmError> {
        let Some(material) = sections::glossary_material(chapters) else {
            return Ok(None);
        };

        let request = LlmRequest::new(prompts::glossary(&material))
            .with_system(prompts::GLOSSARY_SYSTEM)
            .with_max_tokens(5_000);
        let (glossary, _) = self.complete(request).await?;
        Ok(Some(glossary))
    }

    async fn generate_summary(
        &self,
        chapters: &[ChapterAnalysis],
        title: &str,
        author: &str,
    ) -> Result<String, LlmError> {
        let request = LlmRequest::new(prompts::book_summary(
            chapters,
            title,
            author,
            MAX_SUMMARY_INPUTS,
        ))
        .with_system(prompts::SUMMARY_SYSTEM)
        .with_max_tokens(8_000);
        let (summary, _) = self.complete(request).await?;
        Ok(summary)
    }

    fn name(&self) -> &'static str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_client::MockProvider;

    fn chapter() -> Chapter {
        Chapter::new(4, "Growth", "Some chapter body.".to_string(), 0)
    }

    fn analyzer(mock: Arc<MockProvider>) -> LlmAnalyzer {
        LlmAnalyzer::new(mock, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_analyze_chapter_success() {
        let mock = Arc::new(MockProvider::always_succeeds("# Heading\nA short analysis."));
        let outcome = analyzer(mock.clone())
            .analyze_chapter(&chapter(), Some("**Cap 3 (Prior):** earlier"))
            .await
            .unwrap();

        assert_eq!(outcome.analysis, "# Heading\nA short analysis.");
        assert_eq!(outcome.tokens_used, 1);
        assert_eq!(outcome.context_summary, "**Cap 4 (Growth):** A short analysis.");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("**Cap 3 (Prior):** earlier"));
        assert!(requests[0].system_prompt.is_some());
    }

    #[tokio::test]
    async fn test_transient_error_retried_once() {
        let mock = Arc::new(MockProvider::fails_then_succeeds(
            1,
            LlmError::RateLimited { retry_after: None },
            "recovered",
        ));
        let outcome = analyzer(mock.clone())
            .analyze_chapter(&chapter(), None)
            .await
            .unwrap();
        assert_eq!(outcome.analysis, "recovered");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_error_twice_fails() {
        let mock = Arc::new(MockProvider::always_fails(LlmError::ServerOverloaded {
            message: "busy".into(),
        }));
        let result = analyzer(mock.clone()).analyze_chapter(&chapter(), None).await;
        assert!(matches!(result, Err(LlmError::ServerOverloaded { .. })));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let mock = Arc::new(MockProvider::always_fails(LlmError::ApiError {
            message: "bad request".into(),
            status_code: Some(400),
        }));
        let result = analyzer(mock.clone()).analyze_chapter(&chapter(), None).await;
        assert!(result.is_err());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_glossary_skipped_without_terms() {
        let mock = Arc::new(MockProvider::always_succeeds("unused"));
        let chapters = vec![ChapterAnalysis::succeeded(1, "A", "no terms".into(), 1, None)];
        let glossary = analyzer(mock.clone()).generate_glossary(&chapters).await.unwrap();
        assert!(glossary.is_none());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_glossary_generated_from_terms() {
        let mock = Arc::new(MockProvider::always_succeeds("# Glossário\n- **Moat**"));
        let chapters = vec![ChapterAnalysis::succeeded(
            1,
            "A",
            "## Glossário Técnico\n**Moat** → Fosso".into(),
            1,
            None,
        )];
        let glossary = analyzer(mock.clone()).generate_glossary(&chapters).await.unwrap();
        assert_eq!(glossary.as_deref(), Some("# Glossário\n- **Moat**"));
        assert!(mock.requests()[0].prompt.contains("**Moat** → Fosso"));
    }
}
