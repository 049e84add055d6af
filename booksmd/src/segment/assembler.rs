//! Turns detected boundaries into the final chapter list.

use super::detector::PatternDetector;
use super::sizing::split_by_size;
use super::{
    BoundaryDetector, Chapter, ChapterPart, FALLBACK_BASE_TITLE, SplitterConfig,
};

/// Fewer boundaries (or surviving chapters) than this means the structure is unusable.
const MIN_CHAPTERS: usize = 3;

/// Splits a book into chapters using a boundary detector, with size-based fallback.
pub struct ChapterSplitter {
    detector: Box<dyn BoundaryDetector>,
    config: SplitterConfig,
}

impl ChapterSplitter {
    /// Splitter using the pattern detector.
    pub fn new(config: SplitterConfig) -> Self {
        Self::with_detector(Box::new(PatternDetector::default()), config)
    }

    pub fn with_detector(detector: Box<dyn BoundaryDetector>, config: SplitterConfig) -> Self {
        Self { detector, config }
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split `text` into numbered chapters.
    ///
    /// Each detected boundary starts a chapter that runs to the next boundary.
    /// Chapters under the minimum size are dropped; if fewer than three
    /// survive, the whole text is split by size instead. Chapters over the
    /// token budget are subdivided into parts.
    pub fn split(&self, text: &str) -> Vec<Chapter> {
        log::info!("Looking for chapters in {} bytes of text", text.len());
        let boundaries = self.detector.detect(text);

        if boundaries.len() < MIN_CHAPTERS {
            log::info!(
                "Only {} chapter markers found, splitting by size",
                boundaries.len()
            );
            return self.split_by_size(text, FALLBACK_BASE_TITLE);
        }
        log::info!("Found {} chapter markers", boundaries.len());

        let mut kept: Vec<Chapter> = Vec::with_capacity(boundaries.len());
        let mut skipped = 0;
        for (i, boundary) in boundaries.iter().enumerate() {
            let end = boundaries.get(i + 1).map_or(text.len(), |next| next.offset);
            let chapter = Chapter::new(
                boundary.number,
                &boundary.title,
                text[boundary.offset..end].to_string(),
                boundary.offset,
            );

            if chapter.token_count < self.config.min_chapter_tokens {
                skipped += 1;
                log::debug!(
                    "Skipping '{}': too small ({} tokens)",
                    chapter.title,
                    chapter.token_count
                );
                continue;
            }
            kept.push(chapter);
        }

        if kept.len() < MIN_CHAPTERS {
            log::info!(
                "Only {} chapters left after filtering, splitting by size",
                kept.len()
            );
            return self.split_by_size(text, FALLBACK_BASE_TITLE);
        }
        if skipped > 0 {
            log::info!(
                "Skipped {} markers under {} tokens",
                skipped,
                self.config.min_chapter_tokens
            );
        }

        let mut chapters = Vec::with_capacity(kept.len());
        for chapter in kept {
            if chapter.token_count > self.config.max_tokens {
                chapters.extend(self.subdivide(chapter));
            } else {
                chapters.push(chapter);
            }
        }

        for (i, chapter) in chapters.iter_mut().enumerate() {
            chapter.number = i + 1;
        }
        log::info!("Total chapters: {}", chapters.len());
        chapters
    }

    /// Size-based split of `text` with this splitter's budget.
    pub fn split_by_size(&self, text: &str, base_title: &str) -> Vec<Chapter> {
        split_by_size(text, base_title, &self.config)
    }

    /// Split an oversized chapter into "(Part i/n)" pieces of its own content.
    fn subdivide(&self, parent: Chapter) -> Vec<Chapter> {
        log::debug!(
            "Chapter '{}' has {} tokens, subdividing",
            parent.title,
            parent.token_count
        );
        let pieces = self.split_by_size(&parent.content, &parent.title);

        if pieces.len() <= 1 {
            return vec![Chapter {
                oversized: true,
                ..parent
            }];
        }

        let count = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| Chapter {
                title: format!("{} (Part {}/{})", parent.title, i + 1, count),
                start_position: parent.start_position,
                part: Some(ChapterPart {
                    parent_title: parent.title.clone(),
                    index: i + 1,
                    count,
                }),
                ..piece
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::BoundaryCandidate;
    use crate::text::count_tokens;

    fn body(words: usize) -> String {
        let sentence = "The argument develops slowly through careful observation and patient reasoning. ";
        sentence.repeat(words / 10 + 1).trim_end().to_string()
    }

    fn chapters_text(headings: &[&str], words: usize) -> String {
        headings
            .iter()
            .map(|h| format!("{}\n\n{}\n\n", h, body(words)))
            .collect()
    }

    /// Detector returning fixed offsets, for exercising the assembler alone.
    struct FixedDetector(Vec<usize>);

    impl BoundaryDetector for FixedDetector {
        fn detect(&self, _text: &str) -> Vec<BoundaryCandidate> {
            self.0
                .iter()
                .enumerate()
                .map(|(i, &offset)| BoundaryCandidate {
                    number: i + 1,
                    marker: None,
                    title: format!("Heading {}", i + 1),
                    offset,
                })
                .collect()
        }
    }

    #[test]
    fn test_three_chapters_with_titles() {
        let text = chapters_text(
            &["Chapter 1: Origins", "Chapter 2: Growth", "Chapter 3: Reckoning"],
            220,
        );
        let chapters = ChapterSplitter::new(SplitterConfig::default()).split(&text);

        assert_eq!(chapters.len(), 3);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Origins", "Growth", "Reckoning"]);
        let numbers: Vec<usize> = chapters.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_chapters_concatenate_to_source() {
        let preface = "A short preface before the first chapter.\n\n";
        let text = format!(
            "{}{}",
            preface,
            chapters_text(
                &[
                    "Chapter 1: Foundations of Economic Thought",
                    "Chapter 2: Markets and Their Discontents",
                    "Chapter 3: Money, Credit and Banking Systems",
                    "Chapter 4: The Future of Exchange",
                ],
                120,
            )
        );
        let chapters = ChapterSplitter::new(SplitterConfig::default()).split(&text);

        assert_eq!(chapters.len(), 4);
        let joined: String = chapters.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(joined, text[preface.len()..]);
        assert_eq!(chapters[0].start_position, preface.len());
        for c in &chapters {
            assert_eq!(c.token_count, count_tokens(&c.content));
        }
    }

    #[test]
    fn test_fallback_when_no_markers() {
        let text = format!("{}\n\n{}\n\n{}", body(200), body(200), body(200));
        let splitter = ChapterSplitter::new(SplitterConfig::default());
        let chapters = splitter.split(&text);

        assert_eq!(chapters, splitter.split_by_size(&text, "Seção"));
        assert_eq!(chapters[0].title, "Seção 1");
    }

    #[test]
    fn test_running_headers_fall_back_to_size() {
        let titles = [
            "Chapter 1: The Origins of Modern Thought",
            "Chapter 2: The Growth of Institutions",
            "Chapter 3: The Reckoning of Empires",
        ];
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(titles[i % 3]);
            text.push_str("\n\n");
            text.push_str(&body(60));
            text.push_str("\n\n");
        }
        let config = SplitterConfig {
            max_tokens: 2_000,
            ..SplitterConfig::default()
        };
        let chapters = ChapterSplitter::new(config).split(&text);

        assert!(chapters.len() > 1);
        assert!(chapters.iter().all(|c| c.title.starts_with("Seção ")));
    }

    #[test]
    fn test_undersized_chapters_dropped_and_renumbered() {
        let long = body(100);
        let text = format!("One\n\n{long}\n\nTwo\n\nThree\n\n{long}\n\nFour\n\n{long}\n\n");
        let offsets = vec![
            0,
            text.find("Two").unwrap_or_default(),
            text.find("Three").unwrap_or_default(),
            text.find("Four").unwrap_or_default(),
        ];
        let splitter =
            ChapterSplitter::with_detector(Box::new(FixedDetector(offsets)), SplitterConfig::default());
        let chapters = splitter.split(&text);

        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Heading 1", "Heading 3", "Heading 4"]);
        let numbers: Vec<usize> = chapters.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(chapters.iter().all(|c| c.token_count >= 30));
    }

    #[test]
    fn test_too_few_survivors_fall_back_on_full_text() {
        let long = body(100);
        let text = format!("One\n\nTwo\n\nThree\n\n{long}");
        let offsets = vec![0, text.find("Two").unwrap_or_default(), text.find("Three").unwrap_or_default()];
        let splitter =
            ChapterSplitter::with_detector(Box::new(FixedDetector(offsets)), SplitterConfig::default());
        let chapters = splitter.split(&text);

        assert_eq!(chapters, splitter.split_by_size(&text, "Seção"));
    }

    #[test]
    fn test_subdivided_chapter_keeps_short_paragraphs() {
        let short = body(30);
        let big = "word ".repeat(300);
        let big = big.trim();
        let text = format!(
            "One\n\n{short}\n\nTwo\n\n{big}\n\nA short bridge line.\n\n{big}\n\nThree\n\n{short}\n\n"
        );
        let offsets = vec![
            0,
            text.find("Two").unwrap_or_default(),
            text.find("Three").unwrap_or_default(),
        ];
        let config = SplitterConfig {
            max_tokens: 100,
            overlap_tokens: 0,
            min_chapter_tokens: 30,
        };
        let chapters = ChapterSplitter::with_detector(Box::new(FixedDetector(offsets)), config).split(&text);

        let parts: Vec<&Chapter> = chapters.iter().filter(|c| c.part.is_some()).collect();
        assert_eq!(parts.len(), 2);
        let rebuilt = parts
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(rebuilt, format!("Two\n\n{big}\n\nA short bridge line.\n\n{big}"));
        assert_eq!(chapters.len(), 4);
    }

    #[test]
    fn test_oversized_chapter_subdivided_into_parts() {
        let big: String = (0..40)
            .map(|i| format!("Paragraph {} of the long chapter. {}", i, body(30)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let text = format!(
            "Chapter 1: The Short Beginning Section\n\n{}\n\nChapter 2: The Very Long Middle Section\n\n{}\n\nChapter 3: The Short Ending Section\n\n{}",
            body(60),
            big,
            body(60)
        );
        let config = SplitterConfig {
            max_tokens: 1_000,
            overlap_tokens: 0,
            min_chapter_tokens: 30,
        };
        let chapters = ChapterSplitter::new(config).split(&text);

        let parts: Vec<&Chapter> = chapters.iter().filter(|c| c.part.is_some()).collect();
        assert!(parts.len() > 1);
        let count = parts.len();
        for (i, part) in parts.iter().enumerate() {
            let record = part.part.as_ref().unwrap();
            assert_eq!(record.parent_title, "The Very Long Middle Section");
            assert_eq!(record.index, i + 1);
            assert_eq!(record.count, count);
            assert_eq!(
                part.title,
                format!("The Very Long Middle Section (Part {}/{})", i + 1, count)
            );
            assert!(part.token_count <= 1_000);
        }

        let numbers: Vec<usize> = chapters.iter().map(|c| c.number).collect();
        assert_eq!(numbers, (1..=chapters.len()).collect::<Vec<_>>());
        assert_eq!(chapters.first().map(|c| c.title.as_str()), Some("The Short Beginning Section"));
        assert_eq!(chapters.last().map(|c| c.title.as_str()), Some("The Short Ending Section"));

        let rebuilt = parts
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let middle_start = text.find("Chapter 2:").unwrap_or_default();
        let middle_end = text.find("Chapter 3:").unwrap_or_default();
        assert_eq!(rebuilt, text[middle_start..middle_end].trim_end());
    }

    #[test]
    fn test_single_paragraph_chapter_over_budget_is_flagged() {
        let text = format!(
            "Chapter 1: The Short Beginning Section\n\n{}\n\nChapter 2: The Wall of Text Section\n{}\n\nChapter 3: The Short Ending Section\n\n{}",
            body(60),
            body(400),
            body(60)
        );
        let config = SplitterConfig {
            max_tokens: 200,
            overlap_tokens: 0,
            min_chapter_tokens: 30,
        };
        let chapters = ChapterSplitter::new(config).split(&text);

        let wall = chapters
            .iter()
            .find(|c| c.title == "The Wall of Text Section")
            .unwrap();
        assert!(wall.oversized);
        assert!(wall.part.is_none());
    }
}
