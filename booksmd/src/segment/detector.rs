//! Rule-cascade boundary detector.
//!
//! Lines are matched against the strong pattern set first; the weak set is
//! only added when the strong pass is inconclusive. Each match runs through
//! the title filters in a single left-to-right pass and the surviving pass
//! must then look like real headings rather than running headers.

use std::collections::{HashMap, HashSet};

use super::patterns::{
    HeadingPattern, MarkerKind, NUMBERED_KEYWORD, STRONG_PATTERNS, WEAK_PATTERNS,
    has_substantive_content, is_question_only, jaccard, match_heading, normalize_title,
};
use super::{BoundaryCandidate, BoundaryDetector};

/// Lines shorter or longer than this (in characters) are never headings.
const MIN_HEADING_CHARS: usize = 5;
const MAX_HEADING_CHARS: usize = 200;

/// Jaccard similarity above which a title repeats the previous one.
const NEAR_DUPLICATE_SIMILARITY: f64 = 0.9;

const MIN_UNIQUENESS_RATIO: f64 = 0.3;
const MIN_LONG_TITLE_RATIO: f64 = 0.3;
const LONG_TITLE_CHARS: usize = 20;

/// Window inspected around a candidate when a pass overproduces.
const CONFIRM_BEFORE: usize = 100;
const CONFIRM_AFTER: usize = 200;
/// Minimum distance between candidates kept by the proximity filter.
const MIN_CANDIDATE_DISTANCE: usize = 500;

/// Pattern-based [`BoundaryDetector`].
#[derive(Debug, Clone)]
pub struct PatternDetector {
    /// Passes with fewer candidates are inconclusive
    pub min_candidates: usize,
    /// Passes with more candidates go through the overproduction filter
    pub overproduction_limit: usize,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self {
            min_candidates: 3,
            overproduction_limit: 50,
        }
    }
}

/// An accepted match plus what the validity check needs to know about it.
#[derive(Debug, Clone)]
struct Accepted {
    candidate: BoundaryCandidate,
    normalized: String,
    /// Marker continues its family's numbering (1, 2, 3, ...)
    sequenced: bool,
}

/// Result of scanning the text with one pattern tier.
#[derive(Debug, Default)]
struct Pass {
    accepted: Vec<Accepted>,
    /// Lines matching any pattern, before filtering
    raw_matches: usize,
    /// Distinct normalised titles among the raw matches
    distinct_titles: usize,
}

impl BoundaryDetector for PatternDetector {
    fn detect(&self, text: &str) -> Vec<BoundaryCandidate> {
        let strong: Vec<&HeadingPattern> = STRONG_PATTERNS.iter().collect();
        let pass = self.scan(text, &strong);
        if self.is_valid(&pass, "strong") {
            log::debug!("Using strong patterns: {} chapters", pass.accepted.len());
            return into_candidates(pass);
        }

        let mut all = strong;
        all.extend(WEAK_PATTERNS.iter());
        let pass = self.scan(text, &all);
        if self.is_valid(&pass, "weak") {
            log::debug!("Using weak patterns: {} chapters", pass.accepted.len());
            return into_candidates(pass);
        }

        log::debug!("No reliable chapter markers found");
        Vec::new()
    }
}

impl PatternDetector {
    fn scan(&self, text: &str, patterns: &[&HeadingPattern]) -> Pass {
        let mut pass = Pass::default();
        let mut raw_titles: HashSet<String> = HashSet::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut last_title: Option<String> = None;
        let mut last_marker: HashMap<MarkerKind, u32> = HashMap::new();
        let mut pos = 0;

        for line in text.split('\n') {
            let offset = pos;
            pos += line.len() + 1;

            let stripped = line.trim();
            let len = stripped.chars().count();
            if !(MIN_HEADING_CHARS..=MAX_HEADING_CHARS).contains(&len) {
                continue;
            }

            let Some(heading) = match_heading(stripped, patterns) else {
                continue;
            };

            let normalized = normalize_title(&heading.title);
            pass.raw_matches += 1;
            raw_titles.insert(normalized.clone());

            if seen.contains(&normalized) {
                continue;
            }
            if last_title
                .as_deref()
                .is_some_and(|last| jaccard(&normalized, last) > NEAR_DUPLICATE_SIMILARITY)
            {
                continue;
            }
            if is_question_only(&heading.title) {
                continue;
            }

            let sequenced = heading.marker.is_some_and(|marker| {
                match last_marker.get(&heading.kind) {
                    Some(prev) => prev.checked_add(1) == Some(marker),
                    None => marker == 1,
                }
            });
            if !sequenced && !has_substantive_content(&heading.title) {
                continue;
            }

            if let Some(marker) = heading.marker {
                last_marker.insert(heading.kind, marker);
            }
            seen.insert(normalized.clone());
            last_title = Some(normalized.clone());
            pass.accepted.push(Accepted {
                candidate: BoundaryCandidate {
                    number: pass.accepted.len() + 1,
                    marker: heading.marker,
                    title: heading.title,
                    offset,
                },
                normalized,
                sequenced,
            });
        }

        pass.distinct_titles = raw_titles.len();

        if pass.accepted.len() > self.overproduction_limit {
            pass.accepted = filter_overproduction(text, pass.accepted);
        }

        pass
    }

    fn is_valid(&self, pass: &Pass, tier: &str) -> bool {
        let total = pass.accepted.len();
        if total < self.min_candidates {
            log::debug!("{} pass: only {} candidates", tier, total);
            return false;
        }

        let uniqueness = pass.distinct_titles as f64 / pass.raw_matches as f64;
        if uniqueness < MIN_UNIQUENESS_RATIO {
            log::debug!(
                "{} pass: too many repeated titles ({} distinct of {} matches)",
                tier,
                pass.distinct_titles,
                pass.raw_matches
            );
            return false;
        }

        let long = pass
            .accepted
            .iter()
            .filter(|a| a.sequenced || a.normalized.chars().count() > LONG_TITLE_CHARS)
            .count();
        if (long as f64) < total as f64 * MIN_LONG_TITLE_RATIO {
            log::debug!("{} pass: too few long titles ({} of {})", tier, long, total);
            return false;
        }

        true
    }
}

/// Secondary filter for passes that produced too many candidates.
///
/// Candidates with a chapter keyword and number nearby are confirmed. When
/// confirmed ones dominate, only they are kept; otherwise candidates closer
/// than [`MIN_CANDIDATE_DISTANCE`] to the previous kept one are collapsed.
fn filter_overproduction(text: &str, accepted: Vec<Accepted>) -> Vec<Accepted> {
    let (confirmed, unconfirmed): (Vec<Accepted>, Vec<Accepted>) =
        accepted.into_iter().partition(|a| {
            let start = floor_boundary(text, a.candidate.offset.saturating_sub(CONFIRM_BEFORE));
            let end = floor_boundary(text, (a.candidate.offset + CONFIRM_AFTER).min(text.len()));
            NUMBERED_KEYWORD.is_match(&text[start..end])
        });

    let mut kept = if confirmed.len() > unconfirmed.len() * 2 {
        log::debug!(
            "Overproduction filter: keeping {} confirmed, dropping {} unconfirmed",
            confirmed.len(),
            unconfirmed.len()
        );
        confirmed
    } else {
        let mut all = confirmed;
        all.extend(unconfirmed);
        all.sort_by_key(|a| a.candidate.offset);

        let mut kept: Vec<Accepted> = Vec::with_capacity(all.len());
        for a in all {
            let too_close = kept
                .last()
                .is_some_and(|prev| a.candidate.offset - prev.candidate.offset < MIN_CANDIDATE_DISTANCE);
            if !too_close {
                kept.push(a);
            }
        }
        log::debug!("Overproduction filter: {} candidates after proximity collapse", kept.len());
        kept
    };

    for (i, a) in kept.iter_mut().enumerate() {
        a.candidate.number = i + 1;
    }
    kept
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn into_candidates(pass: Pass) -> Vec<BoundaryCandidate> {
    pass.accepted.into_iter().map(|a| a.candidate).collect()
}
