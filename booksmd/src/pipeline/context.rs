use std::collections::VecDeque;

/// Bounded window of earlier chapters' summaries, oldest first.
#[derive(Debug, Clone)]
pub struct RollingContext {
    window: usize,
    summaries: VecDeque<String>,
}

impl RollingContext {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            summaries: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, summary: String) {
        if self.window == 0 || summary.trim().is_empty() {
            return;
        }
        if self.summaries.len() == self.window {
            self.summaries.pop_front();
        }
        self.summaries.push_back(summary);
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Context text for the next chapter, `None` before the first summary.
    pub fn render(&self) -> Option<String> {
        if self.summaries.is_empty() {
            return None;
        }
        Some(
            self.summaries
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }
}
