use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::models::GeneratedContent;

const TITLE_HISTORY: usize = 20;
const TAG_SET_HISTORY: usize = 15;
const MAX_LISTED: usize = 5;

#[derive(Debug, Default)]
struct History {
    title_starts: VecDeque<String>,
    tag_starts: VecDeque<Vec<String>>,
    full_tags: VecDeque<Vec<String>>,
}

/// Remembers what recent generations looked like so the next prompt can
/// steer away from repeated title openers and tags.
#[derive(Debug, Default)]
pub struct DiversityTracker {
    history: Mutex<History>,
}

impl DiversityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra prompt text listing what to avoid. Empty until enough history exists.
    pub async fn instruction(&self) -> String {
        let history = self.history.lock().await;
        let mut out = String::new();

        if history.title_starts.len() >= 3 {
            let overused: Vec<String> = ranked(history.title_starts.iter())
                .into_iter()
                .take(MAX_LISTED)
                .filter(|(_, count)| *count > 1)
                .map(|(word, _)| word)
                .collect();
            if !overused.is_empty() {
                out.push_str(&format!(
                    "\n\n**Title Diversity:** do not start the title with these overused words: {}. Pick a fresh opening word.",
                    overused.join(", ")
                ));
            }
        }

        if history.tag_starts.len() >= 2 {
            let mut lines = Vec::new();
            let patterns: Vec<String> = ranked(history.tag_starts.iter().flatten())
                .into_iter()
                .filter(|(_, count)| *count >= 2)
                .take(MAX_LISTED)
                .map(|(word, _)| word)
                .collect();
            if !patterns.is_empty() {
                lines.push(format!("- Avoid tags starting with: {}", patterns.join(", ")));
            }
            let repeated: Vec<String> = ranked(history.full_tags.iter().flatten())
                .into_iter()
                .take(MAX_LISTED)
                .map(|(tag, _)| tag)
                .collect();
            if !repeated.is_empty() {
                lines.push(format!("- Never repeat these exact tags: {}", repeated.join(", ")));
            }
            if !lines.is_empty() {
                out.push_str("\n\n**Tag Diversity:**\n");
                out.push_str(&lines.join("\n"));
                out.push_str("\nUse synonyms, different word orders and fresh variations.");
            }
        }

        out
    }

    pub async fn record(&self, content: &GeneratedContent) {
        let mut history = self.history.lock().await;

        if let Some(word) = first_word(&content.title) {
            push_capped(&mut history.title_starts, word, TITLE_HISTORY);
        }

        let starts: Vec<String> = content.tags.iter().filter_map(|t| first_word(t)).collect();
        if !starts.is_empty() {
            push_capped(&mut history.tag_starts, starts, TAG_SET_HISTORY);
        }
        let full: Vec<String> = content
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if !full.is_empty() {
            push_capped(&mut history.full_tags, full, TAG_SET_HISTORY);
        }
    }
}

fn first_word(text: &str) -> Option<String> {
    text.split_whitespace().next().map(str::to_lowercase)
}

fn push_capped<T>(queue: &mut VecDeque<T>, item: T, cap: usize) {
    queue.push_back(item);
    while queue.len() > cap {
        queue.pop_front();
    }
}

/// Counts occurrences, most frequent first. Ties keep first-seen order.
fn ranked<'a>(items: impl Iterator<Item = &'a String>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| seen == item) {
            Some((_, count)) => *count += 1,
            None => counts.push((item.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
