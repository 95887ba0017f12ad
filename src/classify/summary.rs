use super::Classifier;
use crate::model::{CatalogEntry, Category, Tier};

const MAX_TOPICS: usize = 6;
const KIND_WINDOW_TOKENS: usize = 80;

impl Classifier {
    pub(super) fn summarize(&self, entry: &CatalogEntry, text: Option<&str>) -> String {
        let category = entry.category.unwrap_or(Category::Education);
        let tier = entry.tier.unwrap_or(Tier::Standard);
        let metrics = match entry.pages {
            Some(pages) if pages > 0 => format!("{} pages, {} MB.", pages, entry.size_mb),
            _ => format!("{} MB.", entry.size_mb),
        };

        let Some(text) = text else {
            return format!(
                "{}. A {} resource classified as {} for offline library use. {}",
                entry.title,
                category.topic_phrase(),
                tier,
                metrics
            );
        };

        let tokens = self.normalizer.tokens(text);
        let leading = &tokens[..tokens.len().min(KIND_WINDOW_TOKENS)];
        let kind = self
            .document_kinds
            .iter()
            .find(|(_, cue)| cue.matches(leading))
            .map(|(label, _)| *label)
            .unwrap_or("Reference document");

        let topics: Vec<&str> = self
            .topics
            .iter()
            .filter(|(_, term)| term.matches(&tokens))
            .map(|(topic, _)| *topic)
            .take(MAX_TOPICS)
            .collect();

        let mut summary = format!(
            "{}. {} providing guidance on {} topics.",
            entry.title,
            kind,
            category.topic_phrase()
        );
        if !topics.is_empty() {
            summary.push_str(&format!(" Covers topics including {}.", topics.join(", ")));
        }
        summary.push(' ');
        summary.push_str(&metrics);
        summary
    }
}
