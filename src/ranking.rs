//! Query relevance scoring for search results.
//!
//! For each whitespace-delimited query term, case-insensitively:
//!
//! | Match | Points |
//! |-------|--------|
//! | term in title | +3 |
//! | term in abstract | +1 |
//! | whole query in title | +5 |
//! | whole query in abstract | +2 |
//!
//! Results below [`MIN_SCORE`] are dropped; the rest are sorted by descending
//! score. The sort is stable, so equal scores keep the order the API returned.

use crate::models::Item;
use std::cmp::Reverse;
use tracing::debug;

pub const MIN_SCORE: u32 = 1;

pub fn relevance_score(query: &str, title: &str, content: &str) -> u32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0;
    }
    let title = title.to_lowercase();
    let content = content.to_lowercase();

    let mut score = 0;
    for term in query.split_whitespace() {
        if title.contains(term) {
            score += 3;
        }
        if content.contains(term) {
            score += 1;
        }
    }
    if title.contains(&query) {
        score += 5;
    }
    if content.contains(&query) {
        score += 2;
    }
    score
}

/// Score, filter and sort `items` for `query`.
///
/// Each kept item carries its score in `extra["relevance_score"]`.
pub fn rank(items: Vec<Item>, query: &str) -> Vec<Item> {
    let total = items.len();
    let mut scored: Vec<(u32, Item)> = items
        .into_iter()
        .map(|item| (relevance_score(query, &item.title, &item.content), item))
        .filter(|(score, _)| *score >= MIN_SCORE)
        .collect();
    scored.sort_by_key(|(score, _)| Reverse(*score));
    debug!(query, total, kept = scored.len(), "Ranked search results");

    scored
        .into_iter()
        .map(|(score, mut item)| {
            item.extra.insert("relevance_score".to_string(), score.to_string());
            item
        })
        .collect()
}
