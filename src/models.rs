//! Data models shared by every stage of the pipeline.
//!
//! This module defines the core data structures:
//! - [`Item`]: The uniform representation every source normalizes into
//! - [`SourceKind`]: Which origin produced an item
//! - [`Bookmark`]: An item saved by the user
//! - [`FetchOutcome`] / [`FetchStatus`]: What a fetch returns to the caller
//! - [`FetchParams`] / [`SearchType`]: What a caller asks for

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default for `author`, `date` and `category` when the source lacks them.
pub const UNKNOWN: &str = "Unknown";

/// Sentinel topic stored when a source exposes no topics.
///
/// It is not a real topic and must be skipped when building filter facets.
pub const TOPIC_UNAVAILABLE: &str = "topic not available";

/// Text shown in place of empty content.
pub const CONTENT_UNAVAILABLE: &str = "content not available";

/// Origin of an [`Item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The news-site scraper.
    News,
    /// The paper-search index.
    Paper,
    /// The link-aggregator front page.
    LinkAggregator,
    /// Produced by the language model (explainers, timelines).
    Generated,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::News => "news",
            SourceKind::Paper => "paper",
            SourceKind::LinkAggregator => "link_aggregator",
            SourceKind::Generated => "generated",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized content unit: an article, a paper, a story link or a
/// generated explainer.
///
/// Items are built by [`crate::normalize`] and never mutated afterwards.
/// `title` and `url` are always non-empty; `url` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub url: String,
    /// Body text or abstract. Empty means the content was unavailable.
    pub content: String,
    pub author: String,
    /// Free-form date as published by the source.
    pub date: String,
    pub category: String,
    /// Topic tags, or `[TOPIC_UNAVAILABLE]` when the source had none.
    pub topics: Vec<String>,
    pub source_kind: SourceKind,
    /// Source-specific fields such as `pdf_link` or `relevance_score`.
    pub extra: BTreeMap<String, String>,
}

impl Item {
    /// Topics with the sentinel removed.
    pub fn real_topics(&self) -> impl Iterator<Item = &str> {
        self.topics
            .iter()
            .map(String::as_str)
            .filter(|t| *t != TOPIC_UNAVAILABLE)
    }

    /// Content, or [`CONTENT_UNAVAILABLE`] when empty.
    pub fn display_content(&self) -> &str {
        if self.content.is_empty() {
            CONTENT_UNAVAILABLE
        } else {
            &self.content
        }
    }

    /// Relevance score attached by the paper ranker, if any.
    pub fn relevance_score(&self) -> Option<u32> {
        self.extra.get("relevance_score").and_then(|s| s.parse().ok())
    }
}

/// An [`Item`] saved by the user.
///
/// The bookmark store holds at most one bookmark per `item.url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub item: Item,
    pub saved_at: DateTime<Utc>,
}

impl Bookmark {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            saved_at: Utc::now(),
        }
    }

    /// Identity key.
    pub fn url(&self) -> &str {
        &self.item.url
    }
}

/// Overall result of a fetch, shown to the user alongside the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStatus {
    /// Everything the source listed was fetched and normalized.
    Ok,
    /// Some items were lost (a sub-fetch failed or an item was malformed).
    Partial,
    /// The source could not be reached or its response could not be read.
    Failed,
}

/// Items returned by a fetch together with how the fetch went.
///
/// A `Failed` outcome never carries items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub items: Vec<Item>,
    pub status: FetchStatus,
    /// Human readable reason for a `Partial` or `Failed` status.
    pub detail: Option<String>,
}

impl FetchOutcome {
    pub fn ok(items: Vec<Item>) -> Self {
        Self {
            items,
            status: FetchStatus::Ok,
            detail: None,
        }
    }

    pub fn partial(items: Vec<Item>, detail: impl Into<String>) -> Self {
        Self {
            items,
            status: FetchStatus::Partial,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            status: FetchStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == FetchStatus::Failed
    }
}

/// Scope of a paper search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    All,
    Title,
    Abstract,
    Author,
    Category,
}

impl SearchType {
    /// Field prefix understood by the search API.
    pub fn prefix(&self) -> &'static str {
        match self {
            SearchType::All => "all",
            SearchType::Title => "ti",
            SearchType::Abstract => "abs",
            SearchType::Author => "au",
            SearchType::Category => "cat",
        }
    }
}

/// What a caller asks a source for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchParams {
    /// Search query; only the paper source uses it.
    pub query: Option<String>,
    pub search_type: SearchType,
    pub max_results: usize,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            query: None,
            search_type: SearchType::All,
            max_results: 10,
        }
    }
}

impl FetchParams {
    pub fn search(query: impl Into<String>, search_type: SearchType, max_results: usize) -> Self {
        Self {
            query: Some(query.into()),
            search_type,
            max_results,
        }
    }

    /// Canonical string form used as part of a cache key.
    ///
    /// A search (even a blank one) never shares a key with the no-query feed.
    pub fn cache_fragment(&self) -> String {
        let query = match self.query.as_deref() {
            Some(q) => format!("q:{}", q.trim().to_lowercase()),
            None => "recent".to_string(),
        };
        format!("{query}|{}|{}", self.search_type.prefix(), self.max_results)
    }
}

/// One page of an in-memory result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-based page index.
    pub index: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.total_pages
    }
}
