//! Translation from source-specific records into [`Item`]s.
//!
//! Every fetch client produces [`RawItem`]s with optional fields; this module is
//! the single place where they become the canonical schema. Items without a
//! title or url are dropped here, everything else falls back to its default.
//!
//! Normalizing an already normalized item returns it unchanged.

use crate::models::{Item, SourceKind, TOPIC_UNAVAILABLE, UNKNOWN};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// A record as extracted from a source, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub topics: Vec<String>,
    pub extra: BTreeMap<String, String>,
}

impl From<Item> for RawItem {
    fn from(item: Item) -> Self {
        RawItem {
            title: Some(item.title),
            url: Some(item.url),
            content: Some(item.content),
            author: Some(item.author),
            date: Some(item.date),
            category: Some(item.category),
            topics: item.topics,
            extra: item.extra,
        }
    }
}

/// Collapse runs of whitespace to a single space and trim.
pub fn clean_text(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

fn cleaned_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| clean_text(&v))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Turn a raw record into an [`Item`], or `None` if it has no title or url.
pub fn normalize(raw: RawItem, source_kind: SourceKind) -> Option<Item> {
    let title = raw.title.map(|t| clean_text(&t)).unwrap_or_default();
    let url = raw.url.map(|u| u.trim().to_string()).unwrap_or_default();
    if title.is_empty() || url.is_empty() {
        debug!(%title, %url, "Dropping item without title or url");
        return None;
    }

    let content = raw.content.map(|c| c.trim().to_string()).unwrap_or_default();

    let mut topics: Vec<String> = raw
        .topics
        .iter()
        .map(|t| clean_text(t))
        .filter(|t| !t.is_empty())
        .unique()
        .collect();
    if topics.is_empty() {
        topics.push(TOPIC_UNAVAILABLE.to_string());
    }

    let extra = raw
        .extra
        .into_iter()
        .map(|(k, v)| (k, v.trim().to_string()))
        .filter(|(_, v)| !v.is_empty())
        .collect();

    Some(Item {
        title,
        url,
        content,
        author: cleaned_or(raw.author, UNKNOWN),
        date: cleaned_or(raw.date, UNKNOWN),
        category: cleaned_or(raw.category, UNKNOWN),
        topics,
        source_kind,
        extra,
    })
}

/// Normalize a batch, returning the items and how many records were dropped.
pub fn normalize_all(raws: Vec<RawItem>, source_kind: SourceKind) -> (Vec<Item>, usize) {
    let total = raws.len();
    let items: Vec<Item> = raws
        .into_iter()
        .filter_map(|raw| normalize(raw, source_kind))
        .collect();
    let dropped = total - items.len();
    (items, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, url: &str) -> RawItem {
        RawItem {
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_title_or_url_is_dropped() {
        let raws = vec![
            raw("", "https://example.com/a"),
            raw("   \n ", "https://example.com/b"),
            raw("Title", "  "),
            RawItem {
                url: Some("https://example.com/c".into()),
                ..Default::default()
            },
            raw("Kept", "https://example.com/d"),
        ];
        let (items, dropped) = normalize_all(raws, SourceKind::News);
        assert_eq!(dropped, 4);
        assert_eq!(items.len(), 1);
        assert!(items.iter().all(|i| !i.title.is_empty() && !i.url.is_empty()));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let item = normalize(raw("Title", "https://example.com/a"), SourceKind::News).unwrap();
        assert_eq!(item.author, UNKNOWN);
        assert_eq!(item.date, UNKNOWN);
        assert_eq!(item.category, UNKNOWN);
        assert_eq!(item.content, "");
        assert_eq!(item.topics, vec![TOPIC_UNAVAILABLE.to_string()]);
    }

    #[test]
    fn test_whitespace_and_duplicate_topics_cleaned() {
        let mut r = raw("  Big\n  launch  ", " https://example.com/a ");
        r.author = Some("  ".into());
        r.topics = vec![" AI ".into(), "AI".into(), "".into(), "Chips".into()];
        r.extra.insert("pdf_link".into(), "".into());
        r.extra.insert("paper_id".into(), " 2401.0001 ".into());
        let item = normalize(r, SourceKind::Paper).unwrap();
        assert_eq!(item.title, "Big launch");
        assert_eq!(item.url, "https://example.com/a");
        assert_eq!(item.author, UNKNOWN);
        assert_eq!(item.topics, vec!["AI".to_string(), "Chips".to_string()]);
        assert!(!item.extra.contains_key("pdf_link"));
        assert_eq!(item.extra["paper_id"], "2401.0001");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut r = raw(" A \t title ", "https://example.com/a");
        r.content = Some("  first\nsecond  ".into());
        r.date = Some("Jan 1, 2025".into());
        r.topics = vec!["Security".into(), " Security ".into()];
        let once = normalize(r, SourceKind::News).unwrap();
        let twice = normalize(RawItem::from(once.clone()), SourceKind::News).unwrap();
        assert_eq!(once, twice);

        let bare = normalize(raw("t", "u"), SourceKind::LinkAggregator).unwrap();
        assert_eq!(
            normalize(RawItem::from(bare.clone()), SourceKind::LinkAggregator),
            Some(bare)
        );
    }
}
