//! Filter facets over a result set.

use crate::models::{Item, UNKNOWN};
use itertools::Itertools;

/// Sorted unique categories, without the `"Unknown"` default.
pub fn categories(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .map(|i| i.category.as_str())
        .filter(|c| *c != UNKNOWN)
        .sorted()
        .dedup()
        .map(String::from)
        .collect()
}

/// Sorted unique topics, without the "no topics" sentinel.
pub fn topics(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .flat_map(Item::real_topics)
        .sorted()
        .dedup()
        .map(String::from)
        .collect()
}

/// Items matching both filters. `None` matches everything.
pub fn filter_items<'a>(items: &'a [Item], category: Option<&str>, topic: Option<&str>) -> Vec<&'a Item> {
    items
        .iter()
        .filter(|i| category.is_none_or(|c| i.category == c))
        .filter(|i| topic.is_none_or(|t| i.real_topics().any(|x| x == t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceKind, TOPIC_UNAVAILABLE};
    use crate::normalize::{RawItem, normalize};

    fn item(url: &str, category: Option<&str>, topics: &[&str]) -> Item {
        normalize(
            RawItem {
                title: Some("t".into()),
                url: Some(url.into()),
                category: category.map(String::from),
                topics: topics.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
            SourceKind::News,
        )
        .unwrap()
    }

    fn sample() -> Vec<Item> {
        vec![
            item("u1", Some("Startups"), &["AI", "Funding"]),
            item("u2", None, &[]),
            item("u3", Some("AI"), &["AI"]),
            item("u4", Some("Startups"), &[]),
        ]
    }

    #[test]
    fn test_facets_skip_defaults() {
        let items = sample();
        assert_eq!(categories(&items), vec!["AI", "Startups"]);
        assert_eq!(topics(&items), vec!["AI", "Funding"]);
        assert!(!topics(&items).contains(&TOPIC_UNAVAILABLE.to_string()));
    }

    #[test]
    fn test_filter_items() {
        let items = sample();
        let urls = |v: Vec<&Item>| v.into_iter().map(|i| i.url.clone()).collect::<Vec<_>>();
        assert_eq!(urls(filter_items(&items, None, None)).len(), 4);
        assert_eq!(urls(filter_items(&items, Some("Startups"), None)), vec!["u1", "u4"]);
        assert_eq!(urls(filter_items(&items, None, Some("AI"))), vec!["u1", "u3"]);
        assert_eq!(urls(filter_items(&items, Some("Startups"), Some("AI"))), vec!["u1"]);
        assert!(filter_items(&items, None, Some(TOPIC_UNAVAILABLE)).is_empty());
    }
}
