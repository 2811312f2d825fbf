//! Markdown rendering for the terminal.
//!
//! Items are grouped by category (alphabetically), bookmarks by source kind.

use crate::models::{Bookmark, FetchOutcome, FetchStatus, Item, SourceKind};
use crate::service::LinksPage;
use crate::utils::{slugify_title, title_case, truncate_for_display};
use std::collections::BTreeMap;
use std::fmt::Write;

const PREVIEW_CHARS: usize = 280;

fn status_line(md: &mut String, status: FetchStatus, detail: Option<&str>) {
    match (status, detail) {
        (FetchStatus::Ok, _) => {}
        (status, Some(detail)) => {
            let _ = writeln!(md, "> **{status:?}**: {detail}\n");
        }
        (status, None) => {
            let _ = writeln!(md, "> **{status:?}**\n");
        }
    }
}

fn item_to_markdown(md: &mut String, item: &Item) {
    let _ = writeln!(md, "### [{}]({})\n", item.title, item.url);
    let _ = writeln!(md, "*{}* · {}", item.author, item.date);
    let topics: Vec<&str> = item.real_topics().collect();
    if !topics.is_empty() {
        let _ = writeln!(md, "\n`{}`", topics.join("` `"));
    }
    if let Some(score) = item.relevance_score() {
        let _ = writeln!(md, "\nRelevance: {score}");
    }
    if let Some(pdf) = item.extra.get("pdf_link") {
        let _ = writeln!(md, "\n[PDF]({pdf})");
    }
    let preview = match item.source_kind {
        SourceKind::Generated => item.display_content().to_string(),
        _ => truncate_for_display(item.display_content(), PREVIEW_CHARS),
    };
    let _ = writeln!(md, "\n{preview}\n");
}

/// Render a fetch outcome, items grouped by category.
pub fn outcome_to_markdown(heading: &str, outcome: &FetchOutcome) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {heading}\n");
    status_line(&mut md, outcome.status, outcome.detail.as_deref());
    if outcome.items.is_empty() {
        let _ = writeln!(md, "_No items._");
        return md;
    }

    let mut by_category: BTreeMap<&str, Vec<&Item>> = BTreeMap::new();
    for item in &outcome.items {
        by_category.entry(item.category.as_str()).or_default().push(item);
    }
    for (category, items) in by_category {
        let _ = writeln!(md, "## {category} <a id=\"{}\"></a>\n", slugify_title(category));
        for item in items {
            item_to_markdown(&mut md, item);
        }
    }
    md
}

/// Render a ranked list in the given order, without regrouping.
pub fn ranked_to_markdown(heading: &str, outcome: &FetchOutcome) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {heading}\n");
    status_line(&mut md, outcome.status, outcome.detail.as_deref());
    if outcome.items.is_empty() {
        let _ = writeln!(md, "_No matching papers._");
    }
    for item in &outcome.items {
        item_to_markdown(&mut md, item);
    }
    md
}

/// Render one page of link-aggregator stories.
pub fn links_page_to_markdown(page: &LinksPage) -> String {
    let mut md = String::new();
    let p = &page.page;
    let _ = writeln!(
        md,
        "# Link aggregator, page {} of {}\n",
        p.index + 1,
        p.total_pages.max(1)
    );
    status_line(&mut md, page.status, page.detail.as_deref());
    for item in &p.items {
        let rank = item.extra.get("rank").map(String::as_str).unwrap_or("-");
        let _ = writeln!(md, "{rank}. [{}]({})", item.title, item.url);
    }
    let _ = writeln!(md, "\n{} stories", p.total_items);
    if p.has_previous() {
        let _ = writeln!(md, "previous: --page {}", p.index);
    }
    if p.has_next() {
        let _ = writeln!(md, "next: --page {}", p.index + 2);
    }
    md
}

/// Render bookmarks grouped by source kind.
pub fn bookmarks_to_markdown(groups: &BTreeMap<SourceKind, Vec<Bookmark>>) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Bookmarks\n");
    if groups.is_empty() {
        let _ = writeln!(md, "_No bookmarks yet._");
        return md;
    }
    for (kind, bookmarks) in groups {
        let _ = writeln!(md, "## {} ({})\n", title_case(kind.as_str()), bookmarks.len());
        for b in bookmarks {
            let _ = writeln!(
                md,
                "- [{}]({}) <small>saved {}</small>",
                b.item.title,
                b.item.url,
                b.saved_at.format("%Y-%m-%d %H:%M")
            );
        }
        let _ = writeln!(md);
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Page;
    use crate::normalize::{RawItem, normalize};

    fn item(title: &str, category: Option<&str>, kind: SourceKind) -> Item {
        normalize(
            RawItem {
                title: Some(title.into()),
                url: Some(format!("https://x.test/{}", slugify_title(title))),
                category: category.map(String::from),
                topics: vec!["AI".into()],
                ..Default::default()
            },
            kind,
        )
        .unwrap()
    }

    #[test]
    fn test_outcome_grouped_by_category() {
        let outcome = FetchOutcome::partial(
            vec![
                item("Zeta", Some("Startups"), SourceKind::News),
                item("Alpha", Some("AI"), SourceKind::News),
            ],
            "1 of 3 articles failed",
        );
        let md = outcome_to_markdown("Latest news", &outcome);
        assert!(md.starts_with("# Latest news\n"));
        assert!(md.contains("> **Partial**: 1 of 3 articles failed"));
        let ai = md.find("## AI").unwrap();
        let startups = md.find("## Startups").unwrap();
        assert!(ai < startups);
        assert!(md.contains("content not available"));
        assert!(md.contains("`AI`"));
    }

    #[test]
    fn test_long_content_preview() {
        let mut long = item("Long", None, SourceKind::News);
        long.content = "word ".repeat(200);
        let md = outcome_to_markdown("Latest news", &FetchOutcome::ok(vec![long]));
        assert!(md.contains("word…\n"));
        assert!(!md.contains("bytes)"));
    }

    #[test]
    fn test_failed_outcome() {
        let md = outcome_to_markdown("Latest news", &FetchOutcome::failed("listing unreachable"));
        assert!(md.contains("**Failed**: listing unreachable"));
        assert!(md.contains("_No items._"));
    }

    #[test]
    fn test_links_page() {
        let mut a = item("One", None, SourceKind::LinkAggregator);
        a.extra.insert("rank".into(), "11".into());
        let page = LinksPage {
            page: Page {
                items: vec![a],
                index: 1,
                total_pages: 3,
                total_items: 25,
            },
            status: FetchStatus::Ok,
            detail: None,
        };
        let md = links_page_to_markdown(&page);
        assert!(md.starts_with("# Link aggregator, page 2 of 3"));
        assert!(md.contains("11. [One](https://x.test/one)"));
        assert!(md.contains("next: --page 3"));
    }

    #[test]
    fn test_bookmarks_grouped() {
        let mut groups = BTreeMap::new();
        groups.insert(
            SourceKind::LinkAggregator,
            vec![Bookmark::new(item("Story", None, SourceKind::LinkAggregator))],
        );
        let md = bookmarks_to_markdown(&groups);
        assert!(md.contains("## Link Aggregator (1)"));
        assert!(md.contains("- [Story](https://x.test/story)"));
        assert!(bookmarks_to_markdown(&BTreeMap::new()).contains("_No bookmarks yet._"));
    }
}
