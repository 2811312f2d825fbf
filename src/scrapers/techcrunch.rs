//! TechCrunch "latest" scraper.
//!
//! Two phases:
//!
//! 1. **Indexing**: fetch the listing page and collect up to
//!    `max_articles` (at most [`MAX_ARTICLES`]) links from `a.loop-card__title-link`.
//! 2. **Fetching**: download each article on a small worker pool. Each worker
//!    sleeps a random 1–3 s before its request so the site sees human-paced
//!    traffic.
//!
//! Fields other than title and url are best-effort. A missing author, date,
//! body, topic list or category only affects that field.

use crate::config::NewsConfig;
use crate::error::NetworkError;
use crate::http::HttpClient;
use crate::models::{FetchOutcome, SourceKind};
use crate::normalize::{RawItem, normalize_all};
use crate::retry::polite_delay;
use crate::scrapers::{all_texts, element_text, first_text, or_default, selector};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use scraper::Html;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const LISTING_LINK: &str = "a.loop-card__title-link";
const HEADLINE: &str = "h1";
const AUTHOR: &str = "a.wp-block-tc23-author-card-name__link";
const DATE: &str = "time";
const BODY_PARAGRAPHS: &str = "div.entry-content.wp-block-post-content p";
const TOPICS: &str = "div.tc23-post-relevant-terms__terms a";
const CATEGORY: &str = "a.is-taxonomy-category.wp-block-tenup-post-primary-term";

/// Upper bound on articles fetched per refresh, whatever the config says.
pub const MAX_ARTICLES: usize = 20;

/// A link found on the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub url: String,
}

/// Extract article links from the listing page, resolved against `base`.
///
/// Duplicate urls are collapsed and at most `cap` entries are returned.
pub fn parse_listing(html: &str, base: &Url, cap: usize) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = selector(LISTING_LINK) else {
        return Vec::new();
    };

    document
        .select(&link_selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let url = base.join(href).ok()?;
            Some(ListingEntry {
                title: element_text(a),
                url: url.to_string(),
            })
        })
        .unique_by(|e| e.url.clone())
        .take(cap)
        .collect()
}

/// Extract one article page into a raw record.
///
/// The listing title wins; the page headline is used only when the listing
/// link had no text.
pub fn parse_article(html: &str, entry: &ListingEntry) -> RawItem {
    let document = Html::parse_document(html);

    let title = if entry.title.trim().is_empty() {
        or_default("title", first_text(&document, HEADLINE))
    } else {
        Some(entry.title.clone())
    };

    let content = or_default("content", all_texts(&document, BODY_PARAGRAPHS)).map(|ps| ps.join("\n"));
    let topics = or_default("topics", all_texts(&document, TOPICS)).unwrap_or_default();

    RawItem {
        title,
        url: Some(entry.url.clone()),
        content,
        author: or_default("author", first_text(&document, AUTHOR)),
        date: or_default("date", first_text(&document, DATE)),
        category: or_default("category", first_text(&document, CATEGORY)),
        topics,
        extra: Default::default(),
    }
}

/// Fetch the listing page and return its article links.
#[instrument(level = "info", skip_all, fields(url = %config.listing_url))]
pub async fn index_articles(
    http: &HttpClient,
    config: &NewsConfig,
    timeout: Duration,
) -> Result<Vec<ListingEntry>, NetworkError> {
    let base = Url::parse(&config.listing_url).map_err(|e| NetworkError::InvalidUrl {
        url: config.listing_url.clone(),
        message: e.to_string(),
    })?;
    let html = http
        .get_text(&config.listing_url, &[], timeout, &config.retry)
        .await?;
    let entries = parse_listing(&html, &base, config.max_articles.clamp(1, MAX_ARTICLES));

    info!(count = entries.len(), "Indexed news article links");
    debug!(urls = ?entries.iter().map(|e| &e.url).collect::<Vec<_>>(), "News URLs");
    Ok(entries)
}

/// Fetch every article page.
///
/// Returns the parsed records in listing order and the number of articles
/// whose page could not be fetched.
#[instrument(level = "info", skip_all, fields(count = entries.len()))]
pub async fn fetch_articles(
    http: &HttpClient,
    config: &NewsConfig,
    timeout: Duration,
    entries: Vec<ListingEntry>,
) -> (Vec<RawItem>, usize) {
    let workers = config.workers.clamp(1, 5);
    let polite = config.polite_delay;

    let results: Vec<Option<RawItem>> = stream::iter(entries)
        .map(|entry| async move {
            if polite {
                sleep(polite_delay()).await;
            }
            match http.get_text(&entry.url, &[], timeout, &config.retry).await {
                Ok(html) => {
                    debug!(url = %entry.url, "Fetched news article");
                    Some(parse_article(&html, &entry))
                }
                Err(e) => {
                    error!(url = %entry.url, error = %e, "News article fetch failed");
                    None
                }
            }
        })
        .buffered(workers)
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.is_none()).count();
    let raws: Vec<RawItem> = results.into_iter().flatten().collect();
    info!(fetched = raws.len(), failed, "Fetched news article contents");
    (raws, failed)
}

/// Index, fetch and normalize the latest articles.
#[instrument(level = "info", skip_all)]
pub async fn fetch_latest(http: &HttpClient, config: &NewsConfig, timeout: Duration) -> FetchOutcome {
    let entries = match index_articles(http, config, timeout).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(error = %e, "News listing unavailable");
            return FetchOutcome::failed(format!("news listing unavailable: {e}"));
        }
    };
    if entries.is_empty() {
        warn!("News listing contained no article links");
        return FetchOutcome::partial(Vec::new(), "news listing contained no articles");
    }

    let listed = entries.len();
    let (raws, failed) = fetch_articles(http, config, timeout, entries).await;
    let (items, dropped) = normalize_all(raws, SourceKind::News);

    if items.is_empty() {
        return FetchOutcome::failed(format!("none of {listed} news articles could be fetched"));
    }
    let lost = failed + dropped;
    if lost > 0 {
        warn!(listed, lost, "Some news articles were lost");
        return FetchOutcome::partial(items, format!("{lost} of {listed} news articles unavailable"));
    }
    FetchOutcome::ok(items)
}
