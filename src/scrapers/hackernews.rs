//! Hacker News front page scraper.
//!
//! The front page is fetched once; every story row (`tr.athing`) yields a
//! title and link. Self posts link to `item?id=…` and are resolved against the
//! site root. Paging happens over the in-memory list, so moving between pages
//! never hits the network.

use crate::config::LinksConfig;
use crate::http::HttpClient;
use crate::models::{FetchOutcome, Page, SourceKind};
use crate::normalize::{RawItem, normalize_all};
use crate::scrapers::{element_text, selector};
use scraper::Html;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use url::Url;

const STORY_ROW: &str = "tr.athing";
const TITLE_LINK: &str = ".titleline > a";
const RANK: &str = "span.rank";
const SITE: &str = "span.sitestr";

/// Extract story rows from a front page.
pub fn parse_front_page(html: &str, base: &Url) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    let (Ok(row_sel), Ok(link_sel), Ok(rank_sel), Ok(site_sel)) =
        (selector(STORY_ROW), selector(TITLE_LINK), selector(RANK), selector(SITE))
    else {
        return Vec::new();
    };

    document
        .select(&row_sel)
        .filter_map(|row| {
            let link = row.select(&link_sel).next()?;
            let href = link.value().attr("href")?;
            let url = base.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string());

            let mut extra = BTreeMap::new();
            if let Some(id) = row.value().attr("id") {
                extra.insert("item_id".to_string(), id.to_string());
            }
            if let Some(rank) = row.select(&rank_sel).next() {
                extra.insert("rank".to_string(), element_text(rank).trim_end_matches('.').to_string());
            }
            if let Some(site) = row.select(&site_sel).next() {
                extra.insert("site".to_string(), element_text(site));
            }

            Some(RawItem {
                title: Some(element_text(link)),
                url: Some(url),
                extra,
                ..Default::default()
            })
        })
        .collect()
}

/// Fetch and normalize the front page.
#[instrument(level = "info", skip_all, fields(url = %config.listing_url))]
pub async fn fetch_front_page(http: &HttpClient, config: &LinksConfig, timeout: Duration) -> FetchOutcome {
    let base = match Url::parse(&config.listing_url) {
        Ok(base) => base,
        Err(e) => {
            error!(error = %e, "Invalid link-aggregator url");
            return FetchOutcome::failed(format!("invalid link-aggregator url: {e}"));
        }
    };
    let html = match http.get_text(&config.listing_url, &[], timeout, &config.retry).await {
        Ok(html) => html,
        Err(e) => {
            error!(error = %e, "Link-aggregator page unavailable");
            return FetchOutcome::failed(format!("link-aggregator page unavailable: {e}"));
        }
    };

    let raws = parse_front_page(&html, &base);
    let listed = raws.len();
    let (items, dropped) = normalize_all(raws, SourceKind::LinkAggregator);
    info!(count = items.len(), dropped, "Parsed link-aggregator stories");

    if listed == 0 {
        warn!("Link-aggregator page contained no stories");
        return FetchOutcome::partial(items, "link-aggregator page contained no stories");
    }
    if dropped > 0 {
        return FetchOutcome::partial(items, format!("{dropped} of {listed} stories were malformed"));
    }
    FetchOutcome::ok(items)
}

/// Slice page `index` (zero-based) out of `items`.
///
/// A page size of zero is treated as one. Pages past the end are empty.
pub fn paginate<T: Clone>(items: &[T], index: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let start = index.saturating_mul(page_size).min(total_items);
    let end = start.saturating_add(page_size).min(total_items);
    Page {
        items: items[start..end].to_vec(),
        index,
        total_pages,
        total_items,
    }
}
