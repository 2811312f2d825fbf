//! Paragraph text of an arbitrary page, used as summarizer input.

use crate::error::NetworkError;
use crate::http::HttpClient;
use crate::retry::RetryPolicy;
use crate::scrapers::{all_texts, or_default};
use scraper::Html;
use std::time::Duration;
use tracing::{info, instrument};

const PARAGRAPHS: &str = "p";

/// Join the non-empty `<p>` texts of `html` with newlines.
pub fn extract_paragraphs(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    or_default("paragraphs", all_texts(&document, PARAGRAPHS)).map(|p| p.join("\n"))
}

/// Fetch `url` and return its paragraph text.
///
/// `Ok(None)` means the page was reachable but had no paragraph text.
#[instrument(level = "info", skip(http, timeout, policy))]
pub async fn fetch_article_content(
    http: &HttpClient,
    url: &str,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<Option<String>, NetworkError> {
    let html = http.get_text(url, &[], timeout, policy).await?;
    let text = extract_paragraphs(&html);
    info!(chars = text.as_ref().map_or(0, |t| t.chars().count()), "Fetched page content");
    Ok(text)
}
