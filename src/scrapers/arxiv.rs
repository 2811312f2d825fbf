//! arXiv search client.
//!
//! Queries the Atom export API:
//!
//! ```text
//! GET {endpoint}?search_query=ti:"graph neural networks"&start=0&max_results=10
//!     &sortBy=submittedDate&sortOrder=descending
//! ```
//!
//! Search results are re-ranked locally with [`crate::ranking::rank`]. The
//! recent-papers feed (no query) is returned in API order.
//!
//! # Category aliases
//!
//! Category searches accept common names ("machine learning", "nlp") and map
//! them to archive codes (`cs.LG`, `cs.CL`). Unknown names are passed through.

use crate::config::PapersConfig;
use crate::error::{NetworkError, ParseError};
use crate::http::HttpClient;
use crate::models::{FetchOutcome, SearchType, SourceKind};
use crate::normalize::{RawItem, clean_text, normalize_all};
use crate::ranking::rank;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Category assigned to every paper.
pub const PAPER_CATEGORY: &str = "Academic Paper";

const ERROR_ID_PREFIX: &str = "http://arxiv.org/api/errors";

static CATEGORY_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("artificial intelligence", "cs.AI"),
        ("ai", "cs.AI"),
        ("machine learning", "cs.LG"),
        ("ml", "cs.LG"),
        ("deep learning", "cs.LG"),
        ("computer vision", "cs.CV"),
        ("vision", "cs.CV"),
        ("natural language processing", "cs.CL"),
        ("nlp", "cs.CL"),
        ("computation and language", "cs.CL"),
        ("robotics", "cs.RO"),
        ("cryptography", "cs.CR"),
        ("security", "cs.CR"),
        ("neural networks", "cs.NE"),
        ("neural and evolutionary computing", "cs.NE"),
        ("information retrieval", "cs.IR"),
        ("databases", "cs.DB"),
        ("distributed computing", "cs.DC"),
        ("software engineering", "cs.SE"),
        ("programming languages", "cs.PL"),
        ("human computer interaction", "cs.HC"),
        ("hci", "cs.HC"),
        ("networking", "cs.NI"),
        ("statistical machine learning", "stat.ML"),
        ("quantum computing", "quant-ph"),
        ("quantum", "quant-ph"),
    ])
});

/// Map a free-text category name to its archive code.
pub fn resolve_category(name: &str) -> String {
    let key = name.trim().to_lowercase();
    match CATEGORY_ALIASES.get(key.as_str()) {
        Some(code) => code.to_string(),
        None => name.trim().to_string(),
    }
}

/// Build the `search_query` parameter for a user query.
///
/// `all` ANDs each term; title, abstract and author searches match the query
/// as a phrase; category searches resolve aliases.
pub fn build_search_query(query: &str, search_type: SearchType) -> String {
    let cleaned = clean_text(&query.replace('"', " "));
    let prefix = search_type.prefix();
    match search_type {
        SearchType::Category => format!("{prefix}:{}", resolve_category(&cleaned)),
        SearchType::All => cleaned
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(|t| format!("{prefix}:{t}"))
            .collect::<Vec<_>>()
            .join(" AND "),
        SearchType::Title | SearchType::Abstract | SearchType::Author => {
            if cleaned.contains(' ') {
                format!("{prefix}:\"{cleaned}\"")
            } else {
                format!("{prefix}:{cleaned}")
            }
        }
    }
}

/// Query for the most recent submissions in `categories`.
pub fn recent_query(categories: &[String]) -> String {
    categories
        .iter()
        .map(|c| format!("cat:{c}"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: Option<String>,
}

impl Entry {
    fn into_raw(self) -> RawItem {
        let authors: Vec<String> = self
            .authors
            .into_iter()
            .filter_map(|a| a.name)
            .map(|n| clean_text(&n))
            .filter(|n| !n.is_empty())
            .collect();
        let pdf_link = self
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("pdf"))
            .and_then(|l| l.href.clone());
        let topics = self
            .categories
            .into_iter()
            .filter_map(|c| c.term)
            .map(|t| t.rsplit('.').next().unwrap_or(&t).to_string())
            .collect();
        let url = self.id.map(|id| id.trim().to_string());

        let mut extra = BTreeMap::new();
        if let Some(pdf) = pdf_link {
            extra.insert("pdf_link".to_string(), pdf);
        }
        if !authors.is_empty() {
            extra.insert("authors_list".to_string(), authors.join("; "));
        }
        if let Some(id) = url.as_deref().and_then(|u| u.rsplit('/').next()) {
            extra.insert("paper_id".to_string(), id.to_string());
        }

        RawItem {
            title: self.title,
            url,
            content: self.summary.map(|s| clean_text(&s)),
            author: (!authors.is_empty()).then(|| authors.join(", ")),
            date: self
                .published
                .map(|p| p.trim().chars().take(10).collect::<String>()),
            category: Some(PAPER_CATEGORY.to_string()),
            topics,
            extra,
        }
    }
}

/// Parse an Atom response into raw paper records.
///
/// API error entries are skipped; a feed made only of error entries is a
/// [`ParseError`].
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>, ParseError> {
    let feed: Feed = quick_xml::de::from_str(xml).map_err(|e| ParseError {
        message: e.to_string(),
    })?;

    let total = feed.entries.len();
    let mut api_error = None;
    let raws: Vec<RawItem> = feed
        .entries
        .into_iter()
        .filter(|entry| {
            let is_error = entry
                .id
                .as_deref()
                .is_some_and(|id| id.trim().starts_with(ERROR_ID_PREFIX));
            if is_error {
                warn!(summary = ?entry.summary, "Search API returned an error entry");
                api_error = entry.summary.clone();
            }
            !is_error
        })
        .map(Entry::into_raw)
        .collect();

    if total > 0 && raws.is_empty() {
        if let Some(message) = api_error {
            return Err(ParseError {
                message: format!("search API error: {}", clean_text(&message)),
            });
        }
    }
    Ok(raws)
}

#[instrument(level = "info", skip(http, config, timeout))]
async fn query_api(
    http: &HttpClient,
    config: &PapersConfig,
    timeout: Duration,
    search_query: &str,
    max_results: usize,
) -> Result<String, NetworkError> {
    let params = [
        ("search_query", search_query.to_string()),
        ("start", "0".to_string()),
        ("max_results", max_results.to_string()),
        ("sortBy", config.sort_by.clone()),
        ("sortOrder", config.sort_order.clone()),
    ];
    http.get_text(&config.endpoint, &params, timeout, &config.retry).await
}

async fn fetch_papers(
    http: &HttpClient,
    config: &PapersConfig,
    timeout: Duration,
    search_query: &str,
    max_results: usize,
) -> Result<(Vec<crate::models::Item>, usize), FetchOutcome> {
    let xml = query_api(http, config, timeout, search_query, max_results)
        .await
        .map_err(|e| {
            error!(error = %e, "Paper search unavailable");
            FetchOutcome::failed(format!("paper search unavailable: {e}"))
        })?;
    let raws = parse_feed(&xml).map_err(|e| {
        error!(error = %e, "Paper search response unreadable");
        FetchOutcome::failed(e.to_string())
    })?;
    Ok(normalize_all(raws, SourceKind::Paper))
}

/// Search papers and return them ranked by relevance to `query`.
#[instrument(level = "info", skip(http, config, timeout))]
pub async fn search(
    http: &HttpClient,
    config: &PapersConfig,
    timeout: Duration,
    query: &str,
    search_type: SearchType,
    max_results: usize,
) -> FetchOutcome {
    if query.trim().is_empty() {
        return FetchOutcome::failed("empty search query");
    }
    let search_query = build_search_query(query, search_type);
    let (items, dropped) = match fetch_papers(http, config, timeout, &search_query, max_results).await {
        Ok(found) => found,
        Err(outcome) => return outcome,
    };

    let returned = items.len();
    let ranked = rank(items, query);
    info!(returned, kept = ranked.len(), dropped, "Paper search complete");
    if dropped > 0 {
        return FetchOutcome::partial(ranked, format!("{dropped} papers were malformed"));
    }
    FetchOutcome::ok(ranked)
}

/// Most recent papers in the configured categories, newest first.
#[instrument(level = "info", skip(http, config, timeout))]
pub async fn recent(http: &HttpClient, config: &PapersConfig, timeout: Duration, max_results: usize) -> FetchOutcome {
    let search_query = recent_query(&config.recent_categories);
    match fetch_papers(http, config, timeout, &search_query, max_results).await {
        Ok((items, 0)) => FetchOutcome::ok(items),
        Ok((items, dropped)) => FetchOutcome::partial(items, format!("{dropped} papers were malformed")),
        Err(outcome) => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchStatus;
    use crate::retry::RetryPolicy;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <link href="http://arxiv.org/api/query" rel="self" type="application/atom+xml"/>
  <title type="html">ArXiv Query: search_query=all:neural</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2025-05-06T00:00:00-04:00</updated>
  <opensearch:totalResults>3</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2505.00001v1</id>
    <updated>2025-05-05T17:59:59Z</updated>
    <published>2025-05-05T17:59:59Z</published>
    <title>Graph Methods for
      Molecules</title>
    <summary>  We train a neural model
      on molecular graphs. </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <arxiv:comment>12 pages</arxiv:comment>
    <link href="http://arxiv.org/abs/2505.00001v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2505.00001v1" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="q-bio.BM" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2505.00002v1</id>
    <published>2025-05-04T10:00:00Z</published>
    <title>Query Optimizers</title>
    <summary>Cost models for databases.</summary>
    <author><name>Edgar Codd</name></author>
    <category term="cs.DB"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2505.00003v2</id>
    <published>2025-05-03T10:00:00Z</published>
    <title>Scaling Neural Networks</title>
    <summary>Bigger is better.</summary>
  </entry>
</feed>"#;

    const ERROR_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
    <title>Error</title>
    <summary>incorrect id format for 1234</summary>
  </entry>
</feed>"#;

    fn test_config(endpoint: String) -> PapersConfig {
        PapersConfig {
            endpoint,
            retry: RetryPolicy::new(2, Duration::from_millis(5)),
            ..PapersConfig::default()
        }
    }

    #[test]
    fn test_build_search_query() {
        assert_eq!(build_search_query("neural networks", SearchType::All), "all:neural AND all:networks");
        assert_eq!(build_search_query("neural networks", SearchType::Title), "ti:\"neural networks\"");
        assert_eq!(build_search_query("transformers", SearchType::Abstract), "abs:transformers");
        assert_eq!(build_search_query("\"Geoffrey  Hinton\"", SearchType::Author), "au:\"Geoffrey Hinton\"");
        assert_eq!(build_search_query("Machine Learning", SearchType::Category), "cat:cs.LG");
        assert_eq!(build_search_query("math.CO", SearchType::Category), "cat:math.CO");
    }

    #[test]
    fn test_resolve_category() {
        assert_eq!(resolve_category(" NLP "), "cs.CL");
        assert_eq!(resolve_category("computer vision"), "cs.CV");
        assert_eq!(resolve_category("astro-ph"), "astro-ph");
    }

    #[test]
    fn test_recent_query() {
        let q = recent_query(&PapersConfig::default().recent_categories);
        assert_eq!(q, "cat:cs.AI OR cat:cs.LG OR cat:cs.CL OR cat:cs.CV");
    }

    #[test]
    fn test_parse_feed() {
        let raws = parse_feed(FEED).unwrap();
        assert_eq!(raws.len(), 3);
        let first = &raws[0];
        assert_eq!(first.url.as_deref(), Some("http://arxiv.org/abs/2505.00001v1"));
        assert_eq!(first.content.as_deref(), Some("We train a neural model on molecular graphs."));
        assert_eq!(first.author.as_deref(), Some("Ada Lovelace, Alan Turing"));
        assert_eq!(first.date.as_deref(), Some("2025-05-05"));
        assert_eq!(first.topics, vec!["LG", "BM"]);
        assert_eq!(first.extra["pdf_link"], "http://arxiv.org/pdf/2505.00001v1");
        assert_eq!(first.extra["paper_id"], "2505.00001v1");
        assert_eq!(first.extra["authors_list"], "Ada Lovelace; Alan Turing");

        let third = &raws[2];
        assert_eq!(third.author, None);
        assert!(third.topics.is_empty());
        assert!(!third.extra.contains_key("pdf_link"));
    }

    #[test]
    fn test_parse_feed_errors() {
        assert!(parse_feed("<feed><entry><title>x</entry></feed>").is_err());
        let err = parse_feed(ERROR_FEED).unwrap_err();
        assert!(err.message.contains("incorrect id format"));
        assert!(parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "all:neural AND all:networks"))
            .and(query_param("start", "0"))
            .and(query_param("max_results", "3"))
            .and(query_param("sortBy", "submittedDate"))
            .and(query_param("sortOrder", "descending"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new("test-agent");
        let config = test_config(format!("{}/api/query", server.uri()));
        let out = search(&http, &config, Duration::from_secs(5), "neural networks", SearchType::All, 3).await;

        assert_eq!(out.status, FetchStatus::Ok);
        let titles: Vec<_> = out.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Scaling Neural Networks", "Graph Methods for Molecules"]);
        assert_eq!(out.items[0].category, PAPER_CATEGORY);
        assert_eq!(out.items[1].relevance_score(), Some(1));
    }

    #[tokio::test]
    async fn test_search_malformed_response_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<feed><entry>"))
            .mount(&server)
            .await;

        let http = HttpClient::new("test-agent");
        let config = test_config(format!("{}/api/query", server.uri()));
        let out = search(&http, &config, Duration::from_secs(5), "rust", SearchType::Title, 5).await;
        assert!(out.is_failed());
        assert!(out.items.is_empty());
    }

    #[tokio::test]
    async fn test_recent_keeps_api_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "cat:cs.AI OR cat:cs.LG OR cat:cs.CL OR cat:cs.CV"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new("test-agent");
        let config = test_config(format!("{}/api/query", server.uri()));
        let out = recent(&http, &config, Duration::from_secs(5), 10).await;
        assert_eq!(out.status, FetchStatus::Ok);
        assert_eq!(out.items.len(), 3);
        assert_eq!(out.items[1].title, "Query Optimizers");
        assert!(out.items.iter().all(|i| i.relevance_score().is_none()));
    }
}
