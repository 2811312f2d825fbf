//! Fetch clients for each external source.
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | TechCrunch latest | [`techcrunch`] | HTML scraping | listing page, then one request per article |
//! | Hacker News | [`hackernews`] | HTML scraping | single front page, paginated in memory |
//! | arXiv | [`arxiv`] | Atom search API | ranked by query relevance |
//! | Any page | [`content`] | HTML scraping | paragraph text for summaries |
//!
//! Markup of third-party pages is not stable, so extraction never fails a whole
//! page. The helpers here return [`ExtractionError`] for a missing element and
//! each client decides the fallback for that one field.

pub mod arxiv;
pub mod content;
pub mod hackernews;
pub mod techcrunch;

use crate::error::ExtractionError;
use crate::normalize::clean_text;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Parse a CSS selector, mapping failures into [`ExtractionError`].
pub(crate) fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Whitespace-normalized text of an element and its descendants.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first element matching `css`.
pub(crate) fn first_text(doc: &Html, css: &str) -> Result<String, ExtractionError> {
    let sel = selector(css)?;
    let el = doc.select(&sel).next().ok_or_else(|| ExtractionError::Missing {
        selector: css.to_string(),
    })?;
    let text = element_text(el);
    if text.is_empty() {
        return Err(ExtractionError::Empty {
            selector: css.to_string(),
        });
    }
    Ok(text)
}

/// Non-empty texts of every element matching `css`, in document order.
pub(crate) fn all_texts(doc: &Html, css: &str) -> Result<Vec<String>, ExtractionError> {
    let sel = selector(css)?;
    let mut matched = false;
    let texts: Vec<String> = doc
        .select(&sel)
        .inspect(|_| matched = true)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    if !matched {
        return Err(ExtractionError::Missing {
            selector: css.to_string(),
        });
    }
    if texts.is_empty() {
        return Err(ExtractionError::Empty {
            selector: css.to_string(),
        });
    }
    Ok(texts)
}

/// Keep the value of a successful extraction; log and drop a failed one.
pub(crate) fn or_default<T>(field: &'static str, res: Result<T, ExtractionError>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(field, error = %e, "Field unavailable; using default");
            None
        }
    }
}
