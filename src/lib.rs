//! # Tech Insight
//!
//! Aggregates technology news from three unreliable sources, normalizes them
//! into one [`models::Item`] shape, caches results with a TTL, ranks paper
//! searches by relevance and keeps a deduplicated set of bookmarks.
//!
//! ## Sources
//!
//! - A news site (listing page plus one request per article)
//! - A link aggregator front page, paged in memory
//! - A paper-search API returning Atom
//!
//! ## Architecture
//!
//! 1. **Fetching**: [`scrapers`] clients run every request under a
//!    [`retry::RetryPolicy`]
//! 2. **Normalization**: [`normalize`] drops records without a title or url
//!    and fills documented defaults
//! 3. **Ranking**: [`ranking`] scores and filters paper search results
//! 4. **Caching**: [`cache::TtlCache`] with single-flight misses
//! 5. **Bookmarks**: [`bookmarks::BookmarkStore`] rejects duplicate urls
//!
//! [`service::Aggregator`] ties the stages together.

pub mod bookmarks;
pub mod cache;
pub mod config;
pub mod error;
pub mod facets;
pub mod http;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod outputs;
pub mod ranking;
pub mod retry;
pub mod scrapers;
pub mod service;
pub mod utils;
