//! Output generation for JSON snapshots and terminal Markdown.
//!
//! # Submodules
//!
//! - [`json`]: Writes fetch results to dated JSON files
//! - [`markdown`]: Renders items, pages and bookmarks for the terminal

pub mod json;
pub mod markdown;
