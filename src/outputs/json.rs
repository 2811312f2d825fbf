//! JSON snapshots of fetch results.
//!
//! # Output Structure
//!
//! Files are organized by local date, one file per source:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── news.json
//!     ├── paper.json
//!     ├── link_aggregator.json
//!     └── bookmarks.json
//! ```
//!
//! A later run on the same day replaces the file for that source.

use chrono::Local;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `value` to `{json_output_dir}/{date}/{name}.json`.
///
/// Returns the path written.
#[instrument(level = "info", skip(value), fields(json_output_dir = %json_output_dir))]
pub async fn write_snapshot<T: Serialize>(
    value: &T,
    json_output_dir: &str,
    name: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    let local_date = Local::now().date_naive().to_string();
    let full_json_dir = PathBuf::from(json_output_dir).join(local_date);

    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let output_json_filename = full_json_dir.join(format!("{name}.json"));
    fs::write(&output_json_filename, json).await?;
    info!(path = %output_json_filename.display(), "Wrote JSON snapshot");

    Ok(output_json_filename)
}
