//! Export cached summaries as JSON.
//!
//! The exported document has exactly the cache-file shape: one key per
//! `"<id>:<fingerprint>"` entry.

use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::cache::SummaryCache;

/// Timestamped export file name, e.g. `ai_summaries_export_20240601_101500.json`.
pub fn export_file_name() -> String {
    format!("ai_summaries_export_{}.json", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Write the cache to a new timestamped file in `dir`. Returns its path.
pub fn export_to_dir(cache: &SummaryCache, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(export_file_name());
    cache.export_to(&path)?;
    Ok(path)
}

/// Export summaries as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn run_export(cache: &SummaryCache, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let count = cache.export_to(path)?;
            eprintln!("Exported {} summaries to {}", count, path.display());
        }
        None => {
            println!("{}", serde_json::to_string_pretty(cache.export_document())?);
        }
    }
    Ok(())
}
