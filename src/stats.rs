//! Summary cache statistics.
//!
//! Quick overview of what the cache holds: entry counts, expiry, hit rate,
//! entry ages, and file size. Used by `sdgp stats` and the chat session's
//! `stats` command.

use anyhow::Result;
use chrono::Duration;

use crate::cache::{CacheStats, SummaryCache};

/// Render `stats` as an indented report. `projects` is the number of loaded
/// records, when a data file was available.
pub fn format_cache_stats(stats: &CacheStats, projects: Option<usize>) -> String {
    let mut out = String::new();
    out.push_str("SDGP Assistant: Summary Cache\n");
    out.push_str("=============================\n\n");

    match (&stats.path, stats.enabled) {
        (_, false) => out.push_str("  Cache:       disabled\n"),
        (Some(path), true) => {
            out.push_str(&format!("  Cache file:  {}\n", path.display()));
            out.push_str(&format!("  Size:        {}\n", format_bytes(stats.file_size_bytes)));
        }
        (None, true) => out.push_str("  Cache:       in memory\n"),
    }
    out.push('\n');

    out.push_str(&format!("  Summaries:   {}\n", stats.total_entries));
    out.push_str(&format!("  Expired:     {}\n", stats.expired_entries));
    if let Some(n) = projects {
        out.push_str(&format!("  Projects:    {}\n", n));
    }

    let lookups = stats.hits + stats.misses;
    let rate = if lookups > 0 {
        (stats.hits * 100) / lookups
    } else {
        0
    };
    out.push_str(&format!(
        "  Hits:        {} / {} ({}%)\n",
        stats.hits, lookups, rate
    ));

    out.push_str(&format!(
        "  Oldest:      {}\n",
        stats.oldest_age.map_or_else(|| "-".to_string(), format_age)
    ));
    out.push_str(&format!(
        "  Newest:      {}\n",
        stats.newest_age.map_or_else(|| "-".to_string(), format_age)
    ));
    out
}

/// CLI entry point: print stats for the cache on disk.
pub fn run_stats(cache: &SummaryCache, projects: Option<usize>) -> Result<()> {
    println!("{}", format_cache_stats(&cache.stats(), projects));
    Ok(())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format an entry age as a relative string (e.g. "3 hours ago").
pub fn format_age(age: Duration) -> String {
    let secs = age.num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        let mins = secs / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if secs < 86400 {
        let hours = secs / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = secs / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    }
}
