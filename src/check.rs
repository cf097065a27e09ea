//! Configuration health check (`sdgp check`).
//!
//! Verifies everything the other commands need before they run: model
//! credentials, project data, and writable output and cache locations.
//! Prints one row per check and never fails the process.

use anyhow::Result;
use std::path::Path;

use crate::cache::SummaryCache;
use crate::config::Config;
use crate::llm::{resolve_credentials, Credentials};
use crate::store::{find_latest_data_file, ProjectStore};

/// One row of the health table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: &'static str,
    pub status: String,
    pub healthy: bool,
}

impl CheckItem {
    fn ok(name: &'static str, status: impl Into<String>) -> Self {
        Self {
            name,
            status: status.into(),
            healthy: true,
        }
    }

    fn fail(name: &'static str, status: impl Into<String>) -> Self {
        Self {
            name,
            status: status.into(),
            healthy: false,
        }
    }
}

/// Run every check. `lookup` abstracts the environment for credential
/// resolution.
pub fn collect_checks<F>(config: &Config, data: Option<&Path>, lookup: F) -> Vec<CheckItem>
where
    F: Fn(&str) -> Option<String>,
{
    vec![
        check_credentials(config, lookup),
        CheckItem::ok("model", config.ai.model.clone()),
        check_data(config, data),
        check_dir("output dir", &config.output.dir),
        check_cache(config),
    ]
}

fn check_credentials<F>(config: &Config, lookup: F) -> CheckItem
where
    F: Fn(&str) -> Option<String>,
{
    match resolve_credentials(&config.ai, lookup) {
        Ok(resolved) => match resolved.credentials {
            Credentials::ApiKey(_) => CheckItem::ok("credentials", "OK (API key)"),
            Credentials::AccessToken(_) => CheckItem::ok(
                "credentials",
                format!(
                    "OK (Vertex AI, project {})",
                    resolved.project_id.as_deref().unwrap_or("-")
                ),
            ),
        },
        Err(e) => CheckItem::fail("credentials", e.to_string()),
    }
}

fn check_data(config: &Config, data: Option<&Path>) -> CheckItem {
    let path = match data {
        Some(p) => p.to_path_buf(),
        None => match find_latest_data_file(&config.output.dir) {
            Ok(Some(p)) => p,
            Ok(None) => {
                return CheckItem::fail(
                    "project data",
                    format!("none in {} (run `sdgp scrape`)", config.output.dir.display()),
                )
            }
            Err(e) => return CheckItem::fail("project data", e.to_string()),
        },
    };
    match ProjectStore::load(&path) {
        Ok(store) => CheckItem::ok(
            "project data",
            format!("OK ({} projects in {})", store.len(), path.display()),
        ),
        Err(e) => CheckItem::fail("project data", e.to_string()),
    }
}

/// A directory is healthy when it exists and is writable, or when it is
/// missing but its nearest existing ancestor is writable.
fn check_dir(name: &'static str, dir: &Path) -> CheckItem {
    let mut probe = dir;
    loop {
        if probe.exists() {
            break;
        }
        match probe.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => probe = parent,
            _ => {
                probe = Path::new(".");
                break;
            }
        }
    }

    let writable = std::fs::metadata(probe)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false);
    match (writable, probe == dir) {
        (true, true) => CheckItem::ok(name, format!("OK ({})", dir.display())),
        (true, false) => CheckItem::ok(name, format!("OK (will create {})", dir.display())),
        (false, _) => CheckItem::fail(name, format!("not writable: {}", probe.display())),
    }
}

fn check_cache(config: &Config) -> CheckItem {
    if !config.cache.enabled {
        return CheckItem::ok("summary cache", "disabled");
    }
    let dir = check_dir("summary cache", &config.cache.dir);
    if !dir.healthy {
        return dir;
    }
    let path = config.cache.file_path();
    if !path.exists() {
        return CheckItem::ok("summary cache", format!("OK (empty, {})", path.display()));
    }
    let cache = SummaryCache::from_config(&config.cache);
    CheckItem::ok(
        "summary cache",
        format!("OK ({} summaries in {})", cache.len(), path.display()),
    )
}

/// Render checks as a fixed-width table.
pub fn format_checks(items: &[CheckItem]) -> String {
    let mut out = format!("{:<16} {:<8} STATUS\n", "CHECK", "HEALTHY");
    for item in items {
        out.push_str(&format!(
            "{:<16} {:<8} {}\n",
            item.name, item.healthy, item.status
        ));
    }
    let failed = items.iter().filter(|i| !i.healthy).count();
    if failed == 0 {
        out.push_str("\nall checks passed\n");
    } else {
        out.push_str(&format!("\n{} check(s) need attention\n", failed));
    }
    out
}

/// CLI entry point.
pub fn run_check(config: &Config, data: Option<&Path>) -> Result<()> {
    let items = collect_checks(config, data, |key| std::env::var(key).ok());
    print!("{}", format_checks(&items));
    Ok(())
}
