//! SDGP project scraper.
//!
//! Pulls the public showcase API and normalizes it into [`ProjectRecord`]s:
//!
//! 1. `GET {base}/api/projects?page=N&limit=L` for every page. The first
//!    response's `meta.totalPages` / `meta.totalItems` drive pagination and
//!    `data[]` carries the listing entries.
//! 2. Optionally `GET {base}/api/projects/{id}` per project for problem
//!    statement, solution, features, team, and technology stack.
//! 3. Write the records as `sdgp_projects_<YYYYmmdd_HHMMSS>.json` in the
//!    output directory.
//!
//! Every request goes through [`with_retry`] and is followed by the
//! configured delay. A failed first page aborts the run; later page or
//! detail failures are logged and skipped.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, ScraperConfig};
use crate::models::{parse_year, ProjectRecord};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::retry::{http_failure, with_retry, Attempt, RetryError, RetryPolicy};
use crate::store::save_records;

/// One page of the listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub total_pages: u64,
    pub total_items: u64,
    pub items: Vec<Value>,
}

/// HTTP client for the showcase API.
pub struct Scraper {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
    delay: Duration,
    include_details: bool,
    retry: RetryPolicy,
}

impl Scraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("sdgp-assistant/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if let Ok(referer) = HeaderValue::from_str(&format!("{}/project", base_url)) {
            headers.insert(REFERER, referer);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            page_size: config.page_size,
            delay: config.delay(),
            include_details: config.include_details,
            retry: config.retry_policy(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, RetryError> {
        with_retry(&self.retry, url, |_| async move {
            let response = self.client.get(url).send().await.map_err(Attempt::transient)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(http_failure("SDGP API", status, &body));
            }
            response.json::<Value>().await.map_err(Attempt::permanent)
        })
        .await
    }

    pub async fn fetch_page(&self, page: u64) -> Result<ListingPage> {
        let url = format!(
            "{}/api/projects?page={}&limit={}",
            self.base_url, page, self.page_size
        );
        let json = self.get_json(&url).await?;
        parse_listing(&json)
    }

    pub async fn fetch_details(&self, id: &str) -> Result<Value> {
        let url = format!("{}/api/projects/{}", self.base_url, id);
        Ok(self.get_json(&url).await?)
    }

    /// Scrape every listing page, then (optionally) every detail record.
    /// `limit` caps the number of projects kept.
    pub async fn scrape(
        &self,
        limit: Option<usize>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<ProjectRecord>> {
        let first = self
            .fetch_page(1)
            .await
            .context("failed to fetch the first listing page")?;
        let total_pages = first.total_pages.max(1);
        info!(
            total_items = first.total_items,
            total_pages, "starting project scrape"
        );
        progress.report(ProgressEvent::Listing {
            page: 1,
            total_pages,
        });

        let mut listing = first.items;
        for page in 2..=total_pages {
            if limit.is_some_and(|l| listing.len() >= l) {
                break;
            }
            self.pause().await;
            match self.fetch_page(page).await {
                Ok(p) => listing.extend(p.items),
                Err(e) => warn!(page, error = %format!("{:#}", e), "skipping listing page"),
            }
            progress.report(ProgressEvent::Listing { page, total_pages });
        }
        if let Some(l) = limit {
            listing.truncate(l);
        }

        let total = listing.len() as u64;
        let mut records = Vec::with_capacity(listing.len());
        for (i, basic) in listing.iter().enumerate() {
            let detail = match (self.include_details, basic_id(basic)) {
                (true, Some(id)) => {
                    self.pause().await;
                    match self.fetch_details(&id).await {
                        Ok(d) => Some(d),
                        Err(e) => {
                            warn!(id = %id, error = %format!("{:#}", e), "keeping listing data only");
                            None
                        }
                    }
                }
                _ => None,
            };
            match normalize(basic, detail.as_ref()) {
                Some(record) => records.push(record),
                None => warn!("listing entry without an id, skipped"),
            }
            if self.include_details {
                progress.report(ProgressEvent::Details {
                    n: i as u64 + 1,
                    total,
                });
            }
        }

        info!(count = records.len(), "scrape complete");
        Ok(records)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Parse a listing response (`{meta: {totalPages, totalItems}, data: [...]}`).
pub fn parse_listing(json: &Value) -> Result<ListingPage> {
    let Some(items) = json.get("data").and_then(|d| d.as_array()) else {
        bail!("invalid listing response: missing data array");
    };
    let meta = json.get("meta");
    let number = |key: &str| {
        meta.and_then(|m| m.get(key))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    };
    Ok(ListingPage {
        total_pages: number("totalPages"),
        total_items: number("totalItems"),
        items: items.clone(),
    })
}

fn basic_id(basic: &Value) -> Option<String> {
    match basic.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build a record from a listing entry and its optional detail response.
/// Returns `None` when the entry has no id.
pub fn normalize(basic: &Value, detail: Option<&Value>) -> Option<ProjectRecord> {
    let id = basic_id(basic)?;
    let mut record = ProjectRecord::new(id, text(basic.get("title")));
    record.subtitle = text(basic.get("subtitle"));
    record.status = text(basic.get("status"));
    record.year = basic.get("year").and_then(parse_year);
    record.domains = tags(basic.get("domains"));
    record.project_types = tags(basic.get("projectTypes"));
    record.updated_at = basic
        .get("updatedAt")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    if let Some(content) = detail.and_then(|d| d.get("content")) {
        if let Some(pd) = content.get("projectDetails") {
            record.problem_statement = text(pd.get("problem_statement"));
            record.solution = text(pd.get("solution"));
            record.features = text(pd.get("features"));
        }
        if let Some(team) = content.get("team").and_then(|t| t.as_array()) {
            record.team = team
                .iter()
                .map(|m| {
                    let name = text(m.get("name"));
                    if name.is_empty() {
                        "Unknown".to_string()
                    } else {
                        name
                    }
                })
                .collect();
        }
        if let Some(assocs) = content.get("associations").and_then(|a| a.as_array()) {
            for assoc in assocs {
                if assoc.get("type").and_then(|t| t.as_str()) == Some("PROJECT_TECH") {
                    let tech = text(assoc.get("techStack"));
                    if !tech.is_empty() {
                        record.tech.insert(tech);
                    }
                }
            }
        }
    }
    Some(record)
}

/// Flatten a string, number, or array of strings into text.
fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| text(Some(v)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    }
}

/// Tag set from an array of strings or `{name}` objects.
fn tags(value: Option<&Value>) -> BTreeSet<String> {
    let Some(items) = value.and_then(|v| v.as_array()) else {
        return BTreeSet::new();
    };
    items
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(_) => v.get("name").and_then(|n| n.as_str()).map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Timestamped data file name, e.g. `sdgp_projects_20240601_101500.json`.
pub fn output_file_name() -> String {
    format!("sdgp_projects_{}.json", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// CLI entry point: scrape and write a new data file. Returns its path.
pub async fn run_scrape(
    config: &Config,
    limit: Option<usize>,
    progress: &dyn ProgressReporter,
) -> Result<PathBuf> {
    let scraper = Scraper::new(&config.scraper)?;
    let records = scraper.scrape(limit, progress).await?;
    if records.is_empty() {
        bail!("no projects found at {}", config.scraper.base_url);
    }

    let path = config.output.dir.join(output_file_name());
    save_records(&path, &records)?;

    println!("scrape {}", config.scraper.base_url);
    println!("  projects: {}", records.len());
    println!(
        "  with details: {}",
        records
            .iter()
            .filter(|r| !r.problem_statement.is_empty() || !r.solution.is_empty())
            .count()
    );
    println!("  saved: {}", path.display());
    println!("ok");
    Ok(path)
}
