//! In-memory project store.
//!
//! Loaded once at startup from the JSON array the scraper writes (raw
//! `{basic_info, detailed_info}` API pairs are accepted too). Preserves
//! file order and indexes records by id. Duplicate ids keep the first
//! occurrence.

use anyhow::Context;
use globset::Glob;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::ProjectRecord;
use crate::scrape::normalize;

/// File name pattern of scraper output.
pub const DATA_FILE_GLOB: &str = "sdgp_projects_*.json";

/// Ordered, id-indexed collection of [`ProjectRecord`]s.
#[derive(Debug, Default, Clone)]
pub struct ProjectStore {
    records: Vec<ProjectRecord>,
    by_id: HashMap<String, usize>,
}

impl ProjectStore {
    pub fn new(records: Vec<ProjectRecord>) -> Self {
        let mut store = Self::default();
        for record in records {
            if store.by_id.contains_key(&record.id) {
                warn!(id = %record.id, "duplicate project id, keeping first occurrence");
                continue;
            }
            store.by_id.insert(record.id.clone(), store.records.len());
            store.records.push(record);
        }
        store
    }

    /// Load a JSON array of records from `path`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.is_file() {
            return Err(AppError::data_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        let records = parse_records(&content).map_err(|e| AppError::DataNotFound {
            path: path.to_path_buf(),
            hint: format!("file is not a JSON array of projects ({}); re-run `sdgp scrape`", e),
        })?;
        let store = Self::new(records);
        info!(count = store.len(), file = %path.display(), "loaded projects");
        Ok(store)
    }

    /// Load `explicit` if given, otherwise the newest scraper output file in
    /// `output_dir`.
    pub fn open(explicit: Option<&Path>, output_dir: &Path) -> Result<Self, AppError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let latest = find_latest_data_file(output_dir)?
                    .ok_or_else(|| AppError::data_not_found(output_dir))?;
                Self::load(&latest)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ProjectRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: &str) -> Option<&ProjectRecord> {
        self.by_id.get(id).map(|&idx| &self.records[idx])
    }

    /// First record whose title contains `name` (or is contained in it),
    /// case-insensitive.
    pub fn find_by_name(&self, name: &str) -> Option<&ProjectRecord> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.records.iter().find(|r| {
            let title = r.title.to_lowercase();
            !title.is_empty() && (title.contains(&needle) || needle.contains(&title))
        })
    }

    /// Status, domain, and year distributions over the whole store.
    pub fn overview(&self) -> StoreOverview {
        let mut overview = StoreOverview {
            total: self.records.len(),
            ..Default::default()
        };
        for r in &self.records {
            let status = if r.status.is_empty() {
                "Unknown".to_string()
            } else {
                r.status.clone()
            };
            *overview.by_status.entry(status).or_default() += 1;
            for d in &r.domains {
                *overview.by_domain.entry(d.clone()).or_default() += 1;
            }
            *overview.by_year.entry(r.year_display()).or_default() += 1;
        }
        overview
    }
}

/// Aggregate counts used when no project matches a query.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreOverview {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_domain: BTreeMap<String, usize>,
    pub by_year: BTreeMap<String, usize>,
}

impl StoreOverview {
    /// Domains sorted by count (desc), then name, truncated to `n`.
    pub fn top_domains(&self, n: usize) -> Vec<(&str, usize)> {
        let mut domains: Vec<(&str, usize)> = self
            .by_domain
            .iter()
            .map(|(d, c)| (d.as_str(), *c))
            .collect();
        domains.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        domains.truncate(n);
        domains
    }
}

/// Parse either normalized records or raw `{basic_info, detailed_info}`
/// pairs as returned by the showcase API.
fn parse_records(content: &str) -> Result<Vec<ProjectRecord>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let raw = value
        .as_array()
        .and_then(|items| items.first())
        .is_some_and(|first| first.get("basic_info").is_some());
    if !raw {
        return serde_json::from_value(value);
    }

    let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
    let records: Vec<ProjectRecord> = items
        .iter()
        .filter_map(|item| {
            let basic = item.get("basic_info")?;
            let detail = item.get("detailed_info").filter(|d| !d.is_null());
            normalize(basic, detail)
        })
        .collect();
    if records.len() < items.len() {
        warn!(
            skipped = items.len() - records.len(),
            "raw entries without basic_info.id skipped"
        );
    }
    Ok(records)
}

/// Newest file matching [`DATA_FILE_GLOB`] in `dir`, by modification time.
/// Returns `Ok(None)` when the directory is missing or holds no match.
pub fn find_latest_data_file(dir: &Path) -> Result<Option<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let matcher = Glob::new(DATA_FILE_GLOB)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?
        .compile_matcher();
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !matcher.is_match(name) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let newer = match &newest {
            Some((ts, p)) => modified > *ts || (modified == *ts && path > *p),
            None => true,
        };
        if newer {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, p)| p))
}

/// Write `records` as a pretty JSON array, creating parent directories.
pub fn save_records(path: &Path, records: &[ProjectRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, title: &str, status: &str, year: Option<i32>) -> ProjectRecord {
        let mut r = ProjectRecord::new(id, title);
        r.status = status.to_string();
        r.year = year;
        r
    }

    #[test]
    fn preserves_order_and_dedups_ids() {
        let store = ProjectStore::new(vec![
            record("b", "Beta", "IDEA", None),
            record("a", "Alpha", "IDEA", None),
            record("b", "Beta again", "IDEA", None),
        ]);
        assert_eq!(store.len(), 2);
        let ids: Vec<&str> = store.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(store.get("b").unwrap().title, "Beta");
        assert!(store.get("zzz").is_none());
    }

    #[test]
    fn find_by_name_is_case_insensitive() {
        let store = ProjectStore::new(vec![record("1", "Campus Food App", "", None)]);
        assert_eq!(store.find_by_name("food app").unwrap().id, "1");
        assert!(store.find_by_name("   ").is_none());
    }

    #[test]
    fn overview_counts() {
        let mut a = record("1", "A", "DEPLOYED", Some(2024));
        a.domains.insert("HealthTech".to_string());
        let mut b = record("2", "B", "DEPLOYED", Some(2023));
        b.domains.insert("HealthTech".to_string());
        b.domains.insert("EdTech".to_string());
        let c = record("3", "C", "", None);
        let overview = ProjectStore::new(vec![a, b, c]).overview();

        assert_eq!(overview.total, 3);
        assert_eq!(overview.by_status["DEPLOYED"], 2);
        assert_eq!(overview.by_status["Unknown"], 1);
        assert_eq!(overview.by_year["Unknown"], 1);
        assert_eq!(overview.top_domains(1), vec![("HealthTech", 2)]);
    }

    #[test]
    fn load_missing_file_is_data_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = ProjectStore::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AppError::DataNotFound { .. }));
    }

    #[test]
    fn open_without_data_is_data_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = ProjectStore::open(None, tmp.path()).unwrap_err();
        assert!(matches!(err, AppError::DataNotFound { .. }));
    }

    #[test]
    fn loads_raw_api_shape() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sdgp_projects_raw.json");
        let raw = serde_json::json!([
            {
                "basic_info": { "id": "p1", "title": "AI Health Monitor", "year": 2024 },
                "detailed_info": {
                    "content": {
                        "associations": [{ "type": "PROJECT_TECH", "techStack": "Python" }]
                    }
                }
            },
            { "basic_info": { "id": "p2", "title": "Campus Food App" }, "detailed_info": null },
            { "basic_info": { "title": "no id" } }
        ]);
        std::fs::write(&path, raw.to_string()).unwrap();

        let store = ProjectStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get("p1").unwrap().tech.contains("Python"));
        assert_eq!(store.get("p2").unwrap().title, "Campus Food App");
    }

    #[test]
    fn save_then_open_latest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sdgp_projects_20240101_000000.json");
        save_records(&path, &[record("p1", "One", "IDEA", Some(2024))]).unwrap();
        std::fs::write(tmp.path().join("notes.json"), "[]").unwrap();

        assert_eq!(find_latest_data_file(tmp.path()).unwrap(), Some(path));
        let store = ProjectStore::open(None, tmp.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("p1").unwrap().year, Some(2024));
    }
}
