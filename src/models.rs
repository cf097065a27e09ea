//! Core data models.
//!
//! [`ProjectRecord`] is the normalized shape of one scraped project. The
//! scraper writes arrays of it and every other component reads it.

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Public page for a project, suffixed with its id.
pub const PROJECT_URL_BASE: &str = "https://www.sdgp.lk/project/";

/// A project listing. Immutable once loaded into a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_year")]
    pub year: Option<i32>,
    #[serde(default, alias = "domain")]
    pub domains: BTreeSet<String>,
    #[serde(default, alias = "projectTypes")]
    pub project_types: BTreeSet<String>,
    #[serde(default, alias = "tech_stack")]
    pub tech: BTreeSet<String>,
    #[serde(default)]
    pub problem_statement: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub features: String,
    /// Team member names.
    #[serde(default)]
    pub team: Vec<String>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
}

impl ProjectRecord {
    /// Minimal record, mostly useful for tests and fixtures.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: String::new(),
            status: String::new(),
            year: None,
            domains: BTreeSet::new(),
            project_types: BTreeSet::new(),
            tech: BTreeSet::new(),
            problem_statement: String::new(),
            solution: String::new(),
            features: String::new(),
            team: Vec::new(),
            updated_at: None,
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", PROJECT_URL_BASE, self.id)
    }

    pub fn team_size(&self) -> usize {
        self.team.len()
    }

    /// Digest of every field that feeds the summary prompt.
    ///
    /// SHA-256 over the sorted-key JSON of those fields, lowercase hex.
    /// Any change to them makes previously cached summaries stale.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "title": self.title,
            "subtitle": self.subtitle,
            "status": self.status,
            "year": self.year,
            "domains": self.domains,
            "project_types": self.project_types,
            "tech": self.tech,
            "problem_statement": self.problem_statement,
            "solution": self.solution,
            "features": self.features,
            "team_size": self.team.len(),
            "updated_at": self.updated_at,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Non-AI fallback summary used when the summarizer is unavailable.
    pub fn template_summary(&self) -> String {
        let title = if self.title.is_empty() {
            "Untitled project"
        } else {
            self.title.as_str()
        };
        let types = join_or(&self.project_types, "software");
        let domains = join_or(&self.domains, "general");
        if self.subtitle.is_empty() {
            format!("{}: A {} project in {} domains.", title, types, domains)
        } else {
            format!(
                "{}: {} - A {} project in {} domains.",
                title, self.subtitle, types, domains
            )
        }
    }

    pub fn year_display(&self) -> String {
        self.year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Join a tag set with `", "`, or return `fallback` when empty.
pub fn join_or(tags: &BTreeSet<String>, fallback: &str) -> String {
    if tags.is_empty() {
        fallback.to_string()
    } else {
        tags.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Accept `2024`, `"2024"`, `null`, or anything else (treated as absent).
fn deserialize_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_year(&value))
}

/// Year from a JSON number or numeric string.
pub fn parse_year(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProjectRecord {
        let mut r = ProjectRecord::new("p1", "AI Health Monitor");
        r.subtitle = "Wearable vitals tracking".to_string();
        r.status = "DEPLOYED".to_string();
        r.year = Some(2024);
        r.domains.insert("HealthTech".to_string());
        r.tech.insert("Python".to_string());
        r.problem_statement = "Late detection of heart conditions".to_string();
        r.team = vec!["Amal".to_string(), "Nimali".to_string()];
        r
    }

    #[test]
    fn compact_shape_deserializes() {
        let json = r#"{"id":"p1","title":"AI Health Monitor","domain":["HealthTech"],"tech":["Python","TensorFlow"]}"#;
        let r: ProjectRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, "p1");
        assert!(r.domains.contains("HealthTech"));
        assert_eq!(r.tech.len(), 2);
        assert_eq!(r.year, None);
    }

    #[test]
    fn year_accepts_number_or_string() {
        let a: ProjectRecord = serde_json::from_str(r#"{"id":"a","year":2023}"#).unwrap();
        let b: ProjectRecord = serde_json::from_str(r#"{"id":"b","year":"2022"}"#).unwrap();
        let c: ProjectRecord = serde_json::from_str(r#"{"id":"c","year":"n/a"}"#).unwrap();
        assert_eq!(a.year, Some(2023));
        assert_eq!(b.year, Some(2022));
        assert_eq!(c.year, None);
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());
        assert_eq!(sample().fingerprint().len(), 64);
    }

    #[test]
    fn fingerprint_tracks_summary_fields() {
        let base = sample().fingerprint();

        let mut changed = sample();
        changed.solution = "Edge ML on a smartwatch".to_string();
        assert_ne!(changed.fingerprint(), base);

        let mut changed = sample();
        changed.tech.insert("Flutter".to_string());
        assert_ne!(changed.fingerprint(), base);

        let mut changed = sample();
        changed.team.push("Kasun".to_string());
        assert_ne!(changed.fingerprint(), base);
    }

    #[test]
    fn fingerprint_ignores_team_names() {
        let mut renamed = sample();
        renamed.team = vec!["X".to_string(), "Y".to_string()];
        assert_eq!(renamed.fingerprint(), sample().fingerprint());
    }

    #[test]
    fn template_summary_mentions_title_and_domains() {
        let s = sample().template_summary();
        assert!(s.starts_with("AI Health Monitor: Wearable vitals tracking"));
        assert!(s.contains("HealthTech"));
    }
}
