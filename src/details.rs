//! Project lookup and detail rendering.
//!
//! Used by the `sdgp details <id>` command and the chat session's
//! `details <id>` / `project <id>` control input.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::cache::SummaryCache;
use crate::models::ProjectRecord;
use crate::store::ProjectStore;

/// Everything known about one project, plus its summary.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetails {
    pub id: String,
    pub url: String,
    pub title: String,
    pub subtitle: String,
    pub status: String,
    pub year: Option<i32>,
    pub domains: Vec<String>,
    pub project_types: Vec<String>,
    pub tech: Vec<String>,
    pub team_size: usize,
    pub team: Vec<String>,
    pub problem_statement: String,
    pub solution: String,
    pub features: String,
    pub summary: String,
}

impl ProjectDetails {
    pub fn new(record: &ProjectRecord, summary: impl Into<String>) -> Self {
        Self {
            id: record.id.clone(),
            url: record.url(),
            title: record.title.clone(),
            subtitle: record.subtitle.clone(),
            status: record.status.clone(),
            year: record.year,
            domains: record.domains.iter().cloned().collect(),
            project_types: record.project_types.iter().cloned().collect(),
            tech: record.tech.iter().cloned().collect(),
            team_size: record.team_size(),
            team: record.team.clone(),
            problem_statement: record.problem_statement.clone(),
            solution: record.solution.clone(),
            features: record.features.clone(),
            summary: summary.into(),
        }
    }

    /// Plain-text report.
    pub fn render(&self) -> String {
        let title = if self.title.is_empty() {
            "(untitled)"
        } else {
            self.title.as_str()
        };
        let team = if self.team.is_empty() {
            format!("{} members", self.team_size)
        } else {
            format!("{} members ({})", self.team_size, self.team.join(", "))
        };

        let mut out = String::new();
        out.push_str(&format!("--- Project {} ---\n", self.id));
        out.push_str(&format!("title:     {}\n", title));
        if !self.subtitle.is_empty() {
            out.push_str(&format!("subtitle:  {}\n", self.subtitle));
        }
        out.push_str(&format!("url:       {}\n", self.url));
        out.push_str(&format!("status:    {}\n", or_unknown(&self.status)));
        out.push_str(&format!(
            "year:      {}\n",
            self.year.map_or_else(|| "Unknown".to_string(), |y| y.to_string())
        ));
        out.push_str(&format!("domains:   {}\n", list_or_dash(&self.domains)));
        out.push_str(&format!("types:     {}\n", list_or_dash(&self.project_types)));
        out.push_str(&format!("tech:      {}\n", list_or_dash(&self.tech)));
        out.push_str(&format!("team:      {}\n", team));
        out.push('\n');

        for (heading, text) in [
            ("Problem", &self.problem_statement),
            ("Solution", &self.solution),
            ("Features", &self.features),
        ] {
            out.push_str(&format!("--- {} ---\n", heading));
            out.push_str(if text.trim().is_empty() {
                "Not specified"
            } else {
                text.trim()
            });
            out.push_str("\n\n");
        }

        out.push_str("--- Summary ---\n");
        out.push_str(self.summary.trim());
        out.push('\n');
        out
    }
}

fn list_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() {
        "Unknown"
    } else {
        s
    }
}

/// Resolve `key` as an exact id, falling back to a title match.
pub fn lookup<'a>(store: &'a ProjectStore, key: &str) -> Option<&'a ProjectRecord> {
    let key = key.trim();
    store.get(key).or_else(|| store.find_by_name(key))
}

/// CLI entry point. Uses the cached summary when one is live and the
/// templated summary otherwise; never calls the model.
pub fn run_details(store: &ProjectStore, cache: &SummaryCache, id: &str, json: bool) -> Result<()> {
    let Some(record) = lookup(store, id) else {
        bail!("project not found: {}", id);
    };
    let summary = cache
        .peek(record)
        .map(str::to_string)
        .unwrap_or_else(|| record.template_summary());
    let details = ProjectDetails::new(record, summary);

    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        print!("{}", details.render());
    }
    Ok(())
}
