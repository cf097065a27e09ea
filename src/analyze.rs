//! Offline analysis of scraped project data (`sdgp analyze`).
//!
//! Extends the store [`overview`](ProjectStore::overview) with detail
//! coverage, project types, technology usage, team sizes, and a per-domain
//! listing. The full report can be saved as
//! `sdgp_analysis_report_<timestamp>.txt`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{join_or, ProjectRecord};
use crate::store::{ProjectStore, StoreOverview};

/// Technologies listed in the report.
pub const TOP_TECH: usize = 10;

/// Whole-store analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub overview: StoreOverview,
    pub with_details: usize,
    pub without_details: usize,
    pub by_project_type: BTreeMap<String, usize>,
    pub tech: TechUsage,
    /// `None` when no record carries detail data.
    pub teams: Option<TeamSizes>,
}

/// Technology usage counts and the projects using each technology.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TechUsage {
    pub usage: BTreeMap<String, usize>,
    /// Project ids per technology, in store order.
    pub projects: BTreeMap<String, Vec<String>>,
}

impl TechUsage {
    /// Technologies by usage (desc), then name, truncated to `n`.
    pub fn top(&self, n: usize) -> Vec<(&str, usize)> {
        let mut rows = ranked(&self.usage);
        rows.truncate(n);
        rows
    }
}

/// Team-size statistics over projects with detail data.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSizes {
    pub analyzed: usize,
    pub average: f64,
    pub min: usize,
    pub max: usize,
    /// Team size to number of teams.
    pub distribution: BTreeMap<usize, usize>,
}

/// Whether the record was enriched from its detail page. Listing-only
/// records carry none of these fields.
pub fn has_details(record: &ProjectRecord) -> bool {
    !record.problem_statement.is_empty()
        || !record.solution.is_empty()
        || !record.features.is_empty()
        || !record.team.is_empty()
        || !record.tech.is_empty()
}

pub fn analyze(store: &ProjectStore) -> Analysis {
    let with_details = store.iter().filter(|r| has_details(r)).count();
    let mut by_project_type = BTreeMap::new();
    for r in store.iter() {
        for t in &r.project_types {
            *by_project_type.entry(t.clone()).or_default() += 1;
        }
    }
    Analysis {
        overview: store.overview(),
        with_details,
        without_details: store.len() - with_details,
        by_project_type,
        tech: analyze_tech(store),
        teams: analyze_teams(store),
    }
}

pub fn analyze_tech(store: &ProjectStore) -> TechUsage {
    let mut tech = TechUsage::default();
    for r in store.iter() {
        for t in &r.tech {
            *tech.usage.entry(t.clone()).or_default() += 1;
            tech.projects.entry(t.clone()).or_default().push(r.id.clone());
        }
    }
    tech
}

pub fn analyze_teams(store: &ProjectStore) -> Option<TeamSizes> {
    let sizes: Vec<usize> = store
        .iter()
        .filter(|r| has_details(r))
        .map(ProjectRecord::team_size)
        .collect();
    let min = *sizes.iter().min()?;
    let max = *sizes.iter().max()?;
    let mut distribution = BTreeMap::new();
    for &size in &sizes {
        *distribution.entry(size).or_default() += 1;
    }
    Some(TeamSizes {
        analyzed: sizes.len(),
        average: sizes.iter().sum::<usize>() as f64 / sizes.len() as f64,
        min,
        max,
        distribution,
    })
}

/// Projects tagged with `domain` (case-insensitive), newest year first,
/// then status descending, then id. Missing years sort last.
pub fn top_projects_by_domain<'a>(
    store: &'a ProjectStore,
    domain: &str,
    limit: usize,
) -> Vec<&'a ProjectRecord> {
    let needle = domain.trim().to_lowercase();
    let mut matches: Vec<&ProjectRecord> = store
        .iter()
        .filter(|r| r.domains.iter().any(|d| d.to_lowercase() == needle))
        .collect();
    matches.sort_by(|a, b| {
        match (a.year, b.year) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| b.status.cmp(&a.status))
        .then_with(|| a.id.cmp(&b.id))
    });
    matches.truncate(limit);
    matches
}

/// Counts sorted by value (desc), then key.
fn ranked(counts: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut rows: Vec<(&str, usize)> = counts.iter().map(|(k, c)| (k.as_str(), *c)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    rows
}

fn section(out: &mut String, title: &str) {
    out.push_str(&format!("\n{}\n{}\n", title, "=".repeat(title.len())));
}

fn push_counts(out: &mut String, counts: &BTreeMap<String, usize>) {
    for (name, count) in ranked(counts) {
        out.push_str(&format!("{}: {} projects\n", name, count));
    }
}

/// Render the plain-text analysis report.
pub fn format_report(analysis: &Analysis, source: &Path, generated: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("SDGP Projects Analysis Report\n");
    out.push_str(&format!(
        "Generated on: {}\n",
        generated.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Data file: {}\n", source.display()));

    section(&mut out, "BASIC STATISTICS");
    out.push_str(&format!("Total Projects: {}\n", analysis.overview.total));
    out.push_str(&format!("Projects with Details: {}\n", analysis.with_details));
    out.push_str(&format!(
        "Projects without Details: {}\n",
        analysis.without_details
    ));

    section(&mut out, "STATUS DISTRIBUTION");
    push_counts(&mut out, &analysis.overview.by_status);
    section(&mut out, "YEAR DISTRIBUTION");
    push_counts(&mut out, &analysis.overview.by_year);
    section(&mut out, "PROJECT TYPES");
    push_counts(&mut out, &analysis.by_project_type);
    section(&mut out, "DOMAINS");
    push_counts(&mut out, &analysis.overview.by_domain);

    if !analysis.tech.usage.is_empty() {
        section(&mut out, "TOP TECHNOLOGY STACKS");
        for (tech, count) in analysis.tech.top(TOP_TECH) {
            out.push_str(&format!("{}: {} projects\n", tech, count));
        }
    }

    if let Some(teams) = &analysis.teams {
        section(&mut out, "TEAM ANALYSIS");
        out.push_str(&format!("Average Team Size: {:.1} members\n", teams.average));
        out.push_str(&format!("Min Team Size: {} members\n", teams.min));
        out.push_str(&format!("Max Team Size: {} members\n", teams.max));
        out.push_str(&format!("Total Teams Analyzed: {}\n", teams.analyzed));
        out.push_str("\nTeam Size Distribution:\n");
        for (size, count) in &teams.distribution {
            out.push_str(&format!("  {} members: {} teams\n", size, count));
        }
    }
    out
}

/// Render the per-domain listing.
pub fn format_domain(domain: &str, projects: &[&ProjectRecord]) -> String {
    if projects.is_empty() {
        return format!("No projects in domain '{}'.\n", domain);
    }
    let mut out = format!("Top {} projects in {}:\n\n", projects.len(), domain);
    for (i, r) in projects.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{}] {} ({}, {})\n",
            i + 1,
            r.id,
            r.title,
            r.year_display(),
            if r.status.is_empty() { "Unknown" } else { r.status.as_str() }
        ));
        if !r.subtitle.is_empty() {
            out.push_str(&format!("   {}\n", r.subtitle));
        }
        out.push_str(&format!("   domains: {}\n", join_or(&r.domains, "-")));
    }
    out
}

/// Timestamped report file name, e.g. `sdgp_analysis_report_20240601_101500.txt`.
pub fn report_file_name(now: DateTime<Utc>) -> String {
    format!("sdgp_analysis_report_{}.txt", now.format("%Y%m%d_%H%M%S"))
}

/// Where `sdgp analyze` saves its report, if anywhere.
pub enum ReportTarget<'a> {
    None,
    /// Timestamped file in this directory.
    Dir(&'a Path),
    File(&'a Path),
}

/// Write `report` to `target`. Returns the written path.
pub fn save_report(report: &str, target: ReportTarget<'_>, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
    let path = match target {
        ReportTarget::None => return Ok(None),
        ReportTarget::Dir(dir) => dir.join(report_file_name(now)),
        ReportTarget::File(file) => file.to_path_buf(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, report)?;
    info!(file = %path.display(), "analysis report written");
    Ok(Some(path))
}

/// CLI entry point. With `domain`, prints that domain's newest projects;
/// otherwise prints the full report. The saved file always holds the full
/// report.
pub fn run_analyze(
    store: &ProjectStore,
    source: &Path,
    domain: Option<&str>,
    limit: usize,
    target: ReportTarget<'_>,
) -> Result<()> {
    let now = Utc::now();
    let report = format_report(&analyze(store), source, now);

    match domain {
        Some(d) => print!("{}", format_domain(d, &top_projects_by_domain(store, d, limit))),
        None => print!("{}", report),
    }

    if let Some(path) = save_report(&report, target, now)? {
        eprintln!("Analysis report saved to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(id: &str, year: Option<i32>, status: &str, domains: &[&str]) -> ProjectRecord {
        let mut r = ProjectRecord::new(id, format!("Project {}", id));
        r.year = year;
        r.status = status.to_string();
        r.domains = domains.iter().map(|s| s.to_string()).collect();
        r
    }

    fn detailed(mut r: ProjectRecord, tech: &[&str], team: usize) -> ProjectRecord {
        r.tech = tech.iter().map(|s| s.to_string()).collect();
        r.team = (0..team).map(|i| format!("member {}", i)).collect();
        r.solution = "An app".to_string();
        r
    }

    fn sample_store() -> ProjectStore {
        let mut p1 = detailed(record("p1", Some(2024), "DEPLOYED", &["HealthTech"]), &["Python", "React"], 4);
        p1.project_types.insert("WEB".to_string());
        let mut p2 = detailed(record("p2", Some(2023), "IDEA", &["HealthTech", "AI"]), &["Python"], 6);
        p2.project_types.insert("MOBILE".to_string());
        p2.project_types.insert("WEB".to_string());
        let p3 = detailed(record("p3", None, "MVP", &["FoodTech"]), &[], 5);
        let p4 = record("p4", Some(2024), "IDEA", &["healthtech"]);
        ProjectStore::new(vec![p1, p2, p3, p4])
    }

    #[test]
    fn tech_usage_counts_and_lists_projects() {
        let tech = analyze_tech(&sample_store());
        assert_eq!(tech.usage["Python"], 2);
        assert_eq!(tech.usage["React"], 1);
        assert_eq!(tech.projects["Python"], vec!["p1", "p2"]);
        assert_eq!(tech.top(1), vec![("Python", 2)]);
    }

    #[test]
    fn team_sizes_cover_detailed_projects_only() {
        let teams = analyze_teams(&sample_store()).unwrap();
        assert_eq!(teams.analyzed, 3);
        assert_eq!(teams.min, 4);
        assert_eq!(teams.max, 6);
        assert!((teams.average - 5.0).abs() < f64::EPSILON);
        assert_eq!(teams.distribution[&5], 1);
    }

    #[test]
    fn no_detail_data_means_no_team_analysis() {
        let store = ProjectStore::new(vec![record("a", None, "IDEA", &[])]);
        assert!(analyze_teams(&store).is_none());
        let analysis = analyze(&store);
        assert_eq!(analysis.without_details, 1);
        assert!(!format_report(&analysis, Path::new("d.json"), Utc::now()).contains("TEAM ANALYSIS"));
    }

    #[test]
    fn domain_listing_is_newest_first() {
        let store = sample_store();
        let ids: Vec<&str> = top_projects_by_domain(&store, "HEALTHTECH", 10)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        // same year: IDEA before DEPLOYED
        assert_eq!(ids, vec!["p4", "p1", "p2"]);
        assert_eq!(top_projects_by_domain(&store, "healthtech", 1).len(), 1);
        assert!(top_projects_by_domain(&store, "Blockchain", 10).is_empty());
    }

    #[test]
    fn analysis_counts_details_and_types() {
        let analysis = analyze(&sample_store());
        assert_eq!(analysis.with_details, 3);
        assert_eq!(analysis.without_details, 1);
        assert_eq!(analysis.by_project_type["WEB"], 2);
        assert_eq!(analysis.by_project_type["MOBILE"], 1);
    }

    #[test]
    fn report_has_every_section() {
        let generated = Utc.with_ymd_and_hms(2024, 6, 1, 10, 15, 0).unwrap();
        let text = format_report(&analyze(&sample_store()), Path::new("out.json"), generated);
        assert!(text.contains("Generated on: 2024-06-01 10:15:00 UTC"));
        assert!(text.contains("Total Projects: 4"));
        assert!(text.contains("Projects with Details: 3"));
        assert!(text.contains("IDEA: 2 projects"));
        assert!(text.contains("WEB: 2 projects"));
        assert!(text.contains("Python: 2 projects"));
        assert!(text.contains("Average Team Size: 5.0 members"));
        assert!(text.contains("  6 members: 1 teams"));
    }

    #[test]
    fn saved_report_uses_timestamped_name() {
        let tmp = TempDir::new().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 15, 0).unwrap();
        let dir = tmp.path().join("output");
        let path = save_report("report", ReportTarget::Dir(&dir), now)
            .unwrap()
            .unwrap();
        assert_eq!(path, dir.join("sdgp_analysis_report_20240601_101500.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "report");
        assert!(save_report("report", ReportTarget::None, now).unwrap().is_none());
    }
}
