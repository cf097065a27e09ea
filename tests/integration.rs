use chrono::{Duration, Utc};
use sdgp_assistant::models::ProjectRecord;
use sdgp_assistant::store::save_records;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sdgp_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sdgp");
    path
}

fn sample_records() -> Vec<ProjectRecord> {
    let mut p1 = ProjectRecord::new("p1", "AI Health Monitor");
    p1.status = "DEPLOYED".to_string();
    p1.year = Some(2024);
    p1.domains.insert("HealthTech".to_string());
    p1.tech.insert("Python".to_string());
    p1.tech.insert("TensorFlow".to_string());
    p1.problem_statement = "Patients lack continuous vitals tracking".to_string();

    let mut p2 = ProjectRecord::new("p2", "Campus Food App");
    p2.status = "IDEA".to_string();
    p2.year = Some(2023);
    p2.domains.insert("FoodTech".to_string());
    p2.tech.insert("React".to_string());

    vec![p1, p2]
}

/// Workspace with a config, one data file, and a cache holding a summary
/// for `p1`.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let records = sample_records();
    save_records(
        &root.join("output").join("sdgp_projects_20240101_000000.json"),
        &records,
    )
    .unwrap();

    let now = Utc::now();
    let cache = serde_json::json!({
        format!("p1:{}", records[0].fingerprint()): {
            "summary": "Cached summary for the health monitor.",
            "created_at": now.to_rfc3339(),
            "expires_at": (now + Duration::hours(24)).to_rfc3339(),
        }
    });
    fs::create_dir_all(root.join("ai_cache")).unwrap();
    fs::write(
        root.join("ai_cache").join("project_summaries.json"),
        serde_json::to_string_pretty(&cache).unwrap(),
    )
    .unwrap();

    let config_content = format!(
        r#"[ai]
credentials_path = "{root}/credentials/missing.json"

[cache]
enabled = true
expiry_secs = 86400
dir = "{root}/ai_cache"

[output]
dir = "{root}/output"

[logging]
level = "warn"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("sdgp.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sdgp(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sdgp_binary();
    let workdir = config_path.parent().unwrap().parent().unwrap();
    let output = Command::new(&binary)
        .current_dir(workdir)
        .env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_OAUTH_ACCESS_TOKEN")
        .env_remove("GOOGLE_APPLICATION_CREDENTIALS")
        .env_remove("GOOGLE_CLOUD_PROJECT")
        .env_remove("OUTPUT_DIR")
        .env_remove("AI_CACHE_ENABLED")
        .env_remove("AI_CACHE_EXPIRY")
        .env_remove("LOG_LEVEL")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sdgp binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_select_ranks_matching_projects() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sdgp(&config_path, &["select", "AI technologies"]);
    assert!(success, "select failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1. [p1] AI Health Monitor"));
    assert!(!stdout.contains("[p2]"));
}

#[test]
fn test_select_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["select", "food react", "--json"]);
    assert!(success);
    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "p2");
    assert_eq!(rows[0]["url"], "https://www.sdgp.lk/project/p2");
}

#[test]
fn test_select_no_match() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["select", "blockchain"]);
    assert!(success);
    assert!(stdout.contains("No projects match"));
}

#[test]
fn test_select_respects_explicit_data_file() {
    let (tmp, config_path) = setup_test_env();
    let other = tmp.path().join("other.json");
    save_records(&other, &[ProjectRecord::new("x9", "Blockchain Voting")]).unwrap();

    let (stdout, _, success) = run_sdgp(
        &config_path,
        &["select", "blockchain", "--data", other.to_str().unwrap()],
    );
    assert!(success);
    assert!(stdout.contains("[x9] Blockchain Voting"));
}

#[test]
fn test_missing_data_is_fatal_with_hint() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_dir_all(tmp.path().join("output")).unwrap();

    let (_, stderr, success) = run_sdgp(&config_path, &["select", "AI"]);
    assert!(!success);
    assert!(stderr.contains("sdgp scrape"), "stderr={}", stderr);
}

#[test]
fn test_details_uses_cached_summary() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sdgp(&config_path, &["details", "p1"]);
    assert!(success, "details failed: stderr={}", stderr);
    assert!(stdout.contains("--- Project p1 ---"));
    assert!(stdout.contains("https://www.sdgp.lk/project/p1"));
    assert!(stdout.contains("Cached summary for the health monitor."));
}

#[test]
fn test_details_falls_back_to_template_and_title_lookup() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["details", "campus food"]);
    assert!(success);
    assert!(stdout.contains("--- Project p2 ---"));
    assert!(stdout.contains("Campus Food App: A software project in FoodTech domains."));
}

#[test]
fn test_details_json_and_unknown_id() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["details", "p1", "--json"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["id"], "p1");

    let (_, stderr, success) = run_sdgp(&config_path, &["details", "nope"]);
    assert!(!success);
    assert!(stderr.contains("project not found"));
}

#[test]
fn test_stats_reports_cache_and_projects() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Summaries:   1"));
    assert!(stdout.contains("Expired:     0"));
    assert!(stdout.contains("Projects:    2"));
}

#[test]
fn test_export_to_stdout_and_file() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["export"]);
    assert!(success);
    let doc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("p1:"));

    let out = tmp.path().join("export.json");
    let (_, stderr, success) = run_sdgp(&config_path, &["export", "--output", out.to_str().unwrap()]);
    assert!(success);
    assert!(stderr.contains("Exported 1 summaries"));
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, doc);
}

#[test]
fn test_invalidate_then_clear() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["invalidate", "p2"]);
    assert!(success);
    assert!(stdout.contains("Invalidated 0 cached summaries for p2."));

    let (stdout, _, success) = run_sdgp(&config_path, &["invalidate", "p1"]);
    assert!(success);
    assert!(stdout.contains("Invalidated 1 cached summaries for p1."));

    let (stdout, _, _) = run_sdgp(&config_path, &["stats"]);
    assert!(stdout.contains("Summaries:   0"));

    let (stdout, _, success) = run_sdgp(&config_path, &["clear-cache"]);
    assert!(success);
    assert!(stdout.contains("Cleared 0 cached summaries."));
}

#[test]
fn test_clear_cache_removes_entries() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["clear-cache"]);
    assert!(success);
    assert!(stdout.contains("Cleared 1 cached summaries."));

    let (stdout, _, _) = run_sdgp(&config_path, &["export"]);
    assert_eq!(stdout.trim(), "{}");
}

#[test]
fn test_clear_expired_keeps_live_summaries() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sdgp(&config_path, &["clear-cache", "--expired"]);
    assert!(success);
    assert!(stdout.contains("Removed 0 expired summaries."));

    let (stdout, _, _) = run_sdgp(&config_path, &["stats"]);
    assert!(stdout.contains("Summaries:   1"));
}

#[test]
fn test_corrupt_cache_is_treated_as_empty() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        tmp.path().join("ai_cache").join("project_summaries.json"),
        "{ not json",
    )
    .unwrap();

    let (stdout, _, success) = run_sdgp(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Summaries:   0"));
}

#[test]
fn test_check_reports_health() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sdgp(&config_path, &["check"]);
    assert!(success, "check failed: stderr={}", stderr);
    assert!(stdout.contains("CHECK"));
    assert!(stdout.contains("OK (2 projects in"));
    assert!(stdout.contains("OK (1 summaries in"));
    assert!(stdout.contains("1 check(s) need attention"));
}

#[test]
fn test_ask_without_credentials_is_fatal() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_sdgp(&config_path, &["ask", "Which projects use AI?"]);
    assert!(!success);
    assert!(stderr.contains("configuration invalid"), "stderr={}", stderr);
    assert!(stderr.contains("GEMINI_API_KEY"));
}

#[test]
fn test_invalid_env_override_is_fatal() {
    let (_tmp, config_path) = setup_test_env();

    let output = Command::new(sdgp_binary())
        .current_dir(config_path.parent().unwrap())
        .env("SCRAPER_DELAY", "soon")
        .arg("--config")
        .arg(&config_path)
        .arg("stats")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SCRAPER_DELAY"));
}

#[test]
fn test_analyze_prints_report() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sdgp(&config_path, &["analyze"]);
    assert!(success, "analyze failed: stderr={}", stderr);
    assert!(stdout.contains("SDGP Projects Analysis Report"));
    assert!(stdout.contains("Total Projects: 2"));
    assert!(stdout.contains("DEPLOYED: 1 projects"));
    assert!(stdout.contains("TensorFlow: 1 projects"));
    assert!(stdout.contains("sdgp_projects_20240101_000000.json"));
}

#[test]
fn test_analyze_domain_and_save() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_sdgp(&config_path, &["analyze", "--domain", "foodtech", "--save"]);
    assert!(success, "analyze failed: stderr={}", stderr);
    assert!(stdout.contains("1. [p2] Campus Food App (2023, IDEA)"));
    assert!(!stdout.contains("[p1]"));
    assert!(stderr.contains("Analysis report saved to"));

    let saved: Vec<_> = fs::read_dir(tmp.path().join("output"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.starts_with("sdgp_analysis_report_") && n.ends_with(".txt"))
        .collect();
    assert_eq!(saved.len(), 1);
}
