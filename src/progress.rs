//! Scrape and bulk-summarize progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Listing page `page` of `total_pages` fetched (`total_pages` is 0 until
    /// the first response reports it).
    Listing { page: u64, total_pages: u64 },
    /// Detail record `n` of `total` fetched.
    Details { n: u64, total: u64 },
    /// Summary `n` of `total` produced (cached or generated).
    Summarizing { n: u64, total: u64 },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "scrape  details  12 / 209 projects".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Listing { page, total_pages } if *total_pages == 0 => {
                format!("scrape  listing  page {}\n", format_number(*page))
            }
            ProgressEvent::Listing { page, total_pages } => format!(
                "scrape  listing  page {} / {}\n",
                format_number(*page),
                format_number(*total_pages)
            ),
            ProgressEvent::Details { n, total } => format!(
                "scrape  details  {} / {} projects\n",
                format_number(*n),
                format_number(*total)
            ),
            ProgressEvent::Summarizing { n, total } => format!(
                "summarize  {} / {} projects\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Listing { page, total_pages } => serde_json::json!({
                "event": "progress",
                "phase": "listing",
                "n": page,
                "total": total_pages
            }),
            ProgressEvent::Details { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "details",
                "n": n,
                "total": total
            }),
            ProgressEvent::Summarizing { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "summarizing",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Resolve the `--progress` flag (`auto`, `human`, `json`, `off`).
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "auto" => Some(Self::default_for_tty()),
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
