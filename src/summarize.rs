//! Model-backed project summaries.
//!
//! [`LlmSummarizer`] turns a [`ProjectRecord`] into a summary prompt and asks
//! the [`TextGenerator`] for a few searchable sentences. [`summarize_all`]
//! walks the whole store through the [`SummaryCache`] so later chat sessions
//! start warm (`sdgp summarize`).

use async_trait::async_trait;
use tracing::{info, warn};

use crate::cache::{Summarizer, SummaryCache};
use crate::error::AppError;
use crate::llm::TextGenerator;
use crate::models::{join_or, ProjectRecord};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::ProjectStore;

/// [`Summarizer`] backed by a hosted language model.
pub struct LlmSummarizer<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> LlmSummarizer<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl<'a> Summarizer for LlmSummarizer<'a> {
    async fn summarize(&self, record: &ProjectRecord) -> Result<String, AppError> {
        let prompt = summary_prompt(record);
        self.generator
            .generate(&prompt)
            .await
            .map_err(|e| AppError::SummarizerUnavailable(format!("{:#}", e)))
    }
}

/// First line of every summary prompt.
pub const SUMMARY_PROMPT_HEADER: &str = "Create a detailed summary for this SDGP project.";

/// Prompt asking for a 3-4 sentence, keyword-rich summary of `record`.
pub fn summary_prompt(record: &ProjectRecord) -> String {
    let or_blank = |s: &str| {
        let s = s.trim();
        if s.is_empty() {
            "Not specified".to_string()
        } else {
            s.to_string()
        }
    };
    format!(
        "{header}\n\
         \n\
         PROJECT DETAILS:\n\
         Title: {title}\n\
         Description: {subtitle}\n\
         Status: {status}\n\
         Year: {year}\n\
         Domains: {domains}\n\
         Project Types: {types}\n\
         \n\
         TECHNICAL DETAILS:\n\
         Problem Statement: {problem}\n\
         Solution Approach: {solution}\n\
         Key Features: {features}\n\
         Team Size: {team} members\n\
         Technology Stack: {tech}\n\
         \n\
         INSTRUCTIONS:\n\
         1. Write 3-4 sentences explaining what the project does.\n\
         2. Name the main problem it solves and how.\n\
         3. Mention key technologies and anything novel.\n\
         4. Include searchable keywords (health, education, AI, IoT, ...).\n\
         5. Keep it readable for technical and non-technical readers.\n",
        header = SUMMARY_PROMPT_HEADER,
        title = or_blank(&record.title),
        subtitle = or_blank(&record.subtitle),
        status = or_blank(&record.status),
        year = record.year_display(),
        domains = join_or(&record.domains, "Not specified"),
        types = join_or(&record.project_types, "Not specified"),
        problem = or_blank(&record.problem_statement),
        solution = or_blank(&record.solution),
        features = or_blank(&record.features),
        team = record.team_size(),
        tech = join_or(&record.tech, "Not specified"),
    )
}

/// Summary for `record` through the cache, or the templated fallback when
/// the summarizer is unavailable. Never fails.
pub async fn summary_or_fallback(
    cache: &mut SummaryCache,
    record: &ProjectRecord,
    summarizer: &dyn Summarizer,
) -> String {
    match cache.get_or_create(record, summarizer).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(id = %record.id, error = %e, "using template summary");
            record.template_summary()
        }
    }
}

/// Outcome counts of a bulk summarize run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SummarizeReport {
    pub total: usize,
    pub cached: usize,
    pub generated: usize,
    pub failed: usize,
}

/// Ensure every record in `store` has a live cached summary.
///
/// Records already cached are skipped without a model call. Failures are
/// counted and logged; the run continues. `limit` caps how many new
/// summaries are generated.
pub async fn summarize_all(
    store: &ProjectStore,
    cache: &mut SummaryCache,
    summarizer: &dyn Summarizer,
    limit: Option<usize>,
    progress: &dyn ProgressReporter,
) -> SummarizeReport {
    let mut report = SummarizeReport {
        total: store.len(),
        ..Default::default()
    };

    for (i, record) in store.iter().enumerate() {
        if cache.peek(record).is_some() {
            report.cached += 1;
        } else if limit.is_some_and(|l| report.generated + report.failed >= l) {
            continue;
        } else {
            match cache.get_or_create(record, summarizer).await {
                Ok(_) => report.generated += 1,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "summary generation failed");
                    report.failed += 1;
                }
            }
        }
        progress.report(ProgressEvent::Summarizing {
            n: (i + 1) as u64,
            total: report.total as u64,
        });
    }

    info!(
        total = report.total,
        cached = report.cached,
        generated = report.generated,
        failed = report.failed,
        "summaries ready"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoGenerator {
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.fail_on {
                if prompt.contains(marker.as_str()) {
                    anyhow::bail!("HTTP 503");
                }
            }
            let title = prompt
                .lines()
                .find_map(|l| l.trim().strip_prefix("Title: "))
                .unwrap_or("?");
            Ok(format!("Summary: {}", title))
        }
    }

    fn generator(fail_on: Option<&str>) -> EchoGenerator {
        EchoGenerator {
            calls: AtomicUsize::new(0),
            fail_on: fail_on.map(String::from),
        }
    }

    fn store() -> ProjectStore {
        ProjectStore::new(vec![
            ProjectRecord::new("p1", "AI Health Monitor"),
            ProjectRecord::new("p2", "Campus Food App"),
            ProjectRecord::new("p3", "Smart Parking"),
        ])
    }

    #[test]
    fn prompt_includes_record_fields() {
        let mut r = ProjectRecord::new("p1", "AI Health Monitor");
        r.tech.insert("TensorFlow".to_string());
        r.team = vec!["A".into(), "B".into(), "C".into()];
        let prompt = summary_prompt(&r);
        assert!(prompt.starts_with(SUMMARY_PROMPT_HEADER));
        assert!(prompt.contains("Title: AI Health Monitor"));
        assert!(prompt.contains("Technology Stack: TensorFlow"));
        assert!(prompt.contains("Team Size: 3 members"));
        assert!(prompt.contains("Problem Statement: Not specified"));
    }

    #[tokio::test]
    async fn generator_failure_maps_to_summarizer_unavailable() {
        let g = generator(Some("Health"));
        let s = LlmSummarizer::new(&g);
        let err = s
            .summarize(&ProjectRecord::new("p1", "AI Health Monitor"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SummarizerUnavailable(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn fallback_uses_template_and_caches_nothing() {
        let g = generator(Some("Health"));
        let s = LlmSummarizer::new(&g);
        let mut cache = SummaryCache::in_memory(chrono::Duration::hours(1));
        let mut r = ProjectRecord::new("p1", "AI Health Monitor");
        r.subtitle = "Vitals".into();
        let text = summary_or_fallback(&mut cache, &r, &s).await;
        assert_eq!(text, r.template_summary());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn bulk_run_counts_outcomes_and_skips_cached() {
        let g = generator(Some("Parking"));
        let s = LlmSummarizer::new(&g);
        let store = store();
        let mut cache = SummaryCache::in_memory(chrono::Duration::hours(1));

        let first = summarize_all(&store, &mut cache, &s, None, &NoProgress).await;
        assert_eq!(
            first,
            SummarizeReport {
                total: 3,
                cached: 0,
                generated: 2,
                failed: 1
            }
        );

        let second = summarize_all(&store, &mut cache, &s, None, &NoProgress).await;
        assert_eq!(second.cached, 2);
        assert_eq!(second.generated, 0);
        assert_eq!(second.failed, 1);
        assert_eq!(g.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn limit_caps_new_generations() {
        let g = generator(None);
        let s = LlmSummarizer::new(&g);
        let store = store();
        let mut cache = SummaryCache::in_memory(chrono::Duration::hours(1));
        let report = summarize_all(&store, &mut cache, &s, Some(1), &NoProgress).await;
        assert_eq!(report.generated, 1);
        assert_eq!(cache.len(), 1);
    }
}
