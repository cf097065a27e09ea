//! Chat orchestration.
//!
//! A [`ChatSession`] answers one query at a time:
//!
//! ```text
//! query ─▶ select ─▶ summaries (cache, read/write-through) ─┐
//!                                                           ├─▶ prompt ─▶ model ─▶ response
//!          recent history ──────────────────────────────────┘                        │
//!                                                                 history.push ◀─────┘
//! ```
//!
//! When nothing in the store matches, the context is an overview of the
//! whole store instead of per-project summaries. The prompt never exceeds
//! `chat.max_prompt_chars`: context blocks that do not fit are dropped,
//! older history turns go first, and the instructions and question always
//! stay.
//!
//! Control inputs (`stats`, `clear cache`, `export`, `details <id>`,
//! `quit`) are handled locally and never reach the model.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::cache::SummaryCache;
use crate::config::ChatConfig;
use crate::details::{lookup, ProjectDetails};
use crate::error::AppError;
use crate::export::export_to_dir;
use crate::history::{ConversationHistory, ConversationTurn};
use crate::llm::TextGenerator;
use crate::models::{join_or, ProjectRecord};
use crate::select::select;
use crate::stats::format_cache_stats;
use crate::store::ProjectStore;
use crate::summarize::{summary_or_fallback, LlmSummarizer};

/// Characters of each earlier response quoted back into the prompt.
const HISTORY_RESPONSE_CHARS: usize = 100;

/// Sample projects listed in the overview context.
const OVERVIEW_SAMPLES: usize = 5;

const INSTRUCTIONS: &str = "\
You are an assistant that helps people explore SDGP (Software Development Group Project) \
projects from https://www.sdgp.lk. Answer using the context data below. For every project \
you mention, give its title, its id as [PROJECT_ID:<id>], its link \
https://www.sdgp.lk/project/<id>, its main domains and technologies, and a short description. \
Point out trends and notable ideas when relevant. If the context does not answer the \
question, say so. Remind the user they can type \"details <id>\" for the full record.";

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Quit,
    Stats,
    ClearCache,
    Export,
    /// `details <key>` or `project <key>`; the key may be empty.
    Details(String),
    Ask(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "" => return Command::Empty,
            "quit" | "exit" | "bye" => return Command::Quit,
            "stats" => return Command::Stats,
            "clear cache" => return Command::ClearCache,
            "export" => return Command::Export,
            _ => {}
        }
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((h, r)) => (h, r.trim()),
            None => (trimmed, ""),
        };
        if head.eq_ignore_ascii_case("details") || head.eq_ignore_ascii_case("project") {
            return Command::Details(rest.to_string());
        }
        Command::Ask(trimmed.to_string())
    }
}

/// Result of handling one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to print (blank input).
    None,
    Text(String),
    /// A recoverable failure; the session continues.
    Error(String),
    Quit,
}

/// One interactive session over a loaded store.
pub struct ChatSession<'a> {
    store: &'a ProjectStore,
    generator: &'a dyn TextGenerator,
    cache: SummaryCache,
    history: ConversationHistory,
    config: ChatConfig,
    export_dir: PathBuf,
}

impl<'a> ChatSession<'a> {
    pub fn new(
        store: &'a ProjectStore,
        generator: &'a dyn TextGenerator,
        cache: SummaryCache,
        config: &ChatConfig,
        export_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            generator,
            cache,
            history: ConversationHistory::new(config.history_size),
            config: config.clone(),
            export_dir: export_dir.into(),
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn cache(&self) -> &SummaryCache {
        &self.cache
    }

    /// Handle one line of input: a control command or a question.
    pub async fn handle_input(&mut self, line: &str) -> Reply {
        match Command::parse(line) {
            Command::Empty => Reply::None,
            Command::Quit => Reply::Quit,
            Command::Stats => Reply::Text(self.stats_text()),
            Command::ClearCache => match self.cache.clear() {
                Ok(n) => Reply::Text(format!("Cleared {} cached summaries.", n)),
                Err(e) => Reply::Error(format!("failed to clear cache: {}", e)),
            },
            Command::Export => match export_to_dir(&self.cache, &self.export_dir) {
                Ok(path) => Reply::Text(format!(
                    "Exported {} summaries to {}",
                    self.cache.len(),
                    path.display()
                )),
                Err(e) => Reply::Error(format!("export failed: {:#}", e)),
            },
            Command::Details(key) if key.is_empty() => {
                Reply::Error("usage: details <project id or title>".to_string())
            }
            Command::Details(key) => self.details(&key).await,
            Command::Ask(query) => match self.ask(&query).await {
                Ok(response) => Reply::Text(response),
                Err(e) => Reply::Error(e.to_string()),
            },
        }
    }

    fn stats_text(&self) -> String {
        let mut text = format_cache_stats(&self.cache.stats(), Some(self.store.len()));
        text.push_str(&format!(
            "  History:     {} / {} turns\n",
            self.history.len(),
            self.history.capacity()
        ));
        text
    }

    async fn details(&mut self, key: &str) -> Reply {
        let store = self.store;
        let Some(record) = lookup(store, key) else {
            return Reply::Error(format!("Project '{}' not found.", key));
        };
        let summarizer = LlmSummarizer::new(self.generator);
        let summary = summary_or_fallback(&mut self.cache, record, &summarizer).await;
        Reply::Text(ProjectDetails::new(record, summary).render())
    }

    /// Answer `query` with store context and recent history.
    ///
    /// On success the turn is appended to history. On failure history is
    /// left unchanged and [`AppError::ChatUnavailable`] is returned.
    pub async fn ask(&mut self, query: &str) -> Result<String, AppError> {
        let query = query.trim();
        let store = self.store;
        let selected = select(query, store, self.config.max_context_items);
        debug!(query, matches = selected.len(), "selected context");

        let blocks = if selected.is_empty() {
            vec![overview_block(store)]
        } else {
            let summarizer = LlmSummarizer::new(self.generator);
            let mut blocks = Vec::with_capacity(selected.len());
            for record in selected {
                let summary = summary_or_fallback(&mut self.cache, record, &summarizer).await;
                blocks.push(project_block(record, &summary));
            }
            blocks
        };

        let turns: Vec<&ConversationTurn> =
            self.history.recent(self.config.prompt_history_turns).collect();
        let prompt = assemble_prompt(query, &turns, &blocks, self.config.max_prompt_chars);

        match self.generator.generate(&prompt).await {
            Ok(response) => {
                self.history.push(query, response.clone());
                info!(prompt_chars = prompt.len(), "answered query");
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, "chat request failed");
                Err(AppError::ChatUnavailable(format!("{:#}", e)))
            }
        }
    }
}

/// Context block for one selected project.
pub fn project_block(record: &ProjectRecord, summary: &str) -> String {
    format!(
        "[PROJECT_ID:{id}] {title}\nURL: {url}\nStatus: {status} | Year: {year}\n\
         Domains: {domains}\nTechnologies: {tech}\nSummary: {summary}\n",
        id = record.id,
        title = record.title,
        url = record.url(),
        status = if record.status.is_empty() { "Unknown" } else { record.status.as_str() },
        year = record.year_display(),
        domains = join_or(&record.domains, "-"),
        tech = join_or(&record.tech, "-"),
        summary = summary.trim(),
    )
}

/// Whole-store overview used when no project matches the query.
pub fn overview_block(store: &ProjectStore) -> String {
    let overview = store.overview();
    let mut out =
        String::from("SDGP project database overview (no project matched the question directly):\n");
    out.push_str(&format!("- Total projects: {}\n", overview.total));

    out.push_str("Status distribution:\n");
    for (status, count) in &overview.by_status {
        out.push_str(&format!("- {}: {}\n", status, count));
    }
    out.push_str("Top domains:\n");
    for (domain, count) in overview.top_domains(8) {
        out.push_str(&format!("- {}: {} projects\n", domain, count));
    }
    out.push_str("Year distribution:\n");
    for (year, count) in overview.by_year.iter().rev() {
        out.push_str(&format!("- {}: {}\n", year, count));
    }

    if !store.is_empty() {
        out.push_str("Sample projects:\n");
        for (i, r) in store.iter().take(OVERVIEW_SAMPLES).enumerate() {
            out.push_str(&format!(
                "{}. {} ({}) - {}\n",
                i + 1,
                r.title,
                join_or(&r.domains, "-"),
                r.url()
            ));
        }
    }
    out
}

/// Build the prompt within `max_chars`.
///
/// Instructions and the question are always included. History turns are
/// kept newest first while they fit; context blocks are then added in
/// relevance order while they fit.
pub fn assemble_prompt(
    query: &str,
    history: &[&ConversationTurn],
    blocks: &[String],
    max_chars: usize,
) -> String {
    const CONTEXT_HEADER: &str = "CONTEXT DATA:\n";
    const HISTORY_HEADER: &str = "CONVERSATION HISTORY:\n";

    let head = format!("{}\n\n", INSTRUCTIONS);
    let tail = format!("USER QUESTION: {}\n", query);
    let mut budget = max_chars
        .saturating_sub(head.len() + tail.len() + CONTEXT_HEADER.len() + HISTORY_HEADER.len() + 1);

    let mut history_lines: Vec<String> = Vec::new();
    for turn in history.iter().rev() {
        let line = format!(
            "User: {}\nAssistant: {}\n",
            turn.query,
            truncate_chars(&turn.response, HISTORY_RESPONSE_CHARS)
        );
        if line.len() > budget {
            break;
        }
        budget -= line.len();
        history_lines.push(line);
    }
    history_lines.reverse();

    let mut context = String::new();
    let mut dropped = 0;
    for block in blocks {
        let needed = block.len() + 1;
        if needed > budget {
            dropped += 1;
            continue;
        }
        budget -= needed;
        context.push_str(block);
        context.push('\n');
    }
    if dropped > 0 {
        debug!(dropped, "context blocks dropped to fit prompt bound");
    }

    let mut prompt = head;
    if !context.is_empty() {
        prompt.push_str(CONTEXT_HEADER);
        prompt.push_str(&context);
    }
    if !history_lines.is_empty() {
        prompt.push_str(HISTORY_HEADER);
        for line in &history_lines {
            prompt.push_str(line);
        }
        prompt.push('\n');
    }
    prompt.push_str(&tail);
    prompt
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
