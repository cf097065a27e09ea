//! # SDGP Assistant CLI (`sdgp`)
//!
//! Collects SDGP showcase projects and answers questions about them.
//!
//! ## Usage
//!
//! ```bash
//! sdgp --config ./config/sdgp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sdgp scrape` | Fetch every project into a timestamped JSON file |
//! | `sdgp chat` | Interactive assistant session |
//! | `sdgp ask "<question>"` | One-shot question |
//! | `sdgp select "<query>"` | Show the projects a query would use as context |
//! | `sdgp summarize` | Pre-generate cached summaries for all projects |
//! | `sdgp details <id>` | Show one project |
//! | `sdgp stats` | Summary cache statistics |
//! | `sdgp export` | Dump the summary cache as JSON |
//! | `sdgp clear-cache` | Delete every cached summary |
//! | `sdgp invalidate <id>` | Delete cached summaries of one project |
//! | `sdgp check` | Verify credentials, data, and directories |
//! | `sdgp analyze` | Offline statistics report over the project data |
//!
//! ## Examples
//!
//! ```bash
//! # Scrape the first 20 projects without detail pages
//! sdgp scrape --limit 20 --no-details
//!
//! # Which projects would answer this question?
//! sdgp select "machine learning healthcare" --limit 5
//!
//! # Newest HealthTech projects, and save the full report
//! sdgp analyze --domain HealthTech --save
//!
//! # Ask against a specific data file
//! sdgp ask "Which deployed projects use Flutter?" --data output/sdgp_projects_20240601_101500.json
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sdgp_assistant::analyze::{self, ReportTarget};
use sdgp_assistant::cache::SummaryCache;
use sdgp_assistant::chat::{ChatSession, Reply};
use sdgp_assistant::config::{self, Config};
use sdgp_assistant::llm::{GeminiGenerator, TextGenerator};
use sdgp_assistant::progress::ProgressMode;
use sdgp_assistant::error::AppError;
use sdgp_assistant::store::{find_latest_data_file, ProjectStore};
use sdgp_assistant::summarize::{summarize_all, LlmSummarizer};
use sdgp_assistant::{check, details, export, scrape, select, stats};

/// SDGP Assistant CLI: scrape SDGP projects, cache AI summaries, and chat
/// about them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Environment variables (and a `.env` file) override it.
#[derive(Parser)]
#[command(
    name = "sdgp",
    about = "SDGP Assistant: scrape SDGP projects and chat about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/sdgp.toml`; skipped when the file is absent.
    #[arg(long, global = true, default_value = "./config/sdgp.toml")]
    config: PathBuf,

    /// Project data file. Defaults to the newest `sdgp_projects_*.json` in
    /// the output directory.
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Scrape the project showcase.
    ///
    /// Walks the paginated listing API, fetches each project's detail page,
    /// and writes `sdgp_projects_<timestamp>.json` to the output directory.
    Scrape {
        /// Maximum number of projects to collect.
        #[arg(long)]
        limit: Option<usize>,

        /// Skip per-project detail requests (listing fields only).
        #[arg(long)]
        no_details: bool,

        /// Progress output: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Start an interactive chat session.
    ///
    /// Besides questions, the session understands `stats`, `clear cache`,
    /// `export`, `details <id>`, and `quit`.
    Chat,

    /// Ask a single question and print the answer.
    Ask {
        /// The question.
        query: String,
    },

    /// Rank projects against a query without calling the model.
    Select {
        /// Free-text query.
        query: String,

        /// Maximum number of projects to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate and cache summaries for every project.
    Summarize {
        /// Maximum number of new summaries to generate.
        #[arg(long)]
        limit: Option<usize>,

        /// Progress output: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Show one project by id or title.
    ///
    /// Uses the cached summary when present; never calls the model.
    Details {
        /// Project id (or part of its title).
        id: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show summary cache statistics.
    Stats,

    /// Export cached summaries as JSON.
    Export {
        /// Output file path. Prints to stdout if omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Delete every cached summary.
    ClearCache {
        /// Only delete summaries past their expiry.
        #[arg(long)]
        expired: bool,
    },

    /// Delete the cached summaries of one project.
    Invalidate {
        /// Project id.
        id: String,
    },

    /// Check credentials, project data, and directories.
    Check,

    /// Analyze the project data offline.
    ///
    /// Prints status, year, type, domain, technology, and team-size
    /// statistics, or with `--domain` that domain's newest projects.
    Analyze {
        /// List projects in this domain instead of the full report.
        #[arg(long)]
        domain: Option<String>,

        /// Maximum number of projects listed for `--domain`.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Write the full report to this file.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Write the full report to `sdgp_analysis_report_<timestamp>.txt`
        /// in the output directory.
        #[arg(long, conflicts_with = "output")]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;
    init_logging(&cfg);

    let data = cli.data.as_deref();

    match cli.command {
        Commands::Scrape {
            limit,
            no_details,
            progress,
        } => {
            if no_details {
                cfg.scraper.include_details = false;
            }
            let reporter = progress_mode(&progress)?.reporter();
            scrape::run_scrape(&cfg, limit, reporter.as_ref()).await?;
        }
        Commands::Chat => {
            let store = ProjectStore::open(data, &cfg.output.dir)?;
            let generator = GeminiGenerator::from_config(&cfg.ai)?;
            let cache = SummaryCache::from_config(&cfg.cache);
            let mut session =
                ChatSession::new(&store, &generator, cache, &cfg.chat, &cfg.output.dir);
            run_repl(&mut session, store.len(), generator.model_name()).await?;
        }
        Commands::Ask { query } => {
            let store = ProjectStore::open(data, &cfg.output.dir)?;
            let generator = GeminiGenerator::from_config(&cfg.ai)?;
            let cache = SummaryCache::from_config(&cfg.cache);
            let mut session =
                ChatSession::new(&store, &generator, cache, &cfg.chat, &cfg.output.dir);
            println!("{}", session.ask(&query).await?);
        }
        Commands::Select { query, limit, json } => {
            let store = ProjectStore::open(data, &cfg.output.dir)?;
            let limit = limit.unwrap_or(cfg.chat.max_context_items);
            select::run_select(&store, &query, limit, json)?;
        }
        Commands::Summarize { limit, progress } => {
            let store = ProjectStore::open(data, &cfg.output.dir)?;
            let generator = GeminiGenerator::from_config(&cfg.ai)?;
            let mut cache = SummaryCache::from_config(&cfg.cache);
            let reporter = progress_mode(&progress)?.reporter();
            let summarizer = LlmSummarizer::new(&generator);
            let report =
                summarize_all(&store, &mut cache, &summarizer, limit, reporter.as_ref()).await;
            println!("summarize {}", generator.model_name());
            println!("  projects: {}", report.total);
            println!("  cached: {}", report.cached);
            println!("  generated: {}", report.generated);
            println!("  failed: {}", report.failed);
            println!("ok");
        }
        Commands::Details { id, json } => {
            let store = ProjectStore::open(data, &cfg.output.dir)?;
            let cache = SummaryCache::from_config(&cfg.cache);
            details::run_details(&store, &cache, &id, json)?;
        }
        Commands::Stats => {
            let cache = SummaryCache::from_config(&cfg.cache);
            let projects = ProjectStore::open(data, &cfg.output.dir)
                .ok()
                .map(|s| s.len());
            stats::run_stats(&cache, projects)?;
        }
        Commands::Export { output } => {
            let cache = SummaryCache::from_config(&cfg.cache);
            export::run_export(&cache, output.as_deref())?;
        }
        Commands::ClearCache { expired } => {
            let mut cache = SummaryCache::from_config(&cfg.cache);
            if expired {
                let removed = cache.purge_expired()?;
                println!("Removed {} expired summaries.", removed);
            } else {
                let removed = cache.clear()?;
                println!("Cleared {} cached summaries.", removed);
            }
        }
        Commands::Invalidate { id } => {
            let mut cache = SummaryCache::from_config(&cfg.cache);
            let removed = cache.invalidate(&id)?;
            println!("Invalidated {} cached summaries for {}.", removed, id);
        }
        Commands::Check => {
            check::run_check(&cfg, data)?;
        }
        Commands::Analyze {
            domain,
            limit,
            output,
            save,
        } => {
            let source = match data {
                Some(path) => path.to_path_buf(),
                None => find_latest_data_file(&cfg.output.dir)?
                    .ok_or_else(|| AppError::data_not_found(&cfg.output.dir))?,
            };
            let store = ProjectStore::load(&source)?;
            let target = match (&output, save) {
                (Some(path), _) => ReportTarget::File(path),
                (None, true) => ReportTarget::Dir(&cfg.output.dir),
                (None, false) => ReportTarget::None,
            };
            analyze::run_analyze(&store, &source, domain.as_deref(), limit, target)?;
        }
    }

    Ok(())
}

/// Logs go to stderr. `LOG_LEVEL` (already folded into the config) wins,
/// then `RUST_LOG`, then the config file's level.
fn init_logging(cfg: &Config) {
    let filter = if std::env::var_os("LOG_LEVEL").is_none() {
        EnvFilter::try_from_default_env().ok()
    } else {
        None
    };
    let filter = filter
        .or_else(|| EnvFilter::try_new(&cfg.logging.level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn progress_mode(flag: &str) -> Result<ProgressMode> {
    match ProgressMode::from_flag(flag) {
        Some(mode) => Ok(mode),
        None => bail!(
            "unknown --progress value '{}': expected auto, human, json, or off",
            flag
        ),
    }
}

/// Read lines until `quit` or end of input. Ctrl-C cancels the current line.
async fn run_repl(session: &mut ChatSession<'_>, projects: usize, model: &str) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("SDGP Assistant ({} projects, model {})", projects, model);
    println!("Ask about SDGP projects, or type 'stats', 'clear cache', 'export', 'details <id>', 'quit'.");
    println!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                match session.handle_input(&line).await {
                    Reply::None => {}
                    Reply::Text(text) => println!("\n{}\n", text.trim_end()),
                    Reply::Error(message) => eprintln!("error: {}", message),
                    Reply::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("(type 'quit' to exit)");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = session.cache().path() {
        eprintln!("{} cached summaries in {}", session.cache().len(), path.display());
    }
    Ok(())
}
