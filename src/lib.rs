//! # SDGP Assistant
//!
//! Scrapes the SDGP project showcase into a local JSON file and answers
//! questions about the projects with a hosted language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Scraper   │──▶│ Project JSON │──▶│ ProjectStore │
//! │ listing+API │   │  (output/)   │   │  (in memory) │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ select(query)
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!               ┌──────────────┐      ┌─────────────┐
//!               │ SummaryCache │◀────▶│ ChatSession │──▶ Gemini
//!               │ (ai_cache/)  │      │  + history  │
//!               └──────────────┘      └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sdgp scrape                        # collect project data
//! sdgp select "AI healthcare"        # offline relevance ranking
//! sdgp chat                          # interactive assistant
//! sdgp ask "Which projects use Flutter?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`analyze`] | Offline data analysis report |
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Typed error taxonomy |
//! | [`models`] | Project record and fingerprint |
//! | [`store`] | In-memory project store and data file discovery |
//! | [`scrape`] | Showcase API scraper |
//! | [`retry`] | Bounded retry with backoff |
//! | [`llm`] | Language-model client |
//! | [`cache`] | Persistent summary cache |
//! | [`summarize`] | Summary prompts and bulk summarization |
//! | [`select`] | Keyword relevance selector |
//! | [`history`] | Bounded conversation history |
//! | [`chat`] | Chat orchestrator |
//! | [`details`] | Single-project view |
//! | [`stats`] | Cache statistics |
//! | [`export`] | Cache export |
//! | [`progress`] | Progress reporting |
//! | [`check`] | Configuration health check |

pub mod analyze;
pub mod cache;
pub mod chat;
pub mod check;
pub mod config;
pub mod details;
pub mod error;
pub mod export;
pub mod history;
pub mod llm;
pub mod models;
pub mod progress;
pub mod retry;
pub mod scrape;
pub mod select;
pub mod stats;
pub mod store;
pub mod summarize;
