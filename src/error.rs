//! Error taxonomy for the assistant.
//!
//! Command plumbing propagates [`anyhow::Error`]; the variants here are the
//! failures callers need to match on (fall back, retry, or abort startup).

use std::path::PathBuf;

use thiserror::Error;

/// Typed failures surfaced by the cache, the chat session, and startup.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed credentials, environment, or config file.
    /// Fatal at startup.
    #[error("configuration invalid: {message} (hint: {hint})")]
    ConfigInvalid { message: String, hint: String },

    /// No scraped project data available. Fatal for chat startup.
    #[error("project data not found at {} (hint: {hint})", path.display())]
    DataNotFound { path: PathBuf, hint: String },

    /// The summarizer call failed. Never cached; callers may fall back to
    /// a templated summary.
    #[error("summarizer unavailable: {0}")]
    SummarizerUnavailable(String),

    /// The chat completion call failed. Conversation history is untouched.
    #[error("chat unavailable: {0}")]
    ChatUnavailable(String),

    /// The cache file exists but cannot be parsed.
    #[error("cache file {} is corrupt: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    /// Filesystem failure while persisting cache or export data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn config(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn data_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DataNotFound {
            path: path.into(),
            hint: "run `sdgp scrape` first to collect project data".to_string(),
        }
    }

    /// Whether this error should abort the process rather than be reported
    /// inside an interactive session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigInvalid { .. } | Self::DataNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(AppError::config("no credentials", "set GEMINI_API_KEY").is_fatal());
        assert!(AppError::data_not_found("output").is_fatal());
        assert!(!AppError::SummarizerUnavailable("quota".into()).is_fatal());
        assert!(!AppError::ChatUnavailable("timeout".into()).is_fatal());
    }

    #[test]
    fn messages_carry_hints() {
        let err = AppError::data_not_found("output/projects.json");
        let msg = err.to_string();
        assert!(msg.contains("output/projects.json"));
        assert!(msg.contains("sdgp scrape"));
    }
}
