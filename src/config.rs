//! Configuration loading.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults.
//! 2. An optional TOML file (`--config`, default `./config/sdgp.toml`).
//! 3. Environment variables (`SCRAPER_DELAY`, `AI_CACHE_EXPIRY`, ...), which
//!    the binary seeds from a `.env` file when one is present.
//!
//! ```toml
//! [ai]
//! credentials_path = "credentials/service-account-key.json"
//! project_id = "my-gcp-project"
//! model = "gemini-2.0-flash-exp"
//!
//! [scraper]
//! delay_secs = 1.0
//! timeout_secs = 30
//! max_retries = 3
//!
//! [cache]
//! enabled = true
//! expiry_secs = 86400
//! dir = "ai_cache"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// JSON file holding an `api_key` or `access_token`.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Cloud project id, required for the Vertex AI endpoint.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            project_id: None,
            location: default_location(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            access_token_env: default_access_token_env(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_ai_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl AiConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials/service-account-key.json")
}
fn default_location() -> String {
    "us-central1".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_access_token_env() -> String {
    "GOOGLE_OAUTH_ACCESS_TOKEN".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_ai_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Pause between consecutive requests, in seconds.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
    #[serde(default = "default_scraper_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_true")]
    pub include_details: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            delay_secs: default_delay_secs(),
            timeout_secs: default_scraper_timeout_secs(),
            max_retries: default_max_retries(),
            page_size: default_page_size(),
            include_details: true,
        }
    }
}

impl ScraperConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: self.delay().max(Duration::from_millis(250)),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_base_url() -> String {
    "https://www.sdgp.lk".to_string()
}
fn default_delay_secs() -> f64 {
    1.0
}
fn default_scraper_timeout_secs() -> u64 {
    30
}
fn default_page_size() -> u32 {
    9
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expiry_secs: default_expiry_secs(),
            dir: default_cache_dir(),
        }
    }
}

impl CacheConfig {
    pub fn file_path(&self) -> PathBuf {
        self.dir.join("project_summaries.json")
    }

    /// Entry lifetime. Values beyond [`MAX_EXPIRY_SECS`] are clamped.
    pub fn expiry(&self) -> chrono::Duration {
        let secs = self.expiry_secs.min(MAX_EXPIRY_SECS) as i64;
        chrono::Duration::try_seconds(secs)
            .unwrap_or_else(|| chrono::Duration::days(MAX_EXPIRY_SECS as i64 / 86_400))
    }
}

/// Upper bound for `cache.expiry_secs`: one hundred years.
pub const MAX_EXPIRY_SECS: u64 = 100 * 365 * 86_400;

fn default_expiry_secs() -> u64 {
    86_400
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("ai_cache")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Conversation turns retained in memory.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Most recent turns quoted back into each prompt.
    #[serde(default = "default_prompt_history_turns")]
    pub prompt_history_turns: usize,
    #[serde(default = "default_max_context_items")]
    pub max_context_items: usize,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            prompt_history_turns: default_prompt_history_turns(),
            max_context_items: default_max_context_items(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_history_size() -> usize {
    10
}
fn default_prompt_history_turns() -> usize {
    3
}
fn default_max_context_items() -> usize {
    10
}
fn default_max_prompt_chars() -> usize {
    24_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from `path` (skipped when absent), apply environment
/// overrides from the process environment, and validate.
pub fn load_config(path: &Path) -> Result<Config, AppError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(
                format!("failed to read config file {}: {}", path.display(), e),
                "check the --config path",
            )
        })?;
        toml::from_str(&content).map_err(|e| {
            AppError::config(
                format!("failed to parse config file {}: {}", path.display(), e),
                "fix the TOML syntax or remove the file to use defaults",
            )
        })?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Apply the environment-style keys on top of `config`.
///
/// `lookup` abstracts the environment so tests never mutate process state.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("GOOGLE_APPLICATION_CREDENTIALS") {
        config.ai.credentials_path = PathBuf::from(v);
    }
    if let Some(v) = get("GOOGLE_CLOUD_PROJECT") {
        config.ai.project_id = Some(v);
    }
    if let Some(v) = get("SCRAPER_DELAY") {
        config.scraper.delay_secs = parse_env("SCRAPER_DELAY", &v)?;
    }
    if let Some(v) = get("SCRAPER_TIMEOUT") {
        config.scraper.timeout_secs = parse_env("SCRAPER_TIMEOUT", &v)?;
    }
    if let Some(v) = get("SCRAPER_MAX_RETRIES") {
        let retries: u32 = parse_env("SCRAPER_MAX_RETRIES", &v)?;
        config.scraper.max_retries = retries;
        config.ai.max_retries = retries;
    }
    if let Some(v) = get("AI_MODEL_NAME") {
        config.ai.model = v;
    }
    if let Some(v) = get("AI_CACHE_ENABLED") {
        config.cache.enabled = parse_bool("AI_CACHE_ENABLED", &v)?;
    }
    if let Some(v) = get("AI_CACHE_EXPIRY") {
        config.cache.expiry_secs = parse_env("AI_CACHE_EXPIRY", &v)?;
    }
    if let Some(v) = get("OUTPUT_DIR") {
        config.output.dir = PathBuf::from(v);
    }
    if let Some(v) = get("LOG_LEVEL") {
        config.logging.level = v.to_lowercase();
    }
    Ok(())
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        AppError::config(
            format!("{} has invalid value '{}': {}", key, raw, e),
            format!("set {} to a number or unset it", key),
        )
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(
            format!("{} has invalid value '{}'", key, raw),
            format!("set {} to true or false", key),
        )),
    }
}

fn validate(config: &Config) -> Result<(), AppError> {
    if !config.scraper.delay_secs.is_finite() || config.scraper.delay_secs < 0.0 {
        return Err(AppError::config(
            "scraper.delay_secs must be >= 0",
            "use SCRAPER_DELAY=1.0",
        ));
    }
    if config.scraper.timeout_secs == 0 {
        return Err(AppError::config(
            "scraper.timeout_secs must be > 0",
            "use SCRAPER_TIMEOUT=30",
        ));
    }
    if config.scraper.page_size == 0 {
        return Err(AppError::config(
            "scraper.page_size must be > 0",
            "remove scraper.page_size to use the default",
        ));
    }
    if config.cache.expiry_secs > MAX_EXPIRY_SECS {
        return Err(AppError::config(
            format!(
                "cache.expiry_secs must be <= {} (got {})",
                MAX_EXPIRY_SECS, config.cache.expiry_secs
            ),
            "use AI_CACHE_EXPIRY=86400",
        ));
    }
    if config.ai.timeout_secs == 0 {
        return Err(AppError::config(
            "ai.timeout_secs must be > 0",
            "remove ai.timeout_secs to use the default",
        ));
    }
    if config.ai.model.trim().is_empty() {
        return Err(AppError::config(
            "ai.model must not be empty",
            "set AI_MODEL_NAME, e.g. gemini-2.0-flash-exp",
        ));
    }
    if config.chat.history_size == 0 {
        return Err(AppError::config(
            "chat.history_size must be >= 1",
            "remove chat.history_size to use the default",
        ));
    }
    if config.chat.max_prompt_chars < 1000 {
        return Err(AppError::config(
            "chat.max_prompt_chars must be >= 1000",
            "remove chat.max_prompt_chars to use the default",
        ));
    }
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => {
            return Err(AppError::config(
                format!("unknown log level '{}'", other),
                "use one of trace, debug, info, warn, error",
            ))
        }
    }
    Ok(())
}
