//! Hosted language-model client.
//!
//! Defines the [`TextGenerator`] trait and [`GeminiGenerator`], which calls
//! Gemini `generateContent` through either the Generative Language API (API
//! key) or Vertex AI (OAuth access token).
//!
//! # Credential Resolution
//!
//! First match wins:
//!
//! 1. `$GEMINI_API_KEY` (name configurable via `ai.api_key_env`)
//! 2. `$GOOGLE_OAUTH_ACCESS_TOKEN` (name configurable via `ai.access_token_env`)
//! 3. `api_key` field of the credentials JSON file
//! 4. `access_token` field of the credentials JSON file
//!
//! A service-account file that only carries a private key is rejected with a
//! hint to mint a token (`gcloud auth print-access-token`). Vertex AI also
//! needs a project id, taken from `ai.project_id` / `GOOGLE_CLOUD_PROJECT` or
//! the credentials file's `project_id`.
//!
//! # Retry Strategy
//!
//! Calls go through [`with_retry`]: HTTP 429 and 5xx retry with exponential
//! backoff, other 4xx fail immediately, network errors retry.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::config::AiConfig;
use crate::error::AppError;
use crate::retry::{http_failure, with_retry, Attempt, RetryPolicy};

/// A black-box text generation endpoint.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier, for logs and `check` output.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ============ Credentials ============

/// How requests authenticate, which also decides the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Generative Language API key, sent as `x-goog-api-key`.
    ApiKey(String),
    /// OAuth bearer token for Vertex AI.
    AccessToken(String),
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
}

/// Resolved credentials plus the project id discovered alongside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub credentials: Credentials,
    pub project_id: Option<String>,
}

/// Resolve credentials from the environment (via `lookup`) and the
/// credentials file.
pub fn resolve_credentials<F>(config: &AiConfig, lookup: F) -> Result<ResolvedCredentials, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let file = read_credentials_file(&config.credentials_path)?;
    let project_id = config
        .project_id
        .clone()
        .or_else(|| file.as_ref().and_then(|f| f.project_id.clone()));

    let credentials = if let Some(key) = env(&config.api_key_env) {
        Credentials::ApiKey(key)
    } else if let Some(token) = env(&config.access_token_env) {
        Credentials::AccessToken(token)
    } else {
        match &file {
            Some(CredentialsFile {
                api_key: Some(key), ..
            }) if !key.trim().is_empty() => Credentials::ApiKey(key.trim().to_string()),
            Some(CredentialsFile {
                access_token: Some(token),
                ..
            }) if !token.trim().is_empty() => Credentials::AccessToken(token.trim().to_string()),
            Some(CredentialsFile {
                private_key: Some(_),
                ..
            }) => {
                return Err(AppError::config(
                    format!(
                        "{} is a service-account key without an access token",
                        config.credentials_path.display()
                    ),
                    format!(
                        "export {}=$(gcloud auth print-access-token) or set {}",
                        config.access_token_env, config.api_key_env
                    ),
                ))
            }
            _ => {
                return Err(AppError::config(
                    "no language-model credentials found",
                    format!(
                        "set {} or {}, or point GOOGLE_APPLICATION_CREDENTIALS at a JSON file with api_key/access_token",
                        config.api_key_env, config.access_token_env
                    ),
                ))
            }
        }
    };

    if matches!(credentials, Credentials::AccessToken(_)) && project_id.is_none() {
        return Err(AppError::config(
            "Vertex AI access token configured without a project id",
            "set GOOGLE_CLOUD_PROJECT or ai.project_id",
        ));
    }

    Ok(ResolvedCredentials {
        credentials,
        project_id,
    })
}

fn read_credentials_file(path: &Path) -> Result<Option<CredentialsFile>, AppError> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map(Some).map_err(|e| {
        AppError::config(
            format!("credentials file {} is not valid JSON: {}", path.display(), e),
            "fix the file or unset GOOGLE_APPLICATION_CREDENTIALS",
        )
    })
}

// ============ Gemini Generator ============

/// Gemini `generateContent` client.
pub struct GeminiGenerator {
    client: reqwest::Client,
    credentials: Credentials,
    endpoint: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    retry: RetryPolicy,
}

impl GeminiGenerator {
    pub fn from_config(config: &AiConfig) -> Result<Self, AppError> {
        let resolved = resolve_credentials(config, |k| std::env::var(k).ok())?;
        let endpoint = endpoint_url(config, &resolved);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::config(format!("failed to build HTTP client: {}", e), "check TLS setup"))?;

        debug!(model = %config.model, endpoint = %endpoint, "language model client ready");
        Ok(Self {
            client,
            credentials: resolved.credentials,
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            retry: config.retry_policy(),
        })
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<String, Attempt> {
        let request = self.client.post(&self.endpoint).json(body);
        let request = match &self.credentials {
            Credentials::ApiKey(key) => request.header("x-goog-api-key", key),
            Credentials::AccessToken(token) => request.bearer_auth(token),
        };

        let response = request.send().await.map_err(Attempt::transient)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(http_failure("Gemini API", status, &text));
        }
        let json: serde_json::Value = response.json().await.map_err(Attempt::transient)?;
        parse_generate_response(&json).map_err(Attempt::Permanent)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = request_body(prompt, self.temperature, self.max_output_tokens);
        let text = with_retry(&self.retry, "generateContent", |_| self.send_once(&body)).await?;
        Ok(text)
    }
}

/// Endpoint for the resolved credential kind.
pub fn endpoint_url(config: &AiConfig, resolved: &ResolvedCredentials) -> String {
    match (&resolved.credentials, &resolved.project_id) {
        (Credentials::AccessToken(_), Some(project)) => format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
            loc = config.location,
            project = project,
            model = config.model,
        ),
        _ => format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            config.model
        ),
    }
}

/// `generateContent` request body for a single user turn.
pub fn request_body(prompt: &str, temperature: f32, max_output_tokens: u32) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }],
        }],
        "generationConfig": {
            "temperature": temperature,
            "maxOutputTokens": max_output_tokens,
        },
    })
}

/// Concatenate `candidates[0].content.parts[].text`.
pub fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    if let Some(reason) = json
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
    {
        bail!("prompt blocked by the model: {}", reason);
    }

    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidates"))?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .unwrap_or("unknown");
        bail!("Gemini returned no text (finish reason: {})", reason);
    }
    Ok(text.trim().to_string())
}
