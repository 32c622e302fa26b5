//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. The result is built once and passed by reference
//! into constructors; nothing reads the environment after startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::openai::redact;
use crate::backend::RetryPolicy;
use crate::cancel::Cancellation;
use crate::client::CompletionClient;
use crate::error::Result;
use crate::events::EventHandler;
use crate::pipeline::OutputBudgets;
use crate::PipelineError;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_CREDENTIALS_PATH: &str = "GOOGLE_CREDENTIALS_PATH";
pub const ENV_TOKEN_LIMIT: &str = "TOKEN_LIMIT";
pub const ENV_COOLDOWN: &str = "RATE_LIMIT_COOLDOWN_SECONDS";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";

/// Everything a run needs to know about its environment.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Completion API key. Required.
    pub completion_api_key: Option<String>,

    /// Path to the Google service-account key file. Required for upload.
    pub doc_store_credentials_path: Option<PathBuf>,

    /// Input ceiling in tokens.
    pub token_limit: usize,

    /// Wait between rate-limited attempts.
    pub rate_limit_cooldown_seconds: u64,

    pub model: String,
    pub base_url: String,

    pub summary_max_tokens: u32,
    pub outline_max_tokens: u32,
    pub article_max_tokens: u32,

    pub request_timeout_seconds: u64,

    /// Characters per document insert request.
    pub docs_batch_size: usize,

    /// Give up after this many rate-limited attempts. Unset retries forever.
    pub max_rate_limit_retries: Option<u32>,

    /// Directory for local artifact files.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            completion_api_key: None,
            doc_store_credentials_path: None,
            token_limit: 2048,
            rate_limit_cooldown_seconds: 60,
            model: "gpt-4".into(),
            base_url: "https://api.openai.com".into(),
            summary_max_tokens: 500,
            outline_max_tokens: 800,
            article_max_tokens: 800,
            request_timeout_seconds: 60,
            docs_batch_size: crate::publish::DEFAULT_BATCH_SIZE,
            max_rate_limit_retries: None,
            output_dir: PathBuf::from("artifacts"),
        }
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field(
                "completion_api_key",
                &self.completion_api_key.as_deref().map(redact),
            )
            .field("doc_store_credentials_path", &self.doc_store_credentials_path)
            .field("token_limit", &self.token_limit)
            .field("rate_limit_cooldown_seconds", &self.rate_limit_cooldown_seconds)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("summary_max_tokens", &self.summary_max_tokens)
            .field("outline_max_tokens", &self.outline_max_tokens)
            .field("article_max_tokens", &self.article_max_tokens)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("docs_batch_size", &self.docs_batch_size)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl PipelineConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a TOML file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            PipelineError::InvalidConfig(msg) => {
                PipelineError::InvalidConfig(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PipelineError::InvalidConfig(e.to_string()))
    }

    /// Override fields from environment variables, looked up through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.completion_api_key = Some(key);
        }
        if let Some(path) = get(ENV_CREDENTIALS_PATH) {
            self.doc_store_credentials_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = get(ENV_TOKEN_LIMIT) {
            self.token_limit = parse_env(ENV_TOKEN_LIMIT, &raw)?;
        }
        if let Some(raw) = get(ENV_COOLDOWN) {
            self.rate_limit_cooldown_seconds = parse_env(ENV_COOLDOWN, &raw)?;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        Ok(())
    }

    /// Check that required values are present and numeric values usable.
    pub fn validate(&self) -> Result<()> {
        match self.completion_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(PipelineError::InvalidConfig(format!(
                    "completion API key not found. Set the {} environment variable",
                    ENV_API_KEY
                )))
            }
        }
        if self.token_limit == 0 {
            return Err(PipelineError::InvalidConfig(
                "token_limit must be greater than zero".into(),
            ));
        }
        if self.summary_max_tokens == 0 || self.outline_max_tokens == 0 || self.article_max_tokens == 0
        {
            return Err(PipelineError::InvalidConfig(
                "output token budgets must be greater than zero".into(),
            ));
        }
        if self.docs_batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "docs_batch_size must be greater than zero".into(),
            ));
        }
        if self.max_rate_limit_retries == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "max_rate_limit_retries must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }

    /// Credentials path, required only when uploading.
    pub fn credentials_path(&self) -> Result<&Path> {
        self.doc_store_credentials_path.as_deref().ok_or_else(|| {
            PipelineError::InvalidConfig(format!(
                "document store credentials not configured. Set the {} environment variable",
                ENV_CREDENTIALS_PATH
            ))
        })
    }

    /// Fixed cooldown; bounded only when `max_rate_limit_retries` is set.
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::fixed(Duration::from_secs(self.rate_limit_cooldown_seconds));
        match self.max_rate_limit_retries {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }

    pub fn output_budgets(&self) -> OutputBudgets {
        OutputBudgets {
            summary: self.summary_max_tokens,
            outline: self.outline_max_tokens,
            article: self.article_max_tokens,
        }
    }

    /// Build the shared completion client.
    pub fn completion_client(
        &self,
        cancellation: Option<Cancellation>,
        event_handler: Option<Arc<dyn EventHandler>>,
    ) -> Result<CompletionClient> {
        let mut builder = CompletionClient::builder(&self.base_url)
            .model(&self.model)
            .retry_policy(self.retry_policy())
            .cancellation(cancellation)
            .timeout(Duration::from_secs(self.request_timeout_seconds));
        if let Some(ref key) = self.completion_api_key {
            builder = builder.api_key(key);
        }
        if let Some(handler) = event_handler {
            builder = builder.event_handler(handler);
        }
        builder.build()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        PipelineError::InvalidConfig(format!("{} must be a non-negative integer, got '{}'", key, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.token_limit, 2048);
        assert_eq!(config.rate_limit_cooldown_seconds, 60);
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.summary_max_tokens, 500);
        assert_eq!(config.outline_max_tokens, 800);
        assert_eq!(config.docs_batch_size, 2000);
        assert!(config.max_rate_limit_retries.is_none());
        assert!(config.retry_policy().max_attempts.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PipelineConfig::default();
        config
            .apply_env_with(env(&[
                (ENV_API_KEY, "sk-env"),
                (ENV_CREDENTIALS_PATH, "/etc/creds.json"),
                (ENV_TOKEN_LIMIT, "4096"),
                (ENV_COOLDOWN, "5"),
                (ENV_MODEL, "gpt-4o"),
            ]))
            .unwrap();

        assert_eq!(config.completion_api_key.as_deref(), Some("sk-env"));
        assert_eq!(
            config.doc_store_credentials_path,
            Some(PathBuf::from("/etc/creds.json"))
        );
        assert_eq!(config.token_limit, 4096);
        assert_eq!(config.retry_policy().cooldown, Duration::from_secs(5));
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn test_env_rejects_garbage_number() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_env_with(env(&[(ENV_TOKEN_LIMIT, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TOKEN_LIMIT));
    }

    #[test]
    fn test_toml_then_env_layering() {
        let mut config = PipelineConfig::from_toml_str(
            r#"
token_limit = 1000
model = "gpt-4-turbo"
max_rate_limit_retries = 5
"#,
        )
        .unwrap();
        assert_eq!(config.token_limit, 1000);
        assert_eq!(config.rate_limit_cooldown_seconds, 60);
        assert_eq!(config.retry_policy().max_attempts, Some(5));

        config
            .apply_env_with(env(&[(ENV_MODEL, "gpt-4o")]))
            .unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.token_limit, 1000);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "summary_max_tokens = 300\n").unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.output_budgets().summary, 300);
        assert!(PipelineConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = PipelineConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        assert!(err.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn test_validate_rejects_zero_token_limit() {
        let config = PipelineConfig {
            completion_api_key: Some("sk-test".into()),
            token_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_path_required_for_upload() {
        let config = PipelineConfig::default();
        assert!(config.credentials_path().is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = PipelineConfig {
            completion_api_key: Some("sk-abcdef123456".into()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("abcdef123456"));
    }

    #[test]
    fn test_completion_client_from_config() {
        let config = PipelineConfig {
            completion_api_key: Some("sk-test".into()),
            base_url: "https://api.openai.com/v1".into(),
            ..Default::default()
        };
        let client = config.completion_client(None, None).unwrap();
        assert_eq!(client.base_url(), "https://api.openai.com");
        assert_eq!(client.model(), "gpt-4");
    }
}
