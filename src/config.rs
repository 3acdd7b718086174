//! # Configuration Module
//!
//! Loads settings from the environment (and an optional `.env` file) on top of
//! sensible defaults, then validates them before anything talks to a backend.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::limiter::DEFAULT_CONCURRENCY;
use crate::llm::LlmProvider;
use crate::search::tavily::SearchDepth;

/// Main configuration for the explorer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Which rig provider backs structured extraction
    pub llm_provider: LlmProvider,

    /// Model name (e.g., "llama3.2", "gpt-4.1")
    pub model: String,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    /// Temperature for extraction calls
    pub temperature: f32,

    /// OpenAI API key; required when `llm_provider` is OpenAI
    pub openai_api_key: Option<String>,

    /// Tavily API key; required for searching
    pub tavily_api_key: Option<String>,

    /// Tavily API base URL
    pub tavily_base_url: String,

    /// Tavily search depth ("basic" or "advanced")
    pub search_depth: SearchDepth,

    /// Concurrently executing branches per fan-out
    pub concurrency_limit: usize,

    /// Per-call search timeout
    pub search_timeout: Duration,

    /// Documents requested per search
    pub search_result_limit: usize,

    /// Per-call extraction timeout
    pub extraction_timeout: Duration,

    /// Characters kept from each document before distillation
    pub content_char_budget: usize,

    /// Learnings requested per distilled query
    pub max_learnings: usize,

    /// Log level for the application
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: LlmProvider::Ollama,
            model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            temperature: 0.7,
            openai_api_key: None,
            tavily_api_key: None,
            tavily_base_url: "https://api.tavily.com".to_string(),
            search_depth: SearchDepth::Basic,
            concurrency_limit: DEFAULT_CONCURRENCY,
            search_timeout: Duration::from_secs(15),
            search_result_limit: 5,
            extraction_timeout: Duration::from_secs(60),
            content_char_budget: 25_000,
            max_learnings: 3,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("LLM_PROVIDER") {
            config.llm_provider = val
                .parse()
                .context("LLM_PROVIDER must be either 'ollama' or 'openai'")?;
        }

        if let Ok(val) = env::var("LLM_MODEL").or_else(|_| env::var("OLLAMA_MODEL")) {
            config.model = val;
        }

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Ok(val) = env::var("TEMPERATURE") {
            config.temperature = parse_var("TEMPERATURE", &val)?;
        }

        if let Ok(val) = env::var("OPENAI_API_KEY") {
            config.openai_api_key = Some(val);
        }

        if let Ok(val) = env::var("TAVILY_API_KEY") {
            config.tavily_api_key = Some(val);
        }

        if let Ok(val) = env::var("TAVILY_BASE_URL") {
            config.tavily_base_url = val;
        }

        if let Ok(val) = env::var("TAVILY_SEARCH_DEPTH") {
            config.search_depth = parse_var("TAVILY_SEARCH_DEPTH", &val)?;
        }

        if let Ok(val) = env::var("CONCURRENCY_LIMIT") {
            config.concurrency_limit = parse_var("CONCURRENCY_LIMIT", &val)?;
        }

        if let Ok(val) = env::var("SEARCH_TIMEOUT_MS") {
            config.search_timeout = Duration::from_millis(parse_var("SEARCH_TIMEOUT_MS", &val)?);
        }

        if let Ok(val) = env::var("SEARCH_RESULT_LIMIT") {
            config.search_result_limit = parse_var("SEARCH_RESULT_LIMIT", &val)?;
        }

        if let Ok(val) = env::var("EXTRACTION_TIMEOUT_MS") {
            config.extraction_timeout =
                Duration::from_millis(parse_var("EXTRACTION_TIMEOUT_MS", &val)?);
        }

        if let Ok(val) = env::var("CONTENT_CHAR_BUDGET") {
            config.content_char_budget = parse_var("CONTENT_CHAR_BUDGET", &val)?;
        }

        if let Ok(val) = env::var("MAX_LEARNINGS") {
            config.max_learnings = parse_var("MAX_LEARNINGS", &val)?;
        }

        if let Ok(val) = env::var("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.model.is_empty() {
            anyhow::bail!("LLM_MODEL cannot be empty");
        }

        if self.concurrency_limit == 0 {
            anyhow::bail!("CONCURRENCY_LIMIT must be at least 1");
        }

        if self.search_result_limit == 0 {
            anyhow::bail!("SEARCH_RESULT_LIMIT must be at least 1");
        }

        if self.max_learnings == 0 {
            anyhow::bail!("MAX_LEARNINGS must be at least 1");
        }

        if self.content_char_budget == 0 {
            anyhow::bail!("CONTENT_CHAR_BUDGET must be at least 1");
        }

        if self.extraction_timeout.is_zero() || self.search_timeout.is_zero() {
            anyhow::bail!("Timeouts must be greater than zero");
        }

        if self.llm_provider == LlmProvider::OpenAi {
            self.require_openai_key()?;
        }

        Ok(())
    }

    /// The Tavily key, or an error explaining how to set it.
    pub fn require_tavily_key(&self) -> Result<&str> {
        self.tavily_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context("TAVILY_API_KEY must be set to run searches")
    }

    /// The OpenAI key, or an error explaining how to set it.
    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context("OPENAI_API_KEY must be set when LLM_PROVIDER=openai")
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", name, value))
}
