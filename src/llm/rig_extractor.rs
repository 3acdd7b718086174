//! Rig-backed extraction
//!
//! Wraps rig-core's Ollama and OpenAI clients. The schema is appended to the
//! prompt as an instruction and the reply is parsed as JSON, so any chat model
//! works without native structured-output support.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{ollama, openai};
use serde_json::Value;
use tracing::debug;

use super::prompts::ResearchPrompts;
use super::{parse_json_payload, ExtractionBackend};
use crate::config::Config;
use crate::error::ExtractionError;

/// Supported rig providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LlmProvider {
    #[default]
    Ollama,
    OpenAi,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown LLM provider: {0}")]
pub struct UnknownProvider(String);

impl FromStr for LlmProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Ollama => f.write_str("ollama"),
            LlmProvider::OpenAi => f.write_str("openai"),
        }
    }
}

enum ProviderClientKind {
    Ollama(ollama::Client),
    OpenAi(openai::Client),
}

/// [`ExtractionBackend`] backed by a rig provider client.
pub struct RigExtractor {
    client: ProviderClientKind,
    provider: LlmProvider,
    model: String,
    temperature: f64,
}

impl RigExtractor {
    /// Build the extractor described by `config`.
    ///
    /// Ollama reads `OLLAMA_API_BASE_URL`; OpenAI reads `OPENAI_API_KEY`,
    /// which must be present in `config`.
    pub fn from_config(config: &Config) -> Result<Self, ExtractionError> {
        let client = match config.llm_provider {
            LlmProvider::Ollama => {
                std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
                ProviderClientKind::Ollama(ollama::Client::from_env())
            }
            LlmProvider::OpenAi => {
                let key = config
                    .openai_api_key
                    .as_deref()
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        ExtractionError::Backend(
                            "OPENAI_API_KEY must be set when LLM_PROVIDER=openai".to_string(),
                        )
                    })?;
                std::env::set_var("OPENAI_API_KEY", key);
                ProviderClientKind::OpenAi(openai::Client::from_env())
            }
        };

        debug!(
            provider = %config.llm_provider,
            model = %config.model,
            "Extraction backend configured"
        );

        Ok(Self {
            client,
            provider: config.llm_provider,
            model: config.model.clone(),
            temperature: f64::from(config.temperature),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ExtractionError> {
        let preamble = ResearchPrompts::system();
        let response = match &self.client {
            ProviderClientKind::Ollama(client) => {
                let agent = client
                    .agent(&self.model)
                    .preamble(&preamble)
                    .temperature(self.temperature)
                    .build();
                agent.prompt(prompt).await
            }
            ProviderClientKind::OpenAi(client) => {
                let agent = client
                    .agent(&self.model)
                    .preamble(&preamble)
                    .temperature(self.temperature)
                    .build();
                agent.prompt(prompt).await
            }
        };

        response.map_err(|e| {
            ExtractionError::Backend(format!("{} completion failed: {}", self.provider, e))
        })
    }
}

/// Append the output contract to a task prompt.
pub(crate) fn with_schema_instruction(prompt: &str, schema: &Value) -> String {
    format!(
        "{prompt}\n\nRespond with a single JSON object that conforms to this JSON schema. \
         Do not wrap it in prose.\n<schema>\n{schema}\n</schema>"
    )
}

#[async_trait]
impl ExtractionBackend for RigExtractor {
    async fn extract(&self, prompt: &str, schema: &Value) -> Result<Value, ExtractionError> {
        let full_prompt = with_schema_instruction(prompt, schema);
        debug!(
            backend = self.name(),
            model = %self.model,
            prompt_chars = full_prompt.len(),
            "Requesting structured extraction"
        );

        let raw = self.complete(&full_prompt).await?;
        parse_json_payload(&raw)
    }

    fn name(&self) -> &str {
        match self.provider {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAi => "openai",
        }
    }
}
