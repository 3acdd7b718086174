//! Structured extraction backend
//!
//! The explorer never talks to a model directly. It hands a prompt and a JSON
//! schema to an [`ExtractionBackend`] and expects a JSON value conforming to
//! that schema back. [`StructuredOutput`] ties a Rust type to its schema so
//! callers work with typed values.
//!
//! # Example
//!
//! ```rust,ignore
//! use deep_explorer::llm::{extract_as, RigExtractor};
//!
//! let backend = RigExtractor::from_config(&config)?;
//! let plan: QueryPlan = extract_as(&backend, "Plan queries for ...").await?;
//! ```

pub mod prompts;
pub mod rig_extractor;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ExtractionError;

pub use rig_extractor::{LlmProvider, RigExtractor};

/// Capability: produce a JSON value conforming to `schema` for `prompt`.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    async fn extract(&self, prompt: &str, schema: &Value) -> Result<Value, ExtractionError>;

    /// Backend name for logging
    fn name(&self) -> &str {
        "extraction"
    }
}

/// A typed extraction target with its JSON schema.
pub trait StructuredOutput: DeserializeOwned {
    fn schema() -> Value;
}

/// Extract a `T` and deserialize it.
pub async fn extract_as<T, B>(backend: &B, prompt: &str) -> Result<T, ExtractionError>
where
    T: StructuredOutput,
    B: ExtractionBackend + ?Sized,
{
    let value = backend.extract(prompt, &T::schema()).await?;
    serde_json::from_value(value).map_err(|e| ExtractionError::Malformed(e.to_string()))
}

/// Parse a model response into JSON.
///
/// Accepts bare JSON, JSON wrapped in a markdown code fence, or JSON embedded
/// in surrounding prose (outermost `{...}`).
pub fn parse_json_payload(raw: &str) -> Result<Value, ExtractionError> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_code_fence(trimmed);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str(&unfenced[start..=end])
                .map_err(|e| ExtractionError::Malformed(e.to_string()))
        }
        _ => Err(ExtractionError::Malformed(format!(
            "no JSON object in response ({} chars)",
            raw.len()
        ))),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip an optional language tag such as ```json
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
