//! Result distiller
//!
//! Condenses one query's search documents into a handful of learnings and
//! follow-up questions. Document text is truncated to a fixed character
//! budget before it reaches the extractor, and the extraction call is bounded
//! by a timeout.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::llm::prompts::ResearchPrompts;
use crate::llm::{extract_as, ExtractionBackend, StructuredOutput};
use crate::search::SearchDocument;

/// Default characters kept per document
pub const DEFAULT_CHAR_BUDGET: usize = 25_000;

/// Default extraction timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Learnings and follow-ups for one query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistillationResult {
    #[serde(default)]
    pub learnings: Vec<String>,

    #[serde(default, rename = "followUpQuestions", alias = "follow_up_questions")]
    pub follow_up_questions: Vec<String>,
}

impl StructuredOutput for DistillationResult {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "learnings": {
                    "type": "array",
                    "description": "List of learnings",
                    "items": { "type": "string" }
                },
                "followUpQuestions": {
                    "type": "array",
                    "description": "List of follow-up questions to research the topic further",
                    "items": { "type": "string" }
                }
            },
            "required": ["learnings", "followUpQuestions"]
        })
    }
}

/// Extracts learnings from search documents
#[derive(Clone)]
pub struct ResultDistiller {
    backend: Arc<dyn ExtractionBackend>,
    char_budget: usize,
    timeout: Duration,
}

impl ResultDistiller {
    pub fn new(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self {
            backend,
            char_budget: DEFAULT_CHAR_BUDGET,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Characters kept from each document
    pub fn with_char_budget(mut self, char_budget: usize) -> Self {
        self.char_budget = char_budget.max(1);
        self
    }

    /// Upper bound on one extraction call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Distill `documents` found for `query`.
    ///
    /// Documents without text are skipped. The backend's output is cut down to
    /// `max_learnings` / `max_follow_ups`.
    pub async fn distill(
        &self,
        query: &str,
        documents: &[SearchDocument],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> Result<DistillationResult, ExtractionError> {
        let contents = self.prepare_contents(documents);
        debug!(query = %query, documents = contents.len(), "Distilling search results");

        let prompt = ResearchPrompts::distill(query, &contents, max_learnings, max_follow_ups);

        let mut result: DistillationResult = with_timeout(
            self.timeout,
            extract_as(self.backend.as_ref(), &prompt),
        )
        .await
        .inspect_err(|e| warn!(query = %query, error = %e, "Distillation failed"))?;

        result.learnings.truncate(max_learnings);
        result.follow_up_questions.truncate(max_follow_ups);

        debug!(
            query = %query,
            learnings = result.learnings.len(),
            follow_ups = result.follow_up_questions.len(),
            "Distilled learnings"
        );

        Ok(result)
    }

    /// Text of every document that has some, each cut to the char budget.
    pub fn prepare_contents(&self, documents: &[SearchDocument]) -> Vec<String> {
        documents
            .iter()
            .filter_map(SearchDocument::text)
            .map(|text| truncate_chars(text, self.char_budget))
            .collect()
    }
}

/// Run an extraction future under `limit`, mapping expiry to a timeout error.
pub async fn with_timeout<T, F>(limit: Duration, extraction: F) -> Result<T, ExtractionError>
where
    F: std::future::Future<Output = Result<T, ExtractionError>>,
{
    match tokio::time::timeout(limit, extraction).await {
        Ok(result) => result,
        Err(_) => Err(ExtractionError::Timeout(limit)),
    }
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
