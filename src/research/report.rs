//! Final report synthesis
//!
//! Turns the learnings of an exploration into either a long markdown report
//! (with a sources section appended) or a concise answer.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::distiller::{with_timeout, DEFAULT_TIMEOUT};
use super::explorer::ExplorationResult;
use crate::error::ExtractionError;
use crate::llm::prompts::ResearchPrompts;
use crate::llm::{extract_as, ExtractionBackend, StructuredOutput};

#[derive(Debug, Deserialize)]
struct ReportOutput {
    #[serde(rename = "reportMarkdown", alias = "report_markdown")]
    report_markdown: String,
}

impl StructuredOutput for ReportOutput {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reportMarkdown": {
                    "type": "string",
                    "description": "Final report on the topic in Markdown"
                }
            },
            "required": ["reportMarkdown"]
        })
    }
}

#[derive(Debug, Deserialize)]
struct AnswerOutput {
    #[serde(rename = "exactAnswer", alias = "exact_answer")]
    exact_answer: String,
}

impl StructuredOutput for AnswerOutput {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "exactAnswer": {
                    "type": "string",
                    "description": "The final answer, make it short and concise, just the answer, no other text"
                }
            },
            "required": ["exactAnswer"]
        })
    }
}

/// Writes reports from exploration results
#[derive(Clone)]
pub struct ReportSynthesizer {
    backend: Arc<dyn ExtractionBackend>,
    timeout: Duration,
}

impl ReportSynthesizer {
    pub fn new(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Detailed markdown report followed by a `## Sources` list.
    pub async fn write_report(
        &self,
        prompt: &str,
        result: &ExplorationResult,
    ) -> Result<String, ExtractionError> {
        let learnings: Vec<String> = result.learnings.iter().cloned().collect();
        info!(learnings = learnings.len(), "Writing final report");

        let request = ResearchPrompts::final_report(prompt, &learnings);
        let output: ReportOutput =
            with_timeout(self.timeout, extract_as(self.backend.as_ref(), &request)).await?;

        Ok(append_sources(&output.report_markdown, result.visited_sources.iter()))
    }

    /// Short answer in whatever format `prompt` asks for.
    pub async fn write_answer(
        &self,
        prompt: &str,
        result: &ExplorationResult,
    ) -> Result<String, ExtractionError> {
        let learnings: Vec<String> = result.learnings.iter().cloned().collect();
        info!(learnings = learnings.len(), "Writing final answer");

        let request = ResearchPrompts::final_answer(prompt, &learnings);
        let output: AnswerOutput =
            with_timeout(self.timeout, extract_as(self.backend.as_ref(), &request)).await?;

        Ok(output.exact_answer.trim().to_string())
    }
}

fn append_sources<'a>(report: &str, sources: impl Iterator<Item = &'a String>) -> String {
    let list: Vec<String> = sources.map(|url| format!("- {}", url)).collect();
    if list.is_empty() {
        return report.to_string();
    }
    format!("{}\n\n## Sources\n\n{}", report.trim_end(), list.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        reply: Value,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExtractionBackend for Canned {
        async fn extract(&self, prompt: &str, _schema: &Value) -> Result<Value, ExtractionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn result() -> ExplorationResult {
        ExplorationResult::from_lists(
            vec!["Rust 1.0 shipped in 2015".to_string()],
            vec!["https://rust-lang.org".to_string(), "https://blog.rust-lang.org".to_string()],
        )
    }

    #[tokio::test]
    async fn test_report_appends_sources() {
        let backend = Arc::new(Canned {
            reply: json!({"reportMarkdown": "# Rust\n\nBody\n"}),
            prompts: Mutex::new(Vec::new()),
        });
        let synthesizer = ReportSynthesizer::new(backend.clone());

        let report = synthesizer.write_report("History of Rust", &result()).await.unwrap();

        assert_eq!(
            report,
            "# Rust\n\nBody\n\n## Sources\n\n- https://rust-lang.org\n- https://blog.rust-lang.org"
        );
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("<learning>\nRust 1.0 shipped in 2015\n</learning>"));
    }

    #[tokio::test]
    async fn test_answer_is_trimmed() {
        let backend = Arc::new(Canned {
            reply: json!({"exactAnswer": "  2015 \n"}),
            prompts: Mutex::new(Vec::new()),
        });
        let synthesizer = ReportSynthesizer::new(backend);

        let answer = synthesizer.write_answer("When did Rust 1.0 ship?", &result()).await.unwrap();
        assert_eq!(answer, "2015");
    }

    #[test]
    fn test_no_sources_section_when_empty() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(append_sources("Body", empty.iter()), "Body");
    }
}
