//! Web search backend
//!
//! The explorer only needs ranked documents for a query string: a URL and,
//! when the backend could fetch it, the document text.

pub mod tavily;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::SearchError;

pub use tavily::TavilySearch;

/// Format requested for document text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Markdown,
    PlainText,
}

/// Per-call search options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub timeout: Duration,
    pub result_limit: usize,
    pub format: ContentFormat,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            result_limit: 5,
            format: ContentFormat::Markdown,
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.search_timeout,
            result_limit: config.search_result_limit,
            format: ContentFormat::Markdown,
        }
    }
}

/// One ranked search hit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub url: Option<String>,
    pub text_content: Option<String>,
}

impl SearchDocument {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            text_content: Some(text.into()),
        }
    }

    /// Document text, if any non-whitespace text is present.
    pub fn text(&self) -> Option<&str> {
        self.text_content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Capability: ranked documents for a query string.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchDocument>, SearchError>;
}

/// URLs of `documents`, in rank order, skipping documents without one.
pub fn document_urls(documents: &[SearchDocument]) -> Vec<String> {
    documents.iter().filter_map(|doc| doc.url.clone()).collect()
}
