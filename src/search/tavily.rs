//! Tavily Search backend
//!
//! Returns ranked documents with their extracted page text. Raw page content
//! is requested so the distiller sees full documents, falling back to
//! Tavily's snippet when a page could not be fetched.
//!
//! Failures are mapped to typed [`SearchError`]s and never retried; the
//! explorer treats a failed search as an empty branch.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ContentFormat, SearchBackend, SearchDocument, SearchOptions};
use crate::error::SearchError;

/// Default Tavily API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Longest query Tavily accepts
const MAX_QUERY_CHARS: usize = 400;

/// Most results Tavily returns per call
const MAX_RESULTS: usize = 20;

/// Search depth for Tavily API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    /// Fast search with basic results
    #[default]
    Basic,
    /// More thorough search with detailed results
    Advanced,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown search depth: {0}")]
pub struct UnknownDepth(String);

impl FromStr for SearchDepth {
    type Err = UnknownDepth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(SearchDepth::Basic),
            "advanced" => Ok(SearchDepth::Advanced),
            other => Err(UnknownDepth(other.to_string())),
        }
    }
}

/// Tavily Search API client
///
/// # Example
/// ```ignore
/// let search = TavilySearch::new("tvly-...");
/// let docs = search.search("Rust async runtimes", &SearchOptions::default()).await?;
/// ```
pub struct TavilySearch {
    api_key: String,
    base_url: String,
    client: Client,
    depth: SearchDepth,
}

impl TavilySearch {
    /// Create a client for the public Tavily API
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
            depth: SearchDepth::default(),
        }
    }

    /// Point the client at a different endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the search depth
    pub fn with_depth(mut self, depth: SearchDepth) -> Self {
        self.depth = depth;
        self
    }

    fn build_request(&self, query: &str, options: &SearchOptions) -> TavilyRequest {
        TavilyRequest {
            query: query.to_string(),
            max_results: options.result_limit.clamp(1, MAX_RESULTS),
            search_depth: self.depth,
            topic: "general".to_string(),
            include_answer: false,
            include_raw_content: raw_content_format(options.format),
        }
    }

    async fn execute(
        &self,
        request: &TavilyRequest,
        options: &SearchOptions,
    ) -> Result<TavilyResponse, SearchError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(options.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::Parse(e.to_string())
                }
            });
        }

        let error_text = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(SearchError::Unauthorized),
            429 => Err(SearchError::RateLimited),
            400 => Err(SearchError::BadRequest(error_text)),
            code => Err(SearchError::Http(code, error_text)),
        }
    }
}

#[async_trait]
impl SearchBackend for TavilySearch {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchDocument>, SearchError> {
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(SearchError::BadRequest(format!(
                "query longer than {} characters",
                MAX_QUERY_CHARS
            )));
        }

        info!(query = %query, "Performing web search");

        let request = self.build_request(query, options);
        let response = self.execute(&request, options).await?;

        if response.results.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            debug!(query = %query, count = response.results.len(), "Search completed");
        }

        Ok(response
            .results
            .into_iter()
            .take(options.result_limit)
            .map(TavilyResult::into_document)
            .collect())
    }
}

/// Request body for Tavily API
#[derive(Debug, Serialize)]
struct TavilyRequest {
    query: String,
    max_results: usize,
    search_depth: SearchDepth,
    topic: String,
    include_answer: bool,
    include_raw_content: &'static str,
}

/// Tavily's name for each page-content format
fn raw_content_format(format: ContentFormat) -> &'static str {
    match format {
        ContentFormat::Markdown => "markdown",
        ContentFormat::PlainText => "text",
    }
}

/// Response from Tavily API
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// Individual search result
#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    raw_content: Option<String>,
}

impl TavilyResult {
    fn into_document(self) -> SearchDocument {
        let text = self
            .raw_content
            .filter(|raw| !raw.trim().is_empty())
            .or(self.content);
        SearchDocument {
            url: self.url,
            text_content: text,
        }
    }
}
