//! Error types for the exploration engine
//!
//! Backend failures are typed so the explorer can log them with context and
//! degrade the affected branch. Only planning failures at the top of an
//! invocation ever reach the caller.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`SearchBackend`](crate::search::SearchBackend).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search request timed out")]
    Timeout,

    #[error("Unauthorized - check search API key")]
    Unauthorized,

    #[error("Rate limited by search provider")]
    RateLimited,

    #[error("Bad search request: {0}")]
    BadRequest(String),

    #[error("Search HTTP error ({0}): {1}")]
    Http(u16, String),

    #[error("Search network error: {0}")]
    Network(String),

    #[error("Failed to parse search response: {0}")]
    Parse(String),
}

impl SearchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SearchError::Timeout)
    }
}

/// Failure reported by an [`ExtractionBackend`](crate::llm::ExtractionBackend).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction backend error: {0}")]
    Backend(String),

    #[error("Malformed extraction output: {0}")]
    Malformed(String),
}

impl ExtractionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExtractionError::Timeout(_))
    }
}

/// Extraction failure while generating search queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Query planning failed: {0}")]
pub struct PlanningError(#[from] pub ExtractionError);

/// Why a single branch contributed nothing.
///
/// Never returned to callers; branches log it and yield an empty result.
#[derive(Error, Debug)]
pub enum BranchError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("Nested exploration failed: {0}")]
    Nested(#[from] Box<ExploreError>),
}

impl BranchError {
    /// Whether the branch gave up because a search or extraction timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            BranchError::Search(e) => e.is_timeout(),
            BranchError::Extraction(e) => e.is_timeout(),
            BranchError::Planning(PlanningError(e)) => e.is_timeout(),
            BranchError::Nested(_) => false,
        }
    }
}

/// Top-level failure of an exploration or entity-research invocation.
#[derive(Error, Debug)]
pub enum ExploreError {
    #[error(transparent)]
    Planning(#[from] PlanningError),
}

/// Failure while persisting a report.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
