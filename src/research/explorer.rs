//! Recursive explorer
//!
//! Drives the plan → search → distill → recurse cycle:
//!
//! ```text
//!   topic (breadth b, depth d)
//!     │ plan ≤ b queries
//!     ├── branch q1 ─ search ─ distill ─┬─ d-1 == 0 → learnings
//!     ├── branch q2 ─ ...               └─ d-1 > 0  → explore(goal + follow-ups, ceil(b/2), d-1)
//!     └── branch qn   (at most K branches run at once)
//!     │
//!     └── union of every branch's learnings and sources
//! ```
//!
//! A branch that fails at any point contributes nothing and never aborts its
//! siblings. Only planning the very first level can fail an invocation.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::distiller::ResultDistiller;
use super::planner::{QueryPlanner, SubQuery};
use crate::config::Config;
use crate::error::{BranchError, ExploreError};
use crate::limiter::{ConcurrencyLimiter, DEFAULT_CONCURRENCY};
use crate::llm::ExtractionBackend;
use crate::progress::{ProgressObserver, ProgressReporter, ProgressSnapshot};
use crate::search::{document_urls, SearchBackend, SearchOptions};

type SharedProgress = Arc<ProgressReporter<ProgressSnapshot>>;

/// One exploration call. A recursive step builds a fresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationRequest {
    pub topic: String,
    pub breadth: usize,
    pub depth: usize,
    pub accumulated_learnings: Vec<String>,
    pub accumulated_sources: Vec<String>,
}

impl ExplorationRequest {
    /// A top-level request. Breadth is at least 1.
    pub fn new(topic: impl Into<String>, breadth: usize, depth: usize) -> Self {
        Self {
            topic: topic.into(),
            breadth: breadth.max(1),
            depth,
            accumulated_learnings: Vec::new(),
            accumulated_sources: Vec::new(),
        }
    }

    /// Seed the request with earlier findings.
    pub fn with_context(mut self, learnings: Vec<String>, sources: Vec<String>) -> Self {
        self.accumulated_learnings = learnings;
        self.accumulated_sources = sources;
        self
    }
}

/// Deduplicated output of an exploration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationResult {
    pub learnings: IndexSet<String>,
    pub visited_sources: IndexSet<String>,
}

impl ExplorationResult {
    pub fn from_lists(learnings: Vec<String>, visited_sources: Vec<String>) -> Self {
        Self {
            learnings: learnings.into_iter().collect(),
            visited_sources: visited_sources.into_iter().collect(),
        }
    }

    /// Union of `results` in iteration order, deduplicated by exact equality.
    pub fn merge(results: impl IntoIterator<Item = ExplorationResult>) -> Self {
        let mut merged = Self::default();
        for result in results {
            merged.learnings.extend(result.learnings);
            merged.visited_sources.extend(result.visited_sources);
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty() && self.visited_sources.is_empty()
    }
}

/// Knobs of the explorer that are fixed for a whole invocation
#[derive(Debug, Clone)]
pub struct ExplorerSettings {
    /// Branches running at once within one fan-out
    pub concurrency_limit: usize,
    pub search_options: SearchOptions,
    /// Learnings requested from each distillation
    pub max_learnings: usize,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            search_options: SearchOptions::default(),
            max_learnings: 3,
        }
    }
}

impl ExplorerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit,
            search_options: SearchOptions::from_config(config),
            max_learnings: config.max_learnings,
        }
    }
}

/// What a branch learned before deciding whether to recurse
struct BranchFindings {
    learnings: Vec<String>,
    sources: Vec<String>,
    follow_up_questions: Vec<String>,
}

/// The recursive exploration engine
pub struct Explorer {
    search: Arc<dyn SearchBackend>,
    planner: QueryPlanner,
    distiller: ResultDistiller,
    settings: ExplorerSettings,
}

impl Explorer {
    pub fn new(
        search: Arc<dyn SearchBackend>,
        extraction: Arc<dyn ExtractionBackend>,
        settings: ExplorerSettings,
    ) -> Self {
        Self {
            search,
            planner: QueryPlanner::new(extraction.clone()),
            distiller: ResultDistiller::new(extraction),
            settings,
        }
    }

    /// Build an explorer with every limit taken from `config`.
    pub fn from_config(
        search: Arc<dyn SearchBackend>,
        extraction: Arc<dyn ExtractionBackend>,
        config: &Config,
    ) -> Self {
        let distiller = ResultDistiller::new(extraction.clone())
            .with_char_budget(config.content_char_budget)
            .with_timeout(config.extraction_timeout);
        Self::new(search, extraction, ExplorerSettings::from_config(config))
            .with_distiller(distiller)
    }

    /// Replace the distiller (custom budget or timeout).
    pub fn with_distiller(mut self, distiller: ResultDistiller) -> Self {
        self.distiller = distiller;
        self
    }

    /// Explore `request` and return every deduplicated learning and source.
    ///
    /// `observer` sees the shared progress snapshot after each change.
    pub async fn explore(
        &self,
        request: ExplorationRequest,
        observer: Option<ProgressObserver>,
    ) -> Result<ExplorationResult, ExploreError> {
        info!(
            topic = %request.topic,
            breadth = request.breadth,
            depth = request.depth,
            "Starting exploration"
        );

        let progress = Arc::new(ProgressReporter::new(
            ProgressSnapshot::new(request.breadth, request.depth),
            observer,
        ));
        let result = self.explore_level(request, progress.clone()).await?;

        if result.is_empty() {
            warn!("Exploration finished without any learnings or sources");
        }

        info!(
            learnings = result.learnings.len(),
            sources = result.visited_sources.len(),
            completed = progress.snapshot().completed_queries,
            "Exploration finished"
        );

        Ok(result)
    }

    fn explore_level<'a>(
        &'a self,
        request: ExplorationRequest,
        progress: SharedProgress,
    ) -> BoxFuture<'a, Result<ExplorationResult, ExploreError>> {
        async move {
            let sub_queries = self
                .planner
                .plan(&request.topic, request.breadth, &request.accumulated_learnings)
                .await?;

            progress.update(|s| {
                s.plan_queries(
                    sub_queries.len(),
                    sub_queries.first().map(|q| q.query.as_str()),
                )
            });

            // Each level gets its own slots so a parent branch waiting on its
            // children never holds a slot they need.
            let limiter = ConcurrencyLimiter::new(self.settings.concurrency_limit);
            debug!(
                branches = sub_queries.len(),
                slots = limiter.limit(),
                "Fanning out"
            );
            let request = &request;
            let branches = sub_queries.into_iter().map(|sub_query| {
                let progress = progress.clone();
                limiter.submit(move || self.run_branch(request, sub_query, progress))
            });
            let results = join_all(branches).await;

            Ok(ExplorationResult::merge(results))
        }
        .boxed()
    }

    async fn run_branch(
        &self,
        request: &ExplorationRequest,
        sub_query: SubQuery,
        progress: SharedProgress,
    ) -> ExplorationResult {
        let new_breadth = request.breadth.div_ceil(2);
        let new_depth = request.depth.saturating_sub(1);

        let findings = match self.search_and_distill(request, &sub_query, new_breadth).await {
            Ok(findings) => findings,
            Err(e) => {
                warn!(
                    query = %sub_query.query,
                    error = %e,
                    timeout = e.is_timeout(),
                    "Branch failed, contributing nothing"
                );
                progress.update(|s| s.complete_query(&sub_query.query));
                return ExplorationResult::default();
            }
        };

        if new_depth == 0 {
            progress.update(|s| {
                s.current_depth = 0;
                s.complete_query(&sub_query.query);
            });
            return ExplorationResult::from_lists(findings.learnings, findings.sources);
        }

        progress.update(|s| {
            s.current_depth = new_depth;
            s.current_breadth = new_breadth;
            s.complete_query(&sub_query.query);
        });

        info!(
            query = %sub_query.query,
            breadth = new_breadth,
            depth = new_depth,
            "Researching deeper"
        );

        let child = ExplorationRequest {
            topic: next_topic(&sub_query.research_goal, &findings.follow_up_questions),
            breadth: new_breadth,
            depth: new_depth,
            accumulated_learnings: findings.learnings,
            accumulated_sources: findings.sources,
        };

        match self.explore_level(child, progress).await {
            Ok(result) => result,
            Err(e) => {
                let e = BranchError::from(Box::new(e));
                warn!(
                    query = %sub_query.query,
                    error = %e,
                    "Deeper research failed, contributing nothing"
                );
                ExplorationResult::default()
            }
        }
    }

    async fn search_and_distill(
        &self,
        request: &ExplorationRequest,
        sub_query: &SubQuery,
        follow_ups: usize,
    ) -> Result<BranchFindings, BranchError> {
        let documents = self
            .search
            .search(&sub_query.query, &self.settings.search_options)
            .await?;
        let new_sources = document_urls(&documents);
        debug!(query = %sub_query.query, sources = new_sources.len(), "Search returned");

        let distilled = self
            .distiller
            .distill(
                &sub_query.query,
                &documents,
                self.settings.max_learnings,
                follow_ups,
            )
            .await?;

        let mut learnings = request.accumulated_learnings.clone();
        learnings.extend(distilled.learnings);
        let mut sources = request.accumulated_sources.clone();
        sources.extend(new_sources);

        Ok(BranchFindings {
            learnings,
            sources,
            follow_up_questions: distilled.follow_up_questions,
        })
    }
}

/// Topic for the next level: the branch's goal plus its follow-up questions.
pub fn next_topic(research_goal: &str, follow_up_questions: &[String]) -> String {
    let directions: String = follow_up_questions
        .iter()
        .map(|q| format!("\n{}", q))
        .collect();
    format!(
        "Previous research goal: {}\nFollow-up research directions: {}",
        research_goal, directions
    )
    .trim()
    .to_string()
}
