//! Query planner
//!
//! Turns a topic (and whatever has been learned so far) into a short list of
//! search queries, each with the research goal it serves.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::PlanningError;
use crate::llm::prompts::ResearchPrompts;
use crate::llm::{extract_as, ExtractionBackend, StructuredOutput};

/// A planned search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    /// The search engine query
    pub query: String,

    /// What this query is meant to find out; carried into the next level's topic
    #[serde(default, rename = "researchGoal", alias = "research_goal")]
    pub research_goal: String,
}

impl SubQuery {
    pub fn new(query: impl Into<String>, research_goal: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            research_goal: research_goal.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryPlan {
    queries: Vec<SubQuery>,
}

impl StructuredOutput for QueryPlan {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "description": "List of SERP queries",
                    "items": {
                        "type": "object",
                        "properties": {
                            "query": {
                                "type": "string",
                                "description": "The SERP query"
                            },
                            "researchGoal": {
                                "type": "string",
                                "description": "First talk about the goal of the research that this query is meant to accomplish, then go deeper into how to advance the research once the results are found, mention additional research directions. Be as specific as possible, especially for additional research directions."
                            }
                        },
                        "required": ["query", "researchGoal"]
                    }
                }
            },
            "required": ["queries"]
        })
    }
}

/// Generates search queries through the extraction backend
#[derive(Clone)]
pub struct QueryPlanner {
    backend: Arc<dyn ExtractionBackend>,
}

impl QueryPlanner {
    pub fn new(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self { backend }
    }

    /// Plan up to `max_queries` queries for `topic`.
    ///
    /// Extra queries from the backend are dropped; fewer are returned as is.
    pub async fn plan(
        &self,
        topic: &str,
        max_queries: usize,
        prior_learnings: &[String],
    ) -> Result<Vec<SubQuery>, PlanningError> {
        let prompt = ResearchPrompts::plan_queries(topic, max_queries, prior_learnings);
        self.run(&prompt, max_queries).await
    }

    /// Plan queries aimed at surfacing named entities for `topic`.
    pub async fn plan_discovery(
        &self,
        topic: &str,
        max_queries: usize,
    ) -> Result<Vec<SubQuery>, PlanningError> {
        let prompt = ResearchPrompts::plan_discovery(topic, max_queries);
        self.run(&prompt, max_queries).await
    }

    async fn run(&self, prompt: &str, max_queries: usize) -> Result<Vec<SubQuery>, PlanningError> {
        let plan: QueryPlan = extract_as(self.backend.as_ref(), prompt).await?;
        let mut queries = plan.queries;
        queries.truncate(max_queries);

        debug!(
            count = queries.len(),
            queries = ?queries.iter().map(|q| q.query.as_str()).collect::<Vec<_>>(),
            "Planned search queries"
        );

        Ok(queries)
    }
}
