//! Deterministic backends shared by the integration tests.
//!
//! Query names encode their position in the exploration tree: the root plans
//! `root.1`, `root.2`, ...; a branch's research goal is `branch[<query>]`, so
//! the level below `root.2` plans `root.2.1`, `root.2.2`, and so on.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use deep_explorer::llm::ExtractionBackend;
use deep_explorer::progress::ProgressSnapshot;
use deep_explorer::search::{SearchBackend, SearchDocument, SearchOptions};
use deep_explorer::{ExtractionError, ProgressObserver, SearchError};

pub const SHARED_LEARNING: &str = "shared learning";

/// Text between `start` and the next `end` after it.
pub fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(&text[from..from + len])
}

#[derive(Default)]
pub struct StubSearch {
    pub failing: HashSet<String>,
    pub delay: Option<Duration>,
    pub queries: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl StubSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(queries: &[&str]) -> Self {
        Self {
            failing: queries.iter().map(|q| q.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

pub fn url_for(query: &str) -> String {
    format!("https://source.test/{}", query.replace(' ', "-"))
}

#[async_trait]
impl SearchBackend for StubSearch {
    async fn search(
        &self,
        query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<SearchDocument>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(query) {
            return Err(SearchError::Http(500, "stub failure".to_string()));
        }
        Ok(vec![SearchDocument::new(url_for(query), format!("content for {}", query))])
    }
}

/// Routes each prompt to a canned reply by the prompt's opening words.
#[derive(Default)]
pub struct StubExtraction {
    /// Labels whose planning call fails; `root` fails the first call
    pub failing_plans: HashSet<String>,
    /// Entities reported by every discovery document
    pub entities: Vec<String>,
    pub fail_fragments: bool,
    pub fail_merge: bool,
    /// `max` requested by each planning call
    pub planned_maxima: Mutex<Vec<usize>>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubExtraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_plans(labels: &[&str]) -> Self {
        Self {
            failing_plans: labels.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_entities(entities: &[&str]) -> Self {
        Self {
            entities: entities.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn planned_maxima(&self) -> Vec<usize> {
        self.planned_maxima.lock().unwrap().clone()
    }

    pub fn count_prompts(&self, prefix: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }

    fn plan(&self, prompt: &str) -> Result<Value, ExtractionError> {
        let max: usize = between(prompt, "Return a maximum of ", " queries")
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);
        self.planned_maxima.lock().unwrap().push(max);

        let label = between(prompt, "branch[", "]").unwrap_or("root");
        if self.failing_plans.contains(label) {
            return Err(ExtractionError::Backend(format!("planning failed for {}", label)));
        }

        let queries: Vec<Value> = (1..=max)
            .map(|i| {
                let query = format!("{}.{}", label, i);
                json!({ "query": query, "researchGoal": format!("branch[{}]", query) })
            })
            .collect();
        Ok(json!({ "queries": queries }))
    }

    fn distill(&self, prompt: &str) -> Result<Value, ExtractionError> {
        let query = between(prompt, "<query>", "</query>").unwrap_or_default();
        Ok(json!({
            "learnings": [format!("learning from {}", query), SHARED_LEARNING],
            "followUpQuestions": [format!("follow-up on {}", query)]
        }))
    }

    fn discovery_plan(&self, prompt: &str) -> Result<Value, ExtractionError> {
        let max: usize = between(prompt, "Generate up to ", " distinct")
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);
        let queries: Vec<Value> = (1..=max)
            .map(|i| json!({ "query": format!("discover.{}", i), "researchGoal": "find entities" }))
            .collect();
        Ok(json!({ "queries": queries }))
    }

    fn fragment(&self, prompt: &str) -> Result<Value, ExtractionError> {
        if self.fail_fragments {
            return Err(ExtractionError::Malformed("stub fragment failure".to_string()));
        }
        let entity = between(prompt, "<entity>", "</entity>").unwrap_or_default();
        Ok(json!({
            "name": entity,
            "phase": "Phase 2",
            "organization": format!("Org of {}", entity),
            "events": [{ "text": format!("{} trial started", entity), "date": "2024" }]
        }))
    }

    fn merge(&self, prompt: &str) -> Result<Value, ExtractionError> {
        if self.fail_merge {
            return Err(ExtractionError::Timeout(Duration::from_secs(60)));
        }
        let entity = between(prompt, "<entity>", "</entity>").unwrap_or_default();
        Ok(json!({
            "name": entity.to_uppercase(),
            "status": "investigational",
            "phase": "phase_3",
            "organization": format!("Org of {}", entity)
        }))
    }
}

#[async_trait]
impl ExtractionBackend for StubExtraction {
    async fn extract(&self, prompt: &str, _schema: &Value) -> Result<Value, ExtractionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.starts_with("Given the following prompt from the user") {
            self.plan(prompt)
        } else if prompt.starts_with("Given the following contents from a SERP search") {
            self.distill(prompt)
        } else if prompt.starts_with("Generate up to") {
            self.discovery_plan(prompt)
        } else if prompt.starts_with("List every distinct named entity") {
            Ok(json!({ "entities": self.entities }))
        } else if prompt.starts_with("Extract everything") {
            self.fragment(prompt)
        } else if prompt.starts_with("The following partial records") {
            self.merge(prompt)
        } else {
            Err(ExtractionError::Backend("unexpected prompt".to_string()))
        }
    }
}

/// An observer that records every snapshot it sees.
pub fn recording_observer() -> (ProgressObserver, Arc<Mutex<Vec<ProgressSnapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer: ProgressObserver = Arc::new(move |snapshot: &ProgressSnapshot| {
        sink.lock().unwrap().push(snapshot.clone());
    });
    (observer, seen)
}
