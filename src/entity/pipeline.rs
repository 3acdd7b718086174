//! Entity discovery and per-entity research

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::record::{EntityList, Record};
use crate::config::Config;
use crate::error::{BranchError, ExploreError};
use crate::limiter::{ConcurrencyLimiter, DEFAULT_CONCURRENCY};
use crate::llm::prompts::ResearchPrompts;
use crate::llm::{extract_as, ExtractionBackend};
use crate::progress::{Observer, ProgressReporter};
use crate::research::distiller::{
    truncate_chars, with_timeout, DEFAULT_CHAR_BUDGET, DEFAULT_TIMEOUT,
};
use crate::research::QueryPlanner;
use crate::search::{SearchBackend, SearchDocument, SearchOptions};

/// Targeted queries issued for every discovered entity.
const TARGETED_QUERIES: [&str; 3] = [
    "{} overview mechanism of action",
    "{} development status clinical trial phase",
    "{} developer organization latest news",
];

/// Where an entity-research run currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum EntityStage {
    #[default]
    DiscoveringEntities,
    ResearchingEntities,
    Done,
}

impl fmt::Display for EntityStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityStage::DiscoveringEntities => write!(f, "discovering entities"),
            EntityStage::ResearchingEntities => write!(f, "researching entities"),
            EntityStage::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityProgress {
    pub stage: EntityStage,
    pub total_entities: usize,
    pub completed_entities: usize,
    pub current_entity: Option<String>,
}

impl fmt::Display for EntityProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.stage, self.completed_entities, self.total_entities
        )?;
        if let Some(entity) = &self.current_entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

pub type EntityObserver = Observer<EntityProgress>;

#[derive(Debug, Clone)]
pub struct EntitySettings {
    /// Searches running at once
    pub concurrency_limit: usize,
    pub search_options: SearchOptions,
    /// Discovery queries planned for the topic
    pub discovery_queries: usize,
    pub char_budget: usize,
    pub extraction_timeout: Duration,
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            search_options: SearchOptions::default(),
            discovery_queries: 3,
            char_budget: DEFAULT_CHAR_BUDGET,
            extraction_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl EntitySettings {
    pub fn from_config(config: &Config, discovery_queries: usize) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit,
            search_options: SearchOptions::from_config(config),
            discovery_queries: discovery_queries.max(1),
            char_budget: config.content_char_budget,
            extraction_timeout: config.extraction_timeout,
        }
    }
}

/// Discovers entities for a topic and builds one record per entity.
///
/// Unlike the recursive explorer there is no nesting here, so a single
/// limiter bounds every search of the run.
pub struct EntityResearcher {
    search: Arc<dyn SearchBackend>,
    extraction: Arc<dyn ExtractionBackend>,
    planner: QueryPlanner,
    limiter: ConcurrencyLimiter,
    settings: EntitySettings,
}

impl EntityResearcher {
    pub fn new(
        search: Arc<dyn SearchBackend>,
        extraction: Arc<dyn ExtractionBackend>,
        settings: EntitySettings,
    ) -> Self {
        Self {
            search,
            planner: QueryPlanner::new(extraction.clone()),
            extraction,
            limiter: ConcurrencyLimiter::new(settings.concurrency_limit),
            settings,
        }
    }

    /// Discover entities for `topic`, then research each in turn.
    ///
    /// Every discovered entity yields exactly one record, in discovery order.
    pub async fn run(
        &self,
        topic: &str,
        observer: Option<EntityObserver>,
    ) -> Result<Vec<Record>, ExploreError> {
        let progress = ProgressReporter::new(EntityProgress::default(), observer);
        progress.update(|p| p.stage = EntityStage::DiscoveringEntities);

        let entities = self.discover(topic).await?;
        info!(topic = %topic, entities = entities.len(), "Discovered entities");

        progress.update(|p| {
            p.stage = EntityStage::ResearchingEntities;
            p.total_entities = entities.len();
        });

        let mut records = Vec::with_capacity(entities.len());
        for entity in &entities {
            progress.update(|p| p.current_entity = Some(entity.clone()));
            records.push(self.research_entity(entity).await);
            progress.update(|p| p.completed_entities += 1);
        }

        progress.update(|p| {
            p.stage = EntityStage::Done;
            p.current_entity = None;
        });

        Ok(records)
    }

    /// Entity names mentioned in search results for `topic`.
    ///
    /// Names are kept exactly as extracted; only identical strings collapse.
    pub async fn discover(&self, topic: &str) -> Result<IndexSet<String>, ExploreError> {
        let queries = self
            .planner
            .plan_discovery(topic, self.settings.discovery_queries)
            .await?;

        let lookups = queries.iter().map(|sub_query| async move {
            match self.entities_for_query(topic, &sub_query.query).await {
                Ok(names) => names,
                Err(e) => {
                    warn!(query = %sub_query.query, error = %e, "Discovery query failed, skipping");
                    Vec::new()
                }
            }
        });

        let entities: IndexSet<String> = join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .filter(|name| !name.is_empty())
            .collect();

        Ok(entities)
    }

    /// Entities named in the results of one discovery query.
    ///
    /// Each document is extracted on its own; a failed extraction drops only
    /// that document's names.
    async fn entities_for_query(
        &self,
        topic: &str,
        query: &str,
    ) -> Result<Vec<String>, BranchError> {
        let documents = self
            .limiter
            .submit(|| self.search.search(query, &self.settings.search_options))
            .await?;

        let extractions = documents
            .iter()
            .filter(|doc| doc.text().is_some())
            .map(|doc| self.entities_in_document(topic, doc));
        let names: Vec<String> = join_all(extractions)
            .await
            .into_iter()
            .flatten()
            .collect();

        debug!(
            query = %query,
            documents = documents.len(),
            names = names.len(),
            "Discovery query done"
        );
        Ok(names)
    }

    async fn entities_in_document(&self, topic: &str, document: &SearchDocument) -> Vec<String> {
        let Some(text) = document.text() else {
            return Vec::new();
        };
        let content = truncate_chars(text, self.settings.char_budget);
        let prompt = ResearchPrompts::extract_entities(topic, &content);

        let result = with_timeout(
            self.settings.extraction_timeout,
            extract_as::<EntityList, _>(self.extraction.as_ref(), &prompt),
        )
        .await;

        match result {
            Ok(list) => list.entities,
            Err(e) => {
                warn!(
                    url = ?document.url,
                    error = %e,
                    timeout = e.is_timeout(),
                    "Entity extraction failed, skipping document"
                );
                Vec::new()
            }
        }
    }

    /// Build the canonical record for `name`. Never fails.
    pub async fn research_entity(&self, name: &str) -> Record {
        let searches = targeted_queries(name).into_iter().map(|query| async move {
            let result = self
                .limiter
                .submit(|| self.search.search(&query, &self.settings.search_options))
                .await;
            match result {
                Ok(documents) => documents,
                Err(e) => {
                    warn!(entity = %name, query = %query, error = %e, "Entity search failed");
                    Vec::new()
                }
            }
        });
        let documents: Vec<SearchDocument> =
            join_all(searches).await.into_iter().flatten().collect();

        let extractions = documents
            .iter()
            .filter(|doc| doc.text().is_some())
            .map(|doc| self.extract_fragment(name, doc));
        let fragments: Vec<Record> = join_all(extractions).await.into_iter().flatten().collect();

        debug!(
            entity = %name,
            documents = documents.len(),
            fragments = fragments.len(),
            "Extracted record fragments"
        );

        if fragments.is_empty() {
            warn!(entity = %name, "No record fragments, keeping name only");
            return Record::unknown(name);
        }

        self.merge(name, &fragments).await
    }

    async fn extract_fragment(&self, name: &str, document: &SearchDocument) -> Option<Record> {
        let text = truncate_chars(document.text()?, self.settings.char_budget);
        let prompt = ResearchPrompts::extract_record(name, document.url.as_deref(), &text);

        let result = with_timeout(
            self.settings.extraction_timeout,
            extract_as::<Record, _>(self.extraction.as_ref(), &prompt),
        )
        .await;

        match result {
            Ok(mut fragment) => {
                fragment.add_references(document.url.clone());
                Some(fragment)
            }
            Err(e) => {
                warn!(
                    entity = %name,
                    url = ?document.url,
                    error = %e,
                    timeout = e.is_timeout(),
                    "Fragment extraction failed"
                );
                None
            }
        }
    }

    async fn merge(&self, name: &str, fragments: &[Record]) -> Record {
        let merged = match serde_json::to_string_pretty(fragments) {
            Ok(fragments_json) => {
                let prompt = ResearchPrompts::merge_records(name, &fragments_json);
                with_timeout(
                    self.settings.extraction_timeout,
                    extract_as::<Record, _>(self.extraction.as_ref(), &prompt),
                )
                .await
                .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        let mut record = match merged {
            Ok(mut record) => {
                record.add_references(fragments.iter().flat_map(|f| f.references.iter().cloned()));
                record
            }
            Err(e) => {
                warn!(entity = %name, error = %e, "Merge call failed, merging locally");
                Record::merge_fragments(name, fragments)
            }
        };
        record.name = name.to_string();
        debug!(entity = %name, known_fields = record.known_fields(), "Merged record");
        record
    }
}

fn targeted_queries(name: &str) -> Vec<String> {
    TARGETED_QUERIES
        .iter()
        .map(|template| template.replace("{}", name))
        .collect()
}
