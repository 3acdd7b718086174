//! deep-explorer
//!
//! Recursive, concurrency-bounded research over a web search backend and an
//! LLM extraction backend.
//!
//! ```text
//!   Explorer ── QueryPlanner ──┐
//!      │     └─ ResultDistiller ┴─ ExtractionBackend (RigExtractor)
//!      └──────── SearchBackend (TavilySearch)
//! ```
//!
//! The entity variant ([`entity::EntityResearcher`]) reuses the same backends
//! to produce one structured record per discovered entity.

pub mod config;
pub mod entity;
pub mod error;
pub mod limiter;
pub mod llm;
pub mod output;
pub mod progress;
pub mod research;
pub mod search;

pub use config::Config;
pub use error::{ExploreError, ExtractionError, OutputError, PlanningError, SearchError};
pub use limiter::ConcurrencyLimiter;
pub use progress::{ProgressObserver, ProgressSnapshot};
pub use research::{ExplorationRequest, ExplorationResult, Explorer, ReportSynthesizer};
