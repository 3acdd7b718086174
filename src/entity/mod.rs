//! Entity research
//!
//! Discover the named entities behind a topic, then research each one into a
//! structured [`Record`].
//!
//! - `record` - the record model and its deterministic merge
//! - `pipeline` - discovery, per-entity research and progress

pub mod pipeline;
pub mod record;

pub use pipeline::{EntityObserver, EntityProgress, EntityResearcher, EntitySettings, EntityStage};
pub use record::{
    AdministrationRoute, DevelopmentPhase, EntityClassification, EntityStatus, Record, RecordEvent,
};
