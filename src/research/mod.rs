//! Recursive research
//!
//! # Module Structure
//!
//! - `planner` - topic → search queries with research goals
//! - `distiller` - search documents → learnings and follow-up questions
//! - `explorer` - the recursive, concurrency-bounded exploration engine
//! - `report` - final markdown report or short answer from the learnings

pub mod distiller;
pub mod explorer;
pub mod planner;
pub mod report;

pub use distiller::{DistillationResult, ResultDistiller};
pub use explorer::{ExplorationRequest, ExplorationResult, Explorer, ExplorerSettings};
pub use planner::{QueryPlanner, SubQuery};
pub use report::ReportSynthesizer;
