//! Adaptive risk regulation
//!
//! - State machine over Normal / Cautious / Emergency driven by trade streaks
//! - Snapshot history for rollback after recovery
//! - Per-hour and per-asset performance learning (advisory only)
//! - Async regulator owning all of the above behind one lock

pub mod learner;
pub mod regulator;
pub mod snapshot;
pub mod state_machine;

pub use learner::{BucketSummary, PerformanceBucket, PerformanceLearner, Recommendation, MIN_SAMPLE_TRADES};
pub use regulator::{PerformanceReport, Regulator, ReportStatus};
pub use snapshot::{ConfigSnapshot, SnapshotStore, StreakId};
pub use state_machine::{RegulationStateMachine, Transition};
