//! Cycle orchestration and scheduling
//!
//! The orchestrator owns the only writer path to the published results;
//! the scheduler runs it on a fixed interval on its own task.

mod cycle;
mod scheduler;

pub use cycle::{
    model_prefix, CycleError, CycleOrchestrator, CycleOutcome, CycleReport, CycleResults,
    CycleState, OrchestratorConfig, SharedState, TrainingSummary,
};
pub use scheduler::{ScheduledRunner, DEFAULT_FORECAST_INTERVAL};
