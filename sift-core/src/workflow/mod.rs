//! Dependency-batched step execution.
//!
//! A generic engine that runs a DAG of steps in topological batches with
//! bounded concurrency, per-step timeouts, configurable cycle handling and
//! an optional narrative synthesis phase.

pub mod dag;
pub mod types;

pub use dag::{BatchPlan, DagExecutor, StepRunner, plan_batches};
pub use types::{
    DagRunReport, DagStep, ExecutedStep, PhaseTracker, PhaseTransition, RunPhase, StepState,
};
