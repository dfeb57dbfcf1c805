//! Step and run state machines for the dependency-batched executor.

use crate::error::ExecutorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// One node of a step DAG.
#[derive(Debug, Clone)]
pub struct DagStep<P> {
    pub id: String,
    /// Ids of steps that must settle before this one starts.
    pub depends_on: Vec<String>,
    pub payload: P,
    /// Overrides the executor's default step timeout.
    pub timeout: Option<Duration>,
}

impl<P> DagStep<P> {
    pub fn new(id: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
            payload,
            timeout: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed | StepState::Failed | StepState::Skipped
        )
    }

    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Ready, Running)
                | (Ready, Skipped)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Skipped)
        )
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepState::Pending => write!(f, "pending"),
            StepState::Ready => write!(f, "ready"),
            StepState::Running => write!(f, "running"),
            StepState::Completed => write!(f, "completed"),
            StepState::Failed => write!(f, "failed"),
            StepState::Skipped => write!(f, "skipped"),
        }
    }
}

/// Lifecycle of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Planning,
    Executing,
    Synthesizing,
    Completed,
    Error,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Error)
    }

    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Planning, Executing)
                | (Planning, Error)
                | (Executing, Synthesizing)
                | (Executing, Completed)
                | (Executing, Error)
                | (Synthesizing, Completed)
                | (Synthesizing, Error)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Planning => write!(f, "planning"),
            RunPhase::Executing => write!(f, "executing"),
            RunPhase::Synthesizing => write!(f, "synthesizing"),
            RunPhase::Completed => write!(f, "completed"),
            RunPhase::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Current run phase plus the history of how it got there.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    phase: RunPhase,
    history: Vec<PhaseTransition>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            phase: RunPhase::Planning,
            history: Vec::new(),
        }
    }
}

impl PhaseTracker {
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: RunPhase, reason: Option<String>) -> bool {
        if !self.phase.can_transition_to(next) {
            warn!(from = %self.phase, to = %next, "Ignoring illegal run phase transition");
            return false;
        }
        self.history.push(PhaseTransition {
            from: self.phase,
            to: next,
            at: Utc::now(),
            reason,
        });
        self.phase = next;
        true
    }

    pub fn into_history(self) -> Vec<PhaseTransition> {
        self.history
    }
}

/// Final record of one step.
#[derive(Debug, Clone)]
pub struct ExecutedStep<O> {
    pub id: String,
    pub state: StepState,
    pub output: Option<O>,
    pub error: Option<ExecutorError>,
    /// Index of the batch the step was scheduled in.
    pub batch: Option<usize>,
    pub duration_ms: u64,
}

impl<O> ExecutedStep<O> {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: StepState::Pending,
            output: None,
            error: None,
            batch: None,
            duration_ms: 0,
        }
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn transition(&mut self, next: StepState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(step = %self.id, from = %self.state, to = %next, "Ignoring illegal step transition");
            return false;
        }
        self.state = next;
        true
    }
}

/// Outcome of one executor run.
#[derive(Debug, Clone)]
pub struct DagRunReport<O> {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub transitions: Vec<PhaseTransition>,
    /// Step ids per batch, in execution order.
    pub batches: Vec<Vec<String>>,
    /// Every step, in declaration order.
    pub executed_steps: Vec<ExecutedStep<O>>,
    pub errors: Vec<ExecutorError>,
    pub cycle_broken: bool,
    /// Narrative produced by the synthesis phase, when one ran.
    pub summary: Option<String>,
    pub duration_ms: u64,
}

impl<O> DagRunReport<O> {
    pub fn step(&self, id: &str) -> Option<&ExecutedStep<O>> {
        self.executed_steps.iter().find(|s| s.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&O> {
        self.step(id).and_then(|s| s.output.as_ref())
    }

    pub fn batch_of(&self, id: &str) -> Option<usize> {
        self.batches
            .iter()
            .position(|batch| batch.iter().any(|s| s == id))
    }

    pub fn count_in(&self, state: StepState) -> usize {
        self.executed_steps
            .iter()
            .filter(|s| s.state == state)
            .count()
    }
}
