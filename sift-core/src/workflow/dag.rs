//! Dependency-batched executor.
//!
//! Steps are grouped into topological batches (Kahn's algorithm). Each batch
//! runs concurrently, bounded by a semaphore, with every step raced against
//! its timeout. A batch only starts after every step of the previous batch
//! has settled. Failures and timeouts are recorded on the step and never
//! abort siblings or later batches.

use super::types::{DagRunReport, DagStep, ExecutedStep, PhaseTracker, RunPhase, StepState};
use crate::config::{CyclePolicy, ExecutorConfig};
use crate::error::ExecutorError;
use crate::providers::NarrativeGenerator;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Executes the payload of one step.
#[async_trait]
pub trait StepRunner<P, O>: Send + Sync {
    async fn run(&self, step: &DagStep<P>) -> Result<O, String>;
}

/// Batches computed for a step list, as indices into that list.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub batches: Vec<Vec<usize>>,
    pub cycle_broken: bool,
    /// Resolved dependency indices per step (unknown ids dropped).
    pub dependencies: Vec<Vec<usize>>,
}

/// Group steps into dependency batches.
///
/// Unknown dependency ids are ignored with a warning. When only cyclic steps
/// remain, `BreakArbitrarily` forces the first unvisited step (declaration
/// order) into a batch of its own; `FailFast` returns `CycleDetected`.
pub fn plan_batches<P>(
    steps: &[DagStep<P>],
    policy: CyclePolicy,
) -> Result<BatchPlan, ExecutorError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, step) in steps.iter().enumerate() {
        if index.insert(step.id.as_str(), i).is_some() {
            warn!(step = %step.id, "Duplicate step id; later declaration shadows earlier");
        }
    }

    let mut dependencies: Vec<Vec<usize>> = Vec::with_capacity(steps.len());
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    let mut in_degree = vec![0usize; steps.len()];

    for (i, step) in steps.iter().enumerate() {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for dep in &step.depends_on {
            match index.get(dep.as_str()) {
                Some(&d) => {
                    if seen.insert(d) {
                        resolved.push(d);
                        dependents[d].push(i);
                        in_degree[i] += 1;
                    }
                }
                None => warn!(step = %step.id, dependency = %dep, "Ignoring unknown dependency"),
            }
        }
        dependencies.push(resolved);
    }

    let mut visited = vec![false; steps.len()];
    let mut remaining = steps.len();
    let mut batches = Vec::new();
    let mut cycle_broken = false;

    while remaining > 0 {
        let mut batch: Vec<usize> = (0..steps.len())
            .filter(|&i| !visited[i] && in_degree[i] == 0)
            .collect();

        if batch.is_empty() {
            let stuck: Vec<String> = (0..steps.len())
                .filter(|&i| !visited[i])
                .map(|i| steps[i].id.clone())
                .collect();
            match policy {
                CyclePolicy::FailFast => {
                    return Err(ExecutorError::CycleDetected { remaining: stuck });
                }
                CyclePolicy::BreakArbitrarily => {
                    let Some(forced) = (0..steps.len()).find(|&i| !visited[i]) else {
                        break;
                    };
                    warn!(
                        step = %steps[forced].id,
                        remaining = ?stuck,
                        "Dependency cycle detected; forcing step to break it"
                    );
                    cycle_broken = true;
                    batch.push(forced);
                }
            }
        }

        for &i in &batch {
            visited[i] = true;
            remaining -= 1;
            for &j in &dependents[i] {
                in_degree[j] = in_degree[j].saturating_sub(1);
            }
        }
        batches.push(batch);
    }

    Ok(BatchPlan {
        batches,
        cycle_broken,
        dependencies,
    })
}

/// Runs step DAGs.
#[derive(Debug, Clone, Default)]
pub struct DagExecutor {
    config: ExecutorConfig,
}

enum StepOutcome<O> {
    Completed(O),
    Failed(ExecutorError),
    Cancelled,
}

impl DagExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run every step and finish in `Completed`, or `Error` when the run was
    /// cancelled or a cycle was rejected.
    ///
    /// A failed or timed-out step moves that step to `Failed` and is listed in
    /// `errors`; the run still completes, with the failure count recorded as
    /// the reason on its final transition.
    pub async fn run<P, O>(
        &self,
        steps: Vec<DagStep<P>>,
        runner: &dyn StepRunner<P, O>,
        cancel: &CancellationToken,
    ) -> DagRunReport<O>
    where
        P: Send + Sync,
        O: Send,
    {
        let (mut report, mut tracker, start) = self.execute(steps, runner, cancel).await;
        if tracker.phase() == RunPhase::Executing {
            tracker.advance(RunPhase::Completed, failure_note(&report));
        }
        report.phase = tracker.phase();
        report.transitions = tracker.into_history();
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Run every step, then ask `generator` to summarize the completed outputs.
    ///
    /// A generator failure moves the run to `Error` but keeps every step record.
    pub async fn run_with_synthesis<P, O>(
        &self,
        steps: Vec<DagStep<P>>,
        runner: &dyn StepRunner<P, O>,
        generator: &dyn NarrativeGenerator,
        cancel: &CancellationToken,
    ) -> DagRunReport<O>
    where
        P: Send + Sync,
        O: Send + Serialize,
    {
        let (mut report, mut tracker, start) = self.execute(steps, runner, cancel).await;

        if tracker.phase() == RunPhase::Executing {
            tracker.advance(RunPhase::Synthesizing, failure_note(&report));
            let prompt = synthesis_prompt(&report);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err("cancelled during synthesis".to_string()),
                result = generator.complete(&prompt) => result.map_err(|e| e.to_string()),
            };
            match outcome {
                Ok(summary) => {
                    report.summary = Some(summary);
                    tracker.advance(RunPhase::Completed, None);
                }
                Err(message) => {
                    warn!(error = %message, "Run synthesis failed");
                    report.errors.push(ExecutorError::SynthesisFailed {
                        message: message.clone(),
                    });
                    tracker.advance(RunPhase::Error, Some(message));
                }
            }
        }

        report.phase = tracker.phase();
        report.transitions = tracker.into_history();
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Plan and execute all batches. Leaves the tracker in `Executing` on a
    /// normal finish, `Error` otherwise.
    async fn execute<P, O>(
        &self,
        steps: Vec<DagStep<P>>,
        runner: &dyn StepRunner<P, O>,
        cancel: &CancellationToken,
    ) -> (DagRunReport<O>, PhaseTracker, Instant)
    where
        P: Send + Sync,
        O: Send,
    {
        let start = Instant::now();
        let mut tracker = PhaseTracker::default();
        let mut report = DagRunReport {
            run_id: Uuid::new_v4(),
            phase: RunPhase::Planning,
            transitions: Vec::new(),
            batches: Vec::new(),
            executed_steps: steps.iter().map(|s| ExecutedStep::pending(&s.id)).collect(),
            errors: Vec::new(),
            cycle_broken: false,
            summary: None,
            duration_ms: 0,
        };

        let plan = match plan_batches(&steps, self.config.cycle_policy) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Refusing to execute cyclic step graph");
                for record in &mut report.executed_steps {
                    record.transition(StepState::Skipped);
                }
                report.errors.push(e.clone());
                tracker.advance(RunPhase::Error, Some(e.to_string()));
                return (report, tracker, start);
            }
        };

        report.cycle_broken = plan.cycle_broken;
        report.batches = plan
            .batches
            .iter()
            .map(|b| b.iter().map(|&i| steps[i].id.clone()).collect())
            .collect();
        tracker.advance(RunPhase::Executing, None);
        info!(
            run_id = %report.run_id,
            steps = steps.len(),
            batches = plan.batches.len(),
            "Executing step graph"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        for (batch_index, batch) in plan.batches.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let mut runnable = Vec::new();
            for &i in batch {
                let record = &mut report.executed_steps[i];
                record.batch = Some(batch_index);
                let blocked_by = if self.config.skip_dependents_of_failed {
                    plan.dependencies[i].iter().copied().find(|&d| {
                        matches!(
                            report.executed_steps[d].state,
                            StepState::Failed | StepState::Skipped
                        )
                    })
                } else {
                    None
                };
                let record = &mut report.executed_steps[i];
                match blocked_by {
                    Some(d) => {
                        record.transition(StepState::Skipped);
                        record.error = Some(ExecutorError::StepFailed {
                            step: steps[i].id.clone(),
                            message: format!("dependency '{}' did not complete", steps[d].id),
                        });
                    }
                    None => {
                        record.transition(StepState::Ready);
                        record.transition(StepState::Running);
                        runnable.push(i);
                    }
                }
            }
            debug!(batch = batch_index, steps = runnable.len(), "Dispatching batch");

            let futures = runnable.iter().map(|&i| {
                let sem = semaphore.clone();
                let step = &steps[i];
                let timeout = step.timeout.unwrap_or_else(|| self.config.step_timeout());
                async move {
                    let step_start = Instant::now();
                    let Ok(_permit) = sem.acquire().await else {
                        return (i, StepOutcome::Cancelled, 0);
                    };
                    if cancel.is_cancelled() {
                        return (i, StepOutcome::Cancelled, 0);
                    }
                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => StepOutcome::Cancelled,
                        result = tokio::time::timeout(timeout, runner.run(step)) => match result {
                            Ok(Ok(output)) => StepOutcome::Completed(output),
                            Ok(Err(message)) => StepOutcome::Failed(ExecutorError::StepFailed {
                                step: step.id.clone(),
                                message,
                            }),
                            Err(_) => StepOutcome::Failed(ExecutorError::StepTimeout {
                                step: step.id.clone(),
                                timeout_secs: timeout.as_secs(),
                            }),
                        },
                    };
                    (i, outcome, step_start.elapsed().as_millis() as u64)
                }
            });

            for (i, outcome, duration_ms) in futures::future::join_all(futures).await {
                let record = &mut report.executed_steps[i];
                record.duration_ms = duration_ms;
                match outcome {
                    StepOutcome::Completed(output) => {
                        record.transition(StepState::Completed);
                        record.output = Some(output);
                    }
                    StepOutcome::Failed(e) => {
                        warn!(step = %record.id, error = %e, "Step failed");
                        record.transition(StepState::Failed);
                        report.errors.push(e.clone());
                        record.error = Some(e);
                    }
                    StepOutcome::Cancelled => {
                        record.transition(StepState::Skipped);
                        record.error = Some(ExecutorError::Cancelled {
                            step: record.id.clone(),
                        });
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            let mut interrupted = 0;
            for record in &mut report.executed_steps {
                if record.state == StepState::Pending {
                    record.transition(StepState::Skipped);
                    record.error = Some(ExecutorError::Cancelled {
                        step: record.id.clone(),
                    });
                }
                if let Some(e @ ExecutorError::Cancelled { .. }) = &record.error {
                    report.errors.push(e.clone());
                    interrupted += 1;
                }
            }
            // A token that fires after every step settled does not fail the run.
            if interrupted > 0 {
                warn!(run_id = %report.run_id, skipped = interrupted, "Step graph cancelled");
                tracker.advance(RunPhase::Error, Some("cancelled".to_string()));
            }
        }

        info!(
            run_id = %report.run_id,
            completed = report.count_in(StepState::Completed),
            failed = report.count_in(StepState::Failed),
            skipped = report.count_in(StepState::Skipped),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Step graph finished"
        );
        (report, tracker, start)
    }
}

fn failure_note<O>(report: &DagRunReport<O>) -> Option<String> {
    match report.count_in(StepState::Failed) {
        0 => None,
        n => Some(format!("{n} step(s) failed")),
    }
}

fn synthesis_prompt<O: Serialize>(report: &DagRunReport<O>) -> String {
    let mut prompt =
        String::from("Summarize the combined results of the following completed steps.\n");
    for step in &report.executed_steps {
        if let Some(output) = &step.output {
            let rendered = serde_json::to_string_pretty(output)
                .unwrap_or_else(|e| format!("<unserializable output: {e}>"));
            prompt.push_str(&format!("\n## {}\n{}\n", step.id, rendered));
        }
    }
    prompt
}
