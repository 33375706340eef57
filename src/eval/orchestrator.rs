//! Sequential three-way evaluation with external-state resets.
//!
//! A run walks a fixed phase sequence:
//!
//! ```text
//! Idle → InitialCleanup → RunApproach(0) → InterCleanup(0)
//!                       → RunApproach(1) → InterCleanup(1)
//!                       → RunApproach(2) → InterCleanup(2) → FinalCleanup → Done
//! ```
//!
//! Inside `RunApproach` every selected case is generated, executed when
//! needed, scored and then cleaned up, one at a time. Nothing runs
//! concurrently: the search service allows one index per name, so a run may
//! only start once the previous run's index is gone.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use super::report::{EvalRecord, RunReport};
use super::task::TaskRunner;
use super::Approach;
use crate::cases::{EvalCase, SearchIndexRef};
use crate::error::TaskError;
use crate::runner::{CleanupCoordinator, CodeExecutor};
use crate::scoring::{aggregate, ScorerRegistry, ScoringContext};

/// Position in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Idle,
    InitialCleanup,
    RunApproach(usize),
    InterCleanup(usize),
    FinalCleanup,
    Done,
}

impl RunPhase {
    /// The phase after this one for a run over `approaches` approaches.
    pub fn next(self, approaches: usize) -> RunPhase {
        match self {
            RunPhase::Idle => RunPhase::InitialCleanup,
            RunPhase::InitialCleanup if approaches == 0 => RunPhase::FinalCleanup,
            RunPhase::InitialCleanup => RunPhase::RunApproach(0),
            RunPhase::RunApproach(i) => RunPhase::InterCleanup(i),
            RunPhase::InterCleanup(i) if i + 1 < approaches => RunPhase::RunApproach(i + 1),
            RunPhase::InterCleanup(_) => RunPhase::FinalCleanup,
            RunPhase::FinalCleanup | RunPhase::Done => RunPhase::Done,
        }
    }
}

/// Timing and selection knobs for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Approaches to run, in order.
    pub approaches: Vec<Approach>,
    /// Wall-clock limit for each sandbox execution.
    pub execution_timeout: Duration,
    /// How long cleanup waits for a dropped index to disappear.
    pub cleanup_max_wait: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            approaches: Approach::ALL.to_vec(),
            execution_timeout: Duration::from_secs(30),
            cleanup_max_wait: Duration::from_secs(60),
        }
    }
}

/// Drives a full evaluation run.
pub struct Orchestrator {
    tasks: TaskRunner,
    executor: Arc<dyn CodeExecutor>,
    scorers: ScorerRegistry,
    cleanup: CleanupCoordinator,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        tasks: TaskRunner,
        executor: Arc<dyn CodeExecutor>,
        scorers: ScorerRegistry,
        cleanup: CleanupCoordinator,
    ) -> Self {
        Self {
            tasks,
            executor,
            scorers,
            cleanup,
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Evaluate every case matching `tags` under every configured approach.
    pub async fn run(&self, cases: &[EvalCase], tags: &[String]) -> RunReport {
        let selected: Vec<&EvalCase> = cases.iter().filter(|c| c.matches_tags(tags)).collect();
        let approaches = &self.settings.approaches;
        let mut report = RunReport::new(self.tasks.model());

        info!(
            run_id = %report.run_id,
            cases = selected.len(),
            approaches = approaches.len(),
            "Starting evaluation run"
        );

        let mut phase = RunPhase::Idle;
        loop {
            phase = phase.next(approaches.len());
            match phase {
                RunPhase::Idle => {}
                RunPhase::InitialCleanup | RunPhase::InterCleanup(_) | RunPhase::FinalCleanup => {
                    info!(phase = ?phase, "Resetting external state");
                    self.cleanup_all(&selected).await;
                }
                RunPhase::RunApproach(i) => {
                    let approach = approaches[i];
                    info!(approach = %approach, "Running approach");
                    for case in &selected {
                        let record = self.run_case(case, approach).await;
                        report.push(record);
                        self.cleanup_case(case).await;
                    }
                }
                RunPhase::Done => break,
            }
        }

        report.finish();
        info!(run_id = %report.run_id, records = report.records.len(), "Evaluation run finished");
        report
    }

    /// One (case, approach) run. Failures become an error record.
    pub async fn run_case(&self, case: &EvalCase, approach: Approach) -> EvalRecord {
        match self.evaluate(case, approach).await {
            Ok(record) => {
                info!(
                    case = %case.name,
                    approach = %approach,
                    compound = ?record.compound_score(),
                    "Case scored"
                );
                record
            }
            Err(e) => {
                error!(case = %case.name, approach = %approach, error = %e, "Case failed");
                EvalRecord::failed(&case.name, approach, e.to_string())
            }
        }
    }

    async fn evaluate(&self, case: &EvalCase, approach: Approach) -> Result<EvalRecord, TaskError> {
        let generated = self.tasks.generate(case, approach).await?;

        let execution = if case.needs_execution() {
            Some(
                self.executor
                    .execute(&generated.code, self.settings.execution_timeout)
                    .await,
            )
        } else {
            None
        };

        let ctx = ScoringContext::new(&generated.code, &case.expected, execution.as_ref());
        let scores = aggregate(self.scorers.score_all(&ctx).await);

        let mut metadata = generated.metadata;
        if let Some(ref execution) = execution {
            metadata.insert("execution_time_ms".into(), json!(execution.execution_time_ms));
        }

        Ok(EvalRecord {
            case_name: case.name.clone(),
            approach,
            generated_code: Some(generated.code),
            execution,
            scores,
            metadata,
            error: None,
        })
    }

    async fn cleanup_case(&self, case: &EvalCase) {
        if let Some(target) = case.cleanup_target() {
            self.cleanup
                .cleanup(target, self.settings.cleanup_max_wait)
                .await;
        }
    }

    async fn cleanup_all(&self, cases: &[&EvalCase]) {
        let mut targets: Vec<&SearchIndexRef> = Vec::new();
        for target in cases.iter().filter_map(|c| c.cleanup_target()) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        for target in targets {
            self.cleanup
                .cleanup(target, self.settings.cleanup_max_wait)
                .await;
        }
    }

    /// Run the cleanup coordinator for every case's cleanup target.
    pub async fn cleanup_only(&self, cases: &[EvalCase]) {
        let refs: Vec<&EvalCase> = cases.iter().collect();
        if refs.iter().all(|c| c.cleanup_target().is_none()) {
            warn!("No case defines a cleanup target");
        }
        self.cleanup_all(&refs).await;
    }
}
