//! Batch evaluation harness
//!
//! Drives the orchestrator over a dataset with bounded concurrency. Each
//! question is answered under the retry policy and a per-request timeout,
//! scored, and checkpointed before its worker picks up the next question.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{PipelineError, Result};
use crate::evaluation::checkpoint::CheckpointStore;
use crate::evaluation::dataset::{find_duplicate_id, EvalQuestion, EvaluationRecord};
use crate::evaluation::metrics::{compute_metrics, MetricEvaluator};
use crate::evaluation::report::BatchReport;
use crate::evaluation::retry::RetryPolicy;
use crate::orchestrator::HybridOrchestrator;
use crate::telemetry::PipelineTelemetry;

/// Harness tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Questions in flight at once
    pub concurrency: usize,
    /// Budget for one `answer` call
    pub request_timeout_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get().clamp(1, 4),
            request_timeout_ms: 120_000,
        }
    }
}

/// Drives the orchestrator over a dataset
pub struct BatchHarness {
    orchestrator: Arc<HybridOrchestrator>,
    evaluator: Arc<dyn MetricEvaluator>,
    checkpoint: CheckpointStore,
    policy: RetryPolicy,
    config: HarnessConfig,
    telemetry: PipelineTelemetry,
    progress: Option<ProgressBar>,
    run_id: String,
}

impl BatchHarness {
    pub fn new(
        orchestrator: Arc<HybridOrchestrator>,
        evaluator: Arc<dyn MetricEvaluator>,
        checkpoint: CheckpointStore,
    ) -> Self {
        let telemetry = orchestrator.telemetry().clone();
        Self {
            orchestrator,
            evaluator,
            checkpoint,
            policy: RetryPolicy::default(),
            config: HarnessConfig::default(),
            telemetry,
            progress: None,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Advance `progress` once per finished question
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn telemetry(&self) -> &PipelineTelemetry {
        &self.telemetry
    }

    /// Stamped on every record this harness writes
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Questions not yet in the checkpoint, in dataset order
    pub async fn pending<'a>(&self, questions: &'a [EvalQuestion]) -> Result<Vec<&'a EvalQuestion>> {
        let done: HashSet<String> = self.checkpoint.completed_ids().await?;
        Ok(questions.iter().filter(|q| !done.contains(&q.id)).collect())
    }

    /// Run the batch
    ///
    /// With `resume` the questions already in the checkpoint are skipped;
    /// without it the checkpoint is cleared first. The report covers every
    /// dataset question that has a record, old or new.
    pub async fn run(&self, questions: &[EvalQuestion], resume: bool) -> Result<BatchReport> {
        if let Some(id) = find_duplicate_id(questions) {
            return Err(PipelineError::MalformedInput(format!(
                "duplicate question id {:?}",
                id
            )));
        }

        if !resume {
            self.checkpoint.reset().await?;
        }

        let pending = self.pending(questions).await?;
        info!(
            total = questions.len(),
            pending = pending.len(),
            run_id = %self.run_id,
            skipped = questions.len() - pending.len(),
            concurrency = self.config.concurrency,
            "starting batch"
        );
        if let Some(progress) = &self.progress {
            progress.set_length(pending.len() as u64);
        }

        let processed: Vec<()> = stream::iter(pending)
            .map(|question| self.process(question))
            .buffer_unordered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        let wanted: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        let records: Vec<EvaluationRecord> = self
            .checkpoint
            .load_records()
            .await?
            .into_iter()
            .filter(|r| wanted.contains(r.id.as_str()))
            .collect();

        let report = BatchReport::from_records(&records, processed.len());
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = self.telemetry.elapsed().as_millis() as u64,
            "batch complete"
        );
        Ok(report)
    }

    /// Answer, score and checkpoint one question
    ///
    /// Only checkpoint failures are returned as errors; everything else is
    /// captured in the record.
    async fn process(&self, question: &EvalQuestion) -> Result<()> {
        let request = question.to_question();
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let orchestrator = &self.orchestrator;
        let telemetry = &self.telemetry;

        let outcome = self
            .policy
            .execute_observed(
                || orchestrator.answer_with_timeout(&request, timeout),
                |attempt, error| {
                    warn!(id = %question.id, attempt, error = %error, "transient failure");
                    telemetry.retry_attempt(&question.id, attempt);
                },
            )
            .await;

        let record = match outcome.result {
            Ok(answer) => {
                let metrics = compute_metrics(
                    self.evaluator.as_ref(),
                    &self.policy,
                    &answer,
                    &question.question,
                    question.ground_truth.as_deref(),
                )
                .await;
                for metric in metrics.failed() {
                    self.telemetry.metric_failure(&question.id, metric.as_str());
                }
                EvaluationRecord::succeeded(question, answer, metrics, outcome.attempts)
                    .in_run(&self.run_id)
            }
            Err(e) => {
                warn!(id = %question.id, attempts = outcome.attempts, error = %e, "question failed");
                EvaluationRecord::failed(question, e.to_string(), outcome.attempts)
                    .in_run(&self.run_id)
            }
        };

        self.checkpoint.append(&record).await?;
        self.telemetry.checkpoint_appended(&record.id, record.success);
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
        Ok(())
    }
}
