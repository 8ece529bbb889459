//! Batch evaluation
//!
//! Resumable, retrying batch runs over the orchestrator with per-record
//! quality metrics and an aggregate report.

pub mod checkpoint;
pub mod dataset;
pub mod harness;
pub mod metrics;
pub mod report;
pub mod retry;

pub use checkpoint::CheckpointStore;
pub use dataset::{load_dataset, EvalQuestion, EvaluationRecord};
pub use harness::{BatchHarness, HarnessConfig};
pub use metrics::{
    compute_metrics, LlmMetricEvaluator, Metric, MetricEvaluator, MetricScores, MetricValue,
};
pub use report::{BatchReport, FailureEntry, MetricSummary};
pub use retry::{Retried, RetryPolicy, RetrySettings};
