//! Pipeline telemetry
//!
//! Collects routing, failure and retry events in memory and mirrors each one
//! to `tracing`. Counters feed the `eval` summary and tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::types::{QueryLabel, RetrievalMode, RoutingTaken};

/// Why a retrieval path produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathFailure {
    /// The structured query ran and matched no rows
    NoRows,
    /// The structured engine could not form a query
    NoAnswer,
    /// The re-ranker kept no passages
    NoPassages,
    /// The backend call errored
    Error,
}

impl PathFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathFailure::NoRows => "no_rows",
            PathFailure::NoAnswer => "no_answer",
            PathFailure::NoPassages => "no_passages",
            PathFailure::Error => "error",
        }
    }
}

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// Orchestrator reached a terminal route
    RouteTaken {
        label: QueryLabel,
        routing: RoutingTaken,
        timestamp: Instant,
    },
    /// One retrieval path produced nothing
    PathFailed {
        mode: RetrievalMode,
        cause: PathFailure,
        reason: String,
        timestamp: Instant,
    },
    /// Retry scheduled after a transient error
    RetryAttempt {
        question_id: String,
        attempt: u32,
        timestamp: Instant,
    },
    /// A quality metric could not be computed
    MetricFailure {
        question_id: String,
        metric: String,
        timestamp: Instant,
    },
    /// Evaluation record written to the checkpoint
    CheckpointAppended {
        question_id: String,
        success: bool,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub requests_routed: usize,
    pub routes: BTreeMap<RoutingTaken, usize>,
    pub structured_failures: usize,
    pub unstructured_failures: usize,
    pub failure_causes: BTreeMap<PathFailure, usize>,
    pub retry_attempts: usize,
    pub metric_failures: usize,
    pub records_appended: usize,
    pub records_failed: usize,
}

/// Shared, cloneable telemetry collector
#[derive(Clone)]
pub struct PipelineTelemetry {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PipelineTelemetry {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::RouteTaken { label, routing, .. } => {
                    stats.requests_routed += 1;
                    *stats.routes.entry(*routing).or_insert(0) += 1;
                    info!(label = %label, routing = routing.as_str(), "route taken");
                }
                TelemetryEvent::PathFailed {
                    mode,
                    cause,
                    reason,
                    ..
                } => {
                    match mode {
                        RetrievalMode::Structured => stats.structured_failures += 1,
                        RetrievalMode::Unstructured => stats.unstructured_failures += 1,
                    }
                    *stats.failure_causes.entry(*cause).or_insert(0) += 1;
                    warn!(mode = %mode, cause = cause.as_str(), reason = %reason, "retrieval path produced nothing");
                }
                TelemetryEvent::RetryAttempt {
                    question_id,
                    attempt,
                    ..
                } => {
                    stats.retry_attempts += 1;
                    warn!(question_id = %question_id, attempt, "retrying after transient error");
                }
                TelemetryEvent::MetricFailure {
                    question_id,
                    metric,
                    ..
                } => {
                    stats.metric_failures += 1;
                    warn!(question_id = %question_id, metric = %metric, "metric computation failed");
                }
                TelemetryEvent::CheckpointAppended {
                    question_id,
                    success,
                    ..
                } => {
                    stats.records_appended += 1;
                    if !success {
                        stats.records_failed += 1;
                    }
                    debug!(question_id = %question_id, success, "checkpoint appended");
                }
            }
        }

        lock(&self.events).push(event);
    }

    pub fn route_taken(&self, label: QueryLabel, routing: RoutingTaken) {
        self.record(TelemetryEvent::RouteTaken {
            label,
            routing,
            timestamp: Instant::now(),
        });
    }

    pub fn path_failed(&self, mode: RetrievalMode, cause: PathFailure, reason: impl Into<String>) {
        self.record(TelemetryEvent::PathFailed {
            mode,
            cause,
            reason: reason.into(),
            timestamp: Instant::now(),
        });
    }

    pub fn retry_attempt(&self, question_id: &str, attempt: u32) {
        self.record(TelemetryEvent::RetryAttempt {
            question_id: question_id.to_string(),
            attempt,
            timestamp: Instant::now(),
        });
    }

    pub fn metric_failure(&self, question_id: &str, metric: &str) {
        self.record(TelemetryEvent::MetricFailure {
            question_id: question_id.to_string(),
            metric: metric.to_string(),
            timestamp: Instant::now(),
        });
    }

    pub fn checkpoint_appended(&self, question_id: &str, success: bool) {
        self.record(TelemetryEvent::CheckpointAppended {
            question_id: question_id.to_string(),
            success,
            timestamp: Instant::now(),
        });
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Reset all telemetry
    pub fn reset(&self) {
        lock(&self.events).clear();
        *lock(&self.stats) = TelemetryStats::default();
    }
}

impl Default for PipelineTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
