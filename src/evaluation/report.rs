//! Aggregate batch report

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::evaluation::dataset::EvaluationRecord;
use crate::evaluation::metrics::{Metric, MetricValue};
use crate::types::RoutingTaken;

/// Aggregate for one metric
///
/// `mean` and `median` cover scored records only; not-applicable and
/// failed entries are counted separately, never as zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub scored: usize,
    pub not_applicable: usize,
    pub failed: usize,
}

impl MetricSummary {
    fn from_values<'a>(values: impl Iterator<Item = &'a MetricValue>) -> Self {
        let mut summary = MetricSummary::default();
        let mut scores = Vec::new();

        for value in values {
            match value {
                MetricValue::Score(v) => scores.push(*v),
                MetricValue::NotApplicable => summary.not_applicable += 1,
                MetricValue::Failed(_) => summary.failed += 1,
            }
        }

        summary.scored = scores.len();
        summary.mean = mean(&scores);
        summary.median = median(&mut scores);
        summary
    }
}

/// A question that never produced an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub id: String,
    pub error: String,
    pub attempts: u32,
}

/// Batch outcome across every record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records produced by this run (the rest came from the checkpoint)
    pub processed_this_run: usize,
    pub metrics: BTreeMap<Metric, MetricSummary>,
    pub routing: BTreeMap<RoutingTaken, usize>,
    pub failures: Vec<FailureEntry>,
}

impl BatchReport {
    /// Aggregate `records`; a later record for the same id replaces an earlier one
    pub fn from_records(records: &[EvaluationRecord], processed_this_run: usize) -> Self {
        let mut latest: Vec<&EvaluationRecord> = Vec::new();
        for record in records {
            match latest.iter().position(|r| r.id == record.id) {
                Some(i) => latest[i] = record,
                None => latest.push(record),
            }
        }

        let mut report = BatchReport {
            total: latest.len(),
            processed_this_run,
            ..Default::default()
        };

        for record in &latest {
            if record.success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
                report.failures.push(FailureEntry {
                    id: record.id.clone(),
                    error: record.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                    attempts: record.attempts,
                });
            }
            if let Some(routing) = record.routing {
                *report.routing.entry(routing).or_insert(0) += 1;
            }
        }

        // Failed records have no answer to score; they show up in `failures`
        for metric in Metric::ALL {
            let summary = MetricSummary::from_values(
                latest
                    .iter()
                    .filter(|r| r.success)
                    .filter_map(|r| r.metrics.get(metric)),
            );
            report.metrics.insert(metric, summary);
        }

        report
    }

    /// "N of M" line for one metric
    pub fn coverage(&self, metric: Metric) -> String {
        let summary = self.metrics.get(&metric).cloned().unwrap_or_default();
        format!("{} of {} scored", summary.scored, self.succeeded)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::dataset::EvalQuestion;
    use crate::evaluation::metrics::MetricScores;
    use chrono::Utc;

    fn record(id: &str, routing: RoutingTaken, precision: MetricValue) -> EvaluationRecord {
        let mut metrics = MetricScores::uniform(MetricValue::Score(1.0));
        metrics.set(Metric::ContextPrecision, precision);
        EvaluationRecord {
            id: id.into(),
            question: "q".into(),
            answer: Some("a".into()),
            label: None,
            routing: Some(routing),
            context: None,
            citations: Vec::new(),
            metrics,
            success: true,
            error: None,
            attempts: 1,
            completed_at: Utc::now(),
            run_id: None,
        }
    }

    #[test]
    fn test_not_applicable_excluded_from_denominator() {
        let records = vec![
            record("1", RoutingTaken::StructuredOnly, MetricValue::NotApplicable),
            record("2", RoutingTaken::StructuredOnly, MetricValue::NotApplicable),
            record("3", RoutingTaken::StructuredOnly, MetricValue::NotApplicable),
            record("4", RoutingTaken::UnstructuredOnly, MetricValue::Score(0.8)),
        ];
        let report = BatchReport::from_records(&records, 4);
        let precision = &report.metrics[&Metric::ContextPrecision];
        assert_eq!(precision.mean, Some(0.8));
        assert_eq!(precision.scored, 1);
        assert_eq!(precision.not_applicable, 3);
        assert_eq!(report.coverage(Metric::ContextPrecision), "1 of 4 scored");
        assert_eq!(report.routing[&RoutingTaken::StructuredOnly], 3);
    }

    #[test]
    fn test_mean_median_and_failed_metrics() {
        let records = vec![
            record("1", RoutingTaken::Hybrid, MetricValue::Score(0.2)),
            record("2", RoutingTaken::Hybrid, MetricValue::Score(0.4)),
            record("3", RoutingTaken::Hybrid, MetricValue::Score(0.9)),
            record("4", RoutingTaken::Hybrid, MetricValue::Failed("judge".into())),
        ];
        let report = BatchReport::from_records(&records, 4);
        let precision = &report.metrics[&Metric::ContextPrecision];
        assert!((precision.mean.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(precision.median, Some(0.4));
        assert_eq!(precision.failed, 1);
    }

    #[test]
    fn test_failures_listed_and_latest_record_wins() {
        let failed = EvaluationRecord::failed(&EvalQuestion::new("1", "q"), "rate limited", 5);
        let records = vec![
            failed.clone(),
            record("2", RoutingTaken::Fallback, MetricValue::Score(0.5)),
            EvaluationRecord::failed(&EvalQuestion::new("2", "q"), "timeout", 3),
        ];
        let report = BatchReport::from_records(&records, 0);
        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures[0].error, "rate limited");
        assert_eq!(report.failures[1].attempts, 3);
        assert!(report.metrics[&Metric::Faithfulness].mean.is_none());
    }

    #[test]
    fn test_median_even() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut values), Some(2.5));
        assert_eq!(median(&mut []), None);
    }
}
