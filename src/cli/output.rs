//! Terminal rendering for answers, batch reports and telemetry

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;

use crate::evaluation::{BatchReport, Metric};
use crate::telemetry::TelemetryStats;
use crate::types::{PipelineAnswer, RoutingTaken};

/// Answer text, its sources and, with `explain`, how it was routed
pub fn format_answer(answer: &PipelineAnswer, explain: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", answer.answer);

    if !answer.citations.is_empty() {
        let _ = writeln!(out, "\n{}", "Sources:".bold());
        for citation in &answer.citations {
            let _ = writeln!(
                out,
                "  [{}] {} ({})",
                citation.marker,
                citation.source,
                citation.mode.to_string().dimmed()
            );
        }
    }

    if answer.grounding_failed {
        let _ = writeln!(
            out,
            "\n{}",
            "Note: could not tell who the question refers to".yellow()
        );
    }

    if explain {
        let c = &answer.classification;
        let _ = writeln!(out, "\n{}", "Routing:".bold().cyan());
        let _ = writeln!(out, "  Label:      {}", c.label.as_str().green());
        let _ = writeln!(out, "  Confidence: {:.2}", c.confidence);
        let _ = writeln!(out, "  Rule:       {}", c.rule);
        if let Some(rationale) = &c.rationale {
            let _ = writeln!(out, "  Rationale:  {}", rationale);
        }
        let _ = writeln!(out, "  Path:       {}", routing_colored(answer.routing));
        if let Some(rows) = &answer.context.rows {
            let _ = writeln!(out, "  Rows:       {}", rows.len());
        }
        let _ = writeln!(out, "  Passages:   {}", answer.context.passages.len());
        for passage in &answer.context.passages {
            let _ = writeln!(
                out,
                "    {} relevance={} similarity={:.2}",
                passage.source,
                passage
                    .relevance
                    .map(|r| format!("{:.1}", r))
                    .unwrap_or_else(|| "-".to_string()),
                passage.similarity
            );
        }
    }

    out
}

fn routing_colored(routing: RoutingTaken) -> ColoredString {
    match routing {
        RoutingTaken::StructuredFailed | RoutingTaken::Fallback => routing.as_str().yellow(),
        _ => routing.as_str().green(),
    }
}

/// Summary table for a batch run
pub fn format_report(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "Batch Evaluation Report".bold().cyan());
    let _ = writeln!(
        out,
        "  Questions:  {} ({} this run)",
        report.total, report.processed_this_run
    );
    let _ = writeln!(out, "  Succeeded:  {}", report.succeeded.to_string().green());
    let failed = report.failed.to_string();
    let _ = writeln!(
        out,
        "  Failed:     {}",
        if report.failed > 0 { failed.red() } else { failed.normal() }
    );

    if !report.routing.is_empty() {
        let _ = writeln!(out, "\n{}", "Routing:".bold());
        for (routing, count) in &report.routing {
            let _ = writeln!(out, "  {:<18} {}", routing.as_str(), count);
        }
    }

    let _ = writeln!(out, "\n{}", "Metrics:".bold());
    for metric in Metric::ALL {
        let Some(summary) = report.metrics.get(&metric) else {
            continue;
        };
        let mean = summary
            .mean
            .map(|m| format!("{:.3}", m))
            .unwrap_or_else(|| "n/a".to_string());
        let median = summary
            .median
            .map(|m| format!("{:.3}", m))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "  {:<20} mean {:>6}  median {:>6}  {}",
            metric.as_str(),
            mean,
            median,
            report.coverage(metric).dimmed()
        );
        if summary.failed > 0 {
            let _ = writeln!(out, "  {:<20} {} judgement(s) failed", "", summary.failed);
        }
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "\n{}", "Failures:".bold().red());
        for failure in &report.failures {
            let _ = writeln!(
                out,
                "  {} after {} attempt(s): {}",
                failure.id, failure.attempts, failure.error
            );
        }
    }

    out
}

/// One-line telemetry summary for verbose runs
pub fn format_stats(stats: &TelemetryStats) -> String {
    format!(
        "routed={} structured_failures={} unstructured_failures={} retries={} metric_failures={}",
        stats.requests_routed,
        stats.structured_failures,
        stats.unstructured_failures,
        stats.retry_attempts,
        stats.metric_failures
    )
}

/// Progress bar for `eval`; the length is set once pending work is known
pub fn eval_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} Evaluating [{bar:40.cyan/blue}] {pos}/{len} | {elapsed_precise}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}
