//! Answer and context quality metrics
//!
//! Metrics are computed after the answer exists and independently of each
//! other. A failing metric is recorded as `Failed`, a metric that does not
//! apply (no passages retrieved, no ground truth) as `NotApplicable`;
//! neither ever counts as a zero.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::backends::LanguageModel;
use crate::errors::{PipelineError, Result};
use crate::evaluation::retry::RetryPolicy;
use crate::rag::ContextBuilder;
use crate::types::{PipelineAnswer, RoutingTaken};

static FRACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").expect("fraction regex is valid"));

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(\s|$)").expect("sentence regex is valid"));

/// Quality metrics tracked per record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Faithfulness,
    AnswerCorrectness,
    ContextPrecision,
    ContextRelevancy,
    ContextRecall,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Faithfulness,
        Metric::AnswerCorrectness,
        Metric::ContextPrecision,
        Metric::ContextRelevancy,
        Metric::ContextRecall,
    ];

    /// Judged over retrieved passages; meaningless without them
    pub fn is_passage_metric(&self) -> bool {
        matches!(
            self,
            Metric::ContextPrecision | Metric::ContextRelevancy | Metric::ContextRecall
        )
    }

    pub fn needs_ground_truth(&self) -> bool {
        matches!(self, Metric::AnswerCorrectness | Metric::ContextRecall)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Faithfulness => "faithfulness",
            Metric::AnswerCorrectness => "answer_correctness",
            Metric::ContextPrecision => "context_precision",
            Metric::ContextRelevancy => "context_relevancy",
            Metric::ContextRecall => "context_recall",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metric outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    /// Score in [0, 1]
    Score(f64),
    /// The metric does not apply to this record
    NotApplicable,
    /// The metric applied but could not be computed
    Failed(String),
}

impl MetricValue {
    pub fn score(&self) -> Option<f64> {
        match self {
            MetricValue::Score(v) => Some(*v),
            _ => None,
        }
    }
}

/// Every metric for one record; missing entries never occur after `compute_metrics`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricScores(pub BTreeMap<Metric, MetricValue>);

impl MetricScores {
    /// Every metric set to the same value
    pub fn uniform(value: MetricValue) -> Self {
        Self(Metric::ALL.iter().map(|m| (*m, value.clone())).collect())
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.0.get(&metric)
    }

    pub fn set(&mut self, metric: Metric, value: MetricValue) {
        self.0.insert(metric, value);
    }

    /// Metrics that failed to compute
    pub fn failed(&self) -> Vec<Metric> {
        self.0
            .iter()
            .filter(|(_, v)| matches!(v, MetricValue::Failed(_)))
            .map(|(m, _)| *m)
            .collect()
    }
}

/// Judgements the metrics are built from
#[async_trait]
pub trait MetricEvaluator: Send + Sync {
    /// Share of answer claims supported by the context, in [0, 1]
    async fn faithfulness(&self, answer: &str, context: &str) -> Result<f64>;

    /// Agreement between answer and reference answer, in [0, 1]
    async fn answer_correctness(&self, question: &str, answer: &str, ground_truth: &str) -> Result<f64>;

    /// Whether one passage is useful for the question
    async fn passage_relevant(&self, question: &str, passage: &str) -> Result<bool>;

    /// Number of context sentences needed to answer the question
    async fn relevant_sentences(&self, question: &str, context: &str) -> Result<usize>;

    /// Share of reference-answer statements attributable to the context, in [0, 1]
    async fn context_recall(&self, ground_truth: &str, context: &str) -> Result<f64>;
}

/// Average precision over ranked relevance verdicts
///
/// Mean of precision@k over the ranks holding a relevant passage; 0 when
/// nothing is relevant.
pub fn average_precision(verdicts: &[bool]) -> f64 {
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (i, relevant) in verdicts.iter().enumerate() {
        if *relevant {
            hits += 1;
            sum += hits as f64 / (i + 1) as f64;
        }
    }
    if hits == 0 {
        0.0
    } else {
        sum / hits as f64
    }
}

/// Relevant sentences over total sentences, clamped to [0, 1]
pub fn relevancy_ratio(relevant: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (relevant as f64 / total as f64).min(1.0)
}

/// Sentences in a block of text
pub fn count_sentences(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let ends = SENTENCE_END_RE.find_iter(trimmed).count();
    let tail = SENTENCE_END_RE
        .find_iter(trimmed)
        .last()
        .map_or(true, |m| m.end() < trimmed.len());
    ends + usize::from(tail)
}

/// Compute every metric for one answer
///
/// Each judgement runs under `policy`. Passage metrics are `NotApplicable`
/// when no unstructured path contributed; ground-truth metrics are
/// `NotApplicable` without a reference answer.
pub async fn compute_metrics(
    evaluator: &dyn MetricEvaluator,
    policy: &RetryPolicy,
    answer: &PipelineAnswer,
    question: &str,
    ground_truth: Option<&str>,
) -> MetricScores {
    if answer.routing == RoutingTaken::Greeting {
        return MetricScores::uniform(MetricValue::NotApplicable);
    }

    let builder = ContextBuilder::new();
    let context_text = builder.render(&answer.context);
    let passages: Vec<&str> = answer.context.passages.iter().map(|p| p.text.as_str()).collect();
    let passage_text = passages.join("\n");
    let has_passages = answer.context.has_unstructured() && !passages.is_empty();
    let ground_truth = ground_truth.map(str::trim).filter(|g| !g.is_empty());

    let mut scores = MetricScores::default();

    for metric in Metric::ALL {
        let applicable = !(metric.is_passage_metric() && !has_passages)
            && !(metric.needs_ground_truth() && ground_truth.is_none())
            && !(metric == Metric::Faithfulness && answer.context.is_empty());
        if !applicable {
            scores.set(metric, MetricValue::NotApplicable);
            continue;
        }

        let reference = ground_truth.unwrap_or_default();
        let outcome = match metric {
            Metric::Faithfulness => {
                policy
                    .execute(|| evaluator.faithfulness(&answer.answer, &context_text))
                    .await
                    .result
            }
            Metric::AnswerCorrectness => {
                policy
                    .execute(|| evaluator.answer_correctness(question, &answer.answer, reference))
                    .await
                    .result
            }
            Metric::ContextPrecision => {
                let mut verdicts = Vec::with_capacity(passages.len());
                let mut failure = None;
                for passage in &passages {
                    match policy
                        .execute(|| evaluator.passage_relevant(question, passage))
                        .await
                        .result
                    {
                        Ok(v) => verdicts.push(v),
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                match failure {
                    Some(e) => Err(e),
                    None => Ok(average_precision(&verdicts)),
                }
            }
            Metric::ContextRelevancy => policy
                .execute(|| evaluator.relevant_sentences(question, &passage_text))
                .await
                .result
                .map(|relevant| relevancy_ratio(relevant, count_sentences(&passage_text))),
            Metric::ContextRecall => {
                policy
                    .execute(|| evaluator.context_recall(reference, &passage_text))
                    .await
                    .result
            }
        };

        let value = match outcome {
            Ok(score) if score.is_finite() => MetricValue::Score(score.clamp(0.0, 1.0)),
            Ok(score) => MetricValue::Failed(format!("non-finite score {}", score)),
            Err(e) => MetricValue::Failed(e.to_string()),
        };
        scores.set(metric, value);
    }

    scores
}

/// Metric judgements made by the language model
pub struct LlmMetricEvaluator {
    model: Arc<dyn LanguageModel>,
}

impl LlmMetricEvaluator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn ask_fraction(&self, prompt: String) -> Result<f64> {
        let output = self.model.complete(&prompt).await?;
        parse_fraction(&output)
            .ok_or_else(|| PipelineError::Parse(format!("no score in {:?}", output.trim())))
    }
}

/// First number in model output read as a fraction; percentages are scaled down
pub fn parse_fraction(output: &str) -> Option<f64> {
    let m = FRACTION_RE.find(output)?;
    let value: f64 = m.as_str().parse().ok()?;
    let is_percent = output[m.end()..].trim_start().starts_with('%');
    let value = if is_percent || value > 1.0 { value / 100.0 } else { value };
    Some(value.clamp(0.0, 1.0))
}

/// `yes`/`no` verdict at the start of the output
pub fn parse_verdict(output: &str) -> Option<bool> {
    let first = output
        .trim()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .split(|c: char| !c.is_alphanumeric())
        .next()?
        .to_lowercase();
    match first.as_str() {
        "yes" | "relevant" | "true" => Some(true),
        "no" | "irrelevant" | "false" => Some(false),
        _ => None,
    }
}

#[async_trait]
impl MetricEvaluator for LlmMetricEvaluator {
    async fn faithfulness(&self, answer: &str, context: &str) -> Result<f64> {
        self.ask_fraction(format!(
            "Break the answer into individual factual claims and check each against the context.\n\n\
             Context:\n{}\n\nAnswer:\n{}\n\n\
             Reply with only the fraction of claims supported by the context, between 0 and 1.",
            context.trim(),
            answer.trim()
        ))
        .await
    }

    async fn answer_correctness(&self, question: &str, answer: &str, ground_truth: &str) -> Result<f64> {
        self.ask_fraction(format!(
            "Question: {}\n\nReference answer: {}\n\nCandidate answer: {}\n\n\
             How factually consistent is the candidate with the reference? \
             Reply with only a number between 0 and 1.",
            question.trim(),
            ground_truth.trim(),
            answer.trim()
        ))
        .await
    }

    async fn passage_relevant(&self, question: &str, passage: &str) -> Result<bool> {
        let output = self
            .model
            .complete(&format!(
                "Question: {}\n\nPassage: {}\n\n\
                 Is this passage useful for answering the question? Reply yes or no.",
                question.trim(),
                passage.trim()
            ))
            .await?;
        parse_verdict(&output)
            .ok_or_else(|| PipelineError::Parse(format!("no verdict in {:?}", output.trim())))
    }

    async fn relevant_sentences(&self, question: &str, context: &str) -> Result<usize> {
        let output = self
            .model
            .complete(&format!(
                "Question: {}\n\nContext:\n{}\n\n\
                 How many sentences of the context are needed to answer the question? \
                 Reply with only the number.",
                question.trim(),
                context.trim()
            ))
            .await?;
        FRACTION_RE
            .find(&output)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|n| n.max(0.0).round() as usize)
            .ok_or_else(|| PipelineError::Parse(format!("no count in {:?}", output.trim())))
    }

    async fn context_recall(&self, ground_truth: &str, context: &str) -> Result<f64> {
        self.ask_fraction(format!(
            "Reference answer: {}\n\nContext:\n{}\n\n\
             What fraction of the statements in the reference answer can be attributed to the context? \
             Reply with only a number between 0 and 1.",
            ground_truth.trim(),
            context.trim()
        ))
        .await
    }
}
