//! Evaluation datasets and per-question records

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::evaluation::metrics::MetricScores;
use crate::types::{Citation, Context, PipelineAnswer, QueryLabel, Question, RoutingTaken, Turn};

/// One dataset line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalQuestion {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub history: Vec<Turn>,
    /// Reference answer, when the dataset has one
    #[serde(default)]
    pub ground_truth: Option<String>,
}

impl EvalQuestion {
    pub fn new(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            history: Vec::new(),
            ground_truth: None,
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: impl Into<String>) -> Self {
        self.ground_truth = Some(ground_truth.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn to_question(&self) -> Question {
        Question::with_history(self.question.clone(), self.history.clone()).in_conversation(self.id.clone())
    }
}

/// Load a JSONL dataset, one `EvalQuestion` per non-blank line
pub fn load_dataset(path: &Path) -> Result<Vec<EvalQuestion>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;

    let mut questions = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let question: EvalQuestion = serde_json::from_str(line)
            .with_context(|| format!("Invalid dataset line {} in {}", line_no + 1, path.display()))?;
        questions.push(question);
    }

    Ok(questions)
}

/// First identifier that appears twice, if any
pub fn find_duplicate_id(questions: &[EvalQuestion]) -> Option<&str> {
    let mut seen = HashSet::new();
    questions
        .iter()
        .find(|q| !seen.insert(q.id.as_str()))
        .map(|q| q.id.as_str())
}

/// Outcome for one dataset question, as written to the checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub label: Option<QueryLabel>,
    #[serde(default)]
    pub routing: Option<RoutingTaken>,
    #[serde(default)]
    pub context: Option<Context>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub metrics: MetricScores,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Attempts made, first try included
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
    /// Harness run that wrote the record
    #[serde(default)]
    pub run_id: Option<String>,
}

impl EvaluationRecord {
    pub fn succeeded(question: &EvalQuestion, answer: PipelineAnswer, metrics: MetricScores, attempts: u32) -> Self {
        Self {
            id: question.id.clone(),
            question: question.question.clone(),
            answer: Some(answer.answer),
            label: Some(answer.classification.label),
            routing: Some(answer.routing),
            context: Some(answer.context),
            citations: answer.citations,
            metrics,
            success: true,
            error: None,
            attempts,
            completed_at: Utc::now(),
            run_id: None,
        }
    }

    pub fn in_run(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    /// No answer was produced; every metric is marked failed
    pub fn failed(question: &EvalQuestion, error: impl Into<String>, attempts: u32) -> Self {
        let error = error.into();
        Self {
            id: question.id.clone(),
            question: question.question.clone(),
            answer: None,
            label: None,
            routing: None,
            context: None,
            citations: Vec::new(),
            metrics: MetricScores::uniform(crate::evaluation::metrics::MetricValue::Failed(
                "no answer produced".to_string(),
            )),
            success: false,
            error: Some(error),
            attempts,
            completed_at: Utc::now(),
            run_id: None,
        }
    }
}
