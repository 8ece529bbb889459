//! Scripted backends shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use courtside::backends::{
    InMemoryPassageIndex, LanguageModel, PassageIndex, StructuredEngine, StructuredOutcome,
};
use courtside::classifier::{QueryClassifier, RuleSet};
use courtside::evaluation::MetricEvaluator;
use courtside::orchestrator::HybridOrchestrator;
use courtside::rag::{ContextReranker, KeywordRelevanceScorer, RelevanceScorer};
use courtside::types::{Passage, RowSet};
use courtside::{PipelineError, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Season scoring leaders, best first
pub fn leader_rows() -> RowSet {
    let rows = [
        json!({"player": "Luka Doncic", "points": 2370}),
        json!({"player": "Shai Gilgeous-Alexander", "points": 2254}),
    ];
    RowSet::new(
        vec!["player".to_string(), "points".to_string()],
        rows.iter().filter_map(|r| r.as_object().cloned()).collect(),
    )
}

pub enum EngineMode {
    Leaders,
    Empty,
    Fail,
    /// Sleeps for `delay` on the first `times` calls, then returns the leaders
    Stall { delay: Duration, times: usize },
}

/// Structured engine returning a fixed result
pub struct StatsEngine {
    mode: EngineMode,
    pub calls: AtomicUsize,
    /// Calls that ran to completion
    pub finished: AtomicUsize,
}

impl StatsEngine {
    pub fn new(mode: EngineMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StructuredEngine for StatsEngine {
    async fn run(&self, _question: &str) -> Result<StructuredOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let EngineMode::Stall { delay, times } = self.mode {
            if call < times {
                tokio::time::sleep(delay).await;
            }
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            EngineMode::Leaders | EngineMode::Stall { .. } => {
                let mut rows = leader_rows();
                rows.rows.truncate(1);
                Ok(StructuredOutcome::Rows(rows))
            }
            EngineMode::Empty => Ok(StructuredOutcome::Rows(RowSet::default())),
            EngineMode::Fail => Err(PipelineError::StructuredEngine(
                "SQL generation failed".to_string(),
            )),
        }
    }
}

/// Discussion threads about the scoring leader
pub fn discussion_index() -> InMemoryPassageIndex {
    let mut index = InMemoryPassageIndex::new();
    index.insert(
        "Luka is considered elite because his step-back three is nearly unguardable.",
        "r/nba/elite-luka",
    );
    index.insert(
        "Fans think his playmaking makes him elite; he reads the pick and roll better than anyone.",
        "r/mavericks/playmaking",
    );
    index.insert("The trade deadline rumors are mostly noise.", "r/nba/deadline");
    index
}

/// Model double: answers from whatever context the prompt carries
pub struct ContextEchoModel {
    pub calls: AtomicUsize,
}

impl ContextEchoModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LanguageModel for ContextEchoModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("2370") {
            Ok("Luka Doncic scored the most points this season with 2370.".to_string())
        } else if prompt.contains("step-back") {
            Ok("His step-back three makes him elite [1].".to_string())
        } else {
            Ok("Not enough information.".to_string())
        }
    }
}

/// Passage index that always errors
pub struct BrokenIndex;

#[async_trait]
impl PassageIndex for BrokenIndex {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<Passage>> {
        Err(PipelineError::PassageIndex("index offline".to_string()))
    }
}

/// Orchestrator over the scripted backends with keyword re-ranking
pub fn orchestrator(
    engine: Arc<StatsEngine>,
    index: Arc<dyn PassageIndex>,
    model: Arc<dyn LanguageModel>,
) -> HybridOrchestrator {
    let scorer: Arc<dyn RelevanceScorer> = Arc::new(KeywordRelevanceScorer::new());
    let reranker = ContextReranker::new(index, scorer);
    HybridOrchestrator::new(
        QueryClassifier::new(RuleSet::default_rules()),
        engine,
        reranker,
        model,
    )
}

/// Fails the first `failures[question]` answer calls for a question with a
/// transient error, then answers
pub struct FlakyModel {
    failures: Mutex<HashMap<String, usize>>,
    fatal_for: Option<String>,
}

impl FlakyModel {
    pub fn new(failures: &[(&str, usize)]) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(failures.iter().map(|(q, n)| (q.to_string(), *n)).collect()),
            fatal_for: None,
        })
    }

    /// Always fail questions containing `marker` with a non-retryable error
    pub fn fatal(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(HashMap::new()),
            fatal_for: Some(marker.to_string()),
        })
    }
}

#[async_trait]
impl LanguageModel for FlakyModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Some(marker) = &self.fatal_for {
            if prompt.contains(marker.as_str()) {
                return Err(PipelineError::MalformedInput("prompt rejected".to_string()));
            }
        }
        let mut failures = self.failures.lock().unwrap();
        for (question, remaining) in failures.iter_mut() {
            if prompt.contains(question.as_str()) && *remaining > 0 {
                *remaining -= 1;
                return Err(PipelineError::RateLimited {
                    provider: "ollama".to_string(),
                    message: "too many requests".to_string(),
                });
            }
        }
        Ok("Luka Doncic, 2370 points.".to_string())
    }
}

/// Metric judge with fixed answers
pub struct FixedJudge {
    pub calls: AtomicUsize,
}

impl FixedJudge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MetricEvaluator for FixedJudge {
    async fn faithfulness(&self, _answer: &str, _context: &str) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(1.0)
    }

    async fn answer_correctness(&self, _q: &str, _a: &str, _gt: &str) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(0.5)
    }

    async fn passage_relevant(&self, _q: &str, _p: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn relevant_sentences(&self, _q: &str, _c: &str) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }

    async fn context_recall(&self, _gt: &str, _c: &str) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(1.0)
    }
}
