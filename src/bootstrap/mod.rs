//! Pipeline bootstrap
//!
//! Builds the orchestrator and its collaborators from `Config`, and checks
//! that the Ollama model the pipeline depends on is available.

use anyhow::{Context as _, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::backends::{
    HttpPassageIndex, HttpStructuredEngine, InMemoryPassageIndex, LanguageModel, OllamaClient,
    PassageIndex, StructuredEngine,
};
use crate::classifier::{QueryClassifier, RuleSet};
use crate::config::{Config, ScorerKind};
use crate::errors::PipelineError;
use crate::evaluation::{LlmMetricEvaluator, MetricEvaluator};
use crate::orchestrator::HybridOrchestrator;
use crate::rag::{
    ContextBuilder, ContextReranker, KeywordRelevanceScorer, LlmRelevanceScorer, RelevanceScorer,
};
use crate::telemetry::PipelineTelemetry;

/// Ollama API tags response
#[derive(Debug, Deserialize, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

/// Model information from Ollama API
#[derive(Debug, Deserialize, Serialize)]
struct ModelInfo {
    name: String,
}

/// Bootstrap check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStatus {
    Ready,
    OllamaNotRunning,
    ModelNotAvailable(String),
}

/// Exit code for setup needed
pub const EXIT_CODE_SETUP_NEEDED: i32 = 2;

/// Wired pipeline ready to answer questions
pub struct Pipeline {
    pub orchestrator: Arc<HybridOrchestrator>,
    pub evaluator: Arc<dyn MetricEvaluator>,
    pub telemetry: PipelineTelemetry,
}

/// Build every collaborator described by `config`
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let model: Arc<dyn LanguageModel> = Arc::new(
        OllamaClient::with_config(
            &config.model.ollama_url,
            &config.model.name,
            Duration::from_secs(config.model.timeout_secs),
        )
        .context("Failed to create Ollama client")?
        .with_temperature(config.model.temperature),
    );

    let backend_timeout = Duration::from_secs(config.backends.timeout_secs);
    let structured: Arc<dyn StructuredEngine> = Arc::new(
        HttpStructuredEngine::new(&config.backends.structured_url, backend_timeout)
            .context("Failed to create structured engine client")?,
    );
    let index = build_passage_index(config, backend_timeout)?;

    let scorer = build_scorer(config, model.clone());

    let classifier = QueryClassifier::new(RuleSet::default_rules())
        .with_model(model.clone())
        .with_config(config.classifier.clone());

    let reranker = ContextReranker::with_config(index, scorer, config.reranker.to_rerank_config());
    let telemetry = PipelineTelemetry::new();

    let orchestrator = HybridOrchestrator::new(classifier, structured, reranker, model.clone())
        .with_context_builder(ContextBuilder::with_config(config.context.clone()))
        .with_telemetry(telemetry.clone());

    info!(
        model = %config.model.name,
        structured = %config.backends.structured_url,
        "pipeline ready"
    );

    Ok(Pipeline {
        orchestrator: Arc::new(orchestrator),
        evaluator: Arc::new(LlmMetricEvaluator::new(model)),
        telemetry,
    })
}

/// Relevance scorer on the configured scale, so the threshold means the same thing for both kinds
fn build_scorer(config: &Config, model: Arc<dyn LanguageModel>) -> Arc<dyn RelevanceScorer> {
    let scale_max = config.reranker.scale_max;
    match config.reranker.scorer {
        ScorerKind::Llm => Arc::new(LlmRelevanceScorer::new(model).with_scale(scale_max)),
        ScorerKind::Keyword => Arc::new(KeywordRelevanceScorer::new().with_scale(scale_max)),
    }
}

fn build_passage_index(config: &Config, timeout: Duration) -> Result<Arc<dyn PassageIndex>> {
    if let Some(path) = &config.backends.corpus_path {
        let index = InMemoryPassageIndex::from_jsonl(path)?;
        info!(path = %path.display(), passages = index.len(), "loaded local corpus");
        return Ok(Arc::new(index));
    }

    match &config.backends.passage_index_url {
        Some(url) => Ok(Arc::new(
            HttpPassageIndex::new(url, timeout).context("Failed to create passage index client")?,
        )),
        None => Err(PipelineError::Config(
            "backends.passage_index_url or backends.corpus_path must be set".to_string(),
        )
        .into()),
    }
}

/// Ollama availability check
pub struct Bootstrap {
    client: Client,
    ollama_url: String,
}

impl Bootstrap {
    pub fn new(ollama_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            ollama_url: ollama_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get list of available models; `None` when Ollama is unreachable
    pub async fn list_models(&self) -> Option<Vec<String>> {
        let url = format!("{}/api/tags", self.ollama_url);
        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let tags: TagsResponse = response.json().await.ok()?;
        Some(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Run complete bootstrap check
    pub async fn check(&self, model_tag: &str) -> BootstrapStatus {
        match self.list_models().await {
            None => BootstrapStatus::OllamaNotRunning,
            Some(models) if models.iter().any(|m| m == model_tag) => BootstrapStatus::Ready,
            Some(_) => BootstrapStatus::ModelNotAvailable(model_tag.to_string()),
        }
    }

    /// Setup instructions for a failed check
    pub fn instructions(status: &BootstrapStatus) -> Option<String> {
        match status {
            BootstrapStatus::Ready => None,
            BootstrapStatus::OllamaNotRunning => Some(
                "Ollama is not running.\n\
                 Start it with:   ollama serve\n\
                 Install it from: https://ollama.com/download"
                    .to_string(),
            ),
            BootstrapStatus::ModelNotAvailable(model) => Some(format!(
                "Model '{}' is not available.\n\
                 Download it with: ollama pull {}\n\
                 Or set [model] name in the config file.",
                model, model
            )),
        }
    }
}
