//! Hybrid orchestrator
//!
//! Classifies a question, runs the retrieval path(s) the label calls for,
//! applies fallback when a path comes back empty, and hands the merged
//! context to the model. Retrieval failures are absorbed per path; only a
//! failing answer call surfaces as an error.

pub mod generation;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::backends::{LanguageModel, StructuredEngine, StructuredOutcome};
use crate::classifier::{find_referring_expression, QueryClassifier};
use crate::errors::{PipelineError, Result};
use crate::rag::{ContextBuilder, ContextReranker};
use crate::telemetry::{PathFailure, PipelineTelemetry};
use crate::types::{
    Classification, Context, Passage, PipelineAnswer, Question, QueryLabel, RetrievalMode,
    RoutingTaken, RowSet,
};

pub use generation::{build_answer_prompt, greeting_response, INSUFFICIENT_INFORMATION};
pub use state::{RouteEvent, RouteState};

/// Routes questions across the structured and unstructured paths
pub struct HybridOrchestrator {
    classifier: QueryClassifier,
    structured: Arc<dyn StructuredEngine>,
    reranker: ContextReranker,
    model: Arc<dyn LanguageModel>,
    context_builder: ContextBuilder,
    telemetry: PipelineTelemetry,
}

impl HybridOrchestrator {
    pub fn new(
        classifier: QueryClassifier,
        structured: Arc<dyn StructuredEngine>,
        reranker: ContextReranker,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            classifier,
            structured,
            reranker,
            model,
            context_builder: ContextBuilder::new(),
            telemetry: PipelineTelemetry::new(),
        }
    }

    pub fn with_context_builder(mut self, builder: ContextBuilder) -> Self {
        self.context_builder = builder;
        self
    }

    /// Share a telemetry collector with the caller
    pub fn with_telemetry(mut self, telemetry: PipelineTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn telemetry(&self) -> &PipelineTelemetry {
        &self.telemetry
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    /// Answer one question
    ///
    /// Always produces exactly one context and one answer. When no path
    /// contributes anything the answer is `INSUFFICIENT_INFORMATION` and
    /// the model is not called.
    pub async fn answer(&self, question: &Question) -> Result<PipelineAnswer> {
        let classification = self
            .classifier
            .classify(&question.text, &question.history)
            .await;
        debug!(
            label = %classification.label,
            confidence = classification.confidence,
            rule = %classification.rule,
            "classified"
        );

        let state = RouteState::Start.transition(RouteEvent::Classified(classification.label))?;

        let (state, rows, passages) = match state {
            RouteState::Greeting => {
                return Ok(self.finish_greeting(question, classification));
            }
            RouteState::AwaitStructured => match self.structured_path(question).await {
                Some(rows) => (state.transition(RouteEvent::StructuredRows)?, Some(rows), Vec::new()),
                None => {
                    let fallback = state.transition(RouteEvent::StructuredEmpty)?;
                    info!("structured path empty, falling back to discussion search");
                    let passages = self.unstructured_path(question).await;
                    (fallback.transition(RouteEvent::PassagesReady)?, None, passages)
                }
            },
            RouteState::AwaitUnstructured => {
                let passages = self.unstructured_path(question).await;
                (state.transition(RouteEvent::PassagesReady)?, None, passages)
            }
            RouteState::AwaitBoth => {
                let (rows, passages) =
                    tokio::join!(self.structured_path(question), self.unstructured_path(question));
                let next = state.transition(RouteEvent::BothJoined {
                    structured_ok: rows.is_some(),
                })?;
                (next, rows, passages)
            }
            other => {
                return Err(PipelineError::InvalidTransition {
                    from: format!("{:?}", other),
                    event: "dispatch".to_string(),
                })
            }
        };

        let routing = state.routing().ok_or_else(|| PipelineError::InvalidTransition {
            from: format!("{:?}", state),
            event: "finish".to_string(),
        })?;
        debug!(state = state.display_name(), routing = %routing, "route finished");

        let context = self.context_builder.build(passages, rows);
        self.finish(question, classification, routing, context).await
    }

    /// `answer`, abandoned after `timeout`
    ///
    /// Dropping the future cancels any retrieval or model call in flight.
    pub async fn answer_with_timeout(
        &self,
        question: &Question,
        timeout: Duration,
    ) -> Result<PipelineAnswer> {
        tokio::time::timeout(timeout, self.answer(question))
            .await
            .map_err(|_| PipelineError::Timeout {
                duration_ms: timeout.as_millis() as u64,
            })?
    }

    fn finish_greeting(&self, question: &Question, classification: Classification) -> PipelineAnswer {
        self.telemetry
            .route_taken(classification.label, RoutingTaken::Greeting);
        PipelineAnswer {
            answer: greeting_response(&question.text).to_string(),
            citations: Vec::new(),
            routing: RoutingTaken::Greeting,
            classification,
            context: Context::empty(),
            grounding_failed: false,
        }
    }

    async fn finish(
        &self,
        question: &Question,
        classification: Classification,
        routing: RoutingTaken,
        context: Context,
    ) -> Result<PipelineAnswer> {
        let grounding_failed = classification.label == QueryLabel::ConversationalUnresolved;

        let answer = if context.is_empty() {
            INSUFFICIENT_INFORMATION.to_string()
        } else {
            let rendered = self.context_builder.render(&context);
            let prompt = build_answer_prompt(&question.text, &rendered, &question.history);
            self.model.complete(&prompt).await?.trim().to_string()
        };

        self.telemetry.route_taken(classification.label, routing);

        Ok(PipelineAnswer {
            answer,
            citations: self.context_builder.citations(&context),
            routing,
            classification,
            context,
            grounding_failed,
        })
    }

    /// Rows from the structured engine, or `None` when the path produced nothing
    async fn structured_path(&self, question: &Question) -> Option<RowSet> {
        let query = contextualize(question);
        let (cause, reason) = match self.structured.run(&query).await {
            Ok(StructuredOutcome::Rows(rows)) if !rows.is_empty() => return Some(rows),
            Ok(StructuredOutcome::Rows(_)) => {
                (PathFailure::NoRows, "query matched no rows".to_string())
            }
            Ok(StructuredOutcome::NoAnswer { reason }) => (PathFailure::NoAnswer, reason),
            Err(e) => (PathFailure::Error, e.to_string()),
        };
        self.telemetry
            .path_failed(RetrievalMode::Structured, cause, reason);
        None
    }

    /// Re-ranked passages, empty when the path failed
    async fn unstructured_path(&self, question: &Question) -> Vec<Passage> {
        let entities = question
            .last_turn()
            .map(|turn| turn.entities.clone())
            .unwrap_or_default();

        match self.reranker.retrieve(&question.text, &entities).await {
            Ok(result) => {
                if result.passages.is_empty() {
                    self.telemetry
                        .path_failed(RetrievalMode::Unstructured, PathFailure::NoPassages, "no passages retrieved");
                }
                result.passages
            }
            Err(e) => {
                self.telemetry
                    .path_failed(RetrievalMode::Unstructured, PathFailure::Error, e.to_string());
                Vec::new()
            }
        }
    }
}

/// Structured query text, with the previous turn's subject attached to pronoun follow-ups
fn contextualize(question: &Question) -> String {
    let text = question.text.trim();
    if find_referring_expression(text).is_none() {
        return text.to_string();
    }
    match question.last_turn().and_then(|turn| turn.entities.first()) {
        Some(entity) => format!("{} (referring to: {})", text, entity),
        None => text.to_string(),
    }
}
