//! Query classifier
//!
//! Two tiers: an ordered heuristic rule table, then a model-backed
//! fallback for questions the rules miss or follow-ups whose references
//! cannot be grounded. The classifier never fails; the worst outcome is
//! `UNSTRUCTURED` with confidence 0.

pub mod rules;
pub mod grounding;
pub mod prompt;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backends::LanguageModel;
use crate::types::{Classification, QueryLabel, RuleMatch, Turn};

pub use grounding::{find_referring_expression, ReferentKind, ReferringExpression};
pub use rules::{RuleGroup, RuleGroupSpec, RuleSet};

/// Classifier tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Consult the model when rules miss or grounding fails
    pub fallback_enabled: bool,
    /// Rule groups below this confidence defer to the model when one is available
    pub heuristic_threshold: f32,
    /// Confidence for a label inherited from the previous turn
    pub inherited_confidence: f32,
    /// Confidence for a cleanly parsed fallback answer
    pub fallback_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            heuristic_threshold: 0.8,
            inherited_confidence: 0.85,
            fallback_confidence: 0.6,
        }
    }
}

/// Routes a question to a label
pub struct QueryClassifier {
    rules: RuleSet,
    model: Option<Arc<dyn LanguageModel>>,
    config: ClassifierConfig,
}

impl QueryClassifier {
    /// Heuristics only
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            model: None,
            config: ClassifierConfig::default(),
        }
    }

    /// Attach the model used by the fallback tier
    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Heuristic tier alone; pure and deterministic
    pub fn classify_heuristic(&self, question: &str) -> Option<Classification> {
        self.rules.first_match(question.trim()).map(|group| {
            Classification::new(
                group.label(),
                group.confidence(),
                RuleMatch::Heuristic(group.id().to_string()),
            )
        })
    }

    /// Whether a classification clears the heuristic threshold
    pub fn is_confident(&self, classification: &Classification) -> bool {
        classification.confidence >= self.config.heuristic_threshold
    }

    /// Classify a question given the prior turns
    pub async fn classify(&self, question: &str, history: &[Turn]) -> Classification {
        let text = question.trim();
        if text.is_empty() {
            return Classification::unknown();
        }

        let heuristic = self.rules.first_match(text);

        // With no prior turn there is nothing to refer back to
        if let Some(previous) = history.last() {
            if let Some(expression) = find_referring_expression(text) {
                let subject = grounding::subject_of(previous);
                let grounded = previous
                    .label
                    .filter(|label| is_retrieval_label(*label))
                    .filter(|_| grounding::antecedent_matches(expression.kind, subject));

                return match grounded {
                    Some(previous_label) => {
                        let classification = self.ground(heuristic, previous_label);
                        debug!(
                            reference = %expression.text,
                            previous = %previous_label,
                            label = %classification.label,
                            "follow-up grounded on previous turn"
                        );
                        classification
                    }
                    // A confident rule that does not lean on the previous turn still decides
                    None => match heuristic {
                        Some(group)
                            if !group.is_follow_up()
                                && group.confidence() >= self.config.heuristic_threshold =>
                        {
                            debug!(
                                reference = %expression.text,
                                rule = group.id(),
                                "reference not grounded, keeping confident heuristic match"
                            );
                            Classification::new(
                                group.label(),
                                group.confidence(),
                                RuleMatch::Heuristic(group.id().to_string()),
                            )
                        }
                        _ => {
                            debug!(
                                reference = %expression.text,
                                ?subject,
                                previous = ?previous.label,
                                "reference not grounded, using fallback tier"
                            );
                            self.fallback(text, history, true).await
                        }
                    },
                };
            }
        }

        match heuristic {
            Some(group) if group.confidence() >= self.config.heuristic_threshold || !self.fallback_available() => {
                debug!(rule = group.id(), label = %group.label(), "heuristic match");
                Classification::new(
                    group.label(),
                    group.confidence(),
                    RuleMatch::Heuristic(group.id().to_string()),
                )
            }
            _ => self.fallback(text, history, false).await,
        }
    }

    /// Combine the current rule match with the previous turn's label
    fn ground(&self, heuristic: Option<&RuleGroup>, previous: QueryLabel) -> Classification {
        let inherited = self.config.inherited_confidence;

        match heuristic {
            Some(group) => match (group.label(), previous) {
                // A conceptual question about a subject we looked up needs both paths
                (QueryLabel::Unstructured, QueryLabel::Structured | QueryLabel::Hybrid) => {
                    Classification::new(
                        QueryLabel::Hybrid,
                        group.confidence().min(inherited),
                        RuleMatch::Inherited(group.id().to_string()),
                    )
                }
                (label, _) => Classification::new(
                    label,
                    group.confidence(),
                    RuleMatch::Heuristic(group.id().to_string()),
                ),
            },
            None => Classification::new(
                previous,
                inherited,
                RuleMatch::Inherited("previous_turn".to_string()),
            ),
        }
    }

    fn fallback_available(&self) -> bool {
        self.config.fallback_enabled && self.model.is_some()
    }

    /// Model-backed tier; `unresolved` marks an ungrounded reference
    async fn fallback(&self, question: &str, history: &[Turn], unresolved: bool) -> Classification {
        let unavailable = || {
            if unresolved {
                Classification::new(QueryLabel::ConversationalUnresolved, 0.0, RuleMatch::Default)
            } else {
                Classification::unknown()
            }
        };

        let model = match &self.model {
            Some(model) if self.config.fallback_enabled => model,
            _ => return unavailable(),
        };

        let prompt = prompt::build_classification_prompt(question, history);
        match model.complete(&prompt).await {
            Ok(output) => match prompt::parse_classification(&output) {
                Some((label, rationale)) => {
                    debug!(label = %label, "fallback tier classified");
                    Classification::new(label, self.config.fallback_confidence, RuleMatch::LlmFallback)
                        .with_rationale(rationale)
                }
                None => {
                    warn!(output = %output.trim(), "unparseable fallback classification");
                    Classification::new(QueryLabel::Unstructured, 0.0, RuleMatch::LlmFallback)
                }
            },
            Err(e) => {
                warn!(error = %e, "fallback classification call failed");
                unavailable()
            }
        }
    }
}

fn is_retrieval_label(label: QueryLabel) -> bool {
    matches!(
        label,
        QueryLabel::Structured | QueryLabel::Unstructured | QueryLabel::Hybrid
    )
}
