// Relevance scoring for retrieved passages
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::backends::LanguageModel;
use crate::errors::{PipelineError, Result};
use crate::types::Passage;

/// Default top of the relevance scale
pub const DEFAULT_SCALE_MAX: f32 = 10.0;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(\.\d+)?").expect("number regex is valid"));

/// Scores how well a passage answers a question
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Score on `[0, scale_max()]`
    async fn score(&self, question: &str, passage: &Passage) -> Result<f32>;

    /// Top of the scale
    fn scale_max(&self) -> f32 {
        DEFAULT_SCALE_MAX
    }
}

/// Prompt asking a model to rate one passage
pub fn build_relevance_prompt(question: &str, passage: &str, scale_max: f32) -> String {
    format!(
        "Rate how useful the passage is for answering the question.\n\
         0 means unrelated, {max} means it directly answers the question.\n\
         Passages that only mention the same player or team without addressing the question \
         deserve a low score.\n\n\
         Question: {question}\n\n\
         Passage: {passage}\n\n\
         Reply with a single number from 0 to {max}.",
        max = scale_max,
        question = question.trim(),
        passage = passage.trim(),
    )
}

/// First number in the model output, clamped to the scale
pub fn parse_relevance_score(output: &str, scale_max: f32) -> Option<f32> {
    let m = NUMBER_RE.find(output)?;
    let value: f32 = m.as_str().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(0.0, scale_max))
}

/// Relevance judged by the language model
pub struct LlmRelevanceScorer {
    model: Arc<dyn LanguageModel>,
    scale_max: f32,
}

impl LlmRelevanceScorer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            scale_max: DEFAULT_SCALE_MAX,
        }
    }

    pub fn with_scale(mut self, scale_max: f32) -> Self {
        self.scale_max = scale_max;
        self
    }
}

#[async_trait]
impl RelevanceScorer for LlmRelevanceScorer {
    async fn score(&self, question: &str, passage: &Passage) -> Result<f32> {
        let prompt = build_relevance_prompt(question, &passage.text, self.scale_max);
        let output = self.model.complete(&prompt).await?;
        parse_relevance_score(&output, self.scale_max).ok_or_else(|| {
            PipelineError::Parse(format!("no relevance score in {:?}", output.trim()))
        })
    }

    fn scale_max(&self) -> f32 {
        self.scale_max
    }
}

/// Lexical scorer for offline runs: share of question terms found in the passage
#[derive(Debug, Clone)]
pub struct KeywordRelevanceScorer {
    scale_max: f32,
}

impl KeywordRelevanceScorer {
    pub fn new() -> Self {
        Self {
            scale_max: DEFAULT_SCALE_MAX,
        }
    }

    /// Score on `[0, scale_max]` so thresholds from config line up
    pub fn with_scale(mut self, scale_max: f32) -> Self {
        self.scale_max = scale_max;
        self
    }

    fn compute(&self, question: &str, passage: &str) -> f32 {
        let question_terms: HashSet<String> = content_terms(question);
        if question_terms.is_empty() {
            return 0.0;
        }
        let passage_lower = passage.to_lowercase();
        let matches = question_terms
            .iter()
            .filter(|term| passage_lower.contains(term.as_str()))
            .count();
        (matches as f32 / question_terms.len() as f32) * self.scale_max
    }
}

impl Default for KeywordRelevanceScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn content_terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl RelevanceScorer for KeywordRelevanceScorer {
    async fn score(&self, question: &str, passage: &Passage) -> Result<f32> {
        Ok(self.compute(question, &passage.text))
    }

    fn scale_max(&self) -> f32 {
        self.scale_max
    }
}
