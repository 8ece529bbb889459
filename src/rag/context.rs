// Context assembly and rendering for answer prompts
use serde::{Deserialize, Serialize};

use crate::types::{Citation, Context, Passage, RetrievalMode, RowSet};

/// Prompt marker for the stats table; passages are numbered from 1
pub const STATS_MARKER: &str = "S";

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Character budget for passage text
    pub max_passage_chars: usize,
    /// Maximum stats rows carried into the prompt
    pub max_rows: usize,
    /// Show relevance scores next to passages
    pub include_scores: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_passage_chars: 6000,
            max_rows: 25,
            include_scores: false,
        }
    }
}

/// Builds bounded contexts and renders them for prompts
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    /// Create new context builder with default config
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Assemble a context from whatever the paths produced
    ///
    /// Passages are taken in order until the character budget is spent;
    /// the first passage is always kept, cut to the budget if needed.
    pub fn build(&self, passages: Vec<Passage>, rows: Option<RowSet>) -> Context {
        let mut kept: Vec<Passage> = Vec::new();
        let mut used = 0usize;

        for mut passage in passages {
            let len = passage.text.chars().count();
            if used + len > self.config.max_passage_chars {
                if kept.is_empty() {
                    passage.text = passage
                        .text
                        .chars()
                        .take(self.config.max_passage_chars)
                        .collect();
                    kept.push(passage);
                }
                break;
            }
            used += len;
            kept.push(passage);
        }

        let rows = rows.filter(|r| !r.is_empty()).map(|mut r| {
            r.rows.truncate(self.config.max_rows);
            r
        });

        let mut contributed = Vec::new();
        if rows.is_some() {
            contributed.push(RetrievalMode::Structured);
        }
        if !kept.is_empty() {
            contributed.push(RetrievalMode::Unstructured);
        }

        Context {
            passages: kept,
            rows,
            contributed,
        }
    }

    /// Render context text for the answer prompt
    pub fn render(&self, context: &Context) -> String {
        let mut sections = Vec::new();

        if let Some(rows) = &context.rows {
            sections.push(format!("[{}] Stats table:\n{}", STATS_MARKER, rows.render()));
        }

        if !context.passages.is_empty() {
            let body: Vec<String> = context
                .passages
                .iter()
                .enumerate()
                .map(|(i, p)| self.format_passage(i + 1, p))
                .collect();
            sections.push(format!("Discussion passages:\n{}", body.join("\n\n")));
        }

        sections.join("\n\n")
    }

    fn format_passage(&self, index: usize, passage: &Passage) -> String {
        match (self.config.include_scores, passage.relevance) {
            (true, Some(score)) => format!(
                "[{}] (source: {}, relevance: {:.1})\n{}",
                index, passage.source, score, passage.text
            ),
            _ => format!("[{}] (source: {})\n{}", index, passage.source, passage.text),
        }
    }

    /// Citations in the numbering used by `render`
    pub fn citations(&self, context: &Context) -> Vec<Citation> {
        let mut citations = Vec::new();

        if let Some(rows) = &context.rows {
            citations.push(Citation {
                marker: STATS_MARKER.to_string(),
                source: rows
                    .generated_query
                    .clone()
                    .unwrap_or_else(|| "stats".to_string()),
                mode: RetrievalMode::Structured,
            });
        }

        citations.extend(context.passages.iter().enumerate().map(|(i, p)| Citation {
            marker: (i + 1).to_string(),
            source: p.source.clone(),
            mode: RetrievalMode::Unstructured,
        }));

        citations
    }

    /// Get current configuration
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
