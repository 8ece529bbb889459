//! Retrieved material and the assembled answer context

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::question::Turn;
use crate::types::routing::{Classification, RetrievalMode, RoutingTaken};

/// Column names whose string values are treated as named entities
const ENTITY_COLUMN_HINTS: &[&str] = &["player", "name", "team"];

/// A discussion snippet from the passage index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub source: String,
    /// Raw similarity reported by the index
    pub similarity: f32,
    /// Relevance assigned by the scorer, on the scorer's scale
    #[serde(default)]
    pub relevance: Option<f32>,
    /// Rank in the candidate list the index returned (0-based)
    #[serde(default)]
    pub position: usize,
}

impl Passage {
    pub fn new(text: impl Into<String>, source: impl Into<String>, similarity: f32) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            similarity,
            relevance: None,
            position: 0,
        }
    }

    /// Score used for filtering and ordering
    pub fn effective_score(&self) -> f32 {
        self.relevance.unwrap_or(0.0)
    }
}

/// Rows returned by the structured engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    #[serde(default)]
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    /// Query the engine generated, when it reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Map<String, Value>>) -> Self {
        Self {
            columns,
            rows,
            generated_query: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Named entities (players, teams) in row order, without duplicates
    pub fn entities(&self) -> Vec<String> {
        let mut entities: Vec<String> = Vec::new();
        for row in &self.rows {
            for column in self.ordered_columns(row) {
                let lower = column.to_lowercase();
                if !ENTITY_COLUMN_HINTS.iter().any(|hint| lower.contains(hint)) {
                    continue;
                }
                if let Some(Value::String(value)) = row.get(column.as_str()) {
                    let value = value.trim();
                    if !value.is_empty() && !entities.iter().any(|e| e == value) {
                        entities.push(value.to_string());
                    }
                }
            }
        }
        entities
    }

    fn ordered_columns(&self, row: &Map<String, Value>) -> Vec<String> {
        if self.columns.is_empty() {
            row.keys().cloned().collect()
        } else {
            self.columns.clone()
        }
    }

    /// Render rows as a pipe-separated table
    pub fn render(&self) -> String {
        let columns: Vec<String> = if self.columns.is_empty() {
            self.rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default()
        } else {
            self.columns.clone()
        };

        let mut lines = vec![columns.join(" | ")];
        for row in &self.rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|c| match row.get(c) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                })
                .collect();
            lines.push(cells.join(" | "));
        }
        lines.join("\n")
    }
}

/// Material attached to exactly one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub passages: Vec<Passage>,
    #[serde(default)]
    pub rows: Option<RowSet>,
    /// Paths that actually contributed data
    #[serde(default)]
    pub contributed: Vec<RetrievalMode>,
}

impl Context {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty() && self.rows.as_ref().map_or(true, RowSet::is_empty)
    }

    pub fn has_structured(&self) -> bool {
        self.contributed.contains(&RetrievalMode::Structured)
    }

    pub fn has_unstructured(&self) -> bool {
        self.contributed.contains(&RetrievalMode::Unstructured)
    }

    /// Entities surfaced by structured rows
    pub fn entities(&self) -> Vec<String> {
        self.rows.as_ref().map(RowSet::entities).unwrap_or_default()
    }
}

/// Source reference carried into the final answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Marker the answer prompt uses for this source: `S` for the stats table, `1`, `2`, ... for passages
    pub marker: String,
    pub source: String,
    pub mode: RetrievalMode,
}

/// What callers get back from one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub routing: RoutingTaken,
    pub classification: Classification,
    pub context: Context,
    /// A referring expression reached the orchestrator ungrounded
    #[serde(default)]
    pub grounding_failed: bool,
}

impl PipelineAnswer {
    /// No path produced anything usable
    pub fn is_cannot_answer(&self) -> bool {
        self.routing != RoutingTaken::Greeting && self.context.is_empty()
    }

    /// Turn to append to the conversation history
    pub fn to_turn(&self, question: &str) -> Turn {
        Turn::new(question, self.answer.clone())
            .with_label(self.classification.label)
            .with_entities(self.context.entities())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rowset_entities_dedup_in_order() {
        let rows = RowSet::new(
            vec!["player_name".into(), "team".into(), "points".into()],
            vec![
                row(json!({"player_name": "A. Star", "team": "OKC", "points": 2484})),
                row(json!({"player_name": "B. Big", "team": "OKC", "points": 2100})),
            ],
        );
        assert_eq!(rows.entities(), vec!["A. Star", "OKC", "B. Big"]);
    }

    #[test]
    fn test_rowset_render() {
        let rows = RowSet::new(
            vec!["player".into(), "points".into()],
            vec![row(json!({"player": "A. Star", "points": 2484}))],
        );
        let rendered = rows.render();
        assert!(rendered.starts_with("player | points"));
        assert!(rendered.contains("A. Star | 2484"));
    }

    #[test]
    fn test_context_emptiness() {
        let mut ctx = Context::empty();
        assert!(ctx.is_empty());
        ctx.rows = Some(RowSet::default());
        assert!(ctx.is_empty());
        ctx.passages.push(Passage::new("text", "thread-1", 0.4));
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_effective_score_defaults_to_zero() {
        let mut p = Passage::new("text", "s", 0.9);
        assert_eq!(p.effective_score(), 0.0);
        p.relevance = Some(8.0);
        assert_eq!(p.effective_score(), 8.0);
    }
}
