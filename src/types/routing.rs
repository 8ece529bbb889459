//! Classification and routing types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Labels the classifier can assign to a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryLabel {
    /// Needs a lookup against the stats tables
    Structured,
    /// Needs similarity search over discussion passages
    Unstructured,
    /// Needs both
    Hybrid,
    /// Refers back to something the classifier could not ground
    ConversationalUnresolved,
    /// Small talk, no retrieval
    Greeting,
}

impl QueryLabel {
    /// Parse a label as written by a model or a config file
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
            .to_ascii_uppercase()
            .replace('-', "_");

        match normalized.as_str() {
            "STRUCTURED" => Some(QueryLabel::Structured),
            "UNSTRUCTURED" => Some(QueryLabel::Unstructured),
            "HYBRID" => Some(QueryLabel::Hybrid),
            "CONVERSATIONAL_UNRESOLVED" => Some(QueryLabel::ConversationalUnresolved),
            "GREETING" => Some(QueryLabel::Greeting),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryLabel::Structured => "STRUCTURED",
            QueryLabel::Unstructured => "UNSTRUCTURED",
            QueryLabel::Hybrid => "HYBRID",
            QueryLabel::ConversationalUnresolved => "CONVERSATIONAL_UNRESOLVED",
            QueryLabel::Greeting => "GREETING",
        }
    }
}

impl fmt::Display for QueryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which decision tier produced a classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum RuleMatch {
    /// A heuristic rule group matched; carries the group id
    Heuristic(String),
    /// Label inherited from the preceding turn through a grounded reference
    Inherited(String),
    /// The model-backed fallback tier decided
    LlmFallback,
    /// Nothing decided; safest broad search
    Default,
}

impl fmt::Display for RuleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleMatch::Heuristic(id) => write!(f, "{}", id),
            RuleMatch::Inherited(id) => write!(f, "inherited:{}", id),
            RuleMatch::LlmFallback => f.write_str("llm-fallback"),
            RuleMatch::Default => f.write_str("default"),
        }
    }
}

/// Classifier output for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: QueryLabel,
    /// Confidence in [0, 1]
    pub confidence: f32,
    pub rule: RuleMatch,
    /// Model rationale when the fallback tier decided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Classification {
    pub fn new(label: QueryLabel, confidence: f32, rule: RuleMatch) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            rule,
            rationale: None,
        }
    }

    /// "Unknown, default to safest broad search"
    pub fn unknown() -> Self {
        Self::new(QueryLabel::Unstructured, 0.0, RuleMatch::Default)
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

/// Retrieval path kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Structured,
    Unstructured,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::Structured => f.write_str("structured"),
            RetrievalMode::Unstructured => f.write_str("unstructured"),
        }
    }
}

/// One retrieval path attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    pub mode: RetrievalMode,
    pub max_results: usize,
}

impl RetrievalRequest {
    pub fn structured(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: RetrievalMode::Structured,
            max_results: 0,
        }
    }

    pub fn unstructured(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            mode: RetrievalMode::Unstructured,
            max_results,
        }
    }
}

/// Route the orchestrator actually took; recorded instead of the label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingTaken {
    StructuredOnly,
    UnstructuredOnly,
    Hybrid,
    /// Structured label, structured path empty or failed, passages used instead
    Fallback,
    /// Hybrid label, structured path failed, passages only
    StructuredFailed,
    Greeting,
}

impl RoutingTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingTaken::StructuredOnly => "structured-only",
            RoutingTaken::UnstructuredOnly => "unstructured-only",
            RoutingTaken::Hybrid => "hybrid",
            RoutingTaken::Fallback => "fallback",
            RoutingTaken::StructuredFailed => "structured-failed",
            RoutingTaken::Greeting => "greeting",
        }
    }
}

impl fmt::Display for RoutingTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_is_lenient_about_decoration() {
        assert_eq!(QueryLabel::parse("structured"), Some(QueryLabel::Structured));
        assert_eq!(QueryLabel::parse(" **HYBRID** "), Some(QueryLabel::Hybrid));
        assert_eq!(
            QueryLabel::parse("conversational-unresolved"),
            Some(QueryLabel::ConversationalUnresolved)
        );
        assert_eq!(QueryLabel::parse("both"), None);
    }

    #[test]
    fn test_classification_clamps_confidence() {
        let c = Classification::new(QueryLabel::Hybrid, 1.7, RuleMatch::LlmFallback);
        assert_eq!(c.confidence, 1.0);
        let c = Classification::new(QueryLabel::Hybrid, -0.2, RuleMatch::LlmFallback);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_unknown_is_broad_search() {
        let c = Classification::unknown();
        assert_eq!(c.label, QueryLabel::Unstructured);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.rule, RuleMatch::Default);
    }

    #[test]
    fn test_routing_serializes_kebab_case() {
        let json = serde_json::to_string(&RoutingTaken::StructuredFailed).unwrap();
        assert_eq!(json, "\"structured-failed\"");
        assert_eq!(RoutingTaken::Fallback.to_string(), "fallback");
    }

    #[test]
    fn test_rule_match_display() {
        assert_eq!(RuleMatch::LlmFallback.to_string(), "llm-fallback");
        assert_eq!(
            RuleMatch::Heuristic("stat_leaders".to_string()).to_string(),
            "stat_leaders"
        );
    }
}
