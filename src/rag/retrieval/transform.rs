//! Query transformation for semantic search
//!
//! Intent patterns (why / what makes / explain / impact / compare) map to
//! canonical concept phrases. Entities from earlier structured results are
//! appended, capped, because naming every player drowns out conceptual
//! passages.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "he",
    "her", "him", "his", "how", "i", "in", "is", "it", "its", "me", "of", "on", "or", "she",
    "so", "that", "the", "their", "them", "they", "this", "to", "was", "were", "what", "when",
    "where", "which", "who", "why", "with", "you", "about", "makes", "make", "explain",
    "compare", "vs", "versus", "than",
];

static INTENTS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)^\s*why\b|\bwhy (is|are|was|were|does|do|did)\b", "reasons explanation"),
        (r"(?i)\bwhat makes\b", "strengths qualities"),
        (r"(?i)\b(explain|describe|break down)\b", "explanation breakdown"),
        (r"(?i)\b(impact|influence|effect|affect(s|ed)?)\b", "impact influence"),
        (r"(?i)\b(compare|comparison|versus|vs\.?|better than|worse than)\b", "comparison strengths weaknesses"),
        (r"(?i)\b(considered|regarded|rated|known for|reputation)\b", "reputation perception"),
    ]
    .into_iter()
    .map(|(pattern, concept)| (Regex::new(pattern).expect("intent regex is valid"), concept))
    .collect()
});

/// Search-ready form of a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedQuery {
    pub text: String,
    pub concepts: Vec<String>,
    pub entities: Vec<String>,
}

impl TransformedQuery {
    /// No concept matched; the question is searched as-is
    pub fn is_passthrough(&self) -> bool {
        self.concepts.is_empty()
    }
}

/// Rewrites questions into concept-centric search queries
#[derive(Debug, Clone)]
pub struct QueryTransformer {
    max_entities: usize,
}

impl QueryTransformer {
    pub fn new(max_entities: usize) -> Self {
        Self { max_entities }
    }

    pub fn max_entities(&self) -> usize {
        self.max_entities
    }

    /// Transform `question`, optionally enriched with known entities
    pub fn transform(&self, question: &str, entities: &[String]) -> TransformedQuery {
        let mut concepts: Vec<String> = Vec::new();
        for (regex, concept) in INTENTS.iter() {
            if regex.is_match(question) && !concepts.iter().any(|c| c == concept) {
                concepts.push(concept.to_string());
            }
        }

        if concepts.is_empty() {
            return TransformedQuery {
                text: question.trim().to_string(),
                concepts,
                entities: Vec::new(),
            };
        }

        let question_lower = question.to_lowercase();
        let chosen: Vec<String> = entities
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty() && !question_lower.contains(&e.to_lowercase()))
            .take(self.max_entities)
            .map(str::to_string)
            .collect();

        let mut parts = keywords(question);
        parts.extend(concepts.iter().cloned());
        parts.extend(chosen.iter().cloned());

        TransformedQuery {
            text: parts.join(" "),
            concepts,
            entities: chosen,
        }
    }
}

impl Default for QueryTransformer {
    fn default() -> Self {
        Self::new(2)
    }
}

fn keywords(question: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for raw in question.split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-') {
        let word = raw.trim_matches(|c: char| c == '\'' || c == '-');
        let lower = word.to_lowercase();
        if lower.len() < 2 || STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        if !words.iter().any(|w| w.eq_ignore_ascii_case(word)) {
            words.push(word.to_string());
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_why_question_gets_concepts() {
        let t = QueryTransformer::default();
        let q = t.transform("Why is he considered elite?", &[]);
        assert_eq!(
            q.concepts,
            vec!["reasons explanation".to_string(), "reputation perception".to_string()]
        );
        assert!(q.text.starts_with("considered elite"));
        assert!(!q.is_passthrough());
    }

    #[test]
    fn test_at_most_two_entities_appended() {
        let t = QueryTransformer::default();
        let q = t.transform(
            "Why is he considered elite?",
            &entities(&["Nikola Jokic", "Denver Nuggets", "Jamal Murray", "Aaron Gordon"]),
        );
        assert_eq!(q.entities, entities(&["Nikola Jokic", "Denver Nuggets"]));
        assert!(q.text.ends_with("Nikola Jokic Denver Nuggets"));
        assert!(!q.text.contains("Jamal Murray"));
    }

    #[test]
    fn test_entity_limit_is_configurable() {
        let t = QueryTransformer::new(1);
        let q = t.transform("What makes him great?", &entities(&["A", "B"]));
        assert_eq!(q.entities, entities(&["A"]));
    }

    #[test]
    fn test_entities_already_named_are_skipped() {
        let t = QueryTransformer::default();
        let q = t.transform(
            "Why is Jokic rated so highly?",
            &entities(&["Jokic", "Murray"]),
        );
        assert_eq!(q.entities, entities(&["Murray"]));
    }

    #[test]
    fn test_no_concept_is_passthrough() {
        let t = QueryTransformer::default();
        let q = t.transform("  trade deadline rumors ", &entities(&["A"]));
        assert!(q.is_passthrough());
        assert_eq!(q.text, "trade deadline rumors");
        assert!(q.entities.is_empty());
    }

    #[test]
    fn test_compare_intent() {
        let t = QueryTransformer::default();
        let q = t.transform("Compare Curry versus Lillard from deep", &[]);
        assert_eq!(q.concepts, vec!["comparison strengths weaknesses".to_string()]);
        assert!(q.text.contains("Curry"));
        assert!(q.text.contains("Lillard"));
    }
}
