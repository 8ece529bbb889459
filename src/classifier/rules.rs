//! Heuristic routing rules
//!
//! An ordered, immutable list of rule groups. Groups are tried in order
//! and the first group with any matching pattern wins, so specific
//! phrasings ("most discussed") must sit ahead of broad trigger words
//! ("most ... points").

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{PipelineError, Result};
use crate::types::QueryLabel;

/// Serializable form of a rule group, as written in config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroupSpec {
    pub id: String,
    pub label: QueryLabel,
    pub confidence: f32,
    pub patterns: Vec<String>,
    /// Only meaningful when a pronoun points back at the previous turn
    #[serde(default)]
    pub follow_up: bool,
}

/// Compiled rule group
#[derive(Debug, Clone)]
pub struct RuleGroup {
    id: String,
    label: QueryLabel,
    confidence: f32,
    patterns: Vec<Regex>,
    follow_up: bool,
}

impl RuleGroup {
    pub fn compile(spec: &RuleGroupSpec) -> Result<Self> {
        if spec.patterns.is_empty() {
            return Err(PipelineError::Config(format!(
                "rule group '{}' has no patterns",
                spec.id
            )));
        }
        if !(0.0..=1.0).contains(&spec.confidence) {
            return Err(PipelineError::Config(format!(
                "rule group '{}' confidence {} outside [0, 1]",
                spec.id, spec.confidence
            )));
        }

        let patterns = spec
            .patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        PipelineError::Config(format!("rule group '{}': {}", spec.id, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: spec.id.clone(),
            label: spec.label,
            confidence: spec.confidence,
            patterns,
            follow_up: spec.follow_up,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> QueryLabel {
        self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn is_follow_up(&self) -> bool {
        self.follow_up
    }

    pub fn matches(&self, question: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(question))
    }
}

/// Ordered rule table handed to the classifier at construction
#[derive(Debug, Clone)]
pub struct RuleSet {
    groups: Vec<RuleGroup>,
}

impl RuleSet {
    /// Compile specs in priority order; duplicate ids are rejected
    pub fn from_specs(specs: &[RuleGroupSpec]) -> Result<Self> {
        let mut groups: Vec<RuleGroup> = Vec::with_capacity(specs.len());
        for spec in specs {
            if groups.iter().any(|g| g.id == spec.id) {
                return Err(PipelineError::Config(format!(
                    "duplicate rule group id '{}'",
                    spec.id
                )));
            }
            groups.push(RuleGroup::compile(spec)?);
        }
        Ok(Self { groups })
    }

    /// The built-in basketball routing table, or the compile error
    pub fn try_default() -> Result<Self> {
        Self::from_specs(&default_specs())
    }

    /// The built-in basketball routing table; empty (and logged) if it fails to compile
    pub fn default_rules() -> Self {
        match Self::try_default() {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "built-in routing rules failed to compile, heuristics disabled");
                Self { groups: Vec::new() }
            }
        }
    }

    /// First group that matches, in priority order
    pub fn first_match(&self, question: &str) -> Option<&RuleGroup> {
        self.groups.iter().find(|g| g.matches(question))
    }

    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::default_rules()
    }
}

fn spec(id: &str, label: QueryLabel, confidence: f32, patterns: &[&str]) -> RuleGroupSpec {
    RuleGroupSpec {
        id: id.to_string(),
        label,
        confidence,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        follow_up: false,
    }
}

const STAT_TERMS: &str = r"(points?|rebounds?|assists?|steals?|blocks?|turnovers?|minutes|games|wins|losses|percentage|ppg|rpg|apg|triple[- ]doubles?|double[- ]doubles?|three[- ]pointers?|threes|free throws?|field goals?|record)";

/// Default rule specs, highest priority first
pub fn default_specs() -> Vec<RuleGroupSpec> {
    let stat_comparison = format!(r"\b(compare|comparison|versus|vs\.?)\b.*\b(stats?|numbers|averages?|{})", STAT_TERMS);
    let stat_then_why = format!(r"\b{}\b.*\b(and|but) (why|how come|what do (fans|people) think)\b", STAT_TERMS);
    let leader_terms = format!(r"\b(most|fewest|least|highest|lowest|top|leading|leader|leaders|average|averages|averaged|total|how many|how much|career|season)\b.*\b{}\b", STAT_TERMS);
    let followup = format!(r"^\s*(what|how) about (his|her|their|the)\b.*\b{}\b", STAT_TERMS);

    vec![
        spec(
            "greeting",
            QueryLabel::Greeting,
            0.95,
            &[r"^\s*(hi|hello|hey|yo|howdy|greetings|sup|good (morning|afternoon|evening)|thanks|thank you|thx|bye|goodbye|see you)( there| again| so much)?[\s!.,?]*$"],
        ),
        spec(
            "discussion_topics",
            QueryLabel::Unstructured,
            0.93,
            &[
                r"\bmost (discussed|talked[- ]about|debated|controversial|mentioned|hyped)\b",
                r"\b(fans|people|reddit|redditors|users|commenters|everyone|analysts)\s+(think|thinks|say|saying|said|feel|believe|argue|arguing|complain|complaining)\b",
                r"\b(discussion|debate|opinion|sentiment|narrative|hot take|rumou?r)s?\b",
            ],
        ),
        spec(
            "stat_explanation",
            QueryLabel::Hybrid,
            0.9,
            &[
                r"\bwhy (is|are|was|were|does|do|did)\b.*\b(best|elite|leader|leading|top|mvp|better|worse|great|greatest|dominant|efficient|underrated|overrated)\b",
                stat_comparison.as_str(),
                stat_then_why.as_str(),
            ],
        ),
        spec(
            "stat_leaders",
            QueryLabel::Structured,
            0.92,
            &[
                leader_terms.as_str(),
                r"\bwho (scored|leads|led|has the most|had the most|averaged)\b",
                r"\b(stats|statistics|stat line|box score|standings|per game)\b",
            ],
        ),
        RuleGroupSpec {
            follow_up: true,
            ..spec("stat_followup", QueryLabel::Structured, 0.86, &[followup.as_str()])
        },
        spec(
            "conceptual",
            QueryLabel::Unstructured,
            0.85,
            &[
                r"^\s*(why|how come|explain|what makes|what do you think|describe)\b",
                r"\b(impact|influence|legacy|reputation|playstyle|play style|style of play|considered|known for)\b",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_of(rules: &RuleSet, q: &str) -> Option<(String, QueryLabel)> {
        rules
            .first_match(q)
            .map(|g| (g.id().to_string(), g.label()))
    }

    #[test]
    fn test_default_rules_compile() {
        let rules = RuleSet::try_default().unwrap();
        assert_eq!(rules.len(), default_specs().len());
        assert_eq!(RuleSet::default_rules().len(), rules.len());
    }

    #[test]
    fn test_only_followup_group_leans_on_previous_turn() {
        let rules = RuleSet::default_rules();
        let followups: Vec<&str> = rules
            .groups()
            .iter()
            .filter(|g| g.is_follow_up())
            .map(|g| g.id())
            .collect();
        assert_eq!(followups, vec!["stat_followup"]);
        assert!(rules.first_match("What about his assists?").unwrap().is_follow_up());
    }

    #[test]
    fn test_stat_leader_question() {
        let rules = RuleSet::default_rules();
        assert_eq!(
            label_of(&rules, "Who scored the most points this season?"),
            Some(("stat_leaders".to_string(), QueryLabel::Structured))
        );
    }

    #[test]
    fn test_specific_discussion_pattern_beats_generic_most() {
        let rules = RuleSet::default_rules();
        assert_eq!(
            label_of(&rules, "What was the most discussed topic about points scored in the finals?"),
            Some(("discussion_topics".to_string(), QueryLabel::Unstructured))
        );
    }

    #[test]
    fn test_explanation_routes_hybrid() {
        let rules = RuleSet::default_rules();
        assert_eq!(
            label_of(&rules, "Why is he considered elite?").map(|(_, l)| l),
            Some(QueryLabel::Hybrid)
        );
    }

    #[test]
    fn test_greeting_only_when_whole_message() {
        let rules = RuleSet::default_rules();
        assert_eq!(
            label_of(&rules, "Hey there!").map(|(_, l)| l),
            Some(QueryLabel::Greeting)
        );
        assert_ne!(
            label_of(&rules, "hey who has the most rebounds").map(|(_, l)| l),
            Some(QueryLabel::Greeting)
        );
    }

    #[test]
    fn test_farewell_is_greeting() {
        let rules = RuleSet::default_rules();
        assert_eq!(label_of(&rules, "Bye!").map(|(_, l)| l), Some(QueryLabel::Greeting));
        assert_eq!(label_of(&rules, "Goodbye").map(|(_, l)| l), Some(QueryLabel::Greeting));
    }

    #[test]
    fn test_no_match() {
        let rules = RuleSet::default_rules();
        assert!(rules.first_match("Tell me something").is_none());
    }

    #[test]
    fn test_priority_is_order_not_pattern_length() {
        let specs = vec![
            spec("short", QueryLabel::Unstructured, 0.9, &["most"]),
            spec("long", QueryLabel::Structured, 0.9, &["most points this season"]),
        ];
        let rules = RuleSet::from_specs(&specs).unwrap();
        assert_eq!(
            rules.first_match("most points this season").unwrap().id(),
            "short"
        );
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let bad_regex = vec![spec("x", QueryLabel::Hybrid, 0.9, &["(unclosed"])];
        assert!(RuleSet::from_specs(&bad_regex).is_err());

        let dup = vec![
            spec("x", QueryLabel::Hybrid, 0.9, &["a"]),
            spec("x", QueryLabel::Hybrid, 0.9, &["b"]),
        ];
        assert!(RuleSet::from_specs(&dup).is_err());

        let bad_conf = vec![spec("x", QueryLabel::Hybrid, 1.5, &["a"])];
        assert!(RuleSet::from_specs(&bad_conf).is_err());

        let empty = vec![spec("x", QueryLabel::Hybrid, 0.5, &[])];
        assert!(RuleSet::from_specs(&empty).is_err());
    }
}
