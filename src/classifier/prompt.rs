//! Fallback-tier prompt construction and output parsing
//!
//! Both halves are pure so prompt-format regressions show up in unit
//! tests without a model.

use crate::types::{QueryLabel, Turn};

/// Labels the fallback tier may answer with
pub const FALLBACK_LABELS: [QueryLabel; 4] = [
    QueryLabel::Structured,
    QueryLabel::Unstructured,
    QueryLabel::Hybrid,
    QueryLabel::Greeting,
];

/// Prior turns included in the prompt
const MAX_HISTORY_TURNS: usize = 3;

/// Build the routing prompt for a question and its recent history
pub fn build_classification_prompt(question: &str, history: &[Turn]) -> String {
    let mut prompt = String::from(
        "You route basketball questions to a data source.\n\n\
         Labels:\n\
         - STRUCTURED: needs numbers from the stats tables (points, rebounds, records, leaders)\n\
         - UNSTRUCTURED: needs fan discussion, opinions, narratives or explanations\n\
         - HYBRID: needs both stats and discussion (e.g. why a statistically strong player is rated highly)\n\
         - GREETING: small talk, no lookup needed\n\n",
    );

    let recent: Vec<&Turn> = history.iter().rev().take(MAX_HISTORY_TURNS).collect();
    if !recent.is_empty() {
        prompt.push_str("Conversation so far (oldest first):\n");
        for turn in recent.into_iter().rev() {
            prompt.push_str(&format!("User: {}\n", turn.question.trim()));
            prompt.push_str(&format!("Assistant: {}\n", turn.answer.trim()));
            if let Some(label) = turn.label {
                prompt.push_str(&format!("(routed as {})\n", label));
            }
        }
        prompt.push_str(
            "\nResolve pronouns such as \"he\", \"his\" or \"their\" against the conversation before choosing.\n\n",
        );
    }

    prompt.push_str(&format!("Question: {}\n\n", question.trim()));
    prompt.push_str(
        "Respond with exactly two lines:\n\
         LABEL: <STRUCTURED|UNSTRUCTURED|HYBRID|GREETING>\n\
         RATIONALE: <one sentence>\n",
    );
    prompt
}

/// Parse `LABEL:` / `RATIONALE:` lines; `None` when no valid label is present
pub fn parse_classification(output: &str) -> Option<(QueryLabel, String)> {
    let mut label = None;
    let mut rationale = String::new();

    for line in output.lines() {
        let line = line.trim().trim_start_matches(['*', '-', '#', ' ']);
        if let Some(rest) = strip_key(line, "label") {
            label = label.or_else(|| QueryLabel::parse(rest));
        } else if let Some(rest) = strip_key(line, "rationale") {
            rationale = rest.trim().to_string();
        }
    }

    // Bare answers like "HYBRID" on the first line
    if label.is_none() {
        label = output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .and_then(|first| first.split_whitespace().next())
            .and_then(QueryLabel::parse);
    }

    label
        .filter(|l| FALLBACK_LABELS.contains(l))
        .map(|l| (l, rationale))
}

fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (head, rest) = line.split_once(':')?;
    let head = head.trim().trim_matches('*');
    if head.eq_ignore_ascii_case(key) {
        Some(rest.trim().trim_matches('*'))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_history() {
        let prompt = build_classification_prompt("Who is the best passer?", &[]);
        assert!(prompt.contains("Question: Who is the best passer?"));
        assert!(prompt.contains("LABEL: <STRUCTURED|UNSTRUCTURED|HYBRID|GREETING>"));
        assert!(!prompt.contains("Conversation so far"));
    }

    #[test]
    fn test_prompt_includes_recent_history_in_order() {
        let history = vec![
            Turn::new("first", "a1"),
            Turn::new("second", "a2"),
            Turn::new("third", "a3"),
            Turn::new("fourth", "a4").with_label(QueryLabel::Structured),
        ];
        let prompt = build_classification_prompt("What about his assists?", &history);

        assert!(!prompt.contains("User: first"));
        let second = prompt.find("User: second").unwrap();
        let fourth = prompt.find("User: fourth").unwrap();
        assert!(second < fourth);
        assert!(prompt.contains("(routed as STRUCTURED)"));
        assert!(prompt.contains("Resolve pronouns"));
    }

    #[test]
    fn test_parse_well_formed() {
        let parsed =
            parse_classification("LABEL: HYBRID\nRATIONALE: needs stats and opinions").unwrap();
        assert_eq!(parsed.0, QueryLabel::Hybrid);
        assert_eq!(parsed.1, "needs stats and opinions");
    }

    #[test]
    fn test_parse_markdown_decorated() {
        let parsed = parse_classification("**Label:** structured\n**Rationale:** numbers").unwrap();
        assert_eq!(parsed.0, QueryLabel::Structured);
    }

    #[test]
    fn test_parse_bare_label() {
        let parsed = parse_classification("UNSTRUCTURED\nbecause it asks for opinions").unwrap();
        assert_eq!(parsed.0, QueryLabel::Unstructured);
        assert!(parsed.1.is_empty());
    }

    #[test]
    fn test_parse_failures() {
        assert!(parse_classification("").is_none());
        assert!(parse_classification("I think it needs both").is_none());
        assert!(parse_classification("LABEL: SOMETHING").is_none());
        // Not a label the fallback tier may emit
        assert!(parse_classification("LABEL: CONVERSATIONAL_UNRESOLVED").is_none());
    }
}
