//! Answer prompts and canned responses

use crate::rag::context::STATS_MARKER;
use crate::types::Turn;

/// Answer given when no retrieval path produced anything
pub const INSUFFICIENT_INFORMATION: &str =
    "I don't have enough information to answer that question.";

/// (greeting word, response). First word match wins.
const GREETING_TEMPLATES: &[(&str, &str)] = &[
    ("thanks", "You're welcome! Ask me anything else about players, teams or stats."),
    ("thank", "You're welcome! Ask me anything else about players, teams or stats."),
    ("bye", "See you next time!"),
    ("goodbye", "See you next time!"),
    ("morning", "Good morning! What would you like to know about the league?"),
    ("evening", "Good evening! What would you like to know about the league?"),
];

const DEFAULT_GREETING: &str =
    "Hi! Ask me about player and team stats, or what fans are saying about them.";

/// Deterministic response for a greeting
pub fn greeting_response(question: &str) -> &'static str {
    let lower = question.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    GREETING_TEMPLATES
        .iter()
        .find(|(word, _)| words.contains(word))
        .map(|(_, response)| *response)
        .unwrap_or(DEFAULT_GREETING)
}

/// Prompt for the final answer
///
/// `context` is the rendered context from `ContextBuilder::render`, which
/// numbers passages `[1]`, `[2]`, ... and labels the stats table `[S]`.
pub fn build_answer_prompt(question: &str, context: &str, history: &[Turn]) -> String {
    let mut prompt = format!(
        "You answer basketball questions using only the context below.\n\
         Cite the source of every claim: [{}] for the stats table, [n] for passage n.\n\
         When stats and discussion are both present, take numbers from the stats table \
         and opinions or explanations from the passages.\n\
         If the context does not contain the answer, say so.\n\n",
        STATS_MARKER
    );

    let recent: Vec<&Turn> = history.iter().rev().take(2).collect();
    if !recent.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for turn in recent.into_iter().rev() {
            prompt.push_str(&format!("User: {}\nAssistant: {}\n", turn.question, turn.answer));
        }
        prompt.push('\n');
    }

    prompt.push_str("Context:\n");
    prompt.push_str(context.trim());
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question.trim());
    prompt.push_str("\nAnswer:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_templates_are_deterministic() {
        assert_eq!(greeting_response("hello"), DEFAULT_GREETING);
        assert_eq!(greeting_response("Thanks!"), greeting_response("thanks a lot"));
        assert!(greeting_response("Good morning").starts_with("Good morning"));
        assert_eq!(greeting_response("bye"), "See you next time!");
    }

    #[test]
    fn test_answer_prompt_layout() {
        let prompt = build_answer_prompt(
            " Who scored the most points? ",
            "[S] Stats table:\nplayer | points\nA. Star | 2484",
            &[],
        );
        assert!(prompt.contains("[S] for the stats table"));
        assert!(prompt.contains("A. Star | 2484"));
        assert!(prompt.ends_with("Question: Who scored the most points?\nAnswer:"));
        assert!(!prompt.contains("Conversation so far"));
    }

    #[test]
    fn test_answer_prompt_includes_recent_history_in_order() {
        let history = vec![
            Turn::new("q1", "a1"),
            Turn::new("q2", "a2"),
            Turn::new("q3", "a3"),
        ];
        let prompt = build_answer_prompt("Why?", "ctx", &history);
        assert!(!prompt.contains("User: q1"));
        let q2 = prompt.find("User: q2").unwrap();
        let q3 = prompt.find("User: q3").unwrap();
        assert!(q2 < q3);
    }
}
