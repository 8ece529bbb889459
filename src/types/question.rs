//! Question and conversation history types
//!
//! A `Question` is created once per request and read-only afterwards.

use serde::{Deserialize, Serialize};

use crate::types::routing::QueryLabel;

/// What a prior turn was about, used to ground referring expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A single player or person
    Person,
    /// A team, roster or franchise
    Team,
    /// A discussion topic or abstract concept
    Topic,
    /// Nothing we could infer
    Unknown,
}

/// One prior exchange in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    /// Label the classifier assigned to this turn, if it was recorded
    #[serde(default)]
    pub label: Option<QueryLabel>,
    /// Explicit subject kind; inferred from the question text when absent
    #[serde(default)]
    pub subject: Option<SubjectKind>,
    /// Named entities surfaced by this turn's structured results
    #[serde(default)]
    pub entities: Vec<String>,
}

impl Turn {
    /// Create a turn with no recorded classification
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            label: None,
            subject: None,
            entities: Vec::new(),
        }
    }

    /// Attach the label the classifier produced for this turn
    pub fn with_label(mut self, label: QueryLabel) -> Self {
        self.label = Some(label);
        self
    }

    /// Attach the entities surfaced by this turn
    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach an explicit subject kind
    pub fn with_subject(mut self, subject: SubjectKind) -> Self {
        self.subject = Some(subject);
        self
    }
}

/// Immutable request input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<Turn>,
}

impl Question {
    /// Create a question without history
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            conversation_id: None,
            history: Vec::new(),
        }
    }

    /// Create a follow-up question in an existing conversation
    pub fn with_history(text: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            text: text.into(),
            conversation_id: None,
            history,
        }
    }

    /// Tag the question with a conversation identifier
    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// The immediately preceding turn
    pub fn last_turn(&self) -> Option<&Turn> {
        self.history.last()
    }
}
