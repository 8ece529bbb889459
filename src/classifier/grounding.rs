//! Referring-expression grounding for follow-up questions
//!
//! A follow-up like "What about his assists?" only inherits the previous
//! turn's route when the pronoun can point at what that turn was about.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{SubjectKind, Turn};

/// What a referring expression can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentKind {
    /// he / him / his / she / her
    Person,
    /// they / them / their
    Group,
    /// "the other one", "that one": no usable antecedent type
    Ambiguous,
}

/// A referring expression found in a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferringExpression {
    pub text: String,
    pub kind: ReferentKind,
}

static AMBIGUOUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(the other (one|guy|player|team)|that one|the same one|the former|the latter)\b")
        .expect("ambiguous reference regex is valid")
});
static PERSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(he|him|his|himself|she|her|hers|herself)\b")
        .expect("person pronoun regex is valid")
});
static GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(they|them|their|theirs|themselves)\b").expect("group pronoun regex is valid")
});
static PERSON_SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(who|whom|whose|player|players|he|his|him|she|her|scorer|rookie|mvp|guard|forward|center|point guard|leader)\b",
    )
    .expect("person subject regex is valid")
});
static TEAM_SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(team|teams|franchise|roster|club|squad|which team|standings)\b")
        .expect("team subject regex is valid")
});

/// First referring expression in the question, most ambiguous kind first
pub fn find_referring_expression(question: &str) -> Option<ReferringExpression> {
    let patterns: [(&Regex, ReferentKind); 3] = [
        (&*AMBIGUOUS_RE, ReferentKind::Ambiguous),
        (&*PERSON_RE, ReferentKind::Person),
        (&*GROUP_RE, ReferentKind::Group),
    ];

    patterns.iter().find_map(|(regex, kind)| {
        regex.find(question).map(|m| ReferringExpression {
            text: m.as_str().to_string(),
            kind: *kind,
        })
    })
}

/// Subject of a prior turn: explicit if recorded, else inferred from text
pub fn subject_of(turn: &Turn) -> SubjectKind {
    if let Some(subject) = turn.subject {
        return subject;
    }

    if TEAM_SUBJECT_RE.is_match(&turn.question) {
        SubjectKind::Team
    } else if PERSON_SUBJECT_RE.is_match(&turn.question) || !turn.entities.is_empty() {
        SubjectKind::Person
    } else if turn.question.trim().is_empty() {
        SubjectKind::Unknown
    } else {
        SubjectKind::Topic
    }
}

/// Whether the expression can refer to the prior turn's subject
pub fn antecedent_matches(expression: ReferentKind, subject: SubjectKind) -> bool {
    match (expression, subject) {
        (ReferentKind::Person, SubjectKind::Person) => true,
        // singular "they" for a player, plural for a team
        (ReferentKind::Group, SubjectKind::Team) => true,
        (ReferentKind::Group, SubjectKind::Person) => true,
        _ => false,
    }
}
