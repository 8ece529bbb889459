//! Per-request route state machine
//!
//! Deterministic: one next state per (state, event). Terminal states map
//! one-to-one onto the `RoutingTaken` value recorded for the request.
//!
//! Valid transitions:
//! 1.  Start                  → AwaitStructured        (on: Classified(STRUCTURED))
//! 2.  Start                  → AwaitUnstructured      (on: Classified(UNSTRUCTURED | CONVERSATIONAL_UNRESOLVED))
//! 3.  Start                  → AwaitBoth              (on: Classified(HYBRID))
//! 4.  Start                  → Greeting               (on: Classified(GREETING))
//! 5.  AwaitStructured        → StructuredOnly         (on: StructuredRows)
//! 6.  AwaitStructured        → FallbackToUnstructured (on: StructuredEmpty)
//! 7.  FallbackToUnstructured → Fallback               (on: PassagesReady)
//! 8.  AwaitUnstructured      → UnstructuredOnly       (on: PassagesReady)
//! 9.  AwaitBoth              → Hybrid                 (on: BothJoined { structured_ok: true })
//! 10. AwaitBoth              → StructuredFailed       (on: BothJoined { structured_ok: false })

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};
use crate::types::{QueryLabel, RoutingTaken};

/// Request routing states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteState {
    /// Question received, not yet classified
    Start,
    /// Waiting on the structured engine
    AwaitStructured,
    /// Waiting on the re-ranker
    AwaitUnstructured,
    /// Waiting on both paths, issued concurrently
    AwaitBoth,
    /// Structured path gave nothing; re-ranker issued instead
    FallbackToUnstructured,

    // Terminal states
    StructuredOnly,
    UnstructuredOnly,
    Hybrid,
    Fallback,
    StructuredFailed,
    Greeting,
}

/// Events that trigger route transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteEvent {
    /// Classifier produced a label
    Classified(QueryLabel),
    /// Structured engine returned at least one row
    StructuredRows,
    /// Structured engine failed, declined, or matched nothing
    StructuredEmpty,
    /// Re-ranker finished (possibly with no passages)
    PassagesReady,
    /// Both hybrid paths joined
    BothJoined { structured_ok: bool },
}

impl RouteState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        self.routing().is_some()
    }

    /// Routing recorded for a terminal state
    pub fn routing(&self) -> Option<RoutingTaken> {
        match self {
            RouteState::StructuredOnly => Some(RoutingTaken::StructuredOnly),
            RouteState::UnstructuredOnly => Some(RoutingTaken::UnstructuredOnly),
            RouteState::Hybrid => Some(RoutingTaken::Hybrid),
            RouteState::Fallback => Some(RoutingTaken::Fallback),
            RouteState::StructuredFailed => Some(RoutingTaken::StructuredFailed),
            RouteState::Greeting => Some(RoutingTaken::Greeting),
            _ => None,
        }
    }

    /// Attempt a transition
    pub fn transition(&self, event: RouteEvent) -> Result<RouteState> {
        use RouteEvent::*;
        use RouteState::*;

        let next = match (self, event) {
            (Start, Classified(label)) => match label {
                QueryLabel::Structured => AwaitStructured,
                QueryLabel::Unstructured | QueryLabel::ConversationalUnresolved => {
                    AwaitUnstructured
                }
                QueryLabel::Hybrid => AwaitBoth,
                QueryLabel::Greeting => Greeting,
            },

            (AwaitStructured, StructuredRows) => StructuredOnly,
            (AwaitStructured, StructuredEmpty) => FallbackToUnstructured,

            (FallbackToUnstructured, PassagesReady) => Fallback,
            (AwaitUnstructured, PassagesReady) => UnstructuredOnly,

            (AwaitBoth, BothJoined { structured_ok: true }) => Hybrid,
            (AwaitBoth, BothJoined { structured_ok: false }) => StructuredFailed,

            (from, event) => {
                return Err(PipelineError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            RouteState::Start => "Classifying",
            RouteState::AwaitStructured => "Querying stats",
            RouteState::AwaitUnstructured => "Searching discussion",
            RouteState::AwaitBoth => "Querying stats and discussion",
            RouteState::FallbackToUnstructured => "Falling back to discussion",
            RouteState::StructuredOnly => "Answered from stats",
            RouteState::UnstructuredOnly => "Answered from discussion",
            RouteState::Hybrid => "Answered from stats and discussion",
            RouteState::Fallback => "Answered from discussion after stats fallback",
            RouteState::StructuredFailed => "Answered from discussion, stats failed",
            RouteState::Greeting => "Greeting",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(events: &[RouteEvent]) -> Result<RouteState> {
        events
            .iter()
            .try_fold(RouteState::Start, |state, event| state.transition(*event))
    }

    #[test]
    fn test_structured_paths() {
        let state = walk(&[RouteEvent::Classified(QueryLabel::Structured), RouteEvent::StructuredRows]).unwrap();
        assert_eq!(state.routing(), Some(RoutingTaken::StructuredOnly));

        let state = walk(&[
            RouteEvent::Classified(QueryLabel::Structured),
            RouteEvent::StructuredEmpty,
            RouteEvent::PassagesReady,
        ])
        .unwrap();
        assert_eq!(state, RouteState::Fallback);
        assert_eq!(state.routing(), Some(RoutingTaken::Fallback));
    }

    #[test]
    fn test_unresolved_goes_unstructured() {
        let state = walk(&[
            RouteEvent::Classified(QueryLabel::ConversationalUnresolved),
            RouteEvent::PassagesReady,
        ])
        .unwrap();
        assert_eq!(state.routing(), Some(RoutingTaken::UnstructuredOnly));
    }

    #[test]
    fn test_hybrid_paths_are_distinct() {
        let ok = walk(&[
            RouteEvent::Classified(QueryLabel::Hybrid),
            RouteEvent::BothJoined { structured_ok: true },
        ])
        .unwrap();
        let failed = walk(&[
            RouteEvent::Classified(QueryLabel::Hybrid),
            RouteEvent::BothJoined { structured_ok: false },
        ])
        .unwrap();
        assert_eq!(ok.routing(), Some(RoutingTaken::Hybrid));
        assert_eq!(failed.routing(), Some(RoutingTaken::StructuredFailed));
        assert_ne!(failed.routing(), Some(RoutingTaken::UnstructuredOnly));
    }

    #[test]
    fn test_greeting_is_immediately_terminal() {
        let state = walk(&[RouteEvent::Classified(QueryLabel::Greeting)]).unwrap();
        assert!(state.is_terminal());
        assert!(state.transition(RouteEvent::PassagesReady).is_err());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(RouteState::Start.transition(RouteEvent::StructuredRows).is_err());
        assert!(RouteState::AwaitUnstructured
            .transition(RouteEvent::StructuredEmpty)
            .is_err());
        let err = RouteState::StructuredOnly
            .transition(RouteEvent::BothJoined { structured_ok: true })
            .unwrap_err();
        assert!(err.to_string().contains("StructuredOnly"));
    }

    #[test]
    fn test_non_terminal_states() {
        for state in [
            RouteState::Start,
            RouteState::AwaitStructured,
            RouteState::AwaitUnstructured,
            RouteState::AwaitBoth,
            RouteState::FallbackToUnstructured,
        ] {
            assert!(!state.is_terminal());
            assert!(state.routing().is_none());
        }
    }
}
