//! Type definitions module
//!
//! Data model shared by the classifier, orchestrator, re-ranker and
//! evaluation harness.

pub mod question;
pub mod routing;
pub mod context;

// Re-export commonly used types
pub use question::{Question, SubjectKind, Turn};
pub use routing::{
    Classification, QueryLabel, RetrievalMode, RetrievalRequest, RoutingTaken, RuleMatch,
};
pub use context::{Citation, Context, Passage, PipelineAnswer, RowSet};
