//! External collaborators
//!
//! The pipeline talks to three services it does not own: the structured
//! query engine, the passage index and the language model. Each sits
//! behind an async trait so the routing logic can be exercised with
//! in-process doubles.

pub mod ollama;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{Passage, RowSet};

pub use http::{HttpPassageIndex, HttpStructuredEngine};
pub use memory::InMemoryPassageIndex;
pub use ollama::OllamaClient;

/// Result of a structured query
///
/// `Rows` with no rows means the query ran and matched nothing;
/// `NoAnswer` means the engine could not form a query at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StructuredOutcome {
    Rows(RowSet),
    NoAnswer { reason: String },
}

/// Natural-language question to rows
#[async_trait]
pub trait StructuredEngine: Send + Sync {
    async fn run(&self, question: &str) -> Result<StructuredOutcome>;
}

/// Similarity search over discussion passages
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// Up to `k` passages, best similarity first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>>;
}

/// Prompt in, text out
///
/// Used for fallback classification, passage scoring, answer synthesis
/// and metric judging.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Short provider name for logs and rate-limit errors
    fn name(&self) -> &str {
        "model"
    }
}
