//! courtside - Hybrid question answering over basketball data
//!
//! Questions are classified, routed to a structured stats engine, a
//! discussion-thread passage index, or both, and answered by a local Ollama
//! model from the merged context.
//!
//! # Architecture
//!
//! - **classifier**: heuristic rules first, model fallback second
//! - **rag**: overfetching retrieval, relevance re-ranking, context assembly
//! - **orchestrator**: routing, per-path fallback, answer generation
//! - **evaluation**: resumable batch runs with retry, metrics and reports

pub mod errors;
pub mod types;
pub mod backends;
pub mod classifier;
pub mod rag;
pub mod orchestrator;
pub mod evaluation;

// Re-export commonly used types
pub use errors::{PipelineError, Result};

pub mod telemetry;
pub mod bootstrap;
pub mod cli;
pub mod config;
