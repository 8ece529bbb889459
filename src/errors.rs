//! Error types for the Courtside pipeline
//!
//! One taxonomy for every layer. Transient failures (network, timeouts,
//! rate limits) are distinguished from fatal ones so the retry policy and
//! the orchestrator can decide what to absorb and what to surface.

use thiserror::Error;

/// Main error type for the routing, retrieval and evaluation pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Route state machine transition errors
    #[error("Invalid route transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Model provider returned an error response
    #[error("Model API error: {0}")]
    ModelApi(String),

    /// Provider asked us to slow down
    #[error("Rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    /// Structured query engine errors
    #[error("Structured engine error: {0}")]
    StructuredEngine(String),

    /// Passage index errors
    #[error("Passage index error: {0}")]
    PassageIndex(String),

    /// Connection dropped or reset mid-request
    #[error("Connection error: {0}")]
    Connection(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model output could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Caller supplied something unusable
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkpoint log is unreadable
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic errors with context
    #[error("Pipeline error: {0}")]
    Generic(String),
}

impl PipelineError {
    /// Whether the failure is worth retrying
    ///
    /// Network, timeout and rate-limit signals are transient. Model API
    /// errors count only when they carry a 429/5xx status or a
    /// connection-reset message.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Timeout { .. } => true,
            PipelineError::RateLimited { .. } => true,
            PipelineError::Connection(_) => true,
            PipelineError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().map_or(false, |s| {
                        s.as_u16() == 429 || s.is_server_error()
                    })
            }
            PipelineError::ModelApi(message)
            | PipelineError::StructuredEngine(message)
            | PipelineError::PassageIndex(message) => mentions_transient_signal(message),

            PipelineError::InvalidTransition { .. } => false,
            PipelineError::Serialization(_) => false,
            PipelineError::Io(_) => false,
            PipelineError::Parse(_) => false,
            PipelineError::MalformedInput(_) => false,
            PipelineError::Config(_) => false,
            PipelineError::Checkpoint(_) => false,
            PipelineError::Generic(_) => false,
        }
    }
}

fn mentions_transient_signal(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "http 429",
        "http 500",
        "http 502",
        "http 503",
        "http 504",
        "rate limit",
        "too many requests",
        "timed out",
        "timeout",
        "connection reset",
        "connection refused",
        "broken pipe",
        "overloaded",
    ]
    .iter()
    .any(|signal| lower.contains(signal))
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Convert anyhow errors to PipelineError
impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Generic(err.to_string())
    }
}
