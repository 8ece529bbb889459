// Relevance scoring and threshold filtering
pub mod filter;
pub mod scorer;

pub use filter::filter_by_threshold;
pub use scorer::{KeywordRelevanceScorer, LlmRelevanceScorer, RelevanceScorer};
