// Context re-ranking for the unstructured path
//
// Components:
// - Retrieval: query transformation and overfetching candidate search
// - Re-ranking: relevance scoring and threshold filtering
// - Context Builder: bounded context assembly, rendering and citations
// - Pipeline: end-to-end re-ranking pass

pub mod retrieval;
pub mod reranking;
pub mod context;
pub mod pipeline;

// Re-export key types
pub use context::{ContextBuilder, ContextConfig};
pub use pipeline::{ContextReranker, ReRankConfig, RerankResult};
pub use reranking::{filter_by_threshold, KeywordRelevanceScorer, LlmRelevanceScorer, RelevanceScorer};
pub use retrieval::{CandidateRetriever, QueryTransformer, TransformedQuery};
