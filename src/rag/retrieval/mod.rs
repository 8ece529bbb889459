// Candidate retrieval and query transformation
pub mod engine;
pub mod transform;

pub use engine::{CandidateRetriever, SearchParams};
pub use transform::{QueryTransformer, TransformedQuery};
