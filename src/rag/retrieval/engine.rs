//! Candidate retrieval from the passage index
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::backends::PassageIndex;
use crate::errors::Result;
use crate::types::{Passage, RetrievalRequest};

/// Search parameters for candidate retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Extra candidates fetched beyond the number finally kept
    pub overfetch: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { overfetch: 2 }
    }
}

/// Fetches more candidates than will be kept, ranked by raw similarity
pub struct CandidateRetriever {
    index: Arc<dyn PassageIndex>,
    params: SearchParams,
}

impl CandidateRetriever {
    /// Create new retriever with default parameters
    pub fn new(index: Arc<dyn PassageIndex>) -> Self {
        Self::with_params(index, SearchParams::default())
    }

    /// Create with custom parameters
    pub fn with_params(index: Arc<dyn PassageIndex>, params: SearchParams) -> Self {
        Self { index, params }
    }

    /// Request for `k` kept passages
    pub fn request_for(&self, query: &str, k: usize) -> RetrievalRequest {
        RetrievalRequest::unstructured(query, k + self.params.overfetch)
    }

    /// Retrieve candidates for a request
    ///
    /// Positions are reassigned from the returned order so citation
    /// numbering stays stable even when a source repeats.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<Passage>> {
        let mut candidates = self
            .index
            .search(&request.query, request.max_results)
            .await?;

        candidates.truncate(request.max_results);
        for (position, passage) in candidates.iter_mut().enumerate() {
            passage.position = position;
            passage.relevance = None;
        }

        debug!(
            query = %request.query,
            requested = request.max_results,
            returned = candidates.len(),
            "retrieved candidates"
        );
        Ok(candidates)
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns the same source for every hit and records requested k
    struct RepeatingIndex {
        requested: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl PassageIndex for RepeatingIndex {
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<Passage>> {
            self.requested.lock().unwrap().push(k);
            Ok((0..k + 3)
                .map(|i| {
                    let mut p = Passage::new(format!("passage {}", i), "thread-7", 0.9);
                    p.position = 99;
                    p
                })
                .collect())
        }
    }

    #[test]
    fn test_search_params_default() {
        assert_eq!(SearchParams::default().overfetch, 2);
    }

    #[tokio::test]
    async fn test_overfetch_and_positions() {
        let index = Arc::new(RepeatingIndex {
            requested: Mutex::new(Vec::new()),
        });
        let retriever = CandidateRetriever::new(index.clone());

        let request = retriever.request_for("elite passing", 3);
        assert_eq!(request.max_results, 5);

        let candidates = retriever.retrieve(&request).await.unwrap();
        assert_eq!(index.requested.lock().unwrap().as_slice(), &[5]);
        assert_eq!(candidates.len(), 5);
        // Same source repeated, distinct positions
        assert!(candidates.iter().all(|p| p.source == "thread-7"));
        let positions: Vec<usize> = candidates.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }
}
