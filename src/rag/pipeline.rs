// Re-ranking pipeline: transform -> retrieve with overfetch -> score -> filter
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backends::PassageIndex;
use crate::errors::Result;
use crate::rag::reranking::{filter_by_threshold, RelevanceScorer};
use crate::rag::retrieval::{CandidateRetriever, QueryTransformer, SearchParams, TransformedQuery};
use crate::types::Passage;

/// Re-ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReRankConfig {
    /// Passages kept after filtering
    pub k: usize,
    /// Extra candidates fetched before scoring
    pub overfetch: usize,
    /// Minimum relevance on the scorer's scale
    pub relevance_threshold: f32,
    /// Entities appended to a transformed query
    pub max_entities: usize,
}

impl Default for ReRankConfig {
    fn default() -> Self {
        Self {
            k: 3,
            overfetch: 2,
            relevance_threshold: 7.0,
            max_entities: 2,
        }
    }
}

/// Output of one re-ranking pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankResult {
    pub original_query: String,
    pub transformed_query: TransformedQuery,
    /// Candidates the index returned before filtering
    pub candidates_retrieved: usize,
    /// Filtered passages, best first
    pub passages: Vec<Passage>,
}

/// Query transformation, candidate retrieval and relevance filtering
pub struct ContextReranker {
    transformer: QueryTransformer,
    retriever: CandidateRetriever,
    scorer: Arc<dyn RelevanceScorer>,
    config: ReRankConfig,
}

impl ContextReranker {
    /// Create with default configuration
    pub fn new(index: Arc<dyn PassageIndex>, scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self::with_config(index, scorer, ReRankConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(
        index: Arc<dyn PassageIndex>,
        scorer: Arc<dyn RelevanceScorer>,
        config: ReRankConfig,
    ) -> Self {
        Self {
            transformer: QueryTransformer::new(config.max_entities),
            retriever: CandidateRetriever::with_params(
                index,
                SearchParams {
                    overfetch: config.overfetch,
                },
            ),
            scorer,
            config,
        }
    }

    /// Retrieve and filter with the configured `k`
    pub async fn retrieve(&self, question: &str, entities: &[String]) -> Result<RerankResult> {
        self.retrieve_and_filter(question, entities, self.config.k).await
    }

    /// Ordered passages for `question`, at most `k`
    ///
    /// `entities` come from earlier structured results. Candidates are scored
    /// against the original question, not the transformed query. A scoring
    /// failure on one candidate gives it a zero score rather than failing
    /// the pass. Index errors propagate.
    pub async fn retrieve_and_filter(
        &self,
        question: &str,
        entities: &[String],
        k: usize,
    ) -> Result<RerankResult> {
        let transformed = self.transformer.transform(question, entities);
        let request = self.retriever.request_for(&transformed.text, k);
        let candidates = self.retriever.retrieve(&request).await?;
        let candidates_retrieved = candidates.len();

        let scores = join_all(
            candidates
                .iter()
                .map(|passage| self.scorer.score(question, passage)),
        )
        .await;

        let scored: Vec<Passage> = candidates
            .into_iter()
            .zip(scores)
            .map(|(mut passage, score)| {
                let value = match score {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(source = %passage.source, position = passage.position, error = %e, "relevance scoring failed");
                        0.0
                    }
                };
                passage.relevance = Some(value);
                passage
            })
            .collect();

        let passages = filter_by_threshold(scored, self.config.relevance_threshold, k);

        debug!(
            query = %transformed.text,
            retrieved = candidates_retrieved,
            kept = passages.len(),
            "re-ranked passages"
        );

        Ok(RerankResult {
            original_query: question.to_string(),
            transformed_query: transformed,
            candidates_retrieved,
            passages,
        })
    }

    /// Get current configuration
    pub fn config(&self) -> &ReRankConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedIndex {
        passages: Vec<Passage>,
        queries: Mutex<Vec<(String, usize)>>,
    }

    impl FixedIndex {
        fn new(texts: &[&str]) -> Self {
            Self {
                passages: texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| Passage::new(*t, format!("thread-{}", i), 0.9 - i as f32 * 0.1))
                    .collect(),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PassageIndex for FixedIndex {
        async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
            self.queries.lock().unwrap().push((query.to_string(), k));
            Ok(self.passages.iter().take(k).cloned().collect())
        }
    }

    /// Scores by exact passage text; missing text is a scoring error
    struct TableScorer(HashMap<&'static str, f32>);

    #[async_trait]
    impl RelevanceScorer for TableScorer {
        async fn score(&self, _question: &str, passage: &Passage) -> Result<f32> {
            self.0
                .get(passage.text.as_str())
                .copied()
                .ok_or_else(|| PipelineError::Parse("no score".into()))
        }
    }

    fn reranker(index: Arc<FixedIndex>, scores: &[(&'static str, f32)]) -> ContextReranker {
        ContextReranker::new(index, Arc::new(TableScorer(scores.iter().cloned().collect())))
    }

    #[test]
    fn test_rerank_config_default() {
        let config = ReRankConfig::default();
        assert_eq!(config.k, 3);
        assert_eq!(config.overfetch, 2);
        assert_eq!(config.relevance_threshold, 7.0);
        assert_eq!(config.max_entities, 2);
    }

    #[tokio::test]
    async fn test_overfetch_then_filter_sorted() {
        let index = Arc::new(FixedIndex::new(&["a", "b", "c", "d", "e", "f"]));
        let rr = reranker(
            index.clone(),
            &[("a", 5.0), ("b", 8.0), ("c", 9.0), ("d", 7.0), ("e", 2.0), ("f", 10.0)],
        );

        let result = rr.retrieve_and_filter("Why is he elite?", &[], 3).await.unwrap();

        // k + overfetch candidates requested; "f" is beyond the overfetch window
        assert_eq!(index.queries.lock().unwrap()[0].1, 5);
        assert_eq!(result.candidates_retrieved, 5);
        let texts: Vec<&str> = result.passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "b", "d"]);
    }

    #[tokio::test]
    async fn test_all_below_threshold_keeps_best() {
        let index = Arc::new(FixedIndex::new(&["a", "b", "c"]));
        let rr = reranker(index, &[("a", 2.0), ("b", 6.5), ("c", 1.0)]);
        let result = rr.retrieve_and_filter("question", &[], 3).await.unwrap();
        assert_eq!(result.passages.len(), 1);
        assert_eq!(result.passages[0].text, "b");
    }

    #[tokio::test]
    async fn test_scoring_failure_counts_as_zero() {
        let index = Arc::new(FixedIndex::new(&["a", "unscored", "c"]));
        let rr = reranker(index, &[("a", 8.0), ("c", 9.0)]);
        let result = rr.retrieve_and_filter("question", &[], 3).await.unwrap();
        let texts: Vec<&str> = result.passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_transformed_query_reaches_index() {
        let index = Arc::new(FixedIndex::new(&["a"]));
        let rr = reranker(index.clone(), &[("a", 8.0)]);
        let entities = vec!["A. Star".to_string(), "OKC".to_string(), "B. Big".to_string()];

        let result = rr
            .retrieve_and_filter("Why is he considered elite?", &entities, 3)
            .await
            .unwrap();

        let sent = index.queries.lock().unwrap()[0].0.clone();
        assert_eq!(sent, result.transformed_query.text);
        assert!(sent.contains("A. Star"));
        assert!(sent.contains("OKC"));
        assert!(!sent.contains("B. Big"));
        assert_eq!(result.original_query, "Why is he considered elite?");
    }

    #[tokio::test]
    async fn test_empty_index() {
        let index = Arc::new(FixedIndex::new(&[]));
        let rr = reranker(index, &[]);
        let result = rr.retrieve("anything", &[]).await.unwrap();
        assert!(result.passages.is_empty());
        assert_eq!(result.candidates_retrieved, 0);
    }
}
