//! In-memory passage index over a JSONL corpus
//!
//! Each line is `{"text": ..., "source": ...}`. Similarity is term overlap
//! normalized by the geometric mean of the two term-set sizes, which is
//! enough for local runs and fixtures.

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::backends::PassageIndex;
use crate::errors::Result;
use crate::types::Passage;

#[derive(Debug, Clone, Deserialize)]
struct CorpusEntry {
    text: String,
    source: String,
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    entry: CorpusEntry,
    terms: HashSet<String>,
}

/// Passage index held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryPassageIndex {
    entries: Vec<IndexedEntry>,
}

impl InMemoryPassageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSONL corpus; blank lines are skipped
    pub fn from_jsonl(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus {}", path.display()))?;

        let mut index = Self::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: CorpusEntry = serde_json::from_str(line).with_context(|| {
                format!("Invalid corpus entry at {}:{}", path.display(), line_no + 1)
            })?;
            index.insert(entry.text, entry.source);
        }
        Ok(index)
    }

    /// Add a passage
    pub fn insert(&mut self, text: impl Into<String>, source: impl Into<String>) {
        let text = text.into();
        let terms = terms(&text);
        self.entries.push(IndexedEntry {
            entry: CorpusEntry {
                text,
                source: source.into(),
            },
            terms,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

fn similarity(query: &HashSet<String>, doc: &HashSet<String>) -> f32 {
    if query.is_empty() || doc.is_empty() {
        return 0.0;
    }
    let overlap = query.intersection(doc).count() as f32;
    overlap / ((query.len() * doc.len()) as f32).sqrt()
}

#[async_trait]
impl PassageIndex for InMemoryPassageIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let query_terms = terms(query);

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, similarity(&query_terms, &e.terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        // Stable on ties: corpus order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(position, (i, score))| {
                let entry = &self.entries[i].entry;
                let mut passage = Passage::new(entry.text.clone(), entry.source.clone(), score);
                passage.position = position;
                passage
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_index() -> InMemoryPassageIndex {
        let mut index = InMemoryPassageIndex::new();
        index.insert("His footwork in the post is elite and hard to guard", "thread-1");
        index.insert("The trade deadline rumors dominated the discussion", "thread-2");
        index.insert("Elite passing vision makes the offense flow", "thread-3");
        index
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = sample_index();
        let results = index.search("why is his passing elite", 5).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "thread-3");
        assert_eq!(results[0].position, 0);
        assert_eq!(results[1].position, 1);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_search_respects_k() {
        let index = sample_index();
        let results = index.search("elite discussion trade passing", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_from_jsonl_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text":"first passage","source":"a"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"text":"second passage","source":"b"}}"#).unwrap();

        let index = InMemoryPassageIndex::from_jsonl(file.path()).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_from_jsonl_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let err = InMemoryPassageIndex::from_jsonl(file.path()).unwrap_err();
        assert!(err.to_string().contains(":1"));
    }
}
