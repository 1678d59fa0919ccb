//! Search capability seam injected into every research run.
//!
//! The engine does not define how retrieval works; it consumes a
//! [`SearchProvider`] supplied through the run context. [`MemorySearchIndex`]
//! is the in-process implementation used by the CLI and by tests.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::heuristics::tokenize;
use crate::source::Source;

/// A semantic search hit: the record plus the provider's similarity.
#[derive(Debug, Clone)]
pub struct ScoredSource {
    pub source: Source,
    pub similarity: f64,
}

/// External retrieval capability.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Similarity-ranked search. `verified_only` restricts to verified records.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        verified_only: bool,
    ) -> anyhow::Result<Vec<ScoredSource>>;

    /// Keyword fallback without a similarity metric.
    async fn search_fulltext(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Source>>;
}

pub type DynSearchProvider = Arc<dyn SearchProvider>;

/// Opaque storage dependency passed through to the search capability.
///
/// The engine never inspects it beyond requiring its presence; the backing
/// schema belongs to the hosting application.
pub trait StorageHandle: Send + Sync {
    fn backend(&self) -> &str;
}

pub type DynStorageHandle = Arc<dyn StorageHandle>;

/// In-process storage handle for tests and offline runs.
pub struct MemoryStorage;

impl StorageHandle for MemoryStorage {
    fn backend(&self) -> &str {
        "memory"
    }
}

/// In-memory search index with token-overlap similarity.
pub struct MemorySearchIndex {
    docs: DashMap<String, Source>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    pub fn insert(&self, source: Source) {
        self.docs.insert(source.id.clone(), source);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn similarity(query_tokens: &[String], doc: &Source) -> f64 {
        if query_tokens.is_empty() {
            return 0.0;
        }
        let doc_text = format!("{} {} {}", doc.title, doc.content, doc.tags.join(" "));
        let doc_tokens: std::collections::HashSet<String> = tokenize(&doc_text).into_iter().collect();
        let overlap = query_tokens
            .iter()
            .filter(|t| doc_tokens.contains(*t))
            .count();
        overlap as f64 / query_tokens.len() as f64
    }
}

impl Default for MemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for MemorySearchIndex {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        verified_only: bool,
    ) -> anyhow::Result<Vec<ScoredSource>> {
        let query_tokens = tokenize(query);
        let mut hits: Vec<ScoredSource> = self
            .docs
            .iter()
            .filter(|entry| !verified_only || entry.verified)
            .filter_map(|entry| {
                let similarity = Self::similarity(&query_tokens, entry.value());
                (similarity > 0.0).then(|| ScoredSource {
                    source: entry.value().clone(),
                    similarity,
                })
            })
            .collect();

        // Secondary id ordering keeps results deterministic across runs.
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source.id.cmp(&b.source.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn search_fulltext(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Source>> {
        let query_tokens = tokenize(query);
        let mut hits: Vec<Source> = self
            .docs
            .iter()
            .filter(|entry| {
                let haystack = format!("{} {}", entry.title, entry.content).to_lowercase();
                query_tokens.iter().any(|t| haystack.contains(t.as_str()))
            })
            .map(|entry| entry.value().clone())
            .collect();

        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with_docs() -> MemorySearchIndex {
        let index = MemorySearchIndex::new();
        index.insert(
            Source::new("ml-1", "Machine learning basics", "Machine learning trains models on data.")
                .with_verified(true)
                .with_tags(vec!["machine".into(), "learning".into()]),
        );
        index.insert(Source::new(
            "db-1",
            "Database tuning",
            "Index selection and query planning for databases.",
        ));
        index
    }

    #[tokio::test]
    async fn semantic_search_ranks_by_overlap() {
        let index = index_with_docs();
        let hits = index.search("machine learning models", 10, false).await.unwrap();
        assert_eq!(hits[0].source.id, "ml-1");
        assert!(hits[0].similarity > 0.9);
    }

    #[tokio::test]
    async fn verified_only_filters_unverified_docs() {
        let index = index_with_docs();
        let hits = index.search("database query planning", 10, true).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn fulltext_matches_any_token() {
        let index = index_with_docs();
        let hits = index.search_fulltext("tuning", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "db-1");
    }
}
