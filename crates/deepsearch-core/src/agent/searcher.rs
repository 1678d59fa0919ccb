//! Searcher agent: multi-strategy retrieval with deduplication and
//! composite ranking.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::agent::{AgentInput, AgentLogic, AgentOutcome, Payload};
use crate::context::ResearchContext;
use crate::error::AgentError;
use crate::heuristics::{is_stop_word, tokenize};
use crate::plan::ResearchPlan;
use crate::retrieval::DynSearchProvider;
use crate::source::{SearchMethod, Source};

/// Credit rate charged per source finally returned.
const CREDITS_PER_SOURCE: f64 = 0.5;

/// Relevance assigned to fulltext hits, which lack a similarity metric.
const FULLTEXT_RELEVANCE: f64 = 0.5;

/// Relevance assigned to related-search hits.
const RELATED_RELEVANCE: f64 = 0.3;

/// Semantic result count below which the fulltext fallback runs.
const FULLTEXT_FLOOR: usize = 3;

/// Default cap when neither the context nor the plan supplies one.
const DEFAULT_SOURCE_LIMIT: usize = 15;

#[derive(Default)]
pub struct SearcherAgent;

impl SearcherAgent {
    pub fn new() -> Self {
        Self
    }

    /// Queries the semantic strategy iterates: the plan's expansions when a
    /// plan is present, otherwise just the raw query.
    fn semantic_queries(input: &AgentInput<'_>) -> (Vec<String>, usize) {
        match input
            .data
            .get("plan")
            .and_then(|value| serde_json::from_value::<ResearchPlan>(value.clone()).ok())
        {
            Some(plan) => {
                let queries = plan
                    .search_queries
                    .into_iter()
                    .take(plan.approach.max_searches)
                    .collect();
                (queries, plan.approach.max_sources)
            }
            None => (vec![input.query.to_string()], DEFAULT_SOURCE_LIMIT),
        }
    }

    async fn semantic_strategy(
        provider: &DynSearchProvider,
        queries: &[String],
        limit: usize,
        ctx: &ResearchContext,
        errors: &mut Vec<String>,
    ) -> Vec<Source> {
        let mut found = Vec::new();
        for query in queries {
            if ctx.is_cancelled() {
                break;
            }
            match provider.search(query, limit, false).await {
                Ok(hits) => {
                    found.extend(hits.into_iter().map(|hit| {
                        let mut source = hit.source;
                        source.relevance_score = hit.similarity.clamp(0.0, 1.0);
                        source.search_method = SearchMethod::Semantic;
                        source
                    }));
                }
                Err(err) => {
                    warn!(%query, error = %err, "semantic search failed; continuing");
                    errors.push(format!("semantic: {err}"));
                }
            }
        }
        found
    }

    async fn fulltext_strategy(
        provider: &DynSearchProvider,
        query: &str,
        limit: usize,
        errors: &mut Vec<String>,
    ) -> Vec<Source> {
        match provider.search_fulltext(query, limit).await {
            Ok(hits) => hits
                .into_iter()
                .map(|mut source| {
                    source.relevance_score = FULLTEXT_RELEVANCE;
                    source.search_method = SearchMethod::Fulltext;
                    source
                })
                .collect(),
            Err(err) => {
                warn!(%query, error = %err, "fulltext search failed; continuing");
                errors.push(format!("fulltext: {err}"));
                Vec::new()
            }
        }
    }

    /// Derive up to five tags from the top three sources found so far and
    /// issue one extra query built from them.
    async fn related_strategy(
        provider: &DynSearchProvider,
        found: &[Source],
        limit: usize,
        errors: &mut Vec<String>,
    ) -> Vec<Source> {
        let tags = Self::derive_tags(found);
        if tags.is_empty() {
            return Vec::new();
        }

        let related_query = tags.join(" ");
        let seen: HashSet<&str> = found.iter().map(|s| s.id.as_str()).collect();

        match provider.search(&related_query, limit, false).await {
            Ok(hits) => hits
                .into_iter()
                .filter(|hit| !seen.contains(hit.source.id.as_str()))
                .map(|hit| {
                    let mut source = hit.source;
                    source.relevance_score = RELATED_RELEVANCE;
                    source.search_method = SearchMethod::Related;
                    source
                })
                .collect(),
            Err(err) => {
                warn!(query = %related_query, error = %err, "related search failed; continuing");
                errors.push(format!("related: {err}"));
                Vec::new()
            }
        }
    }

    fn derive_tags(found: &[Source]) -> Vec<String> {
        let mut tags = Vec::new();
        for source in found.iter().take(3) {
            if !source.tags.is_empty() {
                tags.extend(source.tags.iter().cloned());
            } else {
                tags.extend(
                    tokenize(&source.title)
                        .into_iter()
                        .filter(|t| t.len() > 3 && !is_stop_word(t)),
                );
            }
        }
        tags.dedup();
        tags.truncate(5);
        tags
    }

    /// Drop repeated ids (first occurrence wins), rank by composite score,
    /// truncate to the limit.
    fn dedupe_and_rank(found: Vec<Source>, limit: usize) -> Vec<Source> {
        let mut seen = HashSet::new();
        let mut unique: Vec<Source> = found
            .into_iter()
            .filter(|source| seen.insert(source.id.clone()))
            .collect();

        let now = Utc::now();
        unique.sort_by(|a, b| {
            b.composite_score(now)
                .partial_cmp(&a.composite_score(now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        unique.truncate(limit);
        unique
    }
}

#[async_trait]
impl AgentLogic for SearcherAgent {
    fn name(&self) -> &'static str {
        "searcher"
    }

    #[instrument(name = "agent.searcher", skip(self, input))]
    async fn perform(&self, input: &AgentInput<'_>) -> Result<AgentOutcome, AgentError> {
        let provider = input.ctx.search.clone().ok_or_else(|| {
            AgentError::MissingDependency("Database connection not available: no search engine in context".into())
        })?;
        if input.ctx.storage.is_none() {
            return Err(AgentError::MissingDependency(
                "Database connection not available: no storage handle in context".into(),
            ));
        }

        let (queries, plan_limit) = Self::semantic_queries(input);
        let limit = input.ctx.max_sources.unwrap_or(plan_limit);
        let mut errors = Vec::new();

        let mut found =
            Self::semantic_strategy(&provider, &queries, limit, input.ctx, &mut errors).await;
        if input.ctx.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let semantic_count = found.len();
        let semantic_failed = semantic_count == 0 && !errors.is_empty();

        let mut fulltext_count = 0;
        let mut fulltext_failed = false;
        if semantic_count < FULLTEXT_FLOOR {
            if input.ctx.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let before = errors.len();
            let fallback = Self::fulltext_strategy(&provider, input.query, limit, &mut errors).await;
            fulltext_failed = errors.len() > before;
            fulltext_count = fallback.len();
            found.extend(fallback);
        }

        if input.ctx.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let related = Self::related_strategy(&provider, &found, limit, &mut errors).await;
        let related_count = related.len();
        found.extend(related);

        if found.is_empty() && semantic_failed && fulltext_failed {
            return Err(AgentError::Upstream(errors.join("; ")));
        }

        let sources = Self::dedupe_and_rank(found, limit);
        let mean_relevance = if sources.is_empty() {
            0.0
        } else {
            sources.iter().map(|s| s.relevance_score).sum::<f64>() / sources.len() as f64
        };

        debug!(
            semantic = semantic_count,
            fulltext = fulltext_count,
            related = related_count,
            returned = sources.len(),
            "search strategies finished"
        );

        let mut payload = Payload::new();
        payload.insert(
            "search.sources".into(),
            serde_json::to_value(&sources).unwrap_or_default(),
        );
        payload.insert(
            "search.stats".into(),
            json!({
                "semantic": semantic_count,
                "fulltext": fulltext_count,
                "related": related_count,
                "mean_relevance": mean_relevance,
            }),
        );

        let mut metadata = Payload::new();
        metadata.insert("strategy_errors".into(), json!(errors));

        Ok(AgentOutcome {
            credits: sources.len() as f64 * CREDITS_PER_SOURCE,
            payload,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentInput;
    use crate::context::ResearchContext;
    use crate::retrieval::{MemorySearchIndex, MemoryStorage, ScoredSource, SearchProvider};
    use std::sync::Arc;

    struct BrokenProvider;

    #[async_trait]
    impl SearchProvider for BrokenProvider {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
            _verified_only: bool,
        ) -> anyhow::Result<Vec<ScoredSource>> {
            anyhow::bail!("semantic backend offline")
        }

        async fn search_fulltext(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<Source>> {
            anyhow::bail!("fulltext backend offline")
        }
    }

    fn seeded_index() -> Arc<MemorySearchIndex> {
        let index = MemorySearchIndex::new();
        index.insert(
            Source::new(
                "ml-1",
                "Machine learning overview",
                "Machine learning systems learn patterns from data and improve with experience.",
            )
            .with_verified(true)
            .with_tags(vec!["machine".into(), "learning".into()]),
        );
        index.insert(Source::new(
            "ml-2",
            "Training neural networks",
            "Neural networks are machine learning models trained with gradient descent.",
        ));
        index.insert(Source::new(
            "db-1",
            "Database indexing",
            "B-tree indexes accelerate database lookups considerably.",
        ));
        Arc::new(index)
    }

    fn context_with_provider(provider: Arc<dyn SearchProvider>) -> ResearchContext {
        ResearchContext::new()
            .with_search_provider(provider)
            .with_storage(Arc::new(MemoryStorage))
    }

    #[tokio::test]
    async fn missing_search_engine_is_a_hard_failure() {
        let searcher = SearcherAgent::new();
        let ctx = ResearchContext::new();
        let data = Payload::new();
        let input = AgentInput {
            query: "anything",
            data: &data,
            ctx: &ctx,
        };

        let err = searcher.perform(&input).await.unwrap_err();
        assert!(err.to_string().contains("Database connection"));
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn results_are_deduplicated_and_sorted() {
        let searcher = SearcherAgent::new();
        let ctx = context_with_provider(seeded_index());
        let data = Payload::new();
        let input = AgentInput {
            query: "machine learning",
            data: &data,
            ctx: &ctx,
        };

        let outcome = searcher.perform(&input).await.expect("search");
        let sources: Vec<Source> =
            serde_json::from_value(outcome.payload.get("search.sources").cloned().unwrap()).unwrap();

        let mut ids: Vec<&str> = sources.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), sources.len(), "duplicate ids survived dedup");

        let now = Utc::now();
        for pair in sources.windows(2) {
            assert!(
                pair[0].composite_score(now) >= pair[1].composite_score(now),
                "sources not sorted by composite score"
            );
        }
        assert!((outcome.credits - sources.len() as f64 * CREDITS_PER_SOURCE).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn all_strategies_failing_fails_the_agent() {
        let searcher = SearcherAgent::new();
        let ctx = context_with_provider(Arc::new(BrokenProvider));
        let data = Payload::new();
        let input = AgentInput {
            query: "machine learning",
            data: &data,
            ctx: &ctx,
        };

        let err = searcher.perform(&input).await.unwrap_err();
        assert!(matches!(err, AgentError::Upstream(_)));
    }

    #[tokio::test]
    async fn single_result_is_tagged_semantic() {
        let index = MemorySearchIndex::new();
        index.insert(
            Source::new(
                "only",
                "Machine learning",
                "Machine learning is the study of algorithms that improve through data.",
            )
            .with_verified(true),
        );
        let searcher = SearcherAgent::new();
        let ctx = context_with_provider(Arc::new(index));
        let data = Payload::new();
        let input = AgentInput {
            query: "machine learning",
            data: &data,
            ctx: &ctx,
        };

        let outcome = searcher.perform(&input).await.expect("search");
        let sources: Vec<Source> =
            serde_json::from_value(outcome.payload.get("search.sources").cloned().unwrap()).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].search_method, SearchMethod::Semantic);
    }
}
