//! Retrieval pipeline: resolve book, embed, search, rank, or fall back

use crate::config::{RankingConfig, RetrievalConfig};
use crate::corpus::{Book, Passage};
use crate::embedding::EmbeddingProvider;
use crate::retrieval::{
    CandidateRanker, KeywordFallback, QueryContext, Retrieval, RetrievalError, RetrievalMode,
};
use crate::storage::{PassageStore, SearchHit, StoreError};
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Stateless retrieval pipeline over a shared embedder and passage store.
///
/// Both dependencies are built once per process and injected, so one engine
/// can serve concurrent requests and tests can substitute doubles.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn PassageStore>,
    ranker: CandidateRanker,
    fallback: KeywordFallback,
    config: RetrievalConfig,
    search_timeout: Duration,
    embed_timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn PassageStore>,
        config: RetrievalConfig,
        ranking: &RankingConfig,
    ) -> Result<Self, RetrievalError> {
        let search_timeout = config
            .search_timeout()
            .map_err(|e| RetrievalError::InvalidConfig(e.to_string()))?;
        let embed_timeout = config
            .embed_timeout()
            .map_err(|e| RetrievalError::InvalidConfig(e.to_string()))?;

        if config.search_multiplier == 0 {
            return Err(RetrievalError::InvalidConfig(
                "search_multiplier must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            store,
            ranker: CandidateRanker::from_config(ranking),
            fallback: KeywordFallback::new(config.fallback_scan_limit),
            config,
            search_timeout,
            embed_timeout,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve with the configured `top_k` and score threshold
    pub async fn retrieve(
        &self,
        book: &str,
        query: &QueryContext,
    ) -> Result<Vec<Passage>, RetrievalError> {
        self.retrieve_with(book, query, self.config.top_k, self.config.score_threshold)
            .await
    }

    /// At most `top_k` passages, most relevant first. Empty when the book is
    /// unknown or nothing clears the threshold.
    pub async fn retrieve_with(
        &self,
        book: &str,
        query: &QueryContext,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<Passage>, RetrievalError> {
        Ok(self
            .retrieve_scored(book, query, top_k, threshold)
            .await?
            .into_passages())
    }

    /// Like `retrieve_with`, keeping scores and the path that produced them.
    ///
    /// Outages, timeouts and embedding failures degrade to the keyword
    /// fallback and never surface as errors. Only store failures that point
    /// at broken setup (missing partition, dimension mismatch, corrupt rows)
    /// are returned.
    pub async fn retrieve_scored(
        &self,
        book: &str,
        query: &QueryContext,
        top_k: usize,
        threshold: f32,
    ) -> Result<Retrieval, RetrievalError> {
        let Some(resolved) = Book::from_name(book) else {
            debug!("Unknown book '{}', returning no passages", book);
            return Ok(Retrieval::skipped());
        };

        if top_k == 0 || query.query.trim().is_empty() {
            return Ok(Retrieval::skipped());
        }

        let text = if self.config.augment_query_with_hints {
            query.embedding_text()
        } else {
            query.query.trim().to_string()
        };

        let vector = match self.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Query embedding failed, using keyword fallback: {}", e);
                return Ok(self.keyword_fallback(resolved, &query.query, top_k).await);
            }
        };

        let limit = top_k.saturating_mul(self.config.search_multiplier);
        match self.similarity_search(resolved, vector, limit, threshold).await {
            Ok(hits) => {
                debug!(
                    "Similarity search on {} returned {} candidates",
                    resolved.partition_name(),
                    hits.len()
                );
                let mut results =
                    self.ranker
                        .rank(hits, &query.router_topics, &query.router_keywords);
                results.truncate(top_k);

                Ok(Retrieval {
                    mode: RetrievalMode::Vector,
                    results,
                })
            }
            Err(e) if e.is_transient() => {
                warn!(
                    "Vector search on {} failed, using keyword fallback: {}",
                    resolved.partition_name(),
                    e
                );
                Ok(self.keyword_fallback(resolved, &query.query, top_k).await)
            }
            Err(e) => {
                error!(
                    "Passage store is misconfigured for {}: {}",
                    resolved.partition_name(),
                    e
                );
                Err(RetrievalError::Store(e))
            }
        }
    }

    async fn embed(&self, text: String) -> anyhow::Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let task = tokio::task::spawn_blocking(move || embedder.embed(&text));

        match timeout(self.embed_timeout, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join_error)) => Err(anyhow!("embedding task failed: {}", join_error)),
            Err(_) => Err(anyhow!("embedding timed out after {:?}", self.embed_timeout)),
        }
    }

    async fn similarity_search(
        &self,
        book: Book,
        vector: Vec<f32>,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || {
            store.similarity_search(book, &vector, limit, threshold)
        });

        match timeout(self.search_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StoreError::Unavailable(format!(
                "search task failed: {}",
                join_error
            ))),
            Err(_) => Err(StoreError::Timeout(self.search_timeout)),
        }
    }

    /// Fallback output is returned as-is, without a ranking pass. If the scan
    /// itself fails the answer is empty.
    async fn keyword_fallback(&self, book: Book, query: &str, top_k: usize) -> Retrieval {
        let store = Arc::clone(&self.store);
        let fallback = self.fallback.clone();
        let query = query.to_string();
        let task =
            tokio::task::spawn_blocking(move || fallback.search(store.as_ref(), book, &query, top_k));

        let results = match timeout(self.search_timeout, task).await {
            Ok(Ok(Ok(results))) => results,
            Ok(Ok(Err(e))) => {
                warn!("Keyword fallback on {} failed: {}", book.partition_name(), e);
                Vec::new()
            }
            Ok(Err(join_error)) => {
                warn!("Keyword fallback task failed: {}", join_error);
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "Keyword fallback on {} timed out after {:?}",
                    book.partition_name(),
                    self.search_timeout
                );
                Vec::new()
            }
        };

        Retrieval {
            mode: RetrievalMode::Fallback,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::storage::PartitionInfo;

    struct ConstantEmbedder;

    impl EmbeddingProvider for ConstantEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "constant"
        }
    }

    /// Store that must never be reached
    struct UnreachableStore;

    impl PassageStore for UnreachableStore {
        fn create_partition(&self, _: Book, _: usize) -> Result<PartitionInfo, StoreError> {
            panic!("store called")
        }
        fn upsert(&self, _: Book, _: &[Passage]) -> Result<usize, StoreError> {
            panic!("store called")
        }
        fn similarity_search(
            &self,
            _: Book,
            _: &[f32],
            _: usize,
            _: f32,
        ) -> Result<Vec<SearchHit>, StoreError> {
            panic!("store called")
        }
        fn full_scan(&self, _: Book, _: usize) -> Result<Vec<Passage>, StoreError> {
            panic!("store called")
        }
        fn partition_info(&self, _: Book) -> Result<Option<PartitionInfo>, StoreError> {
            panic!("store called")
        }
    }

    fn engine(config: RetrievalConfig) -> Result<RetrievalEngine, RetrievalError> {
        RetrievalEngine::new(
            Arc::new(ConstantEmbedder),
            Arc::new(UnreachableStore),
            config,
            &RankingConfig::default(),
        )
    }

    #[test]
    fn test_rejects_bad_timeouts() {
        let config = RetrievalConfig {
            search_timeout: "whenever".to_string(),
            ..Default::default()
        };
        assert!(matches!(engine(config), Err(RetrievalError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_multiplier() {
        let config = RetrievalConfig {
            search_multiplier: 0,
            ..Default::default()
        };
        assert!(engine(config).is_err());
    }

    #[tokio::test]
    async fn test_short_circuits_without_store() {
        let engine = engine(RetrievalConfig::default()).unwrap();

        let unknown = engine
            .retrieve_scored("Discourses", &QueryContext::new("love"), 6, 0.2)
            .await
            .unwrap();
        assert_eq!(unknown.mode, RetrievalMode::Skipped);
        assert!(unknown.is_empty());

        let zero_k = engine
            .retrieve_with("God Speaks", &QueryContext::new("love"), 0, 0.2)
            .await
            .unwrap();
        assert!(zero_k.is_empty());

        let blank = engine
            .retrieve("God Speaks", &QueryContext::new("   "))
            .await
            .unwrap();
        assert!(blank.is_empty());
    }
}
