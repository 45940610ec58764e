#![allow(dead_code)]

use claritas::config::{RankingConfig, RetrievalConfig};
use claritas::corpus::{Book, Passage};
use claritas::embedding::{EmbeddingError, EmbeddingProvider};
use claritas::retrieval::RetrievalEngine;
use claritas::storage::{PartitionInfo, PassageStore, SearchHit, SqlitePassageStore, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const DIM: usize = 2;

/// Embeds every text to the same unit vector
pub struct ConstantEmbedder(pub Vec<f32>);

impl ConstantEmbedder {
    pub fn unit() -> Self {
        Self(vec![1.0, 0.0])
    }
}

impl EmbeddingProvider for ConstantEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.0.clone())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| self.0.clone()).collect())
    }

    fn dimension(&self) -> usize {
        self.0.len()
    }

    fn model_name(&self) -> &str {
        "constant"
    }
}

pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::GenerationError("model offline".to_string()))
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::GenerationError("model offline".to_string()))
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// How `FaultyStore` answers similarity search
#[derive(Clone, Copy)]
pub enum SearchFault {
    None,
    Unavailable,
    Slow(Duration),
    DimensionMismatch,
}

/// Real SQLite store whose similarity search misbehaves on demand. Every
/// other call goes through, so the keyword fallback sees real data.
pub struct FaultyStore {
    pub inner: SqlitePassageStore,
    pub fault: SearchFault,
    pub searches: AtomicUsize,
    pub scans: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: SqlitePassageStore, fault: SearchFault) -> Self {
        Self {
            inner,
            fault,
            searches: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
        }
    }
}

impl PassageStore for FaultyStore {
    fn create_partition(&self, book: Book, dimension: usize) -> Result<PartitionInfo, StoreError> {
        self.inner.create_partition(book, dimension)
    }

    fn upsert(&self, book: Book, passages: &[Passage]) -> Result<usize, StoreError> {
        self.inner.upsert(book, passages)
    }

    fn similarity_search(
        &self,
        book: Book,
        query: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            SearchFault::None => self.inner.similarity_search(book, query, limit, score_threshold),
            SearchFault::Unavailable => {
                Err(StoreError::Unavailable("connection refused".to_string()))
            }
            SearchFault::Slow(delay) => {
                std::thread::sleep(delay);
                self.inner.similarity_search(book, query, limit, score_threshold)
            }
            SearchFault::DimensionMismatch => Err(StoreError::DimensionMismatch {
                partition: book.partition_name().to_string(),
                expected: 384,
                actual: query.len(),
            }),
        }
    }

    fn full_scan(&self, book: Book, limit: usize) -> Result<Vec<Passage>, StoreError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.inner.full_scan(book, limit)
    }

    fn partition_info(&self, book: Book) -> Result<Option<PartitionInfo>, StoreError> {
        self.inner.partition_info(book)
    }
}

pub fn open_store() -> (TempDir, SqlitePassageStore) {
    let dir = TempDir::new().unwrap();
    let store = SqlitePassageStore::open(&dir.path().join("passages.sqlite")).unwrap();
    (dir, store)
}

/// Create the book's partition and load `passages`, which must carry vectors
pub fn seed(store: &dyn PassageStore, book: Book, passages: Vec<Passage>) {
    store.create_partition(book, DIM).unwrap();
    store.upsert(book, &passages).unwrap();
}

/// Passage whose vector sits at `similarity` to the unit query `[1, 0]`
pub fn passage_at(id: &str, book: Book, text: &str, similarity: f32) -> Passage {
    let other = (1.0 - similarity * similarity).max(0.0).sqrt();
    Passage::new(id, book, text).with_vector(vec![similarity, other])
}

pub fn ranking(primary_speaker: &str) -> RankingConfig {
    RankingConfig {
        primary_speaker: primary_speaker.to_string(),
        ..Default::default()
    }
}

pub fn engine(
    embedder: impl EmbeddingProvider + 'static,
    store: Arc<dyn PassageStore>,
    retrieval: RetrievalConfig,
) -> RetrievalEngine {
    RetrievalEngine::new(
        Arc::new(embedder),
        store,
        retrieval,
        &ranking("primary author"),
    )
    .unwrap()
}
