//! Passage storage
//!
//! Passages live in per-book partitions of a SQLite database. Similarity
//! search is exact cosine over the partition, which is cheap at the corpus
//! size (low thousands of passages per book).

pub mod database;
mod passages;

use crate::corpus::{Book, Passage};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub use database::{Database, DbPool};
pub use passages::{cosine_similarity, SqlitePassageStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Passage store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Partition not found: {0}")]
    PartitionMissing(String),

    #[error("Dimension mismatch in partition {partition}: expected {expected}, got {actual}")]
    DimensionMismatch {
        partition: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid passage {id}: {reason}")]
    InvalidPassage { id: String, reason: String },

    #[error("Unsupported distance metric: {0}")]
    UnsupportedDistance(String),
}

impl StoreError {
    /// Whether the failure is a passing service condition (worth degrading to
    /// the keyword fallback) rather than corrupt or misconfigured state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Timeout(_) | StoreError::Database(_)
        )
    }

    pub(crate) fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidPassage {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Distance metric of a partition, fixed when the partition is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Cosine,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "cosine",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "cosine" => Ok(Distance::Cosine),
            other => Err(StoreError::UnsupportedDistance(other.to_string())),
        }
    }
}

/// Description of one partition
#[derive(Debug, Clone, Serialize)]
pub struct PartitionInfo {
    pub name: String,
    pub book: Book,
    pub dimension: usize,
    pub distance: Distance,
    pub passage_count: usize,
}

/// A passage with its raw similarity to the query (1.0 = same direction)
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub passage: Passage,
    pub score: f32,
}

/// Persistent, book-partitioned passage collection.
///
/// Every method reports failure through `StoreError` so callers can tell a
/// search that found nothing from a search that could not run.
pub trait PassageStore: Send + Sync {
    /// Create the partition for `book` sized to `dimension`. Re-creating with
    /// the same dimension is a no-op; a different dimension is an error.
    fn create_partition(&self, book: Book, dimension: usize) -> Result<PartitionInfo, StoreError>;

    /// Insert or replace passages by id
    fn upsert(&self, book: Book, passages: &[Passage]) -> Result<usize, StoreError>;

    /// Up to `limit` passages with similarity >= `score_threshold`, most
    /// similar first
    fn similarity_search(
        &self,
        book: Book,
        query: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError>;

    /// Up to `limit` passages in store order
    fn full_scan(&self, book: Book, limit: usize) -> Result<Vec<Passage>, StoreError>;

    /// Partition metadata, `None` if the partition was never created
    fn partition_info(&self, book: Book) -> Result<Option<PartitionInfo>, StoreError>;

    /// Metadata for every partition that exists
    fn list_partitions(&self) -> Result<Vec<PartitionInfo>, StoreError> {
        let mut partitions = Vec::new();
        for book in Book::ALL {
            if let Some(info) = self.partition_info(book)? {
                partitions.push(info);
            }
        }
        Ok(partitions)
    }
}
