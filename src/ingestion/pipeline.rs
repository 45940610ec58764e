//! Embed normalized passages and load them into the book's partition

use crate::corpus::{Book, Passage};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::error::{ClaritasError, Result};
use crate::storage::PassageStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub book: Book,
    pub partition: String,
    pub dimension: usize,
    pub written: usize,
    pub duration_ms: u64,
}

/// Embeds passages in batches and writes them with a single upsert, so a
/// failed run leaves the partition as it was.
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn PassageStore>,
    batch_size: usize,
    default_speaker: Option<String>,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn PassageStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
            default_speaker: None,
        }
    }

    /// Speaker stamped on passages that carry none
    pub fn with_default_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.default_speaker = Some(speaker.into());
        self
    }

    pub fn ingest(&self, book: Book, mut passages: Vec<Passage>) -> Result<IngestReport> {
        let start = std::time::Instant::now();

        self.check_passages(book, &passages)?;

        let dimension = self.embedder.dimension();
        let partition = self.store.create_partition(book, dimension)?;
        info!(
            "Ingesting {} passages into {} ({} dims, model {})",
            passages.len(),
            partition.name,
            dimension,
            self.embedder.model_name()
        );

        if let Some(speaker) = &self.default_speaker {
            for passage in passages.iter_mut().filter(|p| p.speaker.is_none()) {
                passage.speaker = Some(speaker.clone());
            }
        }

        let total = passages.len();
        let mut embedded = 0;
        for chunk in passages.chunks_mut(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|p| p.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;

            if vectors.len() != chunk.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "Expected {} embeddings, got {}",
                    chunk.len(),
                    vectors.len()
                ))
                .into());
            }

            for (passage, vector) in chunk.iter_mut().zip(vectors) {
                if vector.len() != dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: vector.len(),
                    }
                    .into());
                }
                passage.vector = vector;
            }

            embedded += chunk.len();
            info!("Embedded {}/{} passages", embedded, total);
        }

        let written = self.store.upsert(book, &passages)?;
        let duration_ms = start.elapsed().as_millis() as u64;
        debug!("Upsert into {} took {}ms total", partition.name, duration_ms);

        Ok(IngestReport {
            book,
            partition: partition.name,
            dimension,
            written,
            duration_ms,
        })
    }

    fn check_passages(&self, book: Book, passages: &[Passage]) -> Result<()> {
        let mut seen = HashSet::new();

        for passage in passages {
            passage.validate()?;

            if passage.book != book {
                return Err(ClaritasError::malformed(
                    &passage.id,
                    format!("belongs to {}, not {}", passage.book, book),
                ));
            }
            if !seen.insert(passage.id.as_str()) {
                return Err(ClaritasError::malformed(&passage.id, "duplicate id in batch"));
            }
        }

        Ok(())
    }
}
