//! SQLite-backed passage store

use super::{Database, Distance, PartitionInfo, PassageStore, SearchHit, StoreError};
use crate::corpus::{Book, ChunkType, Passage};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const PASSAGE_COLUMNS: &str =
    "id, book, part, chapter, topic, sub_topic, chunk_type, speaker, text, page_range, vector";

/// Passage store over the Claritas SQLite database.
///
/// Vectors are stored as little-endian `f32` blobs. Search scans the whole
/// partition and scores every passage by cosine similarity.
#[derive(Clone)]
pub struct SqlitePassageStore {
    database: Database,
}

impl SqlitePassageStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Open the database at `path`, creating and migrating it if needed
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        Ok(Self::new(Database::new(path)?))
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        self.database
            .get_conn()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Dimension of an existing partition
    fn partition_dimension(conn: &Connection, book: Book) -> Result<usize, StoreError> {
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT dimension, distance FROM partitions WHERE name = ?1",
                params![book.partition_name()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (dimension, distance) =
            row.ok_or_else(|| StoreError::PartitionMissing(book.partition_name().to_string()))?;
        Distance::parse(&distance)?;

        Ok(dimension as usize)
    }

    fn read_partition(conn: &Connection, book: Book) -> Result<Option<PartitionInfo>, StoreError> {
        let row: Option<(i64, String, i64)> = conn
            .query_row(
                "SELECT p.dimension, p.distance,
                        (SELECT COUNT(*) FROM passages WHERE partition = p.name)
                 FROM partitions p WHERE p.name = ?1",
                params![book.partition_name()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(dimension, distance, count)| {
            Ok::<_, StoreError>(PartitionInfo {
                name: book.partition_name().to_string(),
                book,
                dimension: dimension as usize,
                distance: Distance::parse(&distance)?,
                passage_count: count as usize,
            })
        })
        .transpose()
    }

    /// Reject the whole batch before anything is written
    fn check_batch(book: Book, dimension: usize, passages: &[Passage]) -> Result<(), StoreError> {
        let mut seen = HashSet::with_capacity(passages.len());

        for passage in passages {
            if passage.id.trim().is_empty() {
                return Err(StoreError::invalid("<missing id>", "id is empty"));
            }
            if passage.text.trim().is_empty() {
                return Err(StoreError::invalid(&passage.id, "text is empty"));
            }
            if passage.book != book {
                return Err(StoreError::invalid(
                    &passage.id,
                    format!(
                        "belongs to '{}' but was written to partition {}",
                        passage.book,
                        book.partition_name()
                    ),
                ));
            }
            if !seen.insert(passage.id.as_str()) {
                return Err(StoreError::invalid(&passage.id, "duplicate id in batch"));
            }
            if passage.vector.len() != dimension {
                return Err(StoreError::DimensionMismatch {
                    partition: book.partition_name().to_string(),
                    expected: dimension,
                    actual: passage.vector.len(),
                });
            }
        }

        Ok(())
    }

    fn load_rows(
        conn: &Connection,
        book: Book,
        limit: Option<usize>,
    ) -> Result<Vec<PassageRow>, StoreError> {
        let limit = limit.map_or(-1, |l| l as i64);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM passages WHERE partition = ?1 ORDER BY seq LIMIT ?2",
            PASSAGE_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![book.partition_name(), limit], PassageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

impl PassageStore for SqlitePassageStore {
    fn create_partition(&self, book: Book, dimension: usize) -> Result<PartitionInfo, StoreError> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO partitions (name, book, dimension, distance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                book.partition_name(),
                book.name(),
                dimension as i64,
                Distance::Cosine.as_str(),
                chrono::Utc::now().timestamp()
            ],
        )?;

        let info = Self::read_partition(&conn, book)?
            .ok_or_else(|| StoreError::PartitionMissing(book.partition_name().to_string()))?;

        if info.dimension != dimension {
            return Err(StoreError::DimensionMismatch {
                partition: info.name,
                expected: info.dimension,
                actual: dimension,
            });
        }

        if inserted > 0 {
            tracing::info!(
                "Created partition {} ({}D, {})",
                info.name,
                info.dimension,
                info.distance.as_str()
            );
        }

        Ok(info)
    }

    fn upsert(&self, book: Book, passages: &[Passage]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let dimension = Self::partition_dimension(&tx, book)?;
        Self::check_batch(book, dimension, passages)?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO passages (partition, {})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(partition, id) DO UPDATE SET
                    book = excluded.book,
                    part = excluded.part,
                    chapter = excluded.chapter,
                    topic = excluded.topic,
                    sub_topic = excluded.sub_topic,
                    chunk_type = excluded.chunk_type,
                    speaker = excluded.speaker,
                    text = excluded.text,
                    page_range = excluded.page_range,
                    vector = excluded.vector",
                PASSAGE_COLUMNS
            ))?;

            for passage in passages {
                stmt.execute(params![
                    book.partition_name(),
                    passage.id,
                    passage.book.name(),
                    passage.part,
                    passage.chapter,
                    passage.topic,
                    passage.sub_topic,
                    passage.chunk_type.map(|c| c.as_str()),
                    passage.speaker,
                    passage.text,
                    passage.page_range,
                    encode_vector(&passage.vector),
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            "Upserted {} passages into {}",
            passages.len(),
            book.partition_name()
        );

        Ok(passages.len())
    }

    fn similarity_search(
        &self,
        book: Book,
        query: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let conn = self.conn()?;
        let dimension = Self::partition_dimension(&conn, book)?;

        if query.len() != dimension {
            return Err(StoreError::DimensionMismatch {
                partition: book.partition_name().to_string(),
                expected: dimension,
                actual: query.len(),
            });
        }

        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for row in Self::load_rows(&conn, book, None)? {
            let passage = row.into_passage(dimension)?;
            let score = cosine_similarity(query, &passage.vector);
            if score >= score_threshold {
                hits.push(SearchHit { passage, score });
            }
        }

        // Stable: equal scores keep store order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);

        Ok(hits)
    }

    fn full_scan(&self, book: Book, limit: usize) -> Result<Vec<Passage>, StoreError> {
        let conn = self.conn()?;
        let dimension = Self::partition_dimension(&conn, book)?;

        Self::load_rows(&conn, book, Some(limit))?
            .into_iter()
            .map(|row| row.into_passage(dimension))
            .collect()
    }

    fn partition_info(&self, book: Book) -> Result<Option<PartitionInfo>, StoreError> {
        let conn = self.conn()?;
        Self::read_partition(&conn, book)
    }
}

/// Raw columns of a `passages` row, validated before becoming a `Passage`
struct PassageRow {
    id: String,
    book: String,
    part: Option<String>,
    chapter: Option<String>,
    topic: Option<String>,
    sub_topic: Option<String>,
    chunk_type: Option<String>,
    speaker: Option<String>,
    text: String,
    page_range: Option<String>,
    vector: Vec<u8>,
}

impl PassageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            book: row.get(1)?,
            part: row.get(2)?,
            chapter: row.get(3)?,
            topic: row.get(4)?,
            sub_topic: row.get(5)?,
            chunk_type: row.get(6)?,
            speaker: row.get(7)?,
            text: row.get(8)?,
            page_range: row.get(9)?,
            vector: row.get(10)?,
        })
    }

    fn into_passage(self, dimension: usize) -> Result<Passage, StoreError> {
        let book = Book::from_name(&self.book)
            .ok_or_else(|| StoreError::invalid(&self.id, format!("unknown book '{}'", self.book)))?;

        let chunk_type = match self.chunk_type.as_deref() {
            Some(raw) => Some(ChunkType::parse(raw).ok_or_else(|| {
                StoreError::invalid(&self.id, format!("unknown chunk type '{}'", raw))
            })?),
            None => None,
        };

        if self.text.trim().is_empty() {
            return Err(StoreError::invalid(&self.id, "text is empty"));
        }

        let vector = decode_vector(&self.vector)
            .ok_or_else(|| StoreError::invalid(&self.id, "vector blob is not a list of f32"))?;
        if vector.len() != dimension {
            return Err(StoreError::DimensionMismatch {
                partition: book.partition_name().to_string(),
                expected: dimension,
                actual: vector.len(),
            });
        }

        Ok(Passage {
            id: self.id,
            book,
            part: self.part,
            chapter: self.chapter,
            topic: self.topic,
            sub_topic: self.sub_topic,
            chunk_type,
            speaker: self.speaker,
            text: self.text,
            page_range: self.page_range,
            vector,
        })
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Cosine similarity in [-1, 1]. Mismatched lengths and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
