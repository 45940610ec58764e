mod common;

use claritas::config::RetrievalConfig;
use claritas::corpus::{Book, ChunkType};
use claritas::ingestion::{self, Ingestor};
use claritas::retrieval::{QueryContext, RetrievalMode};
use claritas::storage::{PassageStore, SqlitePassageStore};
use claritas::ClaritasError;
use common::*;
use std::sync::Arc;
use tempfile::TempDir;

const GOD_SPEAKS_PART_ONE: &str = r#"[
  {"id": "gs_ch1", "chapter": "One", "part": 1, "text": "God is infinite and beyond the beyond.", "page_range": [1, 4]},
  {"id": "gs_ch2_s1", "chapter": "Two", "part": 1, "section": "The Whim", "text": "The original whim set creation in motion."}
]"#;

const GOD_SPEAKS_PART_TWO: &str = r#"[
  {"id": "gs_supplement_3", "chapter": "Supplement", "topic": "Sanskaras", "text": "Sanskaras are impressions."}
]"#;

#[test]
fn test_normalize_directory_round_trip() {
    let dir = TempDir::new().unwrap();
    let raw_dir = dir.path().join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    std::fs::write(raw_dir.join("b_part2.json"), GOD_SPEAKS_PART_TWO).unwrap();
    std::fs::write(raw_dir.join("a_part1.json"), GOD_SPEAKS_PART_ONE).unwrap();
    std::fs::write(raw_dir.join("notes.txt"), "ignored").unwrap();

    let raw = ingestion::load_raw_chunks(&raw_dir).unwrap();
    let passages = ingestion::normalize_all(Book::GodSpeaks, &raw).unwrap();

    let ids: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["gs_ch1", "gs_ch2_s1", "gs_supplement_3"]);
    assert_eq!(passages[0].page_range.as_deref(), Some("1-4"));
    assert_eq!(passages[1].chunk_type, Some(ChunkType::Section));
    assert_eq!(passages[2].chunk_type, Some(ChunkType::Supplement));

    let out = dir.path().join("normalized").join("god_speaks.json");
    ingestion::save_normalized(&out, &passages).unwrap();

    let loaded = ingestion::load_normalized(&out).unwrap();
    assert_eq!(loaded, passages);
}

#[test]
fn test_bad_raw_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("raw.json");
    std::fs::write(&path, r#"{"id": "not a list"}"#).unwrap();

    let err = ingestion::load_raw_chunks(&path).unwrap_err();
    assert!(matches!(err, ClaritasError::Json { .. }));
}

#[tokio::test]
async fn test_ingested_passages_are_retrievable() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("passages.sqlite");

    let raw_path = dir.path().join("raw.json");
    std::fs::write(&raw_path, GOD_SPEAKS_PART_ONE).unwrap();
    let raw = ingestion::load_raw_chunks(&raw_path).unwrap();
    let passages = ingestion::normalize_all(Book::GodSpeaks, &raw).unwrap();

    {
        let store: Arc<dyn PassageStore> = Arc::new(SqlitePassageStore::open(&db_path).unwrap());
        let ingestor = Ingestor::new(Arc::new(ConstantEmbedder::unit()), store, 1)
            .with_default_speaker("primary author");
        let report = ingestor.ingest(Book::GodSpeaks, passages).unwrap();
        assert_eq!(report.written, 2);
    }

    // Reopen to read what was persisted
    let store: Arc<dyn PassageStore> = Arc::new(SqlitePassageStore::open(&db_path).unwrap());
    let info = store.partition_info(Book::GodSpeaks).unwrap().unwrap();
    assert_eq!(info.passage_count, 2);
    assert_eq!(info.dimension, DIM);

    let engine = engine(ConstantEmbedder::unit(), store, RetrievalConfig::default());
    let ctx = QueryContext::new("why was the world created").with_topics(["whim"]);
    let retrieval = engine
        .retrieve_scored("God Speaks", &ctx, 6, 0.2)
        .await
        .unwrap();

    assert_eq!(retrieval.mode, RetrievalMode::Vector);
    assert_eq!(retrieval.results.len(), 2);
    assert_eq!(retrieval.results[0].passage.id, "gs_ch2_s1");
    assert_eq!(
        retrieval.results[0].passage.speaker.as_deref(),
        Some("primary author")
    );
}

#[test]
fn test_reingest_with_other_dimension_fails() {
    let (_dir, store) = open_store();
    let store: Arc<dyn PassageStore> = Arc::new(store);
    let passages = vec![claritas::corpus::Passage::new("le_1", Book::LifeEternal, "Love.")];

    Ingestor::new(Arc::new(ConstantEmbedder::unit()), store.clone(), 8)
        .ingest(Book::LifeEternal, passages.clone())
        .unwrap();

    let wider = ConstantEmbedder(vec![1.0, 0.0, 0.0]);
    let err = Ingestor::new(Arc::new(wider), store.clone(), 8)
        .ingest(Book::LifeEternal, passages)
        .unwrap_err();
    assert!(matches!(err, ClaritasError::Store(_)));

    assert_eq!(store.full_scan(Book::LifeEternal, 10).unwrap().len(), 1);
}
