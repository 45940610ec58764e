//! Raw chunk files to canonical passages
//!
//! Chunking scripts emit loosely-shaped JSON objects. Each book has its own
//! rules for turning them into `Passage` records; a record that cannot be
//! normalized stops the run with its id and position.

use crate::corpus::{value_to_string, Book, ChunkType, Passage};
use crate::error::{ClaritasError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub type RawChunk = Map<String, Value>;

/// Normalize one raw chunk for `book`
pub fn normalize_chunk(book: Book, raw: &RawChunk) -> Result<Passage> {
    let passage = match book {
        Book::GodSpeaks => normalize_god_speaks(raw)?,
        Book::LifeEternal => normalize_life_eternal(raw)?,
    };
    validate_normalized(&passage)?;
    Ok(passage)
}

/// Normalize a whole batch, failing on the first bad record
pub fn normalize_all(book: Book, raw_chunks: &[RawChunk]) -> Result<Vec<Passage>> {
    let mut normalized = Vec::with_capacity(raw_chunks.len());

    for (idx, raw) in raw_chunks.iter().enumerate() {
        let passage = normalize_chunk(book, raw).map_err(|e| match e {
            ClaritasError::MalformedPassage { id, reason } => ClaritasError::MalformedPassage {
                id,
                reason: format!("{} (record {} of {})", reason, idx + 1, raw_chunks.len()),
            },
            other => other,
        })?;
        normalized.push(passage);
    }

    tracing::info!("Normalized {} {} chunks", normalized.len(), book);
    Ok(normalized)
}

fn normalize_god_speaks(raw: &RawChunk) -> Result<Passage> {
    let id = field(raw, "id")?.unwrap_or_default();
    let text = required_text(raw, &id)?;

    let chapter = field(raw, "chapter")?;
    let is_supplement = chapter.as_deref() == Some("Supplement")
        || id.to_lowercase().contains("supplement");

    let (chunk_type, sub_topic, part) = if is_supplement {
        let sub_topic = field(raw, "topic")?.unwrap_or_else(|| "Supplement".to_string());
        (ChunkType::Supplement, sub_topic, None)
    } else if raw.contains_key("section") {
        let section = field(raw, "section")?
            .ok_or_else(|| ClaritasError::malformed(&id, "section is empty"))?;
        (ChunkType::Section, section, field(raw, "part")?)
    } else {
        (
            ChunkType::Full,
            "Complete Chapter".to_string(),
            field(raw, "part")?,
        )
    };

    Ok(Passage {
        id,
        book: Book::GodSpeaks,
        part,
        chapter: Some(chapter.unwrap_or_else(|| "Unknown".to_string())),
        topic: None,
        sub_topic: Some(sub_topic),
        chunk_type: Some(chunk_type),
        speaker: field(raw, "speaker")?,
        text,
        page_range: field(raw, "page_range")?,
        vector: Vec::new(),
    })
}

fn normalize_life_eternal(raw: &RawChunk) -> Result<Passage> {
    let id = field(raw, "id")?.unwrap_or_default();
    let text = required_text(raw, &id)?;
    let topic = field(raw, "topic")?
        .ok_or_else(|| ClaritasError::malformed(&id, "missing topic"))?;
    let sub_topic = field(raw, "sub_topic")?.unwrap_or_else(|| topic.clone());

    Ok(Passage {
        id,
        book: Book::LifeEternal,
        part: None,
        chapter: None,
        topic: Some(topic),
        sub_topic: Some(sub_topic),
        chunk_type: Some(ChunkType::TopicSection),
        speaker: field(raw, "speaker")?,
        text,
        page_range: field(raw, "page_range")?,
        vector: Vec::new(),
    })
}

/// Fields every normalized passage must carry
fn validate_normalized(passage: &Passage) -> Result<()> {
    passage.validate()?;

    let required = match passage.book {
        Book::GodSpeaks => [("chapter", &passage.chapter), ("sub_topic", &passage.sub_topic)],
        Book::LifeEternal => [("topic", &passage.topic), ("sub_topic", &passage.sub_topic)],
    };
    for (name, value) in required {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            return Err(ClaritasError::malformed(
                &passage.id,
                format!("missing required field '{}'", name),
            ));
        }
    }

    if passage.chunk_type.is_none() {
        return Err(ClaritasError::malformed(&passage.id, "missing chunk type"));
    }

    Ok(())
}

fn required_text(raw: &RawChunk, id: &str) -> Result<String> {
    match raw.get("text") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ClaritasError::malformed(
            display_id(id),
            "missing or empty 'text'",
        )),
    }
}

fn field(raw: &RawChunk, key: &str) -> Result<Option<String>> {
    match raw.get(key) {
        None => Ok(None),
        Some(value) => value_to_string(value).map_err(|reason| {
            let id = raw.get("id").and_then(Value::as_str).unwrap_or_default();
            ClaritasError::malformed(display_id(id), format!("field '{}': {}", key, reason))
        }),
    }
}

fn display_id(id: &str) -> &str {
    if id.is_empty() {
        "<missing id>"
    } else {
        id
    }
}

/// Load raw chunks from a JSON file, or from every `*.json` file in a
/// directory (sorted by name). Each file must hold a list of objects.
pub fn load_raw_chunks(path: &Path) -> Result<Vec<RawChunk>> {
    let files = if path.is_dir() {
        json_files_in(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut chunks = Vec::new();
    for file in files {
        let loaded: Vec<RawChunk> = read_json(&file)?;
        tracing::info!("Loaded {} raw chunks from {}", loaded.len(), file.display());
        chunks.extend(loaded);
    }

    Ok(chunks)
}

fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ClaritasError::Io {
        source: e,
        context: format!("Failed to read chunk directory: {}", dir.display()),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ClaritasError::Io {
            source: e,
            context: format!("Failed to read entry in {}", dir.display()),
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// Read canonical passages written by `save_normalized`
pub fn load_normalized(path: &Path) -> Result<Vec<Passage>> {
    let passages: Vec<Passage> = read_json(path)?;
    for passage in &passages {
        passage.validate()?;
    }
    Ok(passages)
}

/// Write canonical passages as pretty JSON, creating parent directories
pub fn save_normalized(path: &Path, passages: &[Passage]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ClaritasError::Io {
            source: e,
            context: format!("Failed to create output directory: {}", parent.display()),
        })?;
    }

    let json = serde_json::to_string_pretty(passages).map_err(|e| ClaritasError::Json {
        source: e,
        context: "Failed to serialize passages".to_string(),
    })?;

    std::fs::write(path, json).map_err(|e| ClaritasError::Io {
        source: e,
        context: format!("Failed to write {}", path.display()),
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| ClaritasError::Io {
        source: e,
        context: format!("Failed to read {}", path.display()),
    })?;

    serde_json::from_str(&content).map_err(|e| ClaritasError::Json {
        source: e,
        context: format!("{} is not a list of chunk objects", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawChunk {
        match value {
            Value::Object(map) => map,
            _ => panic!("test chunk must be an object"),
        }
    }

    #[test]
    fn test_god_speaks_section() {
        let passage = normalize_chunk(
            Book::GodSpeaks,
            &raw(json!({
                "id": "gs_ch3_s2",
                "chapter": "Three",
                "part": 1,
                "section": "The Seven Planes",
                "text": "  The soul traverses the planes.  ",
                "page_range": "40-42"
            })),
        )
        .unwrap();

        assert_eq!(passage.chunk_type, Some(ChunkType::Section));
        assert_eq!(passage.sub_topic.as_deref(), Some("The Seven Planes"));
        assert_eq!(passage.part.as_deref(), Some("1"));
        assert_eq!(passage.text, "The soul traverses the planes.");
        assert_eq!(passage.page_range.as_deref(), Some("40-42"));
    }

    #[test]
    fn test_god_speaks_full_chapter_defaults() {
        let passage = normalize_chunk(
            Book::GodSpeaks,
            &raw(json!({"id": "gs_ch1", "text": "God is infinite."})),
        )
        .unwrap();

        assert_eq!(passage.chunk_type, Some(ChunkType::Full));
        assert_eq!(passage.sub_topic.as_deref(), Some("Complete Chapter"));
        assert_eq!(passage.chapter.as_deref(), Some("Unknown"));
    }

    #[test]
    fn test_god_speaks_supplement() {
        let by_chapter = normalize_chunk(
            Book::GodSpeaks,
            &raw(json!({
                "id": "gs_17",
                "chapter": "Supplement",
                "part": 2,
                "topic": "Avatar",
                "text": "The Avatar is always one."
            })),
        )
        .unwrap();
        assert_eq!(by_chapter.chunk_type, Some(ChunkType::Supplement));
        assert_eq!(by_chapter.sub_topic.as_deref(), Some("Avatar"));
        assert!(by_chapter.part.is_none());

        let by_id = normalize_chunk(
            Book::GodSpeaks,
            &raw(json!({"id": "Supplement_4", "chapter": "Ten", "text": "x"})),
        )
        .unwrap();
        assert_eq!(by_id.chunk_type, Some(ChunkType::Supplement));
        assert_eq!(by_id.sub_topic.as_deref(), Some("Supplement"));
    }

    #[test]
    fn test_missing_text_names_the_chunk() {
        let err = normalize_chunk(
            Book::GodSpeaks,
            &raw(json!({"id": "gs_9", "text": "   "})),
        )
        .unwrap_err();

        match err {
            ClaritasError::MalformedPassage { id, .. } => assert_eq!(id, "gs_9"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_life_eternal() {
        let passage = normalize_chunk(
            Book::LifeEternal,
            &raw(json!({
                "id": "le_suffering_1",
                "topic": "Suffering",
                "text": "Suffering purifies."
            })),
        )
        .unwrap();

        assert_eq!(passage.topic.as_deref(), Some("Suffering"));
        assert_eq!(passage.sub_topic.as_deref(), Some("Suffering"));
        assert_eq!(passage.chunk_type, Some(ChunkType::TopicSection));
    }

    #[test]
    fn test_life_eternal_requires_topic() {
        let err = normalize_chunk(
            Book::LifeEternal,
            &raw(json!({"id": "le_1", "text": "x"})),
        )
        .unwrap_err();
        assert!(matches!(err, ClaritasError::MalformedPassage { .. }));
    }

    #[test]
    fn test_missing_id_rejected() {
        let err = normalize_chunk(
            Book::LifeEternal,
            &raw(json!({"topic": "Love", "text": "x"})),
        )
        .unwrap_err();
        assert!(matches!(err, ClaritasError::MalformedPassage { .. }));
    }

    #[test]
    fn test_normalize_all_reports_position() {
        let chunks = vec![
            raw(json!({"id": "le_1", "topic": "Love", "text": "Love is God."})),
            raw(json!({"id": "le_2", "topic": "Love"})),
        ];

        match normalize_all(Book::LifeEternal, &chunks).unwrap_err() {
            ClaritasError::MalformedPassage { id, reason } => {
                assert_eq!(id, "le_2");
                assert!(reason.contains("record 2 of 2"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
