use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::Book;
use crate::error::{ClaritasError, Result};

/// How a passage was cut from its book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// A whole chapter
    Full,
    /// One named section of a chapter
    Section,
    /// Supplementary material
    Supplement,
    /// A topical excerpt
    TopicSection,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Full => "full",
            ChunkType::Section => "section",
            ChunkType::Supplement => "supplement",
            ChunkType::TopicSection => "topic_section",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(ChunkType::Full),
            "section" => Some(ChunkType::Section),
            "supplement" => Some(ChunkType::Supplement),
            "topic_section" => Some(ChunkType::TopicSection),
            _ => None,
        }
    }
}

/// One quotable unit of source text.
///
/// `text` is handed verbatim to the answer generator and is never altered
/// after normalization. `vector` is filled at ingestion and is not part of the
/// serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable semantic identifier (e.g. "chunk_12"), unique within a partition
    pub id: String,

    pub book: Book,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<ChunkType>,

    /// Attribution, compared against the primary author for the authority boost
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    pub text: String,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,

    #[serde(skip)]
    pub vector: Vec<f32>,
}

impl Passage {
    pub fn new(id: impl Into<String>, book: Book, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            book,
            part: None,
            chapter: None,
            topic: None,
            sub_topic: None,
            chunk_type: None,
            speaker: None,
            text: text.into(),
            page_range: None,
            vector: Vec::new(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_sub_topic(mut self, sub_topic: impl Into<String>) -> Self {
        self.sub_topic = Some(sub_topic.into());
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn with_page_range(mut self, page_range: impl Into<String>) -> Self {
        self.page_range = Some(page_range.into());
        self
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = vector;
        self
    }

    /// Check the fields every stored passage must carry
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ClaritasError::malformed("<missing id>", "id is empty"));
        }
        if self.text.trim().is_empty() {
            return Err(ClaritasError::malformed(&self.id, "text is empty"));
        }
        Ok(())
    }

    /// Short preview of the text for terminal output
    pub fn preview(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            self.text.clone()
        } else {
            let cut: String = self.text.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }
}

/// Accept strings, numbers and `[start, end]` pairs for provenance fields
/// that chunking scripts emit in several shapes.
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    value
        .as_ref()
        .map_or(Ok(None), value_to_string)
        .map_err(serde::de::Error::custom)
}

/// Render a loosely-typed JSON scalar or pair as text. `null` and blank
/// strings become `None`.
pub(crate) fn value_to_string(value: &Value) -> std::result::Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match value_to_string(item)? {
                    Some(part) => parts.push(part),
                    None => return Err("range contains an empty element".to_string()),
                }
            }
            Ok((!parts.is_empty()).then(|| parts.join("-")))
        }
        other => Err(format!("expected string, number or range, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_normalized_record() {
        let raw = json!({
            "id": "le_suffering_1",
            "book": "Life Eternal",
            "topic": "Suffering",
            "sub_topic": "Suffering",
            "chunk_type": "topic_section",
            "text": "Suffering purifies.",
            "page_range": [12, 14]
        });

        let passage: Passage = serde_json::from_value(raw).unwrap();
        assert_eq!(passage.book, Book::LifeEternal);
        assert_eq!(passage.chunk_type, Some(ChunkType::TopicSection));
        assert_eq!(passage.page_range.as_deref(), Some("12-14"));
        assert!(passage.speaker.is_none());
        assert!(passage.vector.is_empty());
    }

    #[test]
    fn test_numeric_part() {
        let raw = json!({
            "id": "gs_1",
            "book": "God Speaks",
            "part": 3,
            "text": "x",
            "page_range": null
        });

        let passage: Passage = serde_json::from_value(raw).unwrap();
        assert_eq!(passage.part.as_deref(), Some("3"));
        assert!(passage.page_range.is_none());
    }

    #[test]
    fn test_rejects_object_page_range() {
        let raw = json!({
            "id": "gs_1",
            "book": "God Speaks",
            "text": "x",
            "page_range": {"from": 1}
        });

        assert!(serde_json::from_value::<Passage>(raw).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Passage::new("a", Book::GodSpeaks, "text").validate().is_ok());
        assert!(Passage::new("a", Book::GodSpeaks, "   ").validate().is_err());
        assert!(Passage::new("", Book::GodSpeaks, "text").validate().is_err());
    }

    #[test]
    fn test_vector_not_serialized() {
        let passage = Passage::new("a", Book::GodSpeaks, "text").with_vector(vec![1.0, 0.0]);
        let json = serde_json::to_value(&passage).unwrap();
        assert!(json.get("vector").is_none());
        assert!(json.get("topic").is_none());
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let passage = Passage::new("a", Book::GodSpeaks, "Ātman is Paramātman");
        assert_eq!(passage.preview(5), "Ātman...");
        assert_eq!(passage.preview(100), "Ātman is Paramātman");
    }
}
