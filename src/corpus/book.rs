use serde::{Deserialize, Serialize};
use std::fmt;

/// The source texts the corpus is built from. Each book owns exactly one
/// partition in the passage store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Book {
    #[serde(rename = "God Speaks")]
    GodSpeaks,
    #[serde(rename = "Life Eternal")]
    LifeEternal,
}

impl Book {
    pub const ALL: [Book; 2] = [Book::GodSpeaks, Book::LifeEternal];

    /// Resolve a router-supplied book name. Only the canonical titles are
    /// accepted; anything else is an unknown book.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|book| book.name() == name)
    }

    /// Canonical title
    pub fn name(&self) -> &'static str {
        match self {
            Book::GodSpeaks => "God Speaks",
            Book::LifeEternal => "Life Eternal",
        }
    }

    /// Name of the store partition holding this book's passages
    pub fn partition_name(&self) -> &'static str {
        match self {
            Book::GodSpeaks => "god_speaks_collection",
            Book::LifeEternal => "life_eternal_collection",
        }
    }

    pub fn from_partition_name(partition: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|book| book.partition_name() == partition)
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
