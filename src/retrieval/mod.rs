//! Retrieval and ranking
//!
//! Embeds the query, fetches nearest passages from the book's partition,
//! rescores them with router-hint boosts and truncates to `top_k`. When the
//! similarity search itself fails, a literal term-overlap scan of the same
//! partition answers instead.

mod engine;
mod fallback;
mod ranker;

pub use engine::RetrievalEngine;
pub use fallback::KeywordFallback;
pub use ranker::{CandidateRanker, RankingWeights};

use crate::corpus::Passage;
use crate::storage::StoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Invalid retrieval configuration: {0}")]
    InvalidConfig(String),

    /// A store failure that indicates broken setup rather than a passing outage
    #[error("Passage store misconfigured: {0}")]
    Store(#[from] StoreError),
}

/// One request's query and the router's advisory hints
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryContext {
    pub query: String,
    pub router_topics: Vec<String>,
    pub router_keywords: Vec<String>,
}

impl QueryContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Blank entries are dropped; order is kept
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.router_topics = clean_hints(topics);
        self
    }

    /// Blank entries are dropped; order is kept
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.router_keywords = clean_hints(keywords);
        self
    }

    /// Query text with the router hints appended, used to bias the query
    /// embedding toward hinted topics. Without hints this is the raw query.
    pub fn embedding_text(&self) -> String {
        let mut text = self.query.trim().to_string();
        for hint in self.router_topics.iter().chain(&self.router_keywords) {
            text.push(' ');
            text.push_str(hint);
        }
        text
    }
}

fn clean_hints<I, S>(hints: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut cleaned: Vec<String> = Vec::new();
    for hint in hints {
        let hint = hint.into().trim().to_string();
        if !hint.is_empty() && !cleaned.contains(&hint) {
            cleaned.push(hint);
        }
    }
    cleaned
}

/// A passage with the score that placed it. Scores are derived per request
/// and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPassage {
    pub score: f32,
    pub passage: Passage,
}

/// Which path produced a result list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Similarity search followed by ranking
    Vector,
    /// Term-overlap scan after a failed similarity search
    Fallback,
    /// Nothing was searched (unknown book, empty query, zero top_k)
    Skipped,
}

/// Ordered results of one retrieval call
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub mode: RetrievalMode,
    pub results: Vec<RankedPassage>,
}

impl Retrieval {
    pub fn skipped() -> Self {
        Self {
            mode: RetrievalMode::Skipped,
            results: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_passages(self) -> Vec<Passage> {
        self.results.into_iter().map(|r| r.passage).collect()
    }
}
