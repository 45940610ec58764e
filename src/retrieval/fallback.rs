//! Degraded-mode retrieval by literal term overlap

use crate::corpus::{Book, Passage};
use crate::retrieval::RankedPassage;
use crate::storage::{PassageStore, StoreError};

/// Term-overlap search used only when similarity search has failed.
///
/// Scans at most `scan_limit` passages of the partition in store order, so
/// matches beyond that window are never seen. Router hints are ignored.
#[derive(Debug, Clone)]
pub struct KeywordFallback {
    scan_limit: usize,
}

impl KeywordFallback {
    pub fn new(scan_limit: usize) -> Self {
        Self { scan_limit }
    }

    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    /// Scan the book's partition and return up to `limit` passages scored by
    /// how many distinct query terms their text contains
    pub fn search(
        &self,
        store: &dyn PassageStore,
        book: Book,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RankedPassage>, StoreError> {
        let terms = query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let passages = store.full_scan(book, self.scan_limit)?;
        tracing::debug!(
            "Keyword fallback scanned {} passages of {}",
            passages.len(),
            book.partition_name()
        );

        Ok(match_terms(passages, &terms, limit))
    }
}

/// Whitespace-separated, lower-cased, distinct query terms in query order
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query.split_whitespace().map(str::to_lowercase) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

fn match_terms(passages: Vec<Passage>, terms: &[String], limit: usize) -> Vec<RankedPassage> {
    let mut matched: Vec<RankedPassage> = passages
        .into_iter()
        .filter_map(|passage| {
            let text = passage.text.to_lowercase();
            let count = terms.iter().filter(|t| text.contains(t.as_str())).count();
            (count > 0).then(|| RankedPassage {
                score: count as f32,
                passage,
            })
        })
        .collect();

    // Stable: equal counts keep scan order
    matched.sort_by(|a, b| b.score.total_cmp(&a.score));
    matched.truncate(limit);
    matched
}
