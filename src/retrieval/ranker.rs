//! Composite scoring of similarity candidates

use crate::config::RankingConfig;
use crate::corpus::Passage;
use crate::retrieval::RankedPassage;
use crate::storage::SearchHit;

/// Weights of the composite score:
///
/// ```text
/// score = base * raw_similarity
///       + topic_boost      (passage topic contains a router topic)
///       + keyword_boost    (passage text contains a router keyword)
///       + authority_boost  (passage speaker is the primary author)
/// ```
///
/// Matching is case-insensitive substring containment. Each boost is applied
/// at most once per passage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub base: f32,
    pub topic_boost: f32,
    pub keyword_boost: f32,
    pub authority_boost: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            base: 0.6,
            topic_boost: 0.25,
            keyword_boost: 0.15,
            authority_boost: 0.1,
        }
    }
}

/// Rescores raw similarity hits with router hints and orders them
#[derive(Debug, Clone)]
pub struct CandidateRanker {
    weights: RankingWeights,
    primary_speaker: String,
}

impl CandidateRanker {
    pub fn new(weights: RankingWeights, primary_speaker: impl Into<String>) -> Self {
        Self {
            weights,
            primary_speaker: primary_speaker.into(),
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(
            RankingWeights {
                base: config.base_weight,
                topic_boost: config.topic_boost,
                keyword_boost: config.keyword_boost,
                authority_boost: config.authority_boost,
            },
            config.primary_speaker.clone(),
        )
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    /// Score every hit and sort descending. The sort is stable, so equal
    /// scores keep the order of `hits` (the store's similarity rank).
    pub fn rank(
        &self,
        hits: Vec<SearchHit>,
        router_topics: &[String],
        router_keywords: &[String],
    ) -> Vec<RankedPassage> {
        let topics = lowercase_all(router_topics);
        let keywords = lowercase_all(router_keywords);

        let mut ranked: Vec<RankedPassage> = hits
            .into_iter()
            .map(|hit| RankedPassage {
                score: self.score(&hit.passage, hit.score, &topics, &keywords),
                passage: hit.passage,
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// Composite score of one passage. `topics` and `keywords` must already
    /// be lower-cased.
    fn score(&self, passage: &Passage, raw_score: f32, topics: &[String], keywords: &[String]) -> f32 {
        let mut score = self.weights.base * raw_score;

        if topic_matches(passage, topics) {
            score += self.weights.topic_boost;
        }

        if !keywords.is_empty() {
            let text = passage.text.to_lowercase();
            if keywords.iter().any(|k| text.contains(k.as_str())) {
                score += self.weights.keyword_boost;
            }
        }

        if passage.speaker.as_deref() == Some(self.primary_speaker.as_str()) {
            score += self.weights.authority_boost;
        }

        score
    }
}

/// The passage's topic, or its sub-topic when it has no topic (God Speaks
/// passages carry only section-level sub-topics), contains a router topic.
fn topic_matches(passage: &Passage, topics: &[String]) -> bool {
    if topics.is_empty() {
        return false;
    }

    let Some(label) = passage.topic.as_deref().or(passage.sub_topic.as_deref()) else {
        return false;
    };
    let label = label.to_lowercase();

    topics.iter().any(|t| label.contains(t.as_str()))
}

fn lowercase_all(hints: &[String]) -> Vec<String> {
    hints
        .iter()
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}
