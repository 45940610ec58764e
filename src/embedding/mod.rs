//! Local text embedding
//!
//! - `EmbeddingProvider` trait so the retrieval engine and ingestion can be
//!   driven by test doubles
//! - `FastEmbedProvider` for offline embedding (all-MiniLM-L6-v2, 384-dim)
//! - vectors are unit-normalized at the provider, for both passages and queries
mod provider;

pub use provider::{l2_normalize, EmbeddingError, EmbeddingProvider, FastEmbedProvider};
