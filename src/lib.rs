//! Claritas - quote-grounded retrieval over a fixed two-book corpus
//!
//! Routes a question to one source text, retrieves ranked passages from a
//! local vector store and degrades to literal term matching when similarity
//! search is unavailable. Answer generation and question routing live outside
//! this crate and consume the passages it returns.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod ingestion;
pub mod retrieval;
pub mod storage;

pub use error::{ClaritasError, Result};
