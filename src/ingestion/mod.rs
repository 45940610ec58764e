//! Corpus ingestion: raw chunk normalization and embedding load

mod normalize;
mod pipeline;

pub use normalize::{
    load_normalized, load_raw_chunks, normalize_all, normalize_chunk, save_normalized, RawChunk,
};
pub use pipeline::{IngestReport, Ingestor};
