//! Corpus data model: the books and the passages cut from them

mod book;
mod passage;

pub use book::Book;
pub use passage::{ChunkType, Passage};

pub(crate) use passage::value_to_string;
