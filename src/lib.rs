//! Chunking engine for parsed office documents.
//!
//! Markup produced by a document reader is normalized into a uniform block
//! model ([`text::chunking::normalizer`]) and then split by one of the
//! registered strategies ([`text::chunking::registry`]) into token-bounded
//! chunks for embedding, retrieval and summarization.

pub mod text;
pub mod util;

pub use text::chunking::{
    Chunk, ChunkingError, ChunkingOptions, DocumentChunker, DocumentStructure, Result,
};
