//! Token-bounded chunking of normalized documents
//!
//! Markup from a document reader is first normalized into an ordered list of
//! [`types::Block`]s. A [`strategy::ChunkingStrategy`] then groups the blocks
//! into [`types::Chunk`]s whose token counts stay within the configured
//! budget. Strategies are looked up by id through the [`registry`] and run
//! by [`engine::DocumentChunker`].

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixed_size;
pub mod heading_aware;
pub mod normalizer;
pub mod paragraph_aware;
pub mod registry;
pub mod sections;
pub mod sliding_window;
pub mod splitter;
pub mod strategy;
pub mod tokens;
pub mod types;

pub use builder::ChunkContext;
pub use config::{ChunkingOptions, ChunkingStatistics, SubChunkingStrategy};
pub use engine::{DocumentChunker, StrategyInfo};
pub use error::{ChunkingError, Result};
pub use fixed_size::FixedSizeStrategy;
pub use heading_aware::HeadingAwareStrategy;
pub use normalizer::{normalize, normalize_strict};
pub use paragraph_aware::ParagraphAwareStrategy;
pub use registry::StrategyRegistry;
pub use sliding_window::SlidingWindowStrategy;
pub use strategy::ChunkingStrategy;
pub use tokens::{HeuristicCounter, TiktokenCounter, TokenCounter, WordCounter};
pub use types::{
    Block, BlockType, Chunk, ChunkMetadata, ChunkType, DocumentStructure, SourceFormat, SourceMeta,
};
