//! Chunking options and per-run statistics

use super::error::{ChunkingError, Result};
use super::types::ChunkType;
use crate::util::json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_TOKENS: usize = 1000;
pub const DEFAULT_OVERLAP_TOKENS: usize = 150;
pub const DEFAULT_MIN_CHUNK_TOKENS: usize = 200;
pub const DEFAULT_MIN_PARAGRAPHS_PER_CHUNK: usize = 1;
pub const DEFAULT_MAX_PARAGRAPHS_PER_CHUNK: usize = 10;
pub const DEFAULT_WINDOW_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP_SIZE: usize = 200;

/// Granularity used when a heading section exceeds the token budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubChunkingStrategy {
    #[default]
    Paragraph,
    Sentence,
}

/// Flat option record shared by all strategies.
///
/// Every typed field is optional so that a strategy's defaults and a caller's
/// overrides can be shallow-merged; keys no strategy recognizes land in
/// `extra` and are carried through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_chunk_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_chunking_strategy: Option<SubChunkingStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_paragraphs_per_chunk: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_paragraphs_per_chunk: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_word_boundaries: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_sentence_boundaries: Option<bool>,
    /// Unrecognized keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkingOptions {
    /// Parse a JSON object of options; type mismatches are `InvalidOptions`.
    pub fn from_json(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| ChunkingError::invalid_options(format!("cannot parse options: {e}")))
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Shallow merge: each field present in `overrides` wins.
    pub fn merge(&self, overrides: &ChunkingOptions) -> ChunkingOptions {
        let mut extra = self.extra.clone();
        json::merge_obj(&mut extra, overrides.extra.clone());
        ChunkingOptions {
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            overlap_tokens: overrides.overlap_tokens.or(self.overlap_tokens),
            min_chunk_tokens: overrides.min_chunk_tokens.or(self.min_chunk_tokens),
            sub_chunking_strategy: overrides.sub_chunking_strategy.or(self.sub_chunking_strategy),
            min_paragraphs_per_chunk: overrides
                .min_paragraphs_per_chunk
                .or(self.min_paragraphs_per_chunk),
            max_paragraphs_per_chunk: overrides
                .max_paragraphs_per_chunk
                .or(self.max_paragraphs_per_chunk),
            window_size: overrides.window_size.or(self.window_size),
            overlap_size: overrides.overlap_size.or(self.overlap_size),
            preserve_word_boundaries: overrides
                .preserve_word_boundaries
                .or(self.preserve_word_boundaries),
            preserve_sentence_boundaries: overrides
                .preserve_sentence_boundaries
                .or(self.preserve_sentence_boundaries),
            extra,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens.unwrap_or(DEFAULT_OVERLAP_TOKENS)
    }

    pub fn min_chunk_tokens(&self) -> usize {
        self.min_chunk_tokens.unwrap_or(DEFAULT_MIN_CHUNK_TOKENS)
    }

    pub fn sub_chunking_strategy(&self) -> SubChunkingStrategy {
        self.sub_chunking_strategy.unwrap_or_default()
    }

    pub fn min_paragraphs_per_chunk(&self) -> usize {
        self.min_paragraphs_per_chunk
            .unwrap_or(DEFAULT_MIN_PARAGRAPHS_PER_CHUNK)
    }

    pub fn max_paragraphs_per_chunk(&self) -> usize {
        self.max_paragraphs_per_chunk
            .unwrap_or(DEFAULT_MAX_PARAGRAPHS_PER_CHUNK)
    }

    pub fn window_size(&self) -> usize {
        self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE)
    }

    pub fn overlap_size(&self) -> usize {
        self.overlap_size.unwrap_or(DEFAULT_OVERLAP_SIZE)
    }

    pub fn preserve_word_boundaries(&self) -> bool {
        self.preserve_word_boundaries.unwrap_or(true)
    }

    pub fn preserve_sentence_boundaries(&self) -> bool {
        self.preserve_sentence_boundaries.unwrap_or(false)
    }

    /// Validate the shared token budget (maxTokens / overlapTokens)
    pub fn validate_token_budget(&self) -> std::result::Result<(), String> {
        if self.max_tokens() == 0 {
            return Err("maxTokens must be greater than 0".to_string());
        }
        if self.overlap_tokens() >= self.max_tokens() {
            return Err(format!(
                "overlapTokens ({}) must be less than maxTokens ({})",
                self.overlap_tokens(),
                self.max_tokens()
            ));
        }
        Ok(())
    }
}

/// Statistics for one chunking run, summarized into the run log line
#[derive(Debug, Clone, Default)]
pub struct ChunkingStatistics {
    pub total_processing_time: Duration,
    pub input_block_count: usize,

    pub total_chunks_created: usize,
    pub complete_section_chunks: usize,
    pub merged_block_chunks: usize,
    pub sentence_based_chunks: usize,
    pub word_based_chunks: usize,
    pub oversized_chunks: usize,
    pub window_chunks: usize,
    pub boundary_preserving_chunks: usize,
    pub forced_split_chunks: usize,

    pub total_tokens: usize,
    pub avg_tokens_per_chunk: f32,
    pub max_tokens_in_chunk: usize,
    /// `None` until the first chunk is recorded
    pub min_tokens_in_chunk: Option<usize>,
}

impl ChunkingStatistics {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing for total processing
    pub fn start_total_timing(&mut self) -> Instant {
        Instant::now()
    }

    /// Finish total timing
    pub fn finish_total_timing(&mut self, start: Instant) {
        self.total_processing_time = start.elapsed();
    }

    /// Record chunk creation by type and size
    pub fn record_chunk(&mut self, chunk_type: &ChunkType, token_count: usize) {
        self.total_chunks_created += 1;
        match chunk_type {
            ChunkType::CompleteSection => self.complete_section_chunks += 1,
            ChunkType::MergedBlocks => self.merged_block_chunks += 1,
            ChunkType::SentenceBasedSplit => self.sentence_based_chunks += 1,
            ChunkType::WordBasedSplit => self.word_based_chunks += 1,
            ChunkType::Oversized => self.oversized_chunks += 1,
            ChunkType::Window => self.window_chunks += 1,
        }
        if chunk_type.preserves_boundaries() {
            self.boundary_preserving_chunks += 1;
        }
        if chunk_type.is_forced_split() {
            self.forced_split_chunks += 1;
        }

        self.total_tokens += token_count;
        self.max_tokens_in_chunk = self.max_tokens_in_chunk.max(token_count);
        self.min_tokens_in_chunk =
            Some(self.min_tokens_in_chunk.map_or(token_count, |min| min.min(token_count)));
        self.avg_tokens_per_chunk = self.total_tokens as f32 / self.total_chunks_created as f32;
    }

    /// Share of chunks whose boundaries fall on source block boundaries
    pub fn boundary_preservation_rate(&self) -> f32 {
        if self.total_chunks_created == 0 {
            return 0.0;
        }
        self.boundary_preserving_chunks as f32 / self.total_chunks_created as f32
    }

    /// Get summary as string for logging
    pub fn summary(&self) -> String {
        format!(
            "Chunking Stats: {} blocks -> {} chunks ({:.1} avg tokens/chunk, max {}, min {}) in {}ms | \
            forced splits: {} (sentence {}, word {}), oversized: {}, windows: {} | \
            boundary preservation: {:.1}%",
            self.input_block_count,
            self.total_chunks_created,
            self.avg_tokens_per_chunk,
            self.max_tokens_in_chunk,
            self.min_tokens_in_chunk.unwrap_or(0),
            self.total_processing_time.as_millis(),
            self.forced_split_chunks,
            self.sentence_based_chunks,
            self.word_based_chunks,
            self.oversized_chunks,
            self.window_chunks,
            self.boundary_preservation_rate() * 100.0,
        )
    }
}
