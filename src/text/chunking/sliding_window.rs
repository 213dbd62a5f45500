//! Sliding-window strategy over the flattened document text
//!
//! The document is flattened to one unit stream (whitespace words, or
//! fixed character slices when word boundaries are not preserved) and a
//! window of `windowSize` units advances by `windowSize - overlapSize`.

use super::builder::{ChunkContext, ChunkDraft};
use super::config::{ChunkingOptions, DEFAULT_OVERLAP_SIZE, DEFAULT_WINDOW_SIZE};
use super::error::Result;
use super::sections::HeadingTrail;
use super::strategy::ChunkingStrategy;
use super::types::{Block, Chunk, ChunkType, DocumentStructure};
use crate::text::SentenceSplitter;
use crate::text::markup::wrap_paragraph;
use itertools::Itertools;
use tracing::debug;

/// Characters per unit when word boundaries are not preserved
pub const CHAR_UNIT_LEN: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingWindowStrategy;

impl ChunkingStrategy for SlidingWindowStrategy {
    fn id(&self) -> &'static str {
        "sliding-window"
    }

    fn name(&self) -> &'static str {
        "Sliding Window"
    }

    fn description(&self) -> &'static str {
        "Slides a fixed-size window with overlap over the flattened document text"
    }

    fn default_options(&self) -> ChunkingOptions {
        ChunkingOptions {
            window_size: Some(DEFAULT_WINDOW_SIZE),
            overlap_size: Some(DEFAULT_OVERLAP_SIZE),
            preserve_word_boundaries: Some(true),
            preserve_sentence_boundaries: Some(false),
            ..Default::default()
        }
    }

    fn validate_options(&self, options: &ChunkingOptions) -> std::result::Result<(), String> {
        if options.window_size() == 0 {
            return Err("windowSize must be greater than 0".to_string());
        }
        if options.overlap_size() >= options.window_size() {
            return Err(format!(
                "overlapSize ({}) must be less than windowSize ({})",
                options.overlap_size(),
                options.window_size()
            ));
        }
        Ok(())
    }

    fn chunk(
        &self,
        document: &DocumentStructure,
        options: &ChunkingOptions,
        ctx: &ChunkContext<'_>,
    ) -> Result<Vec<Chunk>> {
        let mut assembler = ctx.assembler(self.id(), document, options);
        let stream = if options.preserve_word_boundaries() {
            UnitStream::words(&document.blocks)
        } else {
            UnitStream::char_slices(&document.blocks, CHAR_UNIT_LEN)
        };
        if stream.units.is_empty() {
            return Ok(assembler.finish());
        }
        let paths = heading_paths(&document.blocks);
        let window_size = options.window_size();

        let flattened = document.blocks.iter().map(|b| b.text.as_str()).join("\n\n");
        if ctx.count(&flattened) <= window_size {
            debug!("Document fits one window of {}", window_size);
            let content = document
                .blocks
                .iter()
                .map(|b| wrap_paragraph(&b.text, None))
                .collect::<String>();
            let draft =
                ChunkDraft::new(content, ChunkType::Window).with_window(0, stream.units.len());
            assembler.push(locate(draft, &document.blocks, &paths, 0))?;
            return Ok(assembler.finish());
        }

        let splitter = SentenceSplitter::default();
        let snap = options.preserve_sentence_boundaries();
        for (start, end) in windows(&stream.units, window_size, options.overlap_size(), |unit| {
            snap && splitter.ends_sentence(unit)
        }) {
            let text = stream.units[start..end].join(stream.joiner);
            let draft = ChunkDraft::new(wrap_paragraph(&text, None), ChunkType::Window)
                .with_window(start, end);
            let block = stream.block_at(start);
            assembler.push(locate(draft, &document.blocks, &paths, block))?;
        }
        Ok(assembler.finish())
    }
}

/// Flattened text units plus the first unit index of every block
#[derive(Debug, Clone, PartialEq)]
pub struct UnitStream {
    pub units: Vec<String>,
    pub joiner: &'static str,
    block_starts: Vec<usize>,
}

impl UnitStream {
    pub fn words(blocks: &[Block]) -> Self {
        let mut units = Vec::new();
        let mut block_starts = Vec::with_capacity(blocks.len());
        for block in blocks {
            block_starts.push(units.len());
            units.extend(block.text.split_whitespace().map(str::to_string));
        }
        Self {
            units,
            joiner: " ",
            block_starts,
        }
    }

    /// Whitespace-collapsed text cut into slices of `len` characters
    pub fn char_slices(blocks: &[Block], len: usize) -> Self {
        let mut chars: Vec<char> = Vec::new();
        let mut char_starts = Vec::with_capacity(blocks.len());
        for block in blocks {
            if !chars.is_empty() {
                chars.push(' ');
            }
            char_starts.push(chars.len());
            chars.extend(block.text.split_whitespace().join(" ").chars());
        }
        let len = len.max(1);
        Self {
            units: chars.chunks(len).map(|c| c.iter().collect()).collect(),
            joiner: "",
            block_starts: char_starts.into_iter().map(|c| c / len).collect(),
        }
    }

    /// Index of the block containing unit `unit`
    pub fn block_at(&self, unit: usize) -> usize {
        self.block_starts
            .partition_point(|&start| start <= unit)
            .saturating_sub(1)
    }
}

/// Window bounds `[start, end)` over `units`.
///
/// With `is_sentence_end` matching, the end snaps back to the last sentence
/// end inside the window, else forward to the next one. The start always
/// advances by at least one unit.
pub fn windows(
    units: &[String],
    window_size: usize,
    overlap_size: usize,
    is_sentence_end: impl Fn(&str) -> bool,
) -> Vec<(usize, usize)> {
    let n = units.len();
    let mut bounds = Vec::new();
    let mut start = 0;
    while start < n {
        let mut end = (start + window_size).min(n);
        if end < n {
            let back = (start..end).rev().find(|&i| is_sentence_end(&units[i]));
            let forward = || (end..n).find(|&i| is_sentence_end(&units[i]));
            if let Some(i) = back.or_else(forward) {
                end = i + 1;
            }
        }
        bounds.push((start, end));
        if end >= n {
            break;
        }
        start = end.saturating_sub(overlap_size).max(start + 1);
    }
    debug!("{} windows over {} units", bounds.len(), n);
    bounds
}

// heading path in effect at each block
fn heading_paths(blocks: &[Block]) -> Vec<Vec<String>> {
    let mut trail = HeadingTrail::new();
    blocks
        .iter()
        .map(|block| {
            if block.block_type.is_heading() {
                trail.enter(block.level, &block.text);
            }
            trail.path()
        })
        .collect()
}

fn locate(draft: ChunkDraft, blocks: &[Block], paths: &[Vec<String>], block: usize) -> ChunkDraft {
    let path = paths.get(block).cloned().unwrap_or_default();
    let draft = draft.with_location(blocks.get(block).map(|b| &b.source_meta));
    match path.last().cloned() {
        Some(label) => draft.with_label(label).with_section_path(path),
        None => draft.with_section_path(path),
    }
}
