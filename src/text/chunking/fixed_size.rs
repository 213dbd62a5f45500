//! Fixed-size strategy: whole blocks packed to a token budget

use super::builder::{ChunkAssembler, ChunkContext, ChunkDraft};
use super::config::{ChunkingOptions, DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_TOKENS};
use super::error::Result;
use super::sections::HeadingTrail;
use super::splitter::{FALLBACK_CHAIN, Group, PackLimits, Unit, pack, split_oversized};
use super::strategy::ChunkingStrategy;
use super::tokens::TokenCounter;
use super::types::{Block, Chunk, ChunkType, DocumentStructure, SourceMeta};
use crate::text::last_words;
use crate::text::markup::wrap_paragraph;
use serde_json::{Map, Value};
use tracing::debug;

pub const OVERLAP_CLASS: &str = "chunk-overlap";

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSizeStrategy;

impl ChunkingStrategy for FixedSizeStrategy {
    fn id(&self) -> &'static str {
        "fixed-size"
    }

    fn name(&self) -> &'static str {
        "Fixed Size"
    }

    fn description(&self) -> &'static str {
        "Packs whole blocks up to maxTokens, repeating a short word tail of each chunk at the start of the next"
    }

    fn default_options(&self) -> ChunkingOptions {
        ChunkingOptions {
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            overlap_tokens: Some(DEFAULT_OVERLAP_TOKENS),
            ..Default::default()
        }
    }

    fn validate_options(&self, options: &ChunkingOptions) -> std::result::Result<(), String> {
        options.validate_token_budget()
    }

    fn chunk(
        &self,
        document: &DocumentStructure,
        options: &ChunkingOptions,
        ctx: &ChunkContext<'_>,
    ) -> Result<Vec<Chunk>> {
        let mut assembler = ctx.assembler(self.id(), document, options);
        pack_fixed_size(&document.blocks, options, ctx.counter, &mut assembler, &Map::new())?;
        Ok(assembler.finish())
    }
}

// open chunk: the group plus where its first fresh block sits
#[derive(Default)]
struct Buffer {
    group: Group,
    path: Vec<String>,
    location: Option<SourceMeta>,
}

impl Buffer {
    fn seeded(seed: Option<Unit>) -> Self {
        let mut buffer = Self::default();
        if let Some(seed) = seed {
            buffer.group.units.push(seed);
            buffer.group.overlap = 1;
        }
        buffer
    }

    fn push(&mut self, unit: Unit, block: &Block, trail: &HeadingTrail) {
        if self.group.fresh().is_empty() {
            self.path = trail.path();
            self.location = Some(block.source_meta.clone());
        }
        self.group.units.push(unit);
    }

    fn has_fresh(&self) -> bool {
        !self.group.fresh().is_empty()
    }

    fn text(&self) -> String {
        self.group
            .units
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn into_draft(self, extra: &Map<String, Value>) -> ChunkDraft {
        let mut draft = ChunkDraft::from_group(&self.group)
            .with_section_path(self.path)
            .with_location(self.location.as_ref());
        draft.extra = extra.clone();
        draft
    }
}

/// Word tail of `flushed` sized to about half of `overlap_tokens` words,
/// shortened until it fits both the overlap and, with the next block, the budget.
fn overlap_seed(
    flushed: &str,
    next_tokens: usize,
    options: &ChunkingOptions,
    counter: &dyn TokenCounter,
) -> Option<Unit> {
    let overlap = options.overlap_tokens();
    let separator = counter.separator_tokens();
    for words in (1..=overlap / 2).rev() {
        let tail = last_words(flushed, words);
        let tokens = counter.count(&tail);
        if tokens <= overlap && tokens + separator + next_tokens <= options.max_tokens() {
            return Some(Unit {
                markup: Some(wrap_paragraph(&tail, Some(OVERLAP_CLASS))),
                text: tail,
                tokens,
                kind: ChunkType::MergedBlocks,
                carry: false,
            });
        }
    }
    None
}

/// Fixed-size packing over `blocks`, shared with the heading-aware fallback.
pub(crate) fn pack_fixed_size(
    blocks: &[Block],
    options: &ChunkingOptions,
    counter: &dyn TokenCounter,
    assembler: &mut ChunkAssembler<'_>,
    extra: &Map<String, Value>,
) -> Result<()> {
    let max_tokens = options.max_tokens();
    let separator = counter.separator_tokens();
    let mut trail = HeadingTrail::new();
    let mut buffer = Buffer::default();

    for block in blocks {
        if block.block_type.is_heading() {
            trail.enter(block.level, &block.text);
        }
        let unit = Unit::from_block(block, counter);

        if unit.tokens > max_tokens {
            debug!(
                "Block of {} tokens exceeds {}, splitting at sentences",
                unit.tokens, max_tokens
            );
            let done = std::mem::take(&mut buffer);
            if done.has_fresh() {
                assembler.push(done.into_draft(extra))?;
            }
            let fragments = split_oversized(&block.text, max_tokens, counter, &FALLBACK_CHAIN[..1]);
            let limits = PackLimits::tokens(max_tokens, 0).with_separator(separator);
            for group in pack(fragments, &limits) {
                let mut draft = ChunkDraft::from_group(&group)
                    .with_section_path(trail.path())
                    .with_location(Some(&block.source_meta));
                draft.extra = extra.clone();
                assembler.push(draft)?;
            }
            continue;
        }

        if buffer.has_fresh() && buffer.group.tokens_with(unit.tokens, separator) > max_tokens {
            let flushed_text = buffer.text();
            let done = std::mem::replace(
                &mut buffer,
                Buffer::seeded(overlap_seed(&flushed_text, unit.tokens, options, counter)),
            );
            assembler.push(done.into_draft(extra))?;
        }
        buffer.push(unit, block, &trail);
    }

    if buffer.has_fresh() {
        assembler.push(buffer.into_draft(extra))?;
    }
    Ok(())
}
