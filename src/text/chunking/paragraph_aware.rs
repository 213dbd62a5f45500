//! Paragraph-aware strategy: packs paragraph-like blocks by count and tokens

use super::builder::{ChunkAssembler, ChunkContext, ChunkDraft};
use super::config::{
    ChunkingOptions, DEFAULT_MAX_PARAGRAPHS_PER_CHUNK, DEFAULT_MAX_TOKENS,
    DEFAULT_MIN_PARAGRAPHS_PER_CHUNK, DEFAULT_OVERLAP_TOKENS,
};
use super::error::Result;
use super::sections::HeadingTrail;
use super::splitter::{FALLBACK_CHAIN, Group, PackLimits, Unit, pack, split_oversized};
use super::strategy::ChunkingStrategy;
use super::types::{Block, Chunk, DocumentStructure, SourceMeta};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphAwareStrategy;

impl ChunkingStrategy for ParagraphAwareStrategy {
    fn id(&self) -> &'static str {
        "paragraph-aware"
    }

    fn name(&self) -> &'static str {
        "Paragraph Aware"
    }

    fn description(&self) -> &'static str {
        "Groups whole paragraphs and list items, falling back to sentences and then words for oversized paragraphs"
    }

    fn default_options(&self) -> ChunkingOptions {
        ChunkingOptions {
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            overlap_tokens: Some(DEFAULT_OVERLAP_TOKENS),
            min_paragraphs_per_chunk: Some(DEFAULT_MIN_PARAGRAPHS_PER_CHUNK),
            max_paragraphs_per_chunk: Some(DEFAULT_MAX_PARAGRAPHS_PER_CHUNK),
            ..Default::default()
        }
    }

    fn validate_options(&self, options: &ChunkingOptions) -> std::result::Result<(), String> {
        options.validate_token_budget()?;
        let (min, max) = (
            options.min_paragraphs_per_chunk(),
            options.max_paragraphs_per_chunk(),
        );
        if min == 0 {
            return Err("minParagraphsPerChunk must be at least 1".to_string());
        }
        if max < min {
            return Err(format!(
                "maxParagraphsPerChunk ({max}) must not be less than minParagraphsPerChunk ({min})"
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
        let limits = PackLimits {
            max_tokens: options.max_tokens(),
            overlap_tokens: options.overlap_tokens(),
            min_units: options.min_paragraphs_per_chunk(),
            max_units: options.max_paragraphs_per_chunk(),
            separator_tokens: ctx.counter.separator_tokens(),
        };
        let mut trail = HeadingTrail::new();
        let mut run = Run::default();

        for block in &document.blocks {
            if block.block_type.is_heading() {
                trail.enter(block.level, &block.text);
                continue;
            }
            if !block.block_type.is_paragraph_like() {
                debug!("Skipping {:?} block", block.block_type);
                continue;
            }
            let unit = Unit::from_block(block, ctx.counter);
            let origin = Origin::new(&trail, block);

            if unit.tokens > limits.max_tokens {
                debug!(
                    "Paragraph of {} tokens exceeds {}, splitting",
                    unit.tokens, limits.max_tokens
                );
                run.flush(&limits, &mut assembler)?;
                let fragments =
                    split_oversized(&block.text, limits.max_tokens, ctx.counter, &FALLBACK_CHAIN);
                let fragment_limits = PackLimits::tokens(limits.max_tokens, limits.overlap_tokens)
                    .with_separator(limits.separator_tokens);
                for group in pack(fragments, &fragment_limits) {
                    assembler.push(origin.draft(&group))?;
                }
                continue;
            }
            run.units.push(unit);
            run.origins.push(origin);
        }
        run.flush(&limits, &mut assembler)?;
        Ok(assembler.finish())
    }
}

// heading context and position of one packed block
#[derive(Debug, Clone)]
struct Origin {
    path: Vec<String>,
    location: SourceMeta,
}

impl Origin {
    fn new(trail: &HeadingTrail, block: &Block) -> Self {
        Self {
            path: trail.path(),
            location: block.source_meta.clone(),
        }
    }

    fn draft(&self, group: &Group) -> ChunkDraft {
        let draft = ChunkDraft::from_group(group)
            .with_section_path(self.path.clone())
            .with_location(Some(&self.location));
        match self.path.last() {
            Some(heading) => draft.with_label(heading.clone()),
            None => draft,
        }
    }
}

// consecutive packable blocks between oversized ones
#[derive(Default)]
struct Run {
    units: Vec<Unit>,
    origins: Vec<Origin>,
}

impl Run {
    fn flush(&mut self, limits: &PackLimits, assembler: &mut ChunkAssembler<'_>) -> Result<()> {
        let units = std::mem::take(&mut self.units);
        let origins = std::mem::take(&mut self.origins);
        let mut next = 0;
        for group in pack(units, limits) {
            // a group is attributed to its first fresh block
            if let Some(origin) = origins.get(next) {
                assembler.push(origin.draft(&group))?;
            }
            next += group.fresh().len();
        }
        Ok(())
    }
}
