//! Heading-aware strategy: one chunk per section, sub-chunked when too large

use super::builder::{ChunkAssembler, ChunkContext, ChunkDraft};
use super::config::{
    ChunkingOptions, DEFAULT_MAX_TOKENS, DEFAULT_MIN_CHUNK_TOKENS, DEFAULT_OVERLAP_TOKENS,
    SubChunkingStrategy,
};
use super::error::Result;
use super::fixed_size::pack_fixed_size;
use super::sections::{Section, build_sections};
use super::splitter::{
    FALLBACK_CHAIN, Group, PackLimits, Unit, pack, rebalance_tail, split_oversized, split_sentences,
};
use super::strategy::ChunkingStrategy;
use super::tokens::TokenCounter;
use super::types::{Chunk, ChunkType, DocumentStructure};
use serde_json::{Map, Value, json};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingAwareStrategy;

impl ChunkingStrategy for HeadingAwareStrategy {
    fn id(&self) -> &'static str {
        "heading-aware"
    }

    fn name(&self) -> &'static str {
        "Heading Aware"
    }

    fn description(&self) -> &'static str {
        "Keeps each heading section together, splitting oversized sections by paragraph or sentence"
    }

    fn default_options(&self) -> ChunkingOptions {
        ChunkingOptions {
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            overlap_tokens: Some(DEFAULT_OVERLAP_TOKENS),
            min_chunk_tokens: Some(DEFAULT_MIN_CHUNK_TOKENS),
            sub_chunking_strategy: Some(SubChunkingStrategy::Paragraph),
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

        if !document.has_headings() {
            debug!("No headings in {:?}, using fixed-size packing", document.source_file);
            let mut extra = Map::new();
            extra.insert("fallback".to_string(), json!("fixed-size"));
            pack_fixed_size(&document.blocks, options, ctx.counter, &mut assembler, &extra)?;
            return Ok(assembler.finish());
        }

        let max_tokens = options.max_tokens();
        let limits = PackLimits::tokens(max_tokens, options.overlap_tokens())
            .with_separator(ctx.counter.separator_tokens());
        for section in build_sections(&document.blocks) {
            let units = section_units(&section, options, ctx.counter);
            let total = units.iter().map(|u| u.tokens).sum::<usize>()
                + limits.separator_tokens * units.len().saturating_sub(1);

            if total <= max_tokens {
                assembler.push(
                    ChunkDraft::new(section.markup(), ChunkType::CompleteSection)
                        .with_label(section.label())
                        .with_section_path(section.path.clone())
                        .with_location(section.location()),
                )?;
                continue;
            }

            debug!(
                "Section {:?} has {} tokens, sub-chunking by {:?}",
                section.path,
                total,
                options.sub_chunking_strategy()
            );
            let mut groups = pack(units, &limits);
            // a minimum above the budget can only be met up to the budget
            let min_tokens = options.min_chunk_tokens().min(max_tokens);
            rebalance_tail(&mut groups, min_tokens, &limits);
            push_parts(&mut assembler, &section, &groups)?;
        }
        Ok(assembler.finish())
    }
}

/// Heading unit (never repeated as overlap) followed by the section body at
/// the configured granularity.
fn section_units(
    section: &Section<'_>,
    options: &ChunkingOptions,
    counter: &dyn TokenCounter,
) -> Vec<Unit> {
    let max_tokens = options.max_tokens();
    let mut units: Vec<Unit> = section
        .heading
        .map(|h| Unit::from_block(h, counter).pinned())
        .into_iter()
        .collect();

    for block in &section.blocks {
        match options.sub_chunking_strategy() {
            SubChunkingStrategy::Paragraph => {
                let unit = Unit::from_block(block, counter);
                if unit.tokens > max_tokens {
                    units.extend(split_oversized(
                        &block.text,
                        max_tokens,
                        counter,
                        &FALLBACK_CHAIN,
                    ));
                } else {
                    units.push(unit);
                }
            }
            SubChunkingStrategy::Sentence => {
                let sentences =
                    split_sentences(&block.text).unwrap_or_else(|| vec![block.text.clone()]);
                for sentence in sentences {
                    let tokens = counter.count(&sentence);
                    if tokens > max_tokens {
                        units.extend(split_oversized(
                            &sentence,
                            max_tokens,
                            counter,
                            &FALLBACK_CHAIN[1..],
                        ));
                    } else {
                        units.push(Unit::fragment(sentence, tokens, ChunkType::SentenceBasedSplit));
                    }
                }
            }
        }
    }
    units
}

fn push_parts(
    assembler: &mut ChunkAssembler<'_>,
    section: &Section<'_>,
    groups: &[Group],
) -> Result<()> {
    let parts = groups.len();
    for (k, group) in groups.iter().enumerate() {
        let label = if parts > 1 {
            format!("{} (part {})", section.label(), k + 1)
        } else {
            section.label().to_string()
        };
        assembler.push(
            ChunkDraft::from_group(group)
                .with_label(label)
                .with_section_path(section.path.clone())
                .with_location(section.location())
                .with_extra("sectionPart", Value::from(k + 1))
                .with_extra("sectionParts", Value::from(parts)),
        )?;
    }
    Ok(())
}
