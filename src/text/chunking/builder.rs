//! Chunk assembly: ids, titles, previews, token counts and metadata

use super::config::{ChunkingOptions, ChunkingStatistics};
use super::error::Result;
use super::splitter::Group;
use super::tokens::TokenCounter;
use super::types::{Chunk, ChunkMetadata, ChunkType, DocumentStructure, SourceMeta};
use crate::text::markup;
use crate::util::id_generator::IDGenerator;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info};

pub const PREVIEW_CHARS: usize = 100;
pub const DEFAULT_TITLE_LABEL: &str = "Section";

/// Shared collaborators of one chunking run
pub struct ChunkContext<'a> {
    pub counter: &'a dyn TokenCounter,
    pub id_generator: &'a IDGenerator,
    pub global_metadata: &'a Map<String, Value>,
}

impl<'a> ChunkContext<'a> {
    pub fn new(
        counter: &'a dyn TokenCounter,
        id_generator: &'a IDGenerator,
        global_metadata: &'a Map<String, Value>,
    ) -> Self {
        Self {
            counter,
            id_generator,
            global_metadata,
        }
    }

    pub fn count(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    pub fn assembler(
        &self,
        strategy: &'a str,
        document: &'a DocumentStructure,
        options: &'a ChunkingOptions,
    ) -> ChunkAssembler<'a> {
        ChunkAssembler::new(self, strategy, document, options)
    }
}

/// What a strategy decided about one chunk, before assembly
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub content: String,
    pub chunk_type: ChunkType,
    pub label: Option<String>,
    pub section_path: Vec<String>,
    pub page: Option<u32>,
    pub slide: Option<u32>,
    pub window: Option<(usize, usize)>,
    pub extra: Map<String, Value>,
}

impl ChunkDraft {
    pub fn new(content: String, chunk_type: ChunkType) -> Self {
        Self {
            content,
            chunk_type,
            label: None,
            section_path: Vec::new(),
            page: None,
            slide: None,
            window: None,
            extra: Map::new(),
        }
    }

    pub fn from_group(group: &Group) -> Self {
        Self::new(group.markup(), group.chunk_type())
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_section_path(mut self, path: Vec<String>) -> Self {
        self.section_path = path;
        self
    }

    pub fn with_location(mut self, meta: Option<&SourceMeta>) -> Self {
        if let Some(meta) = meta {
            self.page = meta.page;
            self.slide = meta.slide;
        }
        self
    }

    pub fn with_window(mut self, start: usize, end: usize) -> Self {
        self.window = Some((start, end));
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Turns drafts into numbered chunks and tracks run statistics.
pub struct ChunkAssembler<'a> {
    counter: &'a dyn TokenCounter,
    id_generator: &'a IDGenerator,
    global_metadata: &'a Map<String, Value>,
    strategy: &'a str,
    document: &'a DocumentStructure,
    options: &'a ChunkingOptions,
    chunks: Vec<Chunk>,
    statistics: ChunkingStatistics,
    started: Instant,
}

impl<'a> ChunkAssembler<'a> {
    fn new(
        ctx: &ChunkContext<'a>,
        strategy: &'a str,
        document: &'a DocumentStructure,
        options: &'a ChunkingOptions,
    ) -> Self {
        let mut statistics = ChunkingStatistics::new();
        let started = statistics.start_total_timing();
        statistics.input_block_count = document.blocks.len();
        Self {
            counter: ctx.counter,
            id_generator: ctx.id_generator,
            global_metadata: ctx.global_metadata,
            strategy,
            document,
            options,
            chunks: Vec::new(),
            statistics,
            started,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn push(&mut self, draft: ChunkDraft) -> Result<()> {
        let plain = markup::plain_text(&draft.content);
        if plain.trim().is_empty() {
            debug!("Skipping chunk draft without text");
            return Ok(());
        }
        let token_count = self.counter.count(&plain);
        let index = self.chunks.len();
        let label = draft
            .label
            .clone()
            .or_else(|| markup::first_heading_text(&draft.content))
            .unwrap_or_else(|| DEFAULT_TITLE_LABEL.to_string());

        let mut extra = self.global_metadata.clone();
        extra.extend(draft.extra);

        self.statistics.record_chunk(&draft.chunk_type, token_count);
        debug!(
            "Chunk {} ({}): {} tokens, path {:?}",
            index + 1,
            draft.chunk_type,
            token_count,
            draft.section_path
        );
        self.chunks.push(Chunk {
            id: self.id_generator.generate_string()?,
            title: format!("Chunk {}: {}", index + 1, label),
            preview: preview(&plain),
            content: draft.content,
            token_count,
            metadata: ChunkMetadata {
                strategy: self.strategy.to_string(),
                options: self.options.clone(),
                section_path: draft.section_path,
                source_file: self.document.source_file.clone(),
                source_format: self.document.source_format,
                page: draft.page,
                slide: draft.slide,
                chunk_index: index,
                chunk_type: draft.chunk_type,
                window_start: draft.window.map(|(start, _)| start),
                window_end: draft.window.map(|(_, end)| end),
                extra,
            },
        });
        Ok(())
    }

    pub fn finish(mut self) -> Vec<Chunk> {
        self.statistics.finish_total_timing(self.started);
        info!("[{}] {}", self.strategy, self.statistics.summary());
        self.chunks
    }
}

/// First `PREVIEW_CHARS` characters of `plain`, with `...` when cut.
pub fn preview(plain: &str) -> String {
    let mut chars = plain.char_indices();
    match chars.nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &plain[..cut]),
        None => plain.to_string(),
    }
}
