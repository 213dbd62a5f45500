//! Core data structures for document chunking

use super::config::ChunkingOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Origin format of a parsed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Word,
    Slides,
    Html,
    Markdown,
    Text,
    #[default]
    Unknown,
}

impl SourceFormat {
    /// Slide decks turn headings into slide titles.
    pub fn is_slide_deck(&self) -> bool {
        matches!(self, SourceFormat::Slides)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Word => "word",
            SourceFormat::Slides => "slides",
            SourceFormat::Html => "html",
            SourceFormat::Markdown => "markdown",
            SourceFormat::Text => "text",
            SourceFormat::Unknown => "unknown",
        }
    }
}

impl FromStr for SourceFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => SourceFormat::Pdf,
            "docx" | "doc" | "word" | "odt" => SourceFormat::Word,
            "pptx" | "ppt" | "slides" | "odp" => SourceFormat::Slides,
            "html" | "htm" | "xhtml" => SourceFormat::Html,
            "md" | "markdown" => SourceFormat::Markdown,
            "txt" | "text" => SourceFormat::Text,
            _ => SourceFormat::Unknown,
        };
        Ok(format)
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural kind of a normalized block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockType {
    Heading,
    Paragraph,
    ListItem,
    Table,
    Code,
    SlideTitle,
    SlideNote,
    PageBreak,
    Other,
}

impl BlockType {
    /// Headings and slide titles open sections.
    pub fn is_heading(&self) -> bool {
        matches!(self, BlockType::Heading | BlockType::SlideTitle)
    }

    /// Blocks the paragraph-aware strategy packs.
    pub fn is_paragraph_like(&self) -> bool {
        matches!(self, BlockType::Paragraph | BlockType::ListItem | BlockType::Other)
    }
}

/// Where a block came from in the source document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMeta {
    pub format: SourceFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide: Option<u32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// One normalized structural unit with both plain text and original markup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Heading depth or list nesting depth; zero for other kinds
    pub level: u8,
    pub text: String,
    pub html: String,
    pub source_meta: SourceMeta,
}

impl Block {
    pub fn new(
        block_type: BlockType,
        level: u8,
        text: String,
        html: String,
        source_meta: SourceMeta,
    ) -> Self {
        Self {
            block_type,
            level,
            text,
            html,
            source_meta,
        }
    }
}

/// Ordered blocks of one parsed document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStructure {
    pub blocks: Vec<Block>,
    pub source_file: String,
    pub source_format: SourceFormat,
}

impl DocumentStructure {
    pub fn new(
        blocks: Vec<Block>,
        source_file: impl Into<String>,
        source_format: SourceFormat,
    ) -> Self {
        Self {
            blocks,
            source_file: source_file.into(),
            source_format,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn has_headings(&self) -> bool {
        self.blocks.iter().any(|b| b.block_type.is_heading())
    }

    /// Plain text of all blocks, one block per line.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// How a chunk's boundaries were produced
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkType {
    /// A whole section kept intact
    CompleteSection,
    /// Whole blocks packed together
    MergedBlocks,
    /// Sentence-level fallback for an oversized block
    SentenceBasedSplit,
    /// Word-level fallback for an oversized sentence
    WordBasedSplit,
    /// Single unit larger than the budget with no split point
    Oversized,
    /// Sliding window over the flattened text
    Window,
}

impl ChunkType {
    /// Check if this chunk type keeps source block boundaries
    pub fn preserves_boundaries(&self) -> bool {
        matches!(
            self,
            ChunkType::CompleteSection | ChunkType::MergedBlocks | ChunkType::Oversized
        )
    }

    /// Check if this chunk type required splitting inside a block
    pub fn is_forced_split(&self) -> bool {
        matches!(self, ChunkType::SentenceBasedSplit | ChunkType::WordBasedSplit)
    }

    /// Get a human-readable description of the chunk type
    pub fn description(&self) -> &'static str {
        match self {
            ChunkType::CompleteSection => "Complete section",
            ChunkType::MergedBlocks => "Merged blocks",
            ChunkType::SentenceBasedSplit => "Sentence-based split",
            ChunkType::WordBasedSplit => "Word-based split",
            ChunkType::Oversized => "Oversized unsplittable block",
            ChunkType::Window => "Sliding window",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Lineage and sizing metadata attached to each chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub strategy: String,
    /// Options after merging caller overrides onto the strategy defaults
    pub options: ChunkingOptions,
    pub section_path: Vec<String>,
    pub source_file: String,
    pub source_format: SourceFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide: Option<u32>,
    pub chunk_index: usize,
    pub chunk_type: ChunkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end: Option<usize>,
    /// Caller-supplied global metadata plus strategy-specific keys
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Output unit of a chunking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub title: String,
    pub preview: String,
    /// Markup content
    pub content: String,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Plain text of the chunk content
    pub fn plain_text(&self) -> String {
        crate::text::markup::plain_text(&self.content)
    }

    /// Get metadata value by key
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.extra.get(key)
    }
}
