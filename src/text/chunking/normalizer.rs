//! Block normalizer: parsed-document markup -> ordered typed blocks

use super::error::Result;
use super::types::{Block, BlockType, DocumentStructure, SourceFormat, SourceMeta};
use crate::text::markup::{self, MarkupTree, NodeId};
use tracing::{debug, info};

const PAGE_ATTRS: [&str; 2] = ["data-page", "data-page-number"];
const SLIDE_ATTRS: [&str; 2] = ["data-slide", "data-slide-number"];
const FORMAT_ATTR: &str = "data-source-format";

// containers that become a leaf block when they hold text of their own
const GENERIC_CONTAINERS: [&str; 11] = [
    "div", "section", "article", "blockquote", "main", "header", "footer", "aside", "figure",
    "nav", "address",
];

/// Normalize markup leniently; unparseable input degrades to fewer (or no) blocks.
pub fn normalize(
    markup: &str,
    source_format: SourceFormat,
    source_file: &str,
) -> DocumentStructure {
    let tree = MarkupTree::parse(markup);
    build_structure(&tree, source_format, source_file)
}

/// Normalize markup, surfacing HTML parse errors as `MalformedInput`.
pub fn normalize_strict(
    markup: &str,
    source_format: SourceFormat,
    source_file: &str,
) -> Result<DocumentStructure> {
    let tree = MarkupTree::parse_strict(markup)?;
    Ok(build_structure(&tree, source_format, source_file))
}

fn build_structure(
    tree: &MarkupTree,
    source_format: SourceFormat,
    source_file: &str,
) -> DocumentStructure {
    let mut walker = Walker {
        tree,
        document_format: source_format,
        cursor: Cursor {
            format: source_format,
            page: None,
            slide: None,
        },
        blocks: Vec::new(),
    };
    walker.walk_children(tree.root());
    info!(
        "Normalized {} blocks from {:?} ({})",
        walker.blocks.len(),
        source_file,
        source_format
    );
    DocumentStructure::new(walker.blocks, source_file, source_format)
}

// page / slide position; sticky across siblings until another marker is entered
struct Cursor {
    format: SourceFormat,
    page: Option<u32>,
    slide: Option<u32>,
}

struct Walker<'a> {
    tree: &'a MarkupTree,
    document_format: SourceFormat,
    cursor: Cursor,
    blocks: Vec<Block>,
}

impl Walker<'_> {
    fn walk_children(&mut self, id: NodeId) {
        for &child in self.tree.children(id) {
            self.visit(child);
        }
    }

    fn visit(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(tag) = tree.tag(id) else {
            if tree.is_text(id) {
                // stray text outside any block element
                self.emit(id, BlockType::Other, 0, &|_| false);
            }
            return;
        };
        if markup::is_skipped_tag(tag) {
            return;
        }
        self.update_cursor(id);

        if let Some(level) = markup::heading_level(tag) {
            let block_type = if self.document_format.is_slide_deck() {
                BlockType::SlideTitle
            } else {
                BlockType::Heading
            };
            self.emit(id, block_type, level, &|_| false);
            return;
        }

        match tag {
            "p" => self.emit(id, BlockType::Paragraph, 0, &|_| false),
            "li" => self.visit_list_item(id),
            "table" => self.emit(id, BlockType::Table, 0, &|_| false),
            "pre" | "code" => self.emit(id, BlockType::Code, 0, &|_| false),
            "ul" | "ol" => self.walk_children(id),
            _ if self.is_slide_note(id) => self.emit(id, BlockType::SlideNote, 0, &|_| false),
            _ if GENERIC_CONTAINERS.contains(&tag) => {
                if tree.has_direct_text(id) || !tree.has_element_children(id) {
                    self.emit(id, BlockType::Other, 0, &|_| false);
                } else {
                    self.walk_children(id);
                }
            }
            _ => self.walk_children(id),
        }
    }

    fn visit_list_item(&mut self, id: NodeId) {
        let tree = self.tree;
        let level = tree
            .ancestors(id)
            .filter(|&a| matches!(tree.tag(a), Some("ul" | "ol")))
            .count()
            .max(1);
        let nested_list = |n: NodeId| matches!(tree.tag(n), Some("ul" | "ol"));
        self.emit(id, BlockType::ListItem, level.min(u8::MAX as usize) as u8, &nested_list);
        // nested lists follow their parent item as their own items
        for &child in tree.children(id) {
            if nested_list(child) {
                self.visit(child);
            }
        }
    }

    fn is_slide_note(&self, id: NodeId) -> bool {
        if !self.document_format.is_slide_deck() {
            return false;
        }
        self.tree.attr(id, "data-notes").is_some()
            || self
                .tree
                .attr(id, "class")
                .is_some_and(|class| class.split_whitespace().any(|c| c.contains("notes")))
    }

    fn update_cursor(&mut self, id: NodeId) {
        let tree = self.tree;
        if let Some(page) = PAGE_ATTRS
            .iter()
            .find_map(|attr| tree.attr(id, attr))
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.cursor.page = Some(page);
        }
        if let Some(slide) = SLIDE_ATTRS
            .iter()
            .find_map(|attr| tree.attr(id, attr))
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.cursor.slide = Some(slide);
        }
        if let Some(format) = tree.attr(id, FORMAT_ATTR)
            && let Ok(format) = format.parse::<SourceFormat>()
        {
            self.cursor.format = format;
        }
    }

    fn emit(
        &mut self,
        id: NodeId,
        block_type: BlockType,
        level: u8,
        skip: &dyn Fn(NodeId) -> bool,
    ) {
        let text = self.tree.text_content_filtered(id, skip);
        if text.trim().is_empty() {
            return;
        }
        let html = match self.tree.tag(id) {
            Some(_) => self.tree.outer_html_filtered(id, skip),
            None => markup::wrap_paragraph(&text, None),
        };
        debug!(
            "Block #{} {:?} (level {}): {} chars",
            self.blocks.len(),
            block_type,
            level,
            text.len()
        );
        self.blocks.push(Block::new(
            block_type,
            level,
            text,
            html,
            SourceMeta {
                format: self.cursor.format,
                page: self.cursor.page,
                slide: self.cursor.slide,
                ..Default::default()
            },
        ));
    }
}
