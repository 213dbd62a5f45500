//! Heading hierarchy: sections and the heading trail above each block

use super::types::{Block, SourceMeta};
use tracing::debug;

/// Label of the anonymous section holding blocks before the first heading
pub const ROOT_SECTION_LABEL: &str = "Introduction";

/// Stack of open headings; entering a heading at level L closes every
/// open heading at level >= L.
#[derive(Debug, Clone, Default)]
pub struct HeadingTrail {
    stack: Vec<(u8, String)>,
}

impl HeadingTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, level: u8, title: &str) {
        // untitled slide decks report level 0; treat as top level
        let level = level.max(1);
        while self.stack.last().is_some_and(|(l, _)| *l >= level) {
            self.stack.pop();
        }
        self.stack.push((level, title.to_string()));
    }

    /// Heading texts from the outermost to the innermost open heading
    pub fn path(&self) -> Vec<String> {
        self.stack.iter().map(|(_, t)| t.clone()).collect()
    }
}

/// A heading and the blocks beneath it up to the next heading
#[derive(Debug, Clone)]
pub struct Section<'a> {
    /// `None` for the anonymous root section
    pub heading: Option<&'a Block>,
    /// Ancestor heading texts followed by this section's own heading
    pub path: Vec<String>,
    pub blocks: Vec<&'a Block>,
}

impl<'a> Section<'a> {
    pub fn label(&self) -> &str {
        self.heading
            .map(|h| h.text.as_str())
            .unwrap_or(ROOT_SECTION_LABEL)
    }

    /// Heading (if any) followed by the body blocks
    pub fn all_blocks(&self) -> impl Iterator<Item = &'a Block> + '_ {
        self.heading.into_iter().chain(self.blocks.iter().copied())
    }

    /// Location of the section's first block
    pub fn location(&self) -> Option<&'a SourceMeta> {
        self.all_blocks().next().map(|b| &b.source_meta)
    }

    pub fn markup(&self) -> String {
        self.all_blocks().map(|b| b.html.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.heading.is_none() && self.blocks.is_empty()
    }
}

/// Group blocks into sections in document order.
pub fn build_sections(blocks: &[Block]) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut trail = HeadingTrail::new();
    let mut current = Section {
        heading: None,
        path: Vec::new(),
        blocks: Vec::new(),
    };

    for block in blocks {
        if block.block_type.is_heading() {
            trail.enter(block.level, &block.text);
            let next = Section {
                heading: Some(block),
                path: trail.path(),
                blocks: Vec::new(),
            };
            let done = std::mem::replace(&mut current, next);
            if !done.is_empty() {
                sections.push(done);
            }
        } else {
            current.blocks.push(block);
        }
    }
    if !current.is_empty() {
        sections.push(current);
    }

    debug!("Built {} sections from {} blocks", sections.len(), blocks.len());
    sections
}
