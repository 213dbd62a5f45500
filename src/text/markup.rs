//! HTML markup tree built with `html5ever`.
//!
//! Reader output is an HTML fragment. It is parsed in `<body>` context the
//! way a browser parses it (implicit end tags, raw-text `<script>`, full
//! entity table, stray `<` kept as text) into an arena tree whose root is
//! the fragment's `<body>`. Block markup is re-serialized with the
//! `html5ever` HTML serializer.

use crate::text::chunking::error::{ChunkingError, Result};
use html5ever::driver::ParseOpts;
use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, QualName, local_name, ns, parse_document};
use itertools::Itertools;
use std::borrow::Cow;
use std::cell::RefCell;
use std::io;
use tracing::{debug, warn};

pub type NodeId = usize;

const DOCUMENT: NodeId = 0;

const BLOCK_TAGS: [&str; 34] = [
    "address", "article", "aside", "blockquote", "caption", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "tfoot", "thead",
    "tr", "ul", "body",
];

const SKIPPED_TAGS: [&str; 5] = ["script", "style", "head", "template", "noscript"];

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
    },
    Text(String),
    Comment,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena-backed element tree; `root()` is the fragment's `<body>`.
#[derive(Debug, Clone)]
pub struct MarkupTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: DOCUMENT,
        }
    }
}

impl MarkupTree {
    /// Parse leniently; parse errors are recovered the way browsers do.
    pub fn parse(markup: &str) -> Self {
        let (tree, errors) = Self::build(markup);
        if let Some(first) = errors.first() {
            debug!("Recovered {} markup parse errors, first: {}", errors.len(), first);
        }
        tree
    }

    /// Parse, failing with `MalformedInput` when the markup has parse errors.
    pub fn parse_strict(markup: &str) -> Result<Self> {
        let (tree, errors) = Self::build(markup);
        match errors.first() {
            Some(first) => Err(ChunkingError::malformed_input(format!(
                "{} ({} parse errors)",
                first,
                errors.len()
            ))),
            None => Ok(tree),
        }
    }

    fn build(markup: &str) -> (Self, Vec<Cow<'static, str>>) {
        // fragment parsed in body context of a minimal document
        let wrapped = format!("<!DOCTYPE html><html><head></head><body>{markup}</body></html>");
        let sink = parse_document(ArenaSink::default(), ParseOpts::default())
            .from_utf8()
            .one(wrapped.as_bytes());
        let mut tree = sink.tree.into_inner();
        tree.root = tree.find_body().unwrap_or(DOCUMENT);
        (tree, sink.errors.into_inner())
    }

    fn find_body(&self) -> Option<NodeId> {
        let html = self
            .children(DOCUMENT)
            .iter()
            .copied()
            .find(|&id| self.tag(id) == Some("html"))?;
        self.children(html)
            .iter()
            .copied()
            .find(|&id| self.tag(id) == Some("body"))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Lowercase local tag name, `None` for text, comments and the document.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.data {
            NodeData::Element { name, .. } => Some(&*name.local),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes.get(id)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| &*a.name.local == key)
                .map(|a| &*a.value),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].data, NodeData::Text(_))
    }

    /// True if a direct child text node carries non-whitespace content.
    pub fn has_direct_text(&self, id: NodeId) -> bool {
        self.children(id).iter().any(|&child| match &self.nodes[child].data {
            NodeData::Text(t) => !t.trim().is_empty(),
            _ => false,
        })
    }

    pub fn has_element_children(&self, id: NodeId) -> bool {
        self.children(id).iter().any(|&child| self.tag(child).is_some())
    }

    /// Ancestors of `id`, nearest first, stopping below the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id].parent, |&p| self.nodes[p].parent)
            .take_while(|&p| p != self.root)
    }

    /// Depth-first, document-order traversal below `id` (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = pending.pop() {
            out.push(next);
            pending.extend(self.children(next).iter().rev());
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        self.outer_html_filtered(id, &|_| false)
    }

    /// Serialize `id`, leaving out any subtree for which `skip` is true.
    pub fn outer_html_filtered(&self, id: NodeId, skip: &dyn Fn(NodeId) -> bool) -> String {
        let mut bytes = Vec::new();
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::IncludeNode,
            ..Default::default()
        };
        let subtree = Subtree {
            tree: self,
            id,
            skip,
        };
        if let Err(e) = serialize(&mut bytes, &subtree, opts) {
            warn!("Cannot serialize markup node {}: {}", id, e);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn write_node<S>(
        &self,
        id: NodeId,
        out: &mut S,
        include_self: bool,
        skip: &dyn Fn(NodeId) -> bool,
    ) -> io::Result<()>
    where
        S: Serializer,
    {
        match &self.nodes[id].data {
            NodeData::Element { name, attrs } if include_self => {
                out.start_elem(name.clone(), attrs.iter().map(|a| (&a.name, &*a.value)))?;
                self.write_children(id, out, skip)?;
                out.end_elem(name.clone())
            }
            NodeData::Text(text) if include_self => out.write_text(text),
            NodeData::Comment => Ok(()),
            _ => self.write_children(id, out, skip),
        }
    }

    fn write_children<S>(
        &self,
        id: NodeId,
        out: &mut S,
        skip: &dyn Fn(NodeId) -> bool,
    ) -> io::Result<()>
    where
        S: Serializer,
    {
        for &child in self.children(id) {
            if !skip(child) {
                self.write_node(child, out, true, skip)?;
            }
        }
        Ok(())
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.text_content_filtered(id, &|_| false)
    }

    /// Plain text of `id`: block elements break lines, whitespace collapses.
    pub fn text_content_filtered(&self, id: NodeId, skip: &dyn Fn(NodeId) -> bool) -> String {
        let mut raw = String::new();
        self.collect_text(id, &mut raw, skip);
        normalize_whitespace(&raw)
    }

    fn collect_text(&self, id: NodeId, out: &mut String, skip: &dyn Fn(NodeId) -> bool) {
        match &self.nodes[id].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Comment => {}
            NodeData::Document => {
                for &child in self.children(id) {
                    if !skip(child) {
                        self.collect_text(child, out, skip);
                    }
                }
            }
            NodeData::Element { name, .. } => {
                let name = &*name.local;
                if SKIPPED_TAGS.contains(&name) {
                    return;
                }
                if name == "br" {
                    out.push('\n');
                    return;
                }
                let block = is_block_tag(name);
                if block {
                    out.push('\n');
                }
                for &child in self.children(id) {
                    if !skip(child) {
                        self.collect_text(child, out, skip);
                    }
                }
                if block {
                    out.push('\n');
                } else if matches!(name, "td" | "th") {
                    out.push(' ');
                }
            }
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn insert_before(&mut self, sibling: NodeId, child: NodeId) {
        self.detach(child);
        let Some(parent) = self.nodes[sibling].parent else {
            return;
        };
        let siblings = &mut self.nodes[parent].children;
        let pos = siblings
            .iter()
            .position(|&c| c == sibling)
            .unwrap_or(siblings.len());
        siblings.insert(pos, child);
        self.nodes[child].parent = Some(parent);
    }

    // adjacent text is merged into one node
    fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent].children.last()
            && let NodeData::Text(existing) = &mut self.nodes[last].data
        {
            existing.push_str(text);
            return;
        }
        let id = self.push(NodeData::Text(text.to_string()));
        self.append_child(parent, id);
    }

    fn insert_text_before(&mut self, sibling: NodeId, text: &str) {
        let previous = self.nodes[sibling].parent.and_then(|parent| {
            let siblings = &self.nodes[parent].children;
            let pos = siblings.iter().position(|&c| c == sibling)?;
            pos.checked_sub(1).map(|p| siblings[p])
        });
        if let Some(previous) = previous
            && let NodeData::Text(existing) = &mut self.nodes[previous].data
        {
            existing.push_str(text);
            return;
        }
        let id = self.push(NodeData::Text(text.to_string()));
        self.insert_before(sibling, id);
    }
}

// serialization view of one node with skipped subtrees left out
struct Subtree<'t> {
    tree: &'t MarkupTree,
    id: NodeId,
    skip: &'t dyn Fn(NodeId) -> bool,
}

impl Serialize for Subtree<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let include_self = matches!(traversal_scope, TraversalScope::IncludeNode);
        self.tree.write_node(self.id, serializer, include_self, self.skip)
    }
}

/// Tree-builder handle; elements carry their name for `elem_name`.
#[derive(Debug, Clone)]
struct SinkHandle {
    id: NodeId,
    name: QualName,
}

impl SinkHandle {
    fn unnamed(id: NodeId) -> Self {
        Self {
            id,
            name: QualName::new(None, ns!(), local_name!("")),
        }
    }
}

/// `html5ever` sink building a `MarkupTree`.
#[derive(Default)]
struct ArenaSink {
    tree: RefCell<MarkupTree>,
    errors: RefCell<Vec<Cow<'static, str>>>,
}

impl TreeSink for ArenaSink {
    type Handle = SinkHandle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        self.errors.borrow_mut().push(msg);
    }

    fn get_document(&self) -> Self::Handle {
        SinkHandle::unnamed(DOCUMENT)
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        &target.name
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let id = self.tree.borrow_mut().push(NodeData::Element {
            name: name.clone(),
            attrs,
        });
        SinkHandle { id, name }
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        SinkHandle::unnamed(self.tree.borrow_mut().push(NodeData::Comment))
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        SinkHandle::unnamed(self.tree.borrow_mut().push(NodeData::Comment))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut tree = self.tree.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => tree.append_child(parent.id, node.id),
            NodeOrText::AppendText(text) => tree.append_text(parent.id, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.tree.borrow().nodes[element.id].parent.is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.id == y.id
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut tree = self.tree.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => tree.insert_before(sibling.id, node.id),
            NodeOrText::AppendText(text) => tree.insert_text_before(sibling.id, &text),
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut tree = self.tree.borrow_mut();
        if let NodeData::Element {
            attrs: existing, ..
        } = &mut tree.nodes[target.id].data
        {
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.tree.borrow_mut().detach(target.id);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut tree = self.tree.borrow_mut();
        let children = std::mem::take(&mut tree.nodes[node.id].children);
        for child in children {
            tree.nodes[child].parent = None;
            tree.append_child(new_parent.id, child);
        }
    }
}

pub fn is_block_tag(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

pub fn is_skipped_tag(name: &str) -> bool {
    SKIPPED_TAGS.contains(&name)
}

/// Heading depth for `h1`..`h6`.
pub fn heading_level(name: &str) -> Option<u8> {
    match name.as_bytes() {
        [b'h', d @ b'1'..=b'6'] => Some(d - b'0'),
        _ => None,
    }
}

/// Plain text of a markup fragment.
pub fn plain_text(markup: &str) -> String {
    let tree = MarkupTree::parse(markup);
    tree.text_content(tree.root())
}

/// Text of the first `h1`..`h6` element in document order.
pub fn first_heading_text(markup: &str) -> Option<String> {
    let tree = MarkupTree::parse(markup);
    tree.descendants(tree.root())
        .into_iter()
        .find(|&id| tree.tag(id).and_then(heading_level).is_some())
        .map(|id| tree.text_content(id))
        .filter(|text| !text.is_empty())
}

/// Wrap plain text as a paragraph element, escaping markup characters.
pub fn wrap_paragraph(text: &str, class: Option<&str>) -> String {
    let mut tree = MarkupTree::default();
    let attrs = class
        .map(|class| Attribute {
            name: QualName::new(None, ns!(), local_name!("class")),
            value: StrTendril::from(class),
        })
        .into_iter()
        .collect();
    let p = tree.push(NodeData::Element {
        name: QualName::new(None, ns!(html), local_name!("p")),
        attrs,
    });
    tree.append_child(DOCUMENT, p);
    tree.append_text(p, text);
    tree.outer_html(p)
}

/// Collapse whitespace runs inside lines and drop empty lines.
pub fn normalize_whitespace(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().join(" "))
        .filter(|line| !line.is_empty())
        .join("\n")
}
