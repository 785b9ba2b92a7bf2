//! # Parser (markup to editable tree)
//!
//! One pass over the document:
//!
//! 1. response declarations are read into a side table by identifier
//! 2. the body is walked, each element dispatched to its codec by tag;
//!    anything unrecognised becomes an opaque passthrough node
//! 3. formatting wrappers are flattened into text run flags and whitespace
//!    is collapsed, keeping single spaces only between inline siblings
//! 4. existing response processing is classified into a processing mode
//!
//! Parsing never fails outright: malformed markup or a missing body yields
//! the minimal document plus a diagnostic.

mod classify;
pub mod whitespace;

use indexmap::IndexMap;
use serde::Serialize;

use crate::codecs::{Codec, CodecRegistry, Display, OpaqueCodec, Placement};
use crate::declaration::DECLARATION_TAG;
use crate::error::TransformError;
use crate::model::editable::PARAGRAPH_TYPE;
use crate::model::{
    DocumentMetadata, EditableChild, EditableDocument, EditableNode, GenericNode, Mark, NodeExtra,
    TextRun, xml,
};
use crate::processing::rules::RESPONSE_PROCESSING;

pub const ITEM_TAG: &str = "assessmentItem";
pub const BODY_TAG: &str = "itemBody";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutput {
    pub document: EditableDocument,
    /// Why the document could not be read, when it could not.
    pub diagnostics: Vec<TransformError>,
}

impl ParseOutput {
    fn failed(error: TransformError) -> Self {
        log::warn!("falling back to an empty document: {error}");
        Self {
            document: EditableDocument::minimal(),
            diagnostics: vec![error],
        }
    }
}

pub(crate) fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Parse an item (or a bare `itemBody`) with the default codecs.
pub fn parse(markup: &str) -> ParseOutput {
    parse_with(markup, CodecRegistry::shared())
}

pub fn parse_with(markup: &str, registry: &CodecRegistry) -> ParseOutput {
    let doc = match roxmltree::Document::parse_with_options(markup, parsing_options()) {
        Ok(doc) => doc,
        Err(err) => return ParseOutput::failed(TransformError::parse_failure(err.to_string())),
    };

    let root = doc.root_element();
    let (item, body) = match xml::local_name(&root) {
        BODY_TAG => (None, Some(root)),
        ITEM_TAG => (Some(root), xml::child_elements(root, BODY_TAG).next()),
        _ => (None, None),
    };
    let Some(body) = body else {
        return ParseOutput::failed(TransformError::invalid_structure(format!(
            "no {BODY_TAG} found under <{}>",
            xml::qualified_name(&root)
        )));
    };

    let declarations: IndexMap<String, GenericNode> = item
        .map(|item| {
            xml::child_elements(item, DECLARATION_TAG)
                .filter_map(|node| {
                    let declaration = GenericNode::from_xml(node);
                    let identifier = declaration.attribute("identifier")?.to_string();
                    Some((identifier, declaration))
                })
                .collect()
        })
        .unwrap_or_default();
    log::debug!("found {} response declarations", declarations.len());

    let mut parser = BodyParser::new(registry, markup, &declarations);
    let children = parser.parse_children(body);
    let mut content = group_body(children, registry);
    if content.is_empty() {
        content.push(EditableNode::new(PARAGRAPH_TYPE));
    }

    if let Some(item) = item {
        for child in item.children().filter(|c| c.is_element() && xml::is_item_namespace(c)) {
            let floating = registry
                .for_markup(xml::local_name(&child))
                .is_some_and(|codec| codec.placement() == Placement::Floating);
            if floating {
                content.push(parser.parse_element(child));
            }
        }
    }

    let existing = item
        .and_then(|item| xml::child_elements(item, RESPONSE_PROCESSING).next())
        .map(GenericNode::from_xml);
    let metadata = DocumentMetadata {
        processing: classify::classify(existing, &content, registry),
        body_attributes: xml::attributes(&body),
    };

    ParseOutput {
        document: EditableDocument::new(metadata, content),
        diagnostics: Vec::new(),
    }
}

/// Wrap runs of inline content at body level into paragraphs.
fn group_body(children: Vec<EditableChild>, registry: &CodecRegistry) -> Vec<EditableNode> {
    fn flush(pending: &mut Vec<EditableChild>, out: &mut Vec<EditableNode>) {
        let meaningful = pending.iter().any(|child| match child {
            EditableChild::Node(_) => true,
            EditableChild::Text(run) => !run.text.trim().is_empty(),
        });
        let taken = std::mem::take(pending);
        if meaningful {
            out.push(EditableNode::new(PARAGRAPH_TYPE).with_children(taken));
        }
    }

    let mut out = Vec::new();
    let mut pending = Vec::new();
    for child in children {
        match child {
            EditableChild::Node(node) if stands_alone(&node, registry) => {
                flush(&mut pending, &mut out);
                out.push(node);
            }
            other => pending.push(other),
        }
    }
    flush(&mut pending, &mut out);
    out
}

/// Blocks, and passthrough elements, sit directly in the body.
fn stands_alone(node: &EditableNode, registry: &CodecRegistry) -> bool {
    matches!(node.extra, NodeExtra::Opaque(_))
        || registry.display_of(&node.node_type) == Display::Block
}

/// Walks body markup on behalf of the codecs.
///
/// Carries the declaration side table and the formatting and whitespace
/// state of the element currently being read.
pub struct BodyParser<'s> {
    registry: &'s CodecRegistry,
    source: &'s str,
    declarations: &'s IndexMap<String, GenericNode>,
    marks: TextRun,
    preserve_whitespace: bool,
}

impl<'s> BodyParser<'s> {
    pub fn new(
        registry: &'s CodecRegistry,
        source: &'s str,
        declarations: &'s IndexMap<String, GenericNode>,
    ) -> Self {
        Self {
            registry,
            source,
            declarations,
            marks: TextRun::empty(),
            preserve_whitespace: false,
        }
    }

    pub fn declaration(&self, identifier: &str) -> Option<&'s GenericNode> {
        self.declarations.get(identifier)
    }

    /// Exact source markup of an element.
    pub fn source_text(&self, node: roxmltree::Node<'_, '_>) -> &'s str {
        xml::source_text(&node, self.source)
    }

    /// Parse one element with its codec, or as a passthrough node.
    pub fn parse_element(&mut self, node: roxmltree::Node<'_, '_>) -> EditableNode {
        let registry = self.registry;
        let codec = if xml::is_item_namespace(&node) {
            registry.for_markup(xml::local_name(&node))
        } else {
            None
        };

        let Some(codec) = codec else {
            log::debug!("no codec for <{}>, keeping as passthrough", xml::qualified_name(&node));
            return OpaqueCodec.parse(node, self);
        };

        let saved = self.preserve_whitespace;
        self.preserve_whitespace |= codec.preserves_whitespace();
        let parsed = codec.parse(node, self);
        self.preserve_whitespace = saved;
        parsed
    }

    /// Parse the content of an element into normalized children: marks
    /// flattened, whitespace collapsed, adjacent runs with equal marks merged.
    pub fn parse_children(&mut self, node: roxmltree::Node<'_, '_>) -> Vec<EditableChild> {
        let mut items = Vec::new();
        self.collect(node, &mut items);
        if !self.preserve_whitespace {
            items = drop_separators(items, self.registry);
        }
        merge_runs(items)
    }

    fn collect(&mut self, node: roxmltree::Node<'_, '_>, items: &mut Vec<EditableChild>) {
        for child in node.children() {
            if child.is_text() {
                let raw = child.text().unwrap_or_default();
                let text = if self.preserve_whitespace {
                    raw.to_string()
                } else {
                    whitespace::collapse(raw)
                };
                items.push(EditableChild::Text(TextRun {
                    text,
                    ..self.marks.clone()
                }));
            } else if child.is_element() {
                match formatting_mark(&child) {
                    Some(mark) => {
                        let saved = self.marks.clone();
                        self.marks.set_mark(mark);
                        self.collect(child, items);
                        self.marks = saved;
                    }
                    None => items.push(EditableChild::Node(self.parse_element(child))),
                }
            }
        }
    }
}

/// The mark for a plain formatting wrapper. Wrappers carrying attributes
/// are kept as elements so nothing is lost.
fn formatting_mark(node: &roxmltree::Node<'_, '_>) -> Option<Mark> {
    if !xml::is_item_namespace(node) || node.attributes().next().is_some() {
        return None;
    }
    Mark::from_tag(xml::local_name(node))
}

fn is_inline(child: &EditableChild, registry: &CodecRegistry) -> bool {
    match child {
        EditableChild::Text(_) => true,
        EditableChild::Node(node) => registry.display_of(&node.node_type) == Display::Inline,
    }
}

/// Drop single-space runs unless they separate two inline siblings.
fn drop_separators(items: Vec<EditableChild>, registry: &CodecRegistry) -> Vec<EditableChild> {
    let keep: Vec<bool> = items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            EditableChild::Text(run) if whitespace::is_separator(&run.text) => {
                let before = index.checked_sub(1).and_then(|i| items.get(i));
                let after = items.get(index + 1);
                matches!(
                    (before, after),
                    (Some(b), Some(a)) if is_inline(b, registry) && is_inline(a, registry)
                )
            }
            _ => true,
        })
        .collect();

    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

fn merge_runs(items: Vec<EditableChild>) -> Vec<EditableChild> {
    let mut out: Vec<EditableChild> = Vec::with_capacity(items.len());
    for item in items {
        match item {
            EditableChild::Text(run) if run.text.is_empty() => {}
            EditableChild::Text(run) => match out.last_mut() {
                Some(EditableChild::Text(last)) if last.same_marks(&run) => {
                    last.text.push_str(&run.text)
                }
                _ => out.push(EditableChild::Text(run)),
            },
            node => out.push(node),
        }
    }
    out
}
