//! # Serializer (editable tree to markup)
//!
//! Serializing walks the body through the codecs, collecting response
//! identifiers, live declarations and feedback references on the way.
//! Without a prior document the result is just the body. With one, the
//! prior is patched in place: declarations, the body, generated processing
//! and floating feedback are replaced or inserted, and every byte outside
//! those regions is kept.

pub mod marks;
mod patch;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codecs::{Codec, CodecRegistry, Display, Placement, Serialized};
use crate::error::TransformError;
use crate::model::{EditableChild, EditableDocument, EditableNode, GenericChild, GenericNode};
use crate::parsing::BODY_TAG;
use crate::processing::{GeneratorInput, ResponseInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    /// Spaces per nesting level for regenerated markup.
    pub indent: usize,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl SerializeOptions {
    fn unit(&self) -> String {
        " ".repeat(self.indent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeOutput {
    pub markup: String,
    /// Every response identifier met, in document order, repeats included.
    pub response_identifiers: Vec<String>,
    /// Live declaration per distinct response identifier.
    pub collected_declarations: IndexMap<String, GenericNode>,
    pub errors: Vec<TransformError>,
}

/// Serialize with the default codecs and options.
pub fn serialize(doc: &EditableDocument, prior: Option<&str>) -> SerializeOutput {
    serialize_with(doc, prior, CodecRegistry::shared(), &SerializeOptions::default())
}

/// Serialize `doc`. With `prior`, the result is the whole prior document
/// with its managed regions rewritten; when the prior cannot be patched it is
/// returned unchanged and the reason is the only error.
pub fn serialize_with(
    doc: &EditableDocument,
    prior: Option<&str>,
    registry: &CodecRegistry,
    options: &SerializeOptions,
) -> SerializeOutput {
    let body_attributes = doc
        .metadata()
        .map(|metadata| metadata.body_attributes.clone())
        .unwrap_or_default();
    let collected = collect(doc.content(), registry);

    let result = match prior {
        None => {
            let body = GenericNode::new(BODY_TAG)
                .with_attributes(body_attributes)
                .with_children(collected.body.iter().cloned());
            Ok(body.to_pretty_xml_with(&options.unit(), "", &indent_blocks(registry)))
        }
        Some(prior) => patch::apply(prior, &collected, &doc.processing(), registry, options),
    };

    let context = collected.context;
    match result {
        Ok(markup) => SerializeOutput {
            markup,
            response_identifiers: context.response_identifiers,
            collected_declarations: context.declarations,
            errors: context.errors,
        },
        Err(error) => {
            log::warn!("prior document left unchanged: {error}");
            SerializeOutput {
                markup: prior.unwrap_or_default().to_string(),
                response_identifiers: context.response_identifiers,
                collected_declarations: context.declarations,
                errors: vec![error],
            }
        }
    }
}

/// What a serialize pass learns about the document.
#[derive(Debug, Clone, Default)]
pub struct SerializeContext {
    pub response_identifiers: Vec<String>,
    /// First declaration seen per response identifier.
    pub declarations: IndexMap<String, GenericNode>,
    /// One entry per distinct response identifier.
    pub responses: Vec<ResponseInfo>,
    pub feedback_references: BTreeSet<String>,
    pub errors: Vec<TransformError>,
}

impl SerializeContext {
    fn finish(&mut self) {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for identifier in &self.response_identifiers {
            *counts.entry(identifier.as_str()).or_default() += 1;
        }
        let duplicates: Vec<TransformError> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(identifier, count)| TransformError::DuplicateIdentifier {
                identifier: identifier.to_string(),
                count,
            })
            .collect();
        self.errors.extend(duplicates);
    }

    pub fn generator_input(&self, existing_outcomes: IndexMap<String, GenericNode>) -> GeneratorInput {
        GeneratorInput {
            responses: self.responses.clone(),
            existing_outcomes,
            feedback_references: self.feedback_references.clone(),
        }
    }
}

/// Walks editable nodes on behalf of the codecs.
pub struct BodySerializer<'r> {
    registry: &'r CodecRegistry,
    context: SerializeContext,
}

impl<'r> BodySerializer<'r> {
    pub fn new(registry: &'r CodecRegistry) -> Self {
        Self {
            registry,
            context: SerializeContext::default(),
        }
    }

    pub fn serialize_node(&mut self, node: &EditableNode) -> Serialized {
        let registry = self.registry;
        match registry.get(&node.node_type) {
            Some(codec) => codec.serialize(node, self),
            None => {
                log::warn!("no codec for {}; writing it as a plain element", node.node_type);
                Serialized::Element(self.element(&node.node_type, node))
            }
        }
    }

    /// Serialize children, rebuilding formatting elements around text.
    pub fn serialize_children(&mut self, children: &[EditableChild]) -> Vec<GenericChild> {
        let mut out = Vec::new();
        let mut runs = Vec::new();

        for child in children {
            match child {
                EditableChild::Text(run) => runs.push(run),
                EditableChild::Node(node) => {
                    out.extend(marks::wrap(&runs));
                    runs.clear();
                    match self.serialize_node(node) {
                        Serialized::Element(element) => out.push(GenericChild::Node(element)),
                        Serialized::Fragment(children) => out.extend(children),
                        Serialized::Raw(raw) => out.push(GenericChild::Raw(raw)),
                        Serialized::Nothing => {}
                    }
                }
            }
        }
        out.extend(marks::wrap(&runs));
        out
    }

    /// `tag` with the node's attributes and serialized children. Void nodes
    /// get no children.
    pub fn element(&mut self, tag: &str, node: &EditableNode) -> GenericNode {
        let element = GenericNode::new(tag).with_attributes(node.attributes.clone());
        if node.void {
            element
        } else {
            element.with_children(self.serialize_children(&node.children))
        }
    }

    /// Note an interaction and the declaration its codec derives for it.
    pub fn record_interaction(&mut self, node: &EditableNode, codec: &dyn Codec) {
        let Some(identifier) = node.response_identifier() else {
            self.context.errors.push(TransformError::MissingIdentifier {
                interaction: node.node_type.clone(),
            });
            return;
        };
        self.context.response_identifiers.push(identifier.to_string());

        if self.context.declarations.contains_key(identifier) {
            return;
        }
        let Some(declaration) = codec.live_declaration(node) else {
            return;
        };
        self.context
            .declarations
            .insert(identifier.to_string(), declaration.clone());
        self.context.responses.push(ResponseInfo {
            option_ids: codec.option_ids(node),
            ..ResponseInfo::new(identifier, node.node_type.as_str(), declaration)
        });
    }

    pub fn record_feedback_reference(&mut self, identifier: &str) {
        self.context
            .feedback_references
            .insert(identifier.to_string());
    }

    pub fn into_context(mut self) -> SerializeContext {
        self.context.finish();
        self.context
    }
}

/// Serialized content split by placement, plus the pass context.
pub(crate) struct Collected {
    pub body: Vec<GenericChild>,
    pub floating: Vec<GenericNode>,
    pub context: SerializeContext,
}

pub(crate) fn collect(content: &[EditableNode], registry: &CodecRegistry) -> Collected {
    let mut serializer = BodySerializer::new(registry);
    let mut body = Vec::new();
    let mut floating = Vec::new();

    for node in content {
        let placement = registry
            .get(&node.node_type)
            .map_or(Placement::Body, |codec| codec.placement());
        match (placement, serializer.serialize_node(node)) {
            (Placement::Floating, Serialized::Element(element)) => floating.push(element),
            (Placement::Floating, other) => {
                log::debug!("dropping floating {} that produced {other:?}", node.node_type);
            }
            (Placement::Body, Serialized::Element(element)) => body.push(GenericChild::Node(element)),
            (Placement::Body, Serialized::Fragment(children)) => body.extend(children),
            (Placement::Body, Serialized::Raw(raw)) => body.push(GenericChild::Raw(raw)),
            (Placement::Body, Serialized::Nothing) => {}
        }
    }

    Collected {
        body,
        floating,
        context: serializer.into_context(),
    }
}

/// Generator input for `content`, as a serialize pass would collect it.
pub(crate) fn generator_input(content: &[EditableNode], registry: &CodecRegistry) -> GeneratorInput {
    collect(content, registry)
        .context
        .generator_input(IndexMap::new())
}

/// Only block elements holding nothing but blocks go onto separate lines;
/// anything else is written compactly so no whitespace enters inline flow.
pub(crate) fn indent_blocks(registry: &CodecRegistry) -> impl Fn(&GenericNode) -> bool + '_ {
    let is_block =
        |node: &GenericNode| node.tag == BODY_TAG || registry.display_of(&node.tag) == Display::Block;
    move |node: &GenericNode| is_block(node) && node.elements().all(is_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::editable::{DocumentMetadata, PARAGRAPH_TYPE};
    use crate::model::{InteractionState, NodeExtra, TextRun};
    use crate::parsing::parse;
    use pretty_assertions::assert_eq;

    fn text_entry(identifier: Option<&str>) -> EditableNode {
        let node = EditableNode::new("textEntryInteraction")
            .with_extra(NodeExtra::Interaction(InteractionState::default()))
            .into_void();
        match identifier {
            Some(identifier) => node.with_attribute("responseIdentifier", identifier),
            None => node,
        }
    }

    fn paragraph(children: Vec<EditableChild>) -> EditableNode {
        EditableNode::new(PARAGRAPH_TYPE).with_children(children)
    }

    #[test]
    fn body_only_output() {
        let doc = parse(r#"<itemBody class="x"><p>Hello <em>there</em></p><div><p>a</p></div></itemBody>"#)
            .document;
        assert_eq!(
            serialize(&doc, None).markup,
            "<itemBody class=\"x\">\n  <p>Hello <em>there</em></p>\n  <div>\n    <p>a</p>\n  </div>\n</itemBody>"
        );
    }

    #[test]
    fn indent_option_is_honoured() {
        let doc = parse("<itemBody><p>a</p></itemBody>").document;
        let output = serialize_with(
            &doc,
            None,
            CodecRegistry::shared(),
            &SerializeOptions { indent: 4 },
        );
        assert_eq!(output.markup, "<itemBody>\n    <p>a</p>\n</itemBody>");
    }

    #[test]
    fn duplicates_are_reported_once_each() {
        let doc = EditableDocument::new(
            DocumentMetadata::default(),
            vec![
                paragraph(vec![EditableChild::Node(text_entry(Some("R1")))]),
                paragraph(vec![EditableChild::Node(text_entry(Some("R1")))]),
                paragraph(vec![EditableChild::Node(text_entry(Some("R2")))]),
            ],
        );
        let output = serialize(&doc, None);

        assert_eq!(output.response_identifiers, vec!["R1", "R1", "R2"]);
        assert_eq!(
            output.collected_declarations.keys().collect::<Vec<_>>(),
            vec!["R1", "R2"]
        );
        assert_eq!(
            output.errors,
            vec![TransformError::DuplicateIdentifier {
                identifier: "R1".to_string(),
                count: 2
            }]
        );
    }

    #[test]
    fn missing_identifier_is_reported_and_skipped() {
        let doc = EditableDocument::new(
            DocumentMetadata::default(),
            vec![paragraph(vec![
                EditableChild::Text(TextRun::new("Blank ")),
                EditableChild::Node(text_entry(None)),
            ])],
        );
        let output = serialize(&doc, None);

        assert!(output.response_identifiers.is_empty());
        assert!(output.collected_declarations.is_empty());
        assert_eq!(
            output.errors,
            vec![TransformError::MissingIdentifier {
                interaction: "textEntryInteraction".to_string()
            }]
        );
        assert!(output.markup.contains("<p>Blank <textEntryInteraction/></p>"));
    }

    #[test]
    fn unknown_node_type_is_written_as_element() {
        let doc = EditableDocument::new(
            DocumentMetadata::default(),
            vec![EditableNode::new("mystery").with_children(vec![EditableChild::Text(TextRun::new("?"))])],
        );
        assert!(serialize(&doc, None).markup.contains("<mystery>?</mystery>"));
    }

    #[test]
    fn body_only_output_drops_floating_nodes() {
        let doc = parse(
            r#"<assessmentItem><itemBody><p>Q</p></itemBody><modalFeedback outcomeIdentifier="FEEDBACK" identifier="x" showHide="show">hi</modalFeedback></assessmentItem>"#,
        )
        .document;
        assert_eq!(serialize(&doc, None).markup, "<itemBody>\n  <p>Q</p>\n</itemBody>");
    }
}
