use super::{Codec, Display, Serialized};
use crate::model::editable::{OPAQUE_TYPE, OpaqueSnapshot};
use crate::model::{EditableNode, GenericNode, NodeExtra, OpaqueState, xml};
use crate::parsing::BodyParser;
use crate::serializing::BodySerializer;

/// Passthrough for elements no other codec understands.
///
/// The node keeps the exact source markup next to a structured copy. As long
/// as the structured copy is unchanged the source markup is written back
/// byte for byte; once edited, the structured copy is written instead.
#[derive(Debug, Clone, Copy)]
pub struct OpaqueCodec;

impl Codec for OpaqueCodec {
    fn type_name(&self) -> &str {
        OPAQUE_TYPE
    }

    fn parses_markup(&self) -> bool {
        false
    }

    fn display(&self) -> Display {
        Display::Inline
    }

    fn parse(&self, node: roxmltree::Node<'_, '_>, parser: &mut BodyParser<'_>) -> EditableNode {
        let parsed = EditableNode::new(OPAQUE_TYPE)
            .with_attributes(xml::attributes(&node))
            .with_children(parser.parse_children(node));

        let state = OpaqueState {
            tag: xml::qualified_name(&node),
            raw: parser.source_text(node).to_string(),
            pristine: Box::new(OpaqueSnapshot {
                attributes: parsed.attributes.clone(),
                children: parsed.children.clone(),
            }),
        };
        parsed.with_extra(NodeExtra::Opaque(state))
    }

    fn serialize(&self, node: &EditableNode, serializer: &mut BodySerializer<'_>) -> Serialized {
        let NodeExtra::Opaque(state) = &node.extra else {
            log::warn!("opaque node without passthrough data; writing children only");
            return Serialized::Fragment(serializer.serialize_children(&node.children));
        };

        if state.is_untouched(node) && !state.raw.is_empty() {
            return Serialized::Raw(state.raw.clone());
        }
        let element = GenericNode::new(state.tag.as_str())
            .with_attributes(node.attributes.clone())
            .with_children(serializer.serialize_children(&node.children));
        Serialized::Element(element)
    }
}
