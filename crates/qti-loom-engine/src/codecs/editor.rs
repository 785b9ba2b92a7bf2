//! Node types the editing surface inserts for its own use. They never come
//! from markup and never reach it as elements.

use super::{Codec, Display, Serialized};
use crate::model::EditableNode;
use crate::parsing::BodyParser;
use crate::serializing::BodySerializer;

pub const EDITOR_GROUP: &str = "editorGroup";
pub const EDITOR_HELPER: &str = "editorHelper";

/// A grouping wrapper; its children are written into the parent.
#[derive(Debug, Clone, Copy)]
pub struct EditorGroupCodec;

impl Codec for EditorGroupCodec {
    fn type_name(&self) -> &str {
        EDITOR_GROUP
    }

    fn parses_markup(&self) -> bool {
        false
    }

    fn parse(&self, node: roxmltree::Node<'_, '_>, parser: &mut BodyParser<'_>) -> EditableNode {
        EditableNode::new(EDITOR_GROUP).with_children(parser.parse_children(node))
    }

    fn serialize(&self, node: &EditableNode, serializer: &mut BodySerializer<'_>) -> Serialized {
        Serialized::Fragment(serializer.serialize_children(&node.children))
    }
}

/// Editing chrome (placeholders, drop targets). Dropped on write.
#[derive(Debug, Clone, Copy)]
pub struct EditorHelperCodec;

impl Codec for EditorHelperCodec {
    fn type_name(&self) -> &str {
        EDITOR_HELPER
    }

    fn parses_markup(&self) -> bool {
        false
    }

    fn display(&self) -> Display {
        Display::Inline
    }

    fn parse(&self, _node: roxmltree::Node<'_, '_>, _parser: &mut BodyParser<'_>) -> EditableNode {
        EditableNode::new(EDITOR_HELPER).into_void()
    }

    fn serialize(&self, _node: &EditableNode, _serializer: &mut BodySerializer<'_>) -> Serialized {
        Serialized::Nothing
    }
}
