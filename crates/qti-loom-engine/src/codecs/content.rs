//! Codecs for the XHTML-like content model: blocks, inline spans, and void
//! elements. Formatting wrappers (`strong`, `em`, ...) have no codec; the
//! parser flattens them into text run flags.

use super::{Codec, CodecRegistry, Display, Serialized};
use crate::model::xml;
use crate::model::EditableNode;
use crate::parsing::BodyParser;
use crate::serializing::BodySerializer;

const BLOCKS: &[&str] = &[
    "p",
    "div",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "dl",
    "dt",
    "dd",
    "blockquote",
    "table",
    "caption",
    "thead",
    "tbody",
    "tfoot",
    "tr",
    "th",
    "td",
    "prompt",
    "simpleChoice",
    "simpleAssociableChoice",
    "simpleMatchSet",
];

const INLINES: &[&str] = &[
    "span", "a", "sub", "sup", "q", "abbr", "cite", "dfn", "kbd", "samp", "var", "small", "big",
];

const VOID_INLINES: &[&str] = &["img", "br"];

/// A plain element: tag, attributes, and recursively parsed children.
#[derive(Debug, Clone)]
pub struct ContentCodec {
    tag: String,
    display: Display,
    void: bool,
    preserve_whitespace: bool,
}

impl ContentCodec {
    pub fn block(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            display: Display::Block,
            void: false,
            preserve_whitespace: false,
        }
    }

    pub fn inline(tag: &str) -> Self {
        Self {
            display: Display::Inline,
            ..Self::block(tag)
        }
    }

    /// Block whose text is kept exactly as written.
    pub fn preformatted(tag: &str) -> Self {
        Self {
            preserve_whitespace: true,
            ..Self::block(tag)
        }
    }

    pub fn void(tag: &str, display: Display) -> Self {
        Self {
            display,
            void: true,
            ..Self::block(tag)
        }
    }
}

impl Codec for ContentCodec {
    fn type_name(&self) -> &str {
        &self.tag
    }

    fn display(&self) -> Display {
        self.display
    }

    fn preserves_whitespace(&self) -> bool {
        self.preserve_whitespace
    }

    fn parse(&self, node: roxmltree::Node<'_, '_>, parser: &mut BodyParser<'_>) -> EditableNode {
        let parsed = EditableNode::new(self.tag.as_str()).with_attributes(xml::attributes(&node));
        if self.void {
            parsed.into_void()
        } else {
            parsed.with_children(parser.parse_children(node))
        }
    }

    fn serialize(&self, node: &EditableNode, serializer: &mut BodySerializer<'_>) -> Serialized {
        Serialized::Element(serializer.element(&self.tag, node))
    }
}

pub(super) fn register_defaults(registry: &mut CodecRegistry) {
    for tag in BLOCKS {
        registry.register(ContentCodec::block(tag));
    }
    for tag in INLINES {
        registry.register(ContentCodec::inline(tag));
    }
    for tag in VOID_INLINES {
        registry.register(ContentCodec::void(tag, Display::Inline));
    }
    registry.register(ContentCodec::void("hr", Display::Block));
    registry.register(ContentCodec::preformatted("pre"));
}
