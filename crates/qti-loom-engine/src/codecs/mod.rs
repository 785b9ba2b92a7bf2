//! # Codec Registry
//!
//! One [`Codec`] per node type, looked up by tag. A codec turns a markup
//! element into an [`EditableNode`] and back, and for interactions also
//! supplies the correctness check, feedback rules, and feedback identifiers
//! the generator and catalog need.

pub mod content;
pub mod editor;
pub mod feedback;
pub mod interactions;
pub mod opaque;

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::feedback::{FeedbackIdentifier, standard_identifiers};
use crate::model::{EditableNode, GenericChild, GenericNode};
use crate::parsing::BodyParser;
use crate::processing::{ResponseInfo, rules};
use crate::serializing::BodySerializer;

pub use content::ContentCodec;
pub use editor::{EDITOR_GROUP, EDITOR_HELPER, EditorGroupCodec, EditorHelperCodec};
pub use feedback::FeedbackCodec;
pub use interactions::{InteractionCodec, InteractionKind};
pub use opaque::OpaqueCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
}

/// Where a node lives in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Inside the item body.
    Body,
    /// After the body, outside it (modal feedback).
    Floating,
}

/// What serializing one node produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Serialized {
    Element(GenericNode),
    /// Children to splice into the parent in place of the node.
    Fragment(Vec<GenericChild>),
    /// Markup to copy verbatim.
    Raw(String),
    Nothing,
}

pub trait Codec: Send + Sync {
    /// Node type this codec handles; also the tag it reads and writes.
    fn type_name(&self) -> &str;

    /// Whether the tag is read from markup. Editor-only types are not.
    fn parses_markup(&self) -> bool {
        true
    }

    fn display(&self) -> Display {
        Display::Block
    }

    fn placement(&self) -> Placement {
        Placement::Body
    }

    /// Whether text inside keeps its whitespace as written.
    fn preserves_whitespace(&self) -> bool {
        false
    }

    fn parse(&self, node: roxmltree::Node<'_, '_>, parser: &mut BodyParser<'_>) -> EditableNode;

    fn serialize(&self, node: &EditableNode, serializer: &mut BodySerializer<'_>) -> Serialized;

    /// Option identifiers a response can select, in document order.
    fn option_ids(&self, _node: &EditableNode) -> Vec<String> {
        Vec::new()
    }

    /// The declaration to write for `node`, derived from its current state.
    /// `None` for nodes that are not interactions.
    fn live_declaration(&self, _node: &EditableNode) -> Option<GenericNode> {
        None
    }

    fn correctness_check(&self, response: &ResponseInfo) -> Option<GenericNode> {
        rules::default_correctness_check(response)
    }

    fn feedback_rules(
        &self,
        response: &ResponseInfo,
        referenced: &BTreeSet<String>,
    ) -> Vec<GenericNode> {
        rules::standard_feedback_rules(response, referenced)
    }

    fn feedback_identifiers(&self, response: &ResponseInfo) -> Vec<FeedbackIdentifier> {
        standard_identifiers(response)
    }
}

/// Codecs by node type.
pub struct CodecRegistry {
    codecs: HashMap<String, Box<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry {
            codecs: HashMap::new(),
        }
    }

    /// Register a codec, replacing any with the same type name.
    pub fn register<C: Codec + 'static>(&mut self, codec: C) {
        self.codecs
            .insert(codec.type_name().to_string(), Box::new(codec));
    }

    pub fn get(&self, node_type: &str) -> Option<&dyn Codec> {
        self.codecs.get(node_type).map(|c| c.as_ref())
    }

    /// Codec for a tag found in markup, skipping editor-only types.
    pub fn for_markup(&self, tag: &str) -> Option<&dyn Codec> {
        self.get(tag).filter(|codec| codec.parses_markup())
    }

    /// Display of a node type; unknown types count as inline.
    pub fn display_of(&self, node_type: &str) -> Display {
        self.get(node_type)
            .map_or(Display::Inline, |codec| codec.display())
    }

    /// Registered type names, sorted.
    pub fn list_types(&self) -> Vec<String> {
        let mut names: Vec<_> = self.codecs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        content::register_defaults(&mut registry);
        interactions::register_defaults(&mut registry);
        feedback::register_defaults(&mut registry);
        registry.register(EditorGroupCodec);
        registry.register(EditorHelperCodec);
        registry.register(OpaqueCodec);
        registry
    }

    /// The default registry, built once.
    pub fn shared() -> &'static CodecRegistry {
        static SHARED: OnceLock<CodecRegistry> = OnceLock::new();
        SHARED.get_or_init(CodecRegistry::with_defaults)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
