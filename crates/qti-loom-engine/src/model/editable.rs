use serde::{Deserialize, Serialize};

use super::{Attributes, GenericNode};
use crate::error::TransformError;
use crate::processing::{ProcessingConfig, ProcessingMode};

/// Node type of the synthetic first node carrying document-level settings.
pub const METADATA_TYPE: &str = "metadata";
/// Node type for elements no codec understands.
pub const OPAQUE_TYPE: &str = "opaque";
/// Node type used when bare text has to be given a block container.
pub const PARAGRAPH_TYPE: &str = "p";

/// Inline formatting carried as a flag on a [`TextRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl Mark {
    /// Nesting order used when wrappers are rebuilt, outermost first.
    pub const ALL: [Mark; 5] = [
        Mark::Bold,
        Mark::Italic,
        Mark::Underline,
        Mark::Strikethrough,
        Mark::Code,
    ];

    /// Tag written for this mark.
    pub fn tag(self) -> &'static str {
        match self {
            Mark::Bold => "strong",
            Mark::Italic => "em",
            Mark::Underline => "u",
            Mark::Strikethrough => "del",
            Mark::Code => "code",
        }
    }

    /// Mark for a formatting wrapper tag, accepting the common synonyms.
    pub fn from_tag(tag: &str) -> Option<Mark> {
        match tag {
            "strong" | "b" => Some(Mark::Bold),
            "em" | "i" => Some(Mark::Italic),
            "u" => Some(Mark::Underline),
            "del" | "s" | "strike" => Some(Mark::Strikethrough),
            "code" | "tt" => Some(Mark::Code),
            _ => None,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A leaf of text with flat formatting flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strikethrough: bool,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Underline => self.underline,
            Mark::Strikethrough => self.strikethrough,
            Mark::Code => self.code,
        }
    }

    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.set_mark(mark);
        self
    }

    pub(crate) fn set_mark(&mut self, mark: Mark) {
        match mark {
            Mark::Bold => self.bold = true,
            Mark::Italic => self.italic = true,
            Mark::Underline => self.underline = true,
            Mark::Strikethrough => self.strikethrough = true,
            Mark::Code => self.code = true,
        }
    }

    pub fn same_marks(&self, other: &TextRun) -> bool {
        Mark::ALL.iter().all(|&m| self.has(m) == other.has(m))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditableChild {
    Node(EditableNode),
    Text(TextRun),
}

impl EditableChild {
    pub fn as_node(&self) -> Option<&EditableNode> {
        match self {
            EditableChild::Node(node) => Some(node),
            EditableChild::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextRun> {
        match self {
            EditableChild::Text(run) => Some(run),
            EditableChild::Node(_) => None,
        }
    }
}

/// Type-specific data riding along with an [`EditableNode`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeExtra {
    #[default]
    None,
    Metadata(DocumentMetadata),
    Interaction(InteractionState),
    Opaque(OpaqueState),
}

impl NodeExtra {
    pub fn is_none(&self) -> bool {
        matches!(self, NodeExtra::None)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub processing: ProcessingConfig,
    /// Attributes of the body container, written back unchanged.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub body_attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionState {
    /// Response declaration bound to this interaction, when one exists.
    pub declaration: Option<GenericNode>,
    /// Options held as side data by interactions that render as one void
    /// inline (inline choice).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    pub text: String,
}

/// Passthrough data for an element no codec handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpaqueState {
    /// Tag as written in the source, including any prefix.
    pub tag: String,
    /// Exact source markup of the element.
    pub raw: String,
    /// Structured copy as it was parsed; used to tell whether it was edited.
    pub pristine: Box<OpaqueSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpaqueSnapshot {
    pub attributes: Attributes,
    pub children: Vec<EditableChild>,
}

impl OpaqueState {
    /// Whether `node` still matches what was parsed.
    pub fn is_untouched(&self, node: &EditableNode) -> bool {
        self.pristine.attributes == node.attributes && self.pristine.children == node.children
    }
}

/// An element of the editable tree.
///
/// Every node has at least one child; an empty element holds a single empty
/// [`TextRun`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    pub children: Vec<EditableChild>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub void: bool,
    #[serde(default, skip_serializing_if = "NodeExtra::is_none")]
    pub extra: NodeExtra,
}

impl EditableNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attributes: Attributes::new(),
            children: vec![EditableChild::Text(TextRun::empty())],
            void: false,
            extra: NodeExtra::None,
        }
    }

    /// Replace the children, keeping the node non-empty.
    pub fn with_children(mut self, children: Vec<EditableChild>) -> Self {
        self.children = if children.is_empty() {
            vec![EditableChild::Text(TextRun::empty())]
        } else {
            children
        };
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_extra(mut self, extra: NodeExtra) -> Self {
        self.extra = extra;
        self
    }

    pub fn into_void(mut self) -> Self {
        self.void = true;
        self.children = vec![EditableChild::Text(TextRun::empty())];
        self
    }

    /// Attach a response declaration. Nodes that are not interactions are
    /// returned unchanged.
    pub fn with_declaration(mut self, declaration: GenericNode) -> Self {
        if let NodeExtra::Interaction(state) = &mut self.extra {
            state.declaration = Some(declaration);
        }
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The bound response identifier, if present and non-empty.
    pub fn response_identifier(&self) -> Option<&str> {
        self.attribute("responseIdentifier")
            .filter(|id| !id.trim().is_empty())
    }

    pub fn interaction(&self) -> Option<&InteractionState> {
        match &self.extra {
            NodeExtra::Interaction(state) => Some(state),
            _ => None,
        }
    }

    pub fn declaration(&self) -> Option<&GenericNode> {
        self.interaction().and_then(|state| state.declaration.as_ref())
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &EditableNode> {
        self.children.iter().filter_map(EditableChild::as_node)
    }

    /// Plain text of this node and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(children: &[EditableChild], out: &mut String) {
    for child in children {
        match child {
            EditableChild::Text(run) => out.push_str(&run.text),
            EditableChild::Node(node) => collect_text(&node.children, out),
        }
    }
}

/// Index path to a node: first the position in [`EditableDocument::nodes`],
/// then child positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath(pub Vec<usize>);

/// The editable document: a metadata node, body content, then floating
/// nodes such as modal feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableDocument {
    pub nodes: Vec<EditableNode>,
}

impl EditableDocument {
    pub fn new(metadata: DocumentMetadata, content: Vec<EditableNode>) -> Self {
        let mut nodes = Vec::with_capacity(content.len() + 1);
        nodes.push(EditableNode::new(METADATA_TYPE).with_extra(NodeExtra::Metadata(metadata)));
        nodes.extend(content);
        Self { nodes }
    }

    /// Metadata plus a single empty paragraph; what a failed parse yields.
    pub fn minimal() -> Self {
        Self::new(
            DocumentMetadata::default(),
            vec![EditableNode::new(PARAGRAPH_TYPE)],
        )
    }

    pub fn metadata(&self) -> Option<&DocumentMetadata> {
        match self.nodes.first().map(|node| &node.extra) {
            Some(NodeExtra::Metadata(metadata)) => Some(metadata),
            _ => None,
        }
    }

    pub fn processing(&self) -> ProcessingConfig {
        self.metadata()
            .map(|metadata| metadata.processing.clone())
            .unwrap_or_default()
    }

    /// Body and floating nodes, without the metadata node.
    pub fn content(&self) -> &[EditableNode] {
        match self.metadata() {
            Some(_) => &self.nodes[1..],
            None => &self.nodes,
        }
    }

    /// A copy with the processing mode switched. Switching into custom keeps
    /// the last custom payload seen.
    pub fn with_processing_mode(&self, mode: ProcessingMode) -> EditableDocument {
        let metadata = self.metadata().cloned().unwrap_or_default();
        let metadata = DocumentMetadata {
            processing: metadata.processing.with_mode(mode),
            ..metadata
        };
        EditableDocument::new(metadata, self.content().to_vec())
    }

    /// All nodes depth-first, with their paths.
    pub fn walk(&self) -> Vec<(NodePath, &EditableNode)> {
        fn visit<'a>(
            node: &'a EditableNode,
            path: &mut Vec<usize>,
            out: &mut Vec<(NodePath, &'a EditableNode)>,
        ) {
            out.push((NodePath(path.clone()), node));
            for (index, child) in node.children.iter().enumerate() {
                if let EditableChild::Node(child) = child {
                    path.push(index);
                    visit(child, path, out);
                    path.pop();
                }
            }
        }

        let mut out = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let mut path = vec![index];
            visit(node, &mut path, &mut out);
        }
        out
    }

    /// Path of the first interaction bound to `response_identifier`.
    pub fn find_interaction(&self, response_identifier: &str) -> Option<NodePath> {
        self.walk()
            .into_iter()
            .find(|(_, node)| {
                node.interaction().is_some()
                    && node.response_identifier() == Some(response_identifier)
            })
            .map(|(path, _)| path)
    }

    pub fn node_at(&self, path: &NodePath) -> Option<&EditableNode> {
        let (first, rest) = path.0.split_first()?;
        let mut node = self.nodes.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?.as_node()?;
        }
        Some(node)
    }

    /// A copy with the node at `path` replaced.
    pub fn replace_at(
        &self,
        path: &NodePath,
        replacement: EditableNode,
    ) -> Result<EditableDocument, TransformError> {
        let not_found = || TransformError::NodeNotFound {
            path: path.0.clone(),
        };
        let (first, rest) = path.0.split_first().ok_or_else(not_found)?;

        let mut copy = self.clone();
        let mut slot = copy.nodes.get_mut(*first).ok_or_else(not_found)?;
        for index in rest {
            slot = match slot.children.get_mut(*index) {
                Some(EditableChild::Node(node)) => node,
                _ => return Err(not_found()),
            };
        }
        *slot = replacement;
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EditableDocument {
        let entry = EditableNode::new("textEntryInteraction")
            .with_attribute("responseIdentifier", "R1")
            .with_extra(NodeExtra::Interaction(InteractionState::default()))
            .into_void();
        let paragraph = EditableNode::new(PARAGRAPH_TYPE).with_children(vec![
            EditableChild::Text(TextRun::new("Capital: ")),
            EditableChild::Node(entry),
        ]);
        EditableDocument::new(DocumentMetadata::default(), vec![paragraph])
    }

    #[test]
    fn new_node_is_never_empty() {
        let node = EditableNode::new("div").with_children(vec![]);
        assert_eq!(node.children, vec![EditableChild::Text(TextRun::empty())]);
    }

    #[test]
    fn minimal_document_has_metadata_and_paragraph() {
        let doc = EditableDocument::minimal();
        assert!(doc.metadata().is_some());
        assert_eq!(doc.content().len(), 1);
        assert_eq!(doc.content()[0].node_type, PARAGRAPH_TYPE);
    }

    #[test]
    fn find_and_replace_interaction() {
        let doc = sample();
        let path = doc.find_interaction("R1").unwrap();
        assert_eq!(path, NodePath(vec![1, 1]));

        let renamed = doc
            .node_at(&path)
            .unwrap()
            .clone()
            .with_attribute("responseIdentifier", "R9");
        let updated = doc.replace_at(&path, renamed).unwrap();

        assert!(updated.find_interaction("R9").is_some());
        assert!(doc.find_interaction("R1").is_some());
    }

    #[test]
    fn replace_at_rejects_text_paths() {
        let doc = sample();
        let result = doc.replace_at(&NodePath(vec![1, 0]), EditableNode::new("p"));
        assert!(matches!(
            result,
            Err(TransformError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn declaration_only_attaches_to_interactions() {
        let decl = GenericNode::new("responseDeclaration");
        let paragraph = EditableNode::new("p").with_declaration(decl.clone());
        assert!(paragraph.declaration().is_none());

        let entry = EditableNode::new("textEntryInteraction")
            .with_extra(NodeExtra::Interaction(InteractionState::default()))
            .with_declaration(decl.clone());
        assert_eq!(entry.declaration(), Some(&decl));
    }

    #[test]
    fn marks_compare_independently_of_text() {
        let a = TextRun::new("a").with_mark(Mark::Bold);
        let b = TextRun::new("b").with_mark(Mark::Bold);
        let c = TextRun::new("c").with_mark(Mark::Italic);
        assert!(a.same_marks(&b));
        assert!(!a.same_marks(&c));
        assert_eq!(Mark::from_tag("b"), Some(Mark::Bold));
        assert_eq!(Mark::from_tag("span"), None);
    }

    #[test]
    fn editable_child_accessors() {
        let run = EditableChild::Text(TextRun::new("x").with_mark(Mark::Code));
        let node = EditableChild::Node(EditableNode::new("br").into_void());
        assert!(run.as_text().unwrap().code);
        assert!(node.as_node().unwrap().void);
    }
}
