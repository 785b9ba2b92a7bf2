use serde::{Deserialize, Serialize};

use super::{Attributes, xml};

/// A plain element tree for markup that never needs live editing:
/// declarations and generated processing fragments.
///
/// Builder methods consume `self` and return the new node, so a node is
/// never changed behind a shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GenericChild>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GenericChild {
    Node(GenericNode),
    Text(String),
    /// Already-serialized markup, written out verbatim.
    Raw(String),
}

impl From<GenericNode> for GenericChild {
    fn from(node: GenericNode) -> Self {
        GenericChild::Node(node)
    }
}

impl GenericNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn without_attribute(mut self, name: &str) -> Self {
        self.attributes.shift_remove(name);
        self
    }

    pub fn with_child(mut self, child: impl Into<GenericChild>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<GenericChild>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(GenericChild::Text(text.into()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &GenericNode> {
        self.children.iter().filter_map(|child| match child {
            GenericChild::Node(node) => Some(node),
            _ => None,
        })
    }

    pub fn elements_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a GenericNode> {
        self.elements().filter(move |node| node.tag == tag)
    }

    pub fn first_element(&self, tag: &str) -> Option<&GenericNode> {
        self.elements().find(|node| node.tag == tag)
    }

    /// Concatenated text content of this node and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                GenericChild::Node(node) => node.collect_text(out),
                GenericChild::Text(text) => out.push_str(text),
                GenericChild::Raw(_) => {}
            }
        }
    }

    /// A copy with every direct child element named `tag` removed.
    pub fn without_elements(&self, tag: &str) -> GenericNode {
        let children = self
            .children
            .iter()
            .filter(|child| !matches!(child, GenericChild::Node(node) if node.tag == tag))
            .cloned()
            .collect();
        GenericNode {
            tag: self.tag.clone(),
            attributes: self.attributes.clone(),
            children,
        }
    }

    /// A copy with `child` inserted before the first direct child element
    /// whose tag is in `before`, or appended when none is present.
    pub fn with_element_before(&self, child: GenericNode, before: &[&str]) -> GenericNode {
        let mut copy = self.clone();
        let position = copy
            .children
            .iter()
            .position(|c| matches!(c, GenericChild::Node(node) if before.contains(&node.tag.as_str())))
            .unwrap_or(copy.children.len());
        copy.children.insert(position, GenericChild::Node(child));
        copy
    }

    /// Build from a parsed element. Comments and processing instructions are
    /// dropped, as is whitespace-only text in element-only content.
    pub fn from_xml(node: roxmltree::Node<'_, '_>) -> GenericNode {
        let element_only = node.children().any(|c| c.is_element());
        let mut children = Vec::new();

        for child in node.children() {
            if child.is_element() {
                children.push(GenericChild::Node(GenericNode::from_xml(child)));
            } else if child.is_text() {
                let text = child.text().unwrap_or_default();
                if element_only && text.trim().is_empty() {
                    continue;
                }
                children.push(GenericChild::Text(text.to_string()));
            }
        }

        GenericNode {
            tag: xml::qualified_name(&node),
            attributes: xml::attributes(&node),
            children,
        }
    }

    /// Compact markup with no added whitespace.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_compact(&mut out);
        out
    }

    /// Markup with element-only content broken onto indented lines.
    ///
    /// `prefix` is the indentation of the line the node starts on; `unit` is
    /// added per nesting level. The first line is not prefixed.
    pub fn to_pretty_xml(&self, unit: &str, prefix: &str) -> String {
        self.to_pretty_xml_with(unit, prefix, &|_| true)
    }

    /// Like [`to_pretty_xml`](Self::to_pretty_xml), but only elements accepted
    /// by `may_indent` get their children put on separate lines.
    pub fn to_pretty_xml_with(
        &self,
        unit: &str,
        prefix: &str,
        may_indent: &dyn Fn(&GenericNode) -> bool,
    ) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, unit, prefix, may_indent);
        out
    }

    fn write_pretty(
        &self,
        out: &mut String,
        unit: &str,
        prefix: &str,
        may_indent: &dyn Fn(&GenericNode) -> bool,
    ) {
        let element_only = !self.children.is_empty()
            && self
                .children
                .iter()
                .all(|c| matches!(c, GenericChild::Node(_)));

        if !element_only || !may_indent(self) {
            self.write_compact(out);
            return;
        }

        self.write_start_tag(out, false);
        let inner = format!("{prefix}{unit}");
        for child in self.elements() {
            out.push('\n');
            out.push_str(&inner);
            child.write_pretty(out, unit, &inner, may_indent);
        }
        out.push('\n');
        out.push_str(prefix);
        self.write_end_tag(out);
    }

    fn write_compact(&self, out: &mut String) {
        if self.children.is_empty() {
            self.write_start_tag(out, true);
            return;
        }
        self.write_start_tag(out, false);
        for child in &self.children {
            match child {
                GenericChild::Node(node) => node.write_compact(out),
                GenericChild::Text(text) => out.push_str(&html_escape::encode_text(text)),
                GenericChild::Raw(raw) => out.push_str(raw),
            }
        }
        self.write_end_tag(out);
    }

    fn write_start_tag(&self, out: &mut String, self_closing: bool) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }
        out.push_str(if self_closing { "/>" } else { ">" });
    }

    fn write_end_tag(&self, out: &mut String) {
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}
