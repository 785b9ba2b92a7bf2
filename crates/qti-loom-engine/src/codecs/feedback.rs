use super::{Codec, CodecRegistry, Display, Placement, Serialized};
use crate::model::{EditableNode, xml};
use crate::parsing::BodyParser;
use crate::processing::FEEDBACK;
use crate::serializing::BodySerializer;

/// Feedback content shown when an outcome holds a given identifier.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackCodec {
    tag: &'static str,
    display: Display,
    placement: Placement,
}

impl FeedbackCodec {
    pub const INLINE: FeedbackCodec = FeedbackCodec {
        tag: "feedbackInline",
        display: Display::Inline,
        placement: Placement::Body,
    };
    pub const BLOCK: FeedbackCodec = FeedbackCodec {
        tag: "feedbackBlock",
        display: Display::Block,
        placement: Placement::Body,
    };
    pub const MODAL: FeedbackCodec = FeedbackCodec {
        tag: "modalFeedback",
        display: Display::Block,
        placement: Placement::Floating,
    };
}

/// Feedback identifier a node shows on, when it is driven by `FEEDBACK`.
pub fn referenced_identifier(node: &EditableNode) -> Option<&str> {
    if node.attribute("outcomeIdentifier") != Some(FEEDBACK) {
        return None;
    }
    node.attribute("identifier").filter(|id| !id.is_empty())
}

impl Codec for FeedbackCodec {
    fn type_name(&self) -> &str {
        self.tag
    }

    fn display(&self) -> Display {
        self.display
    }

    fn placement(&self) -> Placement {
        self.placement
    }

    fn parse(&self, node: roxmltree::Node<'_, '_>, parser: &mut BodyParser<'_>) -> EditableNode {
        EditableNode::new(self.tag)
            .with_attributes(xml::attributes(&node))
            .with_children(parser.parse_children(node))
    }

    fn serialize(&self, node: &EditableNode, serializer: &mut BodySerializer<'_>) -> Serialized {
        if let Some(identifier) = referenced_identifier(node) {
            serializer.record_feedback_reference(identifier);
        }
        Serialized::Element(serializer.element(self.tag, node))
    }
}

pub(super) fn register_defaults(registry: &mut CodecRegistry) {
    registry.register(FeedbackCodec::INLINE);
    registry.register(FeedbackCodec::BLOCK);
    registry.register(FeedbackCodec::MODAL);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse;
    use crate::serializing::serialize;

    #[test]
    fn modal_feedback_floats_after_body() {
        let doc = parse(
            r#"<assessmentItem>
  <itemBody><p>Q</p></itemBody>
  <modalFeedback outcomeIdentifier="FEEDBACK" identifier="R1_correct" showHide="show">Well done</modalFeedback>
</assessmentItem>"#,
        )
        .document;
        let types: Vec<_> = doc.content().iter().map(|n| n.node_type.as_str()).collect();
        assert_eq!(types, vec!["p", "modalFeedback"]);
        assert_eq!(referenced_identifier(&doc.content()[1]), Some("R1_correct"));
    }

    #[test]
    fn only_feedback_outcome_counts_as_reference() {
        let node = EditableNode::new("feedbackInline")
            .with_attribute("outcomeIdentifier", "OTHER")
            .with_attribute("identifier", "x");
        assert_eq!(referenced_identifier(&node), None);
    }

    #[test]
    fn serialize_collects_references() {
        let doc = parse(
            r#"<itemBody><p>Answer <feedbackInline outcomeIdentifier="FEEDBACK" identifier="R1_correct" showHide="show">yes</feedbackInline></p></itemBody>"#,
        )
        .document;
        let output = serialize(&doc, None);
        assert!(output.markup.contains(r#"<feedbackInline outcomeIdentifier="FEEDBACK" identifier="R1_correct" showHide="show">yes</feedbackInline>"#));
    }
}
