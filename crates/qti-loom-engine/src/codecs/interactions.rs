use std::collections::BTreeSet;

use super::{Codec, CodecRegistry, Display, Serialized};
use crate::declaration::{BaseType, Cardinality, new_declaration};
use crate::feedback::{FeedbackIdentifier, choice_identifiers, standard_identifiers};
use crate::model::{
    ChoiceOption, EditableNode, GenericNode, InteractionState, NodeExtra, xml,
};
use crate::parsing::BodyParser;
use crate::processing::{ResponseInfo, rules};
use crate::serializing::BodySerializer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    TextEntry,
    ExtendedText,
    Choice,
    InlineChoice,
    Order,
    Match,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 6] = [
        InteractionKind::TextEntry,
        InteractionKind::ExtendedText,
        InteractionKind::Choice,
        InteractionKind::InlineChoice,
        InteractionKind::Order,
        InteractionKind::Match,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            InteractionKind::TextEntry => "textEntryInteraction",
            InteractionKind::ExtendedText => "extendedTextInteraction",
            InteractionKind::Choice => "choiceInteraction",
            InteractionKind::InlineChoice => "inlineChoiceInteraction",
            InteractionKind::Order => "orderInteraction",
            InteractionKind::Match => "matchInteraction",
        }
    }

    fn display(self) -> Display {
        match self {
            InteractionKind::TextEntry | InteractionKind::InlineChoice => Display::Inline,
            _ => Display::Block,
        }
    }

    /// Rendered as a single void node with no editable content.
    fn is_void(self) -> bool {
        matches!(
            self,
            InteractionKind::TextEntry
                | InteractionKind::ExtendedText
                | InteractionKind::InlineChoice
        )
    }

    /// Whether responses select among named options that feedback can
    /// target individually.
    pub fn is_choice_like(self) -> bool {
        matches!(self, InteractionKind::Choice | InteractionKind::InlineChoice)
    }

    /// Cardinality and base type written when a declaration lacks them.
    fn default_shape(self, node: &EditableNode) -> (Cardinality, BaseType) {
        match self {
            InteractionKind::TextEntry | InteractionKind::ExtendedText => {
                (Cardinality::Single, BaseType::String)
            }
            InteractionKind::Choice => {
                if node.attribute("maxChoices").map(str::trim) == Some("1") {
                    (Cardinality::Single, BaseType::Identifier)
                } else {
                    (Cardinality::Multiple, BaseType::Identifier)
                }
            }
            InteractionKind::InlineChoice => (Cardinality::Single, BaseType::Identifier),
            InteractionKind::Order => (Cardinality::Ordered, BaseType::Identifier),
            InteractionKind::Match => (Cardinality::Multiple, BaseType::DirectedPair),
        }
    }
}

const INLINE_CHOICE: &str = "inlineChoice";
const SIMPLE_CHOICE: &str = "simpleChoice";

#[derive(Debug, Clone, Copy)]
pub struct InteractionCodec {
    kind: InteractionKind,
}

impl InteractionCodec {
    pub fn new(kind: InteractionKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }
}

impl Codec for InteractionCodec {
    fn type_name(&self) -> &str {
        self.kind.tag()
    }

    fn display(&self) -> Display {
        self.kind.display()
    }

    fn parse(&self, node: roxmltree::Node<'_, '_>, parser: &mut BodyParser<'_>) -> EditableNode {
        let attributes = xml::attributes(&node);
        let declaration = attributes
            .get("responseIdentifier")
            .and_then(|id| parser.declaration(id))
            .cloned();
        if declaration.is_none() {
            log::debug!(
                "{} {:?} has no matching declaration",
                self.kind.tag(),
                attributes.get("responseIdentifier")
            );
        }

        let options = if self.kind == InteractionKind::InlineChoice {
            xml::child_elements(node, INLINE_CHOICE)
                .map(|choice| {
                    let mut attributes = xml::attributes(&choice);
                    let identifier = attributes.shift_remove("identifier").unwrap_or_default();
                    ChoiceOption {
                        identifier,
                        attributes,
                        text: choice.text().unwrap_or_default().trim().to_string(),
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        let parsed = EditableNode::new(self.kind.tag())
            .with_attributes(attributes)
            .with_extra(NodeExtra::Interaction(InteractionState {
                declaration,
                options,
            }));

        if self.kind.is_void() {
            parsed.into_void()
        } else {
            parsed.with_children(parser.parse_children(node))
        }
    }

    fn serialize(&self, node: &EditableNode, serializer: &mut BodySerializer<'_>) -> Serialized {
        serializer.record_interaction(node, self);

        let element = match self.kind {
            InteractionKind::InlineChoice => {
                let options = node
                    .interaction()
                    .map(|state| state.options.as_slice())
                    .unwrap_or_default();
                GenericNode::new(self.kind.tag())
                    .with_attributes(node.attributes.clone())
                    .with_children(options.iter().map(|option| {
                        GenericNode::new(INLINE_CHOICE)
                            .with_attribute("identifier", option.identifier.as_str())
                            .with_attributes(option.attributes.clone())
                            .with_text(option.text.as_str())
                    }))
            }
            _ => serializer.element(self.kind.tag(), node),
        };
        Serialized::Element(element)
    }

    fn option_ids(&self, node: &EditableNode) -> Vec<String> {
        match self.kind {
            InteractionKind::InlineChoice => node
                .interaction()
                .map(|state| {
                    state
                        .options
                        .iter()
                        .map(|option| option.identifier.clone())
                        .collect()
                })
                .unwrap_or_default(),
            InteractionKind::Choice => node
                .child_nodes()
                .filter(|child| child.node_type == SIMPLE_CHOICE)
                .filter_map(|child| child.attribute("identifier").map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The attached declaration, or a fresh one for this kind, with the
    /// identifier forced to the live `responseIdentifier` and missing shape
    /// attributes filled in.
    fn live_declaration(&self, node: &EditableNode) -> Option<GenericNode> {
        let identifier = node.response_identifier()?;
        let (cardinality, base_type) = self.kind.default_shape(node);

        let mut live = match node.declaration() {
            Some(attached) => attached
                .clone()
                .with_attribute("identifier", identifier),
            None => new_declaration(identifier, cardinality, base_type),
        };
        if live.attribute("cardinality").is_none() {
            live = live.with_attribute("cardinality", cardinality.as_str());
        }
        if live.attribute("baseType").is_none() {
            live = live.with_attribute("baseType", base_type.as_str());
        }
        Some(live)
    }

    fn feedback_rules(
        &self,
        response: &ResponseInfo,
        referenced: &BTreeSet<String>,
    ) -> Vec<GenericNode> {
        let mut generated = rules::standard_feedback_rules(response, referenced);
        if self.kind.is_choice_like() {
            generated.extend(rules::choice_feedback_rules(response, referenced));
        }
        generated
    }

    fn feedback_identifiers(&self, response: &ResponseInfo) -> Vec<FeedbackIdentifier> {
        let mut identifiers = standard_identifiers(response);
        if self.kind.is_choice_like() {
            identifiers.extend(choice_identifiers(response));
        }
        identifiers
    }
}

pub(super) fn register_defaults(registry: &mut CodecRegistry) {
    for kind in InteractionKind::ALL {
        registry.register(InteractionCodec::new(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{correct_value, has_correct_response};
    use crate::model::{EditableChild, EditableDocument, NodePath};
    use crate::parsing::parse;
    use pretty_assertions::assert_eq;

    const ITEM: &str = r#"<assessmentItem identifier="capitals">
  <responseDeclaration identifier="R1" cardinality="single" baseType="string">
    <correctResponse><value>paris</value></correctResponse>
  </responseDeclaration>
  <responseDeclaration identifier="R2" cardinality="single" baseType="identifier"/>
  <itemBody>
    <p>Capital of France: <textEntryInteraction responseIdentifier="R1" expectedLength="10"/></p>
    <p>Largest: <inlineChoiceInteraction responseIdentifier="R2" shuffle="false"><inlineChoice identifier="A">Lyon</inlineChoice><inlineChoice identifier="B" fixed="true">Paris</inlineChoice></inlineChoiceInteraction></p>
    <choiceInteraction responseIdentifier="R3" maxChoices="0">
      <prompt>Pick rivers</prompt>
      <simpleChoice identifier="S">Seine</simpleChoice>
      <simpleChoice identifier="L">Loire</simpleChoice>
    </choiceInteraction>
  </itemBody>
</assessmentItem>"#;

    fn document() -> EditableDocument {
        parse(ITEM).document
    }

    fn node(doc: &EditableDocument, id: &str) -> EditableNode {
        let path = doc.find_interaction(id).unwrap();
        doc.node_at(&path).unwrap().clone()
    }

    #[test]
    fn text_entry_binds_declaration() {
        let entry = node(&document(), "R1");
        assert!(entry.void);
        assert_eq!(entry.attribute("expectedLength"), Some("10"));
        assert_eq!(correct_value(entry.declaration().unwrap()), Some("paris".into()));
    }

    #[test]
    fn inline_choice_keeps_options_as_side_data() {
        let choice = node(&document(), "R2");
        let state = choice.interaction().unwrap();

        assert!(choice.void);
        assert_eq!(state.options.len(), 2);
        assert_eq!(state.options[1].identifier, "B");
        assert_eq!(state.options[1].text, "Paris");
        assert_eq!(
            state.options[1].attributes.get("fixed").map(String::as_str),
            Some("true")
        );
        assert_eq!(
            InteractionCodec::new(InteractionKind::InlineChoice).option_ids(&choice),
            vec!["A", "B"]
        );
    }

    #[test]
    fn choice_children_are_content() {
        let choice = node(&document(), "R3");
        let types: Vec<_> = choice.child_nodes().map(|n| n.node_type.as_str()).collect();
        assert_eq!(types, vec!["prompt", "simpleChoice", "simpleChoice"]);
        assert!(choice.declaration().is_none());
        assert_eq!(
            InteractionCodec::new(InteractionKind::Choice).option_ids(&choice),
            vec!["S", "L"]
        );
    }

    #[test]
    fn live_declaration_follows_renamed_identifier() {
        let entry = node(&document(), "R1").with_attribute("responseIdentifier", "R9");
        let live = InteractionCodec::new(InteractionKind::TextEntry)
            .live_declaration(&entry)
            .unwrap();
        assert_eq!(live.attribute("identifier"), Some("R9"));
        assert!(has_correct_response(&live));
    }

    #[test]
    fn live_declaration_synthesizes_default_shape() {
        let codec = InteractionCodec::new(InteractionKind::Choice);
        let multi = node(&document(), "R3");
        let live = codec.live_declaration(&multi).unwrap();
        assert_eq!(live.attribute("cardinality"), Some("multiple"));
        assert_eq!(live.attribute("baseType"), Some("identifier"));

        let single = multi.with_attribute("maxChoices", "1");
        assert_eq!(
            codec.live_declaration(&single).unwrap().attribute("cardinality"),
            Some("single")
        );
    }

    #[test]
    fn live_declaration_fills_missing_base_type_only() {
        let decl = GenericNode::new("responseDeclaration")
            .with_attribute("identifier", "M1")
            .with_attribute("cardinality", "single");
        let matcher = EditableNode::new("matchInteraction")
            .with_attribute("responseIdentifier", "M1")
            .with_extra(NodeExtra::Interaction(InteractionState::default()))
            .with_declaration(decl);

        let live = InteractionCodec::new(InteractionKind::Match)
            .live_declaration(&matcher)
            .unwrap();
        assert_eq!(live.attribute("cardinality"), Some("single"));
        assert_eq!(live.attribute("baseType"), Some("directedPair"));
    }

    #[test]
    fn missing_identifier_still_parses() {
        let doc = parse("<itemBody><p>x <textEntryInteraction/></p></itemBody>").document;
        let p = &doc.content()[0];
        let entry = p.child_nodes().next().unwrap();
        assert_eq!(entry.node_type, "textEntryInteraction");
        assert!(entry.response_identifier().is_none());
        assert!(
            InteractionCodec::new(InteractionKind::TextEntry)
                .live_declaration(entry)
                .is_none()
        );
        assert_eq!(doc.find_interaction(""), None::<NodePath>);
        assert!(matches!(p.children[0], EditableChild::Text(_)));
    }
}
