//! # Response Declarations
//!
//! Pure functions over a `responseDeclaration` held as a [`GenericNode`].
//! Nothing here mutates its argument: every setter returns a new declaration.
//!
//! - correct response: read, write, add, remove (this module)
//! - mapping: read, write, and the maximum achievable mapped score
//!   ([`mapping`])

pub mod mapping;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{GenericChild, GenericNode};

pub use mapping::{
    MapEntry, Mapping, MappingMetadata, format_number, has_mapping, mapping, max_mapped_value,
    with_empty_mapping, with_mapping, with_mapping_entries, with_mapping_metadata,
    without_mapping,
};

pub const DECLARATION_TAG: &str = "responseDeclaration";
pub const CORRECT_RESPONSE_TAG: &str = "correctResponse";
pub const VALUE_TAG: &str = "value";

/// Elements that follow `correctResponse` inside a declaration.
const AFTER_CORRECT_RESPONSE: &[&str] = &["mapping", "areaMapping"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    Single,
    Multiple,
    Ordered,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cardinality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Cardinality::Single),
            "multiple" => Ok(Cardinality::Multiple),
            "ordered" => Ok(Cardinality::Ordered),
            other => Err(format!("unknown cardinality '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    String,
    Integer,
    Float,
    Identifier,
    DirectedPair,
    Pair,
}

impl BaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::String => "string",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::Identifier => "identifier",
            BaseType::DirectedPair => "directedPair",
            BaseType::Pair => "pair",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Float)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(BaseType::String),
            "integer" => Ok(BaseType::Integer),
            "float" => Ok(BaseType::Float),
            "identifier" => Ok(BaseType::Identifier),
            "directedPair" => Ok(BaseType::DirectedPair),
            "pair" => Ok(BaseType::Pair),
            other => Err(format!("unknown base type '{other}'")),
        }
    }
}

/// A bare declaration with no correct response and no mapping.
pub fn new_declaration(
    identifier: &str,
    cardinality: Cardinality,
    base_type: BaseType,
) -> GenericNode {
    GenericNode::new(DECLARATION_TAG)
        .with_attribute("identifier", identifier)
        .with_attribute("cardinality", cardinality.as_str())
        .with_attribute("baseType", base_type.as_str())
}

pub fn identifier(declaration: &GenericNode) -> Option<&str> {
    declaration.attribute("identifier")
}

/// Declared cardinality; `single` when absent or unrecognised.
pub fn cardinality(declaration: &GenericNode) -> Cardinality {
    declaration
        .attribute("cardinality")
        .and_then(|c| c.parse().ok())
        .unwrap_or(Cardinality::Single)
}

pub fn base_type(declaration: &GenericNode) -> Option<BaseType> {
    declaration.attribute("baseType").and_then(|b| b.parse().ok())
}

pub fn has_correct_response(declaration: &GenericNode) -> bool {
    declaration.first_element(CORRECT_RESPONSE_TAG).is_some()
}

/// First correct value.
pub fn correct_value(declaration: &GenericNode) -> Option<String> {
    correct_values(declaration).into_iter().next()
}

/// All correct values in document order.
pub fn correct_values(declaration: &GenericNode) -> Vec<String> {
    declaration
        .first_element(CORRECT_RESPONSE_TAG)
        .map(|correct| correct.elements_named(VALUE_TAG).map(GenericNode::text).collect())
        .unwrap_or_default()
}

/// Set a single correct value, replacing any existing ones. Cardinality is
/// left as declared.
pub fn with_correct_value(declaration: &GenericNode, value: &str) -> GenericNode {
    replace_correct_response(declaration, correct_response(&[value]))
}

/// Set several correct values and the matching cardinality.
pub fn with_correct_values<S: AsRef<str>>(
    declaration: &GenericNode,
    values: &[S],
    cardinality: Cardinality,
) -> GenericNode {
    let values: Vec<&str> = values.iter().map(AsRef::as_ref).collect();
    replace_correct_response(declaration, correct_response(&values))
        .with_attribute("cardinality", cardinality.as_str())
}

/// Add an empty correct response unless one is already present.
pub fn with_empty_correct_response(declaration: &GenericNode) -> GenericNode {
    if has_correct_response(declaration) {
        return declaration.clone();
    }
    declaration.with_element_before(
        GenericNode::new(CORRECT_RESPONSE_TAG),
        AFTER_CORRECT_RESPONSE,
    )
}

/// Remove the correct response, leaving everything else intact.
pub fn without_correct_response(declaration: &GenericNode) -> GenericNode {
    declaration.without_elements(CORRECT_RESPONSE_TAG)
}

fn correct_response(values: &[&str]) -> GenericNode {
    GenericNode::new(CORRECT_RESPONSE_TAG).with_children(
        values
            .iter()
            .map(|v| GenericChild::Node(GenericNode::new(VALUE_TAG).with_text(*v))),
    )
}

fn replace_correct_response(declaration: &GenericNode, correct: GenericNode) -> GenericNode {
    let position = declaration.children.iter().position(
        |c| matches!(c, GenericChild::Node(node) if node.tag == CORRECT_RESPONSE_TAG),
    );
    match position {
        Some(index) => {
            let mut copy = declaration.clone();
            copy.children[index] = GenericChild::Node(correct);
            copy
        }
        None => declaration.with_element_before(correct, AFTER_CORRECT_RESPONSE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn declaration() -> GenericNode {
        new_declaration("R1", Cardinality::Single, BaseType::String)
    }

    #[test]
    fn new_declaration_has_no_answer() {
        let decl = declaration();
        assert_eq!(identifier(&decl), Some("R1"));
        assert_eq!(cardinality(&decl), Cardinality::Single);
        assert_eq!(base_type(&decl), Some(BaseType::String));
        assert!(!has_correct_response(&decl));
        assert_eq!(correct_value(&decl), None);
    }

    #[test]
    fn single_setter_keeps_cardinality() {
        let decl = with_correct_value(&declaration(), "paris");
        assert_eq!(correct_value(&decl), Some("paris".to_string()));
        assert_eq!(cardinality(&decl), Cardinality::Single);
    }

    #[test]
    fn multi_setter_updates_cardinality() {
        let decl = with_correct_values(&declaration(), &["A", "C"], Cardinality::Multiple);
        assert_eq!(correct_values(&decl), vec!["A", "C"]);
        assert_eq!(cardinality(&decl), Cardinality::Multiple);
    }

    #[test]
    fn setters_do_not_touch_input() {
        let original = declaration();
        let _ = with_correct_value(&original, "paris");
        assert!(!has_correct_response(&original));
    }

    #[test]
    fn setting_twice_replaces_value() {
        let decl = with_correct_value(&with_correct_value(&declaration(), "paris"), "lyon");
        assert_eq!(correct_values(&decl), vec!["lyon"]);
    }

    #[test]
    fn correct_response_goes_before_mapping() {
        let mapped = with_empty_mapping(&declaration(), 0.0);
        let decl = with_correct_value(&mapped, "A");
        let tags: Vec<_> = decl.elements().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec!["correctResponse", "mapping"]);
    }

    #[test]
    fn add_empty_is_idempotent() {
        let once = with_empty_correct_response(&declaration());
        let twice = with_empty_correct_response(&once);
        assert_eq!(once, twice);
        assert!(has_correct_response(&once));
        assert!(correct_values(&once).is_empty());
    }

    #[test]
    fn remove_keeps_mapping() {
        let decl = with_empty_mapping(&with_correct_value(&declaration(), "A"), 0.0);
        let removed = without_correct_response(&decl);
        assert!(!has_correct_response(&removed));
        assert!(has_mapping(&removed));
        assert_eq!(identifier(&removed), Some("R1"));
    }

    #[test]
    fn cardinality_parses_and_prints() {
        for c in [Cardinality::Single, Cardinality::Multiple, Cardinality::Ordered] {
            assert_eq!(c.as_str().parse::<Cardinality>(), Ok(c));
        }
        assert!("bag".parse::<Cardinality>().is_err());
        assert_eq!(BaseType::DirectedPair.to_string(), "directedPair");
    }
}
