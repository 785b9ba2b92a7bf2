//! A small interpreter for response processing, enough to score an item
//! against candidate responses. It covers the vocabulary the generator
//! emits plus the common comparison and logic operators; anything else is
//! reported as unsupported rather than guessed at.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::rules;
use crate::declaration::{self, BaseType, Cardinality, format_number};
use crate::model::{GenericNode, xml};
use crate::parsing::parsing_options;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Malformed item markup: {message}")]
    Malformed { message: String },

    #[error("Unknown variable '{identifier}'")]
    UnknownVariable { identifier: String },

    #[error("Response '{identifier}' has no mapping")]
    MissingMapping { identifier: String },

    #[error("Unsupported processing element <{element}>")]
    Unsupported { element: String },

    #[error("<{element}> expected {expected}")]
    TypeMismatch {
        element: String,
        expected: &'static str,
    },
}

/// A runtime value. Empty containers are treated as NULL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    Container { items: Vec<Value>, ordered: bool },
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Container { items, .. } => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Scalar values as the strings a mapping is keyed on.
    fn keys(&self) -> Vec<String> {
        match self {
            Value::Null => Vec::new(),
            Value::Container { items, .. } => items.iter().flat_map(Value::keys).collect(),
            other => vec![other.to_string()],
        }
    }

    fn items(&self) -> Vec<Value> {
        match self {
            Value::Null => Vec::new(),
            Value::Container { items, .. } => items.clone(),
            scalar => vec![scalar.clone()],
        }
    }

    fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (
                Value::Container {
                    items: a,
                    ordered: true,
                },
                Value::Container {
                    items: b,
                    ordered: true,
                },
            ) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y)),
            (Value::Container { items: a, .. }, Value::Container { items: b, .. }) => {
                let mut remaining = b.clone();
                a.len() == b.len()
                    && a.iter().all(|x| match remaining.iter().position(|y| x.same_as(y)) {
                        Some(index) => {
                            remaining.swap_remove(index);
                            true
                        }
                        None => false,
                    })
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(t) => f.write_str(t),
            Value::Container { items, ordered } => {
                let inner: Vec<String> = items.iter().map(ToString::to_string).collect();
                if *ordered {
                    write!(f, "[{}]", inner.join(", "))
                } else {
                    write!(f, "{{{}}}", inner.join(", "))
                }
            }
        }
    }
}

/// Outcome values after processing, in declaration order.
pub type Outcomes = IndexMap<String, Value>;

/// Raw candidate responses by response identifier. A response with no
/// values is NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateResponses {
    values: IndexMap<String, Vec<String>>,
}

impl CandidateResponses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, identifier: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(identifier, values);
        self
    }

    pub fn set<I, S>(&mut self, identifier: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(identifier.into(), values.into_iter().map(Into::into).collect());
    }

    pub fn get(&self, identifier: &str) -> Option<&[String]> {
        self.values.get(identifier).map(Vec::as_slice)
    }
}

/// Declarations and processing of one item, ready to be evaluated.
#[derive(Debug, Clone, Default)]
pub struct ItemScoring {
    responses: IndexMap<String, GenericNode>,
    outcomes: IndexMap<String, GenericNode>,
    processing: Option<GenericNode>,
}

impl ItemScoring {
    pub fn new(
        response_declarations: impl IntoIterator<Item = GenericNode>,
        outcome_declarations: impl IntoIterator<Item = GenericNode>,
        processing: Option<GenericNode>,
    ) -> Self {
        Self {
            responses: by_identifier(response_declarations),
            outcomes: by_identifier(outcome_declarations),
            processing,
        }
    }

    /// Read declarations and processing from a full item document.
    pub fn from_markup(markup: &str) -> Result<Self, EvaluationError> {
        let doc = roxmltree::Document::parse_with_options(markup, parsing_options()).map_err(|e| {
            EvaluationError::Malformed {
                message: e.to_string(),
            }
        })?;
        let root = doc.root_element();

        let named = |name: &'static str| {
            root.children()
                .filter(move |n| n.is_element() && xml::local_name(n) == name)
                .map(GenericNode::from_xml)
        };

        Ok(Self::new(
            named(declaration::DECLARATION_TAG),
            named(rules::OUTCOME_DECLARATION),
            named(rules::RESPONSE_PROCESSING).next(),
        ))
    }

    pub fn processing(&self) -> Option<&GenericNode> {
        self.processing.as_ref()
    }

    /// Run processing for `candidate` and return every outcome.
    pub fn evaluate(&self, candidate: &CandidateResponses) -> Result<Outcomes, EvaluationError> {
        let mut state = State {
            item: self,
            responses: self
                .responses
                .iter()
                .map(|(id, decl)| {
                    let raw = candidate.get(id).unwrap_or_default();
                    (id.clone(), typed_values(decl, raw))
                })
                .collect(),
            outcomes: self
                .outcomes
                .iter()
                .map(|(id, decl)| (id.clone(), initial_outcome(decl)))
                .collect(),
        };

        if let Some(processing) = &self.processing {
            if processing.attribute("template").is_some() && processing.elements().next().is_none()
            {
                return Err(EvaluationError::Unsupported {
                    element: "responseProcessing template".to_string(),
                });
            }
            state.run(processing.elements())?;
        }
        Ok(state.outcomes)
    }
}

fn by_identifier(
    declarations: impl IntoIterator<Item = GenericNode>,
) -> IndexMap<String, GenericNode> {
    declarations
        .into_iter()
        .filter_map(|decl| Some((decl.attribute("identifier")?.to_string(), decl)))
        .collect()
}

fn local(tag: &str) -> &str {
    tag.rsplit(':').next().unwrap_or(tag)
}

fn scalar(base_type: Option<BaseType>, raw: &str) -> Value {
    let raw = raw.trim();
    match base_type {
        Some(bt) if bt.is_numeric() => raw
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        Some(BaseType::Pair) => {
            let mut parts: Vec<&str> = raw.split_whitespace().collect();
            parts.sort_unstable();
            Value::Text(parts.join(" "))
        }
        _ => match raw {
            "true" if base_type.is_none() => Value::Boolean(true),
            "false" if base_type.is_none() => Value::Boolean(false),
            _ => Value::Text(raw.to_string()),
        },
    }
}

fn typed_values<S: AsRef<str>>(decl: &GenericNode, raw: &[S]) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    let base_type = declaration::base_type(decl);
    let items: Vec<Value> = raw.iter().map(|v| scalar(base_type, v.as_ref())).collect();
    match declaration::cardinality(decl) {
        Cardinality::Single => items.into_iter().next().unwrap_or(Value::Null),
        Cardinality::Multiple => Value::Container {
            items,
            ordered: false,
        },
        Cardinality::Ordered => Value::Container {
            items,
            ordered: true,
        },
    }
}

fn initial_outcome(decl: &GenericNode) -> Value {
    let defaults: Vec<String> = decl
        .first_element("defaultValue")
        .map(|d| d.elements_named(declaration::VALUE_TAG).map(GenericNode::text).collect())
        .unwrap_or_default();
    if !defaults.is_empty() {
        return typed_values(decl, &defaults);
    }
    let numeric = declaration::base_type(decl).is_some_and(BaseType::is_numeric);
    if numeric && declaration::cardinality(decl) == Cardinality::Single {
        Value::Number(0.0)
    } else {
        Value::Null
    }
}

enum Flow {
    Continue,
    Exit,
}

struct State<'a> {
    item: &'a ItemScoring,
    responses: IndexMap<String, Value>,
    outcomes: Outcomes,
}

impl State<'_> {
    fn run<'n>(
        &mut self,
        nodes: impl Iterator<Item = &'n GenericNode>,
    ) -> Result<Flow, EvaluationError> {
        for rule in nodes {
            if let Flow::Exit = self.rule(rule)? {
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    fn rule(&mut self, rule: &GenericNode) -> Result<Flow, EvaluationError> {
        match local(&rule.tag) {
            "responseCondition" => self.condition(rule),
            "setOutcomeValue" => {
                let identifier = identifier_of(rule)?;
                if !self.outcomes.contains_key(identifier) {
                    return Err(EvaluationError::UnknownVariable {
                        identifier: identifier.to_string(),
                    });
                }
                let value = self.expression(first_operand(rule)?)?;
                self.outcomes.insert(identifier.to_string(), value);
                Ok(Flow::Continue)
            }
            "exitResponse" => Ok(Flow::Exit),
            other => Err(unsupported(other)),
        }
    }

    fn condition(&mut self, condition: &GenericNode) -> Result<Flow, EvaluationError> {
        for branch in condition.elements() {
            match local(&branch.tag) {
                "responseIf" | "responseElseIf" => {
                    let mut children = branch.elements();
                    let test = children.next().ok_or_else(|| mismatch(branch, "a condition"))?;
                    match self.expression(test)? {
                        Value::Boolean(true) => return self.run(children),
                        Value::Boolean(false) | Value::Null => {}
                        _ => return Err(mismatch(test, "a boolean")),
                    }
                }
                "responseElse" => return self.run(branch.elements()),
                other => return Err(unsupported(other)),
            }
        }
        Ok(Flow::Continue)
    }

    fn operands(&self, node: &GenericNode) -> Result<Vec<Value>, EvaluationError> {
        node.elements().map(|e| self.expression(e)).collect()
    }

    fn two(&self, node: &GenericNode) -> Result<(Value, Value), EvaluationError> {
        let mut values = self.operands(node)?.into_iter();
        match (values.next(), values.next(), values.next()) {
            (Some(a), Some(b), None) => Ok((a, b)),
            _ => Err(mismatch(node, "two operands")),
        }
    }

    fn numbers(&self, node: &GenericNode) -> Result<Option<(f64, f64)>, EvaluationError> {
        let (a, b) = self.two(node)?;
        if a.is_null() || b.is_null() {
            return Ok(None);
        }
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => Ok(Some((a, b))),
            _ => Err(mismatch(node, "numeric operands")),
        }
    }

    fn compare(
        &self,
        node: &GenericNode,
        op: fn(f64, f64) -> bool,
    ) -> Result<Value, EvaluationError> {
        Ok(self
            .numbers(node)?
            .map_or(Value::Null, |(a, b)| Value::Boolean(op(a, b))))
    }

    fn expression(&self, node: &GenericNode) -> Result<Value, EvaluationError> {
        match local(&node.tag) {
            "variable" => {
                let identifier = identifier_of(node)?;
                self.responses
                    .get(identifier)
                    .or_else(|| self.outcomes.get(identifier))
                    .cloned()
                    .ok_or_else(|| EvaluationError::UnknownVariable {
                        identifier: identifier.to_string(),
                    })
            }
            "correct" => {
                let decl = self.response_declaration(identifier_of(node)?)?;
                Ok(typed_values(decl, &declaration::correct_values(decl)))
            }
            "mapResponse" => {
                let identifier = identifier_of(node)?;
                let decl = self.response_declaration(identifier)?;
                let mapping = declaration::mapping(decl).ok_or_else(|| {
                    EvaluationError::MissingMapping {
                        identifier: identifier.to_string(),
                    }
                })?;
                let response = self.responses.get(identifier).cloned().unwrap_or(Value::Null);
                let score = if response.is_null() {
                    mapping.clamp(mapping.metadata.default_value)
                } else {
                    mapping.score(&response.keys())
                };
                Ok(Value::Number(score))
            }
            "baseValue" => {
                let base_type = node.attribute("baseType").and_then(|b| b.parse().ok());
                Ok(scalar(base_type, &node.text()))
            }
            "match" => {
                let (a, b) = self.two(node)?;
                if a.is_null() || b.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Boolean(a.same_as(&b)))
            }
            "equal" => self.compare(node, |a, b| a == b),
            "gt" => self.compare(node, |a, b| a > b),
            "gte" => self.compare(node, |a, b| a >= b),
            "lt" => self.compare(node, |a, b| a < b),
            "lte" => self.compare(node, |a, b| a <= b),
            "and" | "or" => {
                let all = local(&node.tag) == "and";
                let mut saw_null = false;
                for value in self.operands(node)? {
                    match value {
                        Value::Boolean(b) if b != all => return Ok(Value::Boolean(b)),
                        Value::Boolean(_) => {}
                        v if v.is_null() => saw_null = true,
                        _ => return Err(mismatch(node, "boolean operands")),
                    }
                }
                Ok(if saw_null {
                    Value::Null
                } else {
                    Value::Boolean(all)
                })
            }
            "not" => match self.operands(node)?.as_slice() {
                [Value::Boolean(b)] => Ok(Value::Boolean(!b)),
                [v] if v.is_null() => Ok(Value::Null),
                _ => Err(mismatch(node, "one boolean operand")),
            },
            "member" => {
                let (value, container) = self.two(node)?;
                if value.is_null() || container.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Boolean(
                    container.items().iter().any(|item| item.same_as(&value)),
                ))
            }
            "isNull" => match self.operands(node)?.as_slice() {
                [v] => Ok(Value::Boolean(v.is_null())),
                _ => Err(mismatch(node, "one operand")),
            },
            "sum" => {
                let mut total = 0.0;
                for value in self.operands(node)? {
                    if value.is_null() {
                        return Ok(Value::Null);
                    }
                    total += value.as_number().ok_or_else(|| mismatch(node, "numeric operands"))?;
                }
                Ok(Value::Number(total))
            }
            "multiple" | "ordered" => {
                let ordered = local(&node.tag) == "ordered";
                let items: Vec<Value> = self
                    .operands(node)?
                    .iter()
                    .flat_map(Value::items)
                    .collect();
                Ok(if items.is_empty() {
                    Value::Null
                } else {
                    Value::Container { items, ordered }
                })
            }
            other => Err(unsupported(other)),
        }
    }

    fn response_declaration(&self, identifier: &str) -> Result<&GenericNode, EvaluationError> {
        self.item
            .responses
            .get(identifier)
            .ok_or_else(|| EvaluationError::UnknownVariable {
                identifier: identifier.to_string(),
            })
    }
}

fn identifier_of(node: &GenericNode) -> Result<&str, EvaluationError> {
    node.attribute("identifier")
        .ok_or_else(|| mismatch(node, "an identifier attribute"))
}

fn first_operand(node: &GenericNode) -> Result<&GenericNode, EvaluationError> {
    node.elements()
        .next()
        .ok_or_else(|| mismatch(node, "an expression"))
}

fn unsupported(tag: &str) -> EvaluationError {
    EvaluationError::Unsupported {
        element: tag.to_string(),
    }
}

fn mismatch(node: &GenericNode, expected: &'static str) -> EvaluationError {
    EvaluationError::TypeMismatch {
        element: local(&node.tag).to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const ITEM: &str = r#"<assessmentItem xmlns="http://www.imsglobal.org/xsd/imsqti_v2p2" identifier="i1">
  <responseDeclaration identifier="R1" cardinality="multiple" baseType="identifier">
    <correctResponse><value>A</value><value>C</value></correctResponse>
    <mapping defaultValue="0" upperBound="2"><mapEntry mapKey="A" mappedValue="1"/><mapEntry mapKey="B" mappedValue="-1"/><mapEntry mapKey="C" mappedValue="1.5"/></mapping>
  </responseDeclaration>
  <outcomeDeclaration identifier="SCORE" cardinality="single" baseType="float"/>
  <outcomeDeclaration identifier="FEEDBACK" cardinality="multiple" baseType="identifier"/>
  <itemBody/>
  <responseProcessing>
    <setOutcomeValue identifier="SCORE"><mapResponse identifier="R1"/></setOutcomeValue>
    <responseCondition>
      <responseIf><match><variable identifier="R1"/><correct identifier="R1"/></match>
        <setOutcomeValue identifier="FEEDBACK"><multiple><variable identifier="FEEDBACK"/><baseValue baseType="identifier">R1_correct</baseValue></multiple></setOutcomeValue>
      </responseIf>
    </responseCondition>
  </responseProcessing>
</assessmentItem>"#;

    #[rstest]
    #[case(&[], 0.0)]
    #[case(&["A"], 1.0)]
    #[case(&["A", "A"], 1.0)]
    #[case(&["A", "B"], 0.0)]
    #[case(&["C", "A"], 2.0)]
    fn map_response_scores(#[case] values: &[&str], #[case] expected: f64) {
        let item = ItemScoring::from_markup(ITEM).unwrap();
        let outcomes = item
            .evaluate(&CandidateResponses::new().with("R1", values.iter().copied()))
            .unwrap();
        assert_eq!(outcomes["SCORE"], Value::Number(expected));
    }

    #[test]
    fn unordered_match_ignores_order() {
        let item = ItemScoring::from_markup(ITEM).unwrap();
        let outcomes = item
            .evaluate(&CandidateResponses::new().with("R1", ["C", "A"]))
            .unwrap();
        assert_eq!(
            outcomes["FEEDBACK"],
            Value::Container {
                items: vec![Value::Text("R1_correct".into())],
                ordered: false
            }
        );
    }

    #[test]
    fn outcomes_start_from_defaults() {
        let item = ItemScoring::new(
            [],
            [rules::score_declaration(), rules::feedback_declaration()],
            None,
        );
        let outcomes = item.evaluate(&CandidateResponses::new()).unwrap();
        assert_eq!(outcomes["SCORE"], Value::Number(0.0));
        assert_eq!(outcomes["FEEDBACK"], Value::Null);
    }

    #[test]
    fn exit_response_stops_processing() {
        let processing = GenericNode::new("responseProcessing")
            .with_child(GenericNode::new("exitResponse"))
            .with_child(rules::set_outcome("SCORE", rules::float(5.0)));
        let item = ItemScoring::new([], [rules::score_declaration()], Some(processing));
        let outcomes = item.evaluate(&CandidateResponses::new()).unwrap();
        assert_eq!(outcomes["SCORE"], Value::Number(0.0));
    }

    #[test]
    fn unknown_elements_are_reported() {
        let processing = GenericNode::new("responseProcessing").with_child(
            rules::set_outcome("SCORE", GenericNode::new("randomInteger")),
        );
        let item = ItemScoring::new([], [rules::score_declaration()], Some(processing));
        assert_eq!(
            item.evaluate(&CandidateResponses::new()),
            Err(EvaluationError::Unsupported {
                element: "randomInteger".into()
            })
        );
    }

    #[test]
    fn template_processing_is_unsupported() {
        let processing = GenericNode::new("responseProcessing")
            .with_attribute("template", "http://www.imsglobal.org/question/qti_v2p2/rptemplates/match_correct");
        let item = ItemScoring::new([], [], Some(processing));
        assert!(matches!(
            item.evaluate(&CandidateResponses::new()),
            Err(EvaluationError::Unsupported { .. })
        ));
    }

    #[test]
    fn undeclared_outcome_is_an_error() {
        let processing = GenericNode::new("responseProcessing")
            .with_child(rules::set_outcome("TOTAL", rules::float(1.0)));
        let item = ItemScoring::new([], [], Some(processing));
        assert_eq!(
            item.evaluate(&CandidateResponses::new()),
            Err(EvaluationError::UnknownVariable {
                identifier: "TOTAL".into()
            })
        );
    }

    #[test]
    fn malformed_markup_is_reported() {
        assert!(matches!(
            ItemScoring::from_markup("<assessmentItem>"),
            Err(EvaluationError::Malformed { .. })
        ));
    }

    #[test]
    fn values_display_compactly() {
        let value = Value::Container {
            items: vec![Value::Text("A".into()), Value::Number(2.0)],
            ordered: true,
        };
        assert_eq!(value.to_string(), "[A, 2]");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
