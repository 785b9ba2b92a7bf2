//! Builders for the response-processing vocabulary, and the default
//! correctness and feedback generators codecs fall back on.

use std::collections::BTreeSet;

use super::{FEEDBACK, ResponseInfo, SCORE, intermediate_outcome};
use crate::declaration::{
    self, BaseType, Cardinality, format_number, has_correct_response, max_mapped_value,
};
use crate::model::GenericNode;

pub const RESPONSE_PROCESSING: &str = "responseProcessing";
pub const RESPONSE_CONDITION: &str = "responseCondition";
pub const RESPONSE_IF: &str = "responseIf";
pub const RESPONSE_ELSE_IF: &str = "responseElseIf";
pub const RESPONSE_ELSE: &str = "responseElse";
pub const SET_OUTCOME_VALUE: &str = "setOutcomeValue";
pub const OUTCOME_DECLARATION: &str = "outcomeDeclaration";

pub fn variable(identifier: &str) -> GenericNode {
    GenericNode::new("variable").with_attribute("identifier", identifier)
}

pub fn correct(identifier: &str) -> GenericNode {
    GenericNode::new("correct").with_attribute("identifier", identifier)
}

pub fn map_response(identifier: &str) -> GenericNode {
    GenericNode::new("mapResponse").with_attribute("identifier", identifier)
}

pub fn base_value(base_type: BaseType, value: impl Into<String>) -> GenericNode {
    GenericNode::new("baseValue")
        .with_attribute("baseType", base_type.as_str())
        .with_text(value)
}

pub fn float(value: f64) -> GenericNode {
    base_value(BaseType::Float, format_number(value))
}

pub fn match_(left: GenericNode, right: GenericNode) -> GenericNode {
    GenericNode::new("match").with_child(left).with_child(right)
}

pub fn equal_exact(left: GenericNode, right: GenericNode) -> GenericNode {
    GenericNode::new("equal")
        .with_attribute("toleranceMode", "exact")
        .with_child(left)
        .with_child(right)
}

pub fn gt(left: GenericNode, right: GenericNode) -> GenericNode {
    GenericNode::new("gt").with_child(left).with_child(right)
}

pub fn member(value: GenericNode, container: GenericNode) -> GenericNode {
    GenericNode::new("member").with_child(value).with_child(container)
}

pub fn and(operands: Vec<GenericNode>) -> GenericNode {
    GenericNode::new("and").with_children(operands)
}

pub fn sum(operands: Vec<GenericNode>) -> GenericNode {
    GenericNode::new("sum").with_children(operands)
}

pub fn set_outcome(identifier: &str, expression: GenericNode) -> GenericNode {
    GenericNode::new(SET_OUTCOME_VALUE)
        .with_attribute("identifier", identifier)
        .with_child(expression)
}

/// Append `key` to the `FEEDBACK` outcome.
pub fn add_feedback(key: &str) -> GenericNode {
    set_outcome(
        FEEDBACK,
        GenericNode::new("multiple")
            .with_child(variable(FEEDBACK))
            .with_child(base_value(BaseType::Identifier, key)),
    )
}

/// One branch of a condition. `test` is `None` for the final else branch.
#[derive(Debug, Clone)]
pub struct Branch {
    pub test: Option<GenericNode>,
    pub actions: Vec<GenericNode>,
}

impl Branch {
    pub fn when(test: GenericNode, actions: Vec<GenericNode>) -> Self {
        Self {
            test: Some(test),
            actions,
        }
    }

    pub fn otherwise(actions: Vec<GenericNode>) -> Self {
        Self {
            test: None,
            actions,
        }
    }
}

/// A `responseCondition` from ordered branches. The first branch must have
/// a test; an untested branch becomes `responseElse` and ends the chain.
pub fn response_condition(branches: Vec<Branch>) -> GenericNode {
    let mut condition = GenericNode::new(RESPONSE_CONDITION);
    for (index, branch) in branches.into_iter().enumerate() {
        let element = match branch.test {
            Some(test) => {
                let tag = if index == 0 { RESPONSE_IF } else { RESPONSE_ELSE_IF };
                GenericNode::new(tag).with_child(test).with_children(branch.actions)
            }
            None => {
                condition = condition
                    .with_child(GenericNode::new(RESPONSE_ELSE).with_children(branch.actions));
                break;
            }
        };
        condition = condition.with_child(element);
    }
    condition
}

fn float_outcome(identifier: &str) -> GenericNode {
    GenericNode::new(OUTCOME_DECLARATION)
        .with_attribute("identifier", identifier)
        .with_attribute("cardinality", Cardinality::Single.as_str())
        .with_attribute("baseType", BaseType::Float.as_str())
        .with_child(
            GenericNode::new("defaultValue")
                .with_child(GenericNode::new(declaration::VALUE_TAG).with_text("0")),
        )
}

pub fn score_declaration() -> GenericNode {
    float_outcome(SCORE)
}

pub fn intermediate_declaration(response_identifier: &str) -> GenericNode {
    float_outcome(&intermediate_outcome(response_identifier))
}

pub fn feedback_declaration() -> GenericNode {
    GenericNode::new(OUTCOME_DECLARATION)
        .with_attribute("identifier", FEEDBACK)
        .with_attribute("cardinality", Cardinality::Multiple.as_str())
        .with_attribute("baseType", BaseType::Identifier.as_str())
}

/// Full-credit test for one response: mapped value equals the mapping's
/// maximum when there is one, otherwise a match against the correct
/// response. `None` when the response cannot be scored.
pub fn default_correctness_check(response: &ResponseInfo) -> Option<GenericNode> {
    let id = response.identifier.as_str();
    if let Some(max) = max_mapped_value(&response.declaration) {
        return Some(equal_exact(map_response(id), float(max)));
    }
    has_correct_response(&response.declaration).then(|| match_(variable(id), correct(id)))
}

/// Correct / partial / incorrect feedback for one response, keeping only
/// the branches up to the last one somebody references.
pub fn standard_feedback_rules(
    response: &ResponseInfo,
    referenced: &BTreeSet<String>,
) -> Vec<GenericNode> {
    let id = response.identifier.as_str();
    let correct_key = format!("{id}_correct");
    let partial_key = format!("{id}_partial");
    let incorrect_key = format!("{id}_incorrect");

    let branches: Vec<(Option<GenericNode>, String)> =
        match max_mapped_value(&response.declaration) {
            Some(max) => vec![
                (Some(equal_exact(map_response(id), float(max))), correct_key),
                (Some(gt(map_response(id), float(0.0))), partial_key),
                (None, incorrect_key),
            ],
            None if has_correct_response(&response.declaration) => vec![
                (Some(match_(variable(id), correct(id))), correct_key),
                (None, incorrect_key),
            ],
            None => return Vec::new(),
        };

    let Some(last) = branches.iter().rposition(|(_, key)| referenced.contains(key)) else {
        return Vec::new();
    };

    let kept = branches
        .into_iter()
        .take(last + 1)
        .map(|(test, key)| {
            let actions = if referenced.contains(&key) {
                vec![add_feedback(&key)]
            } else {
                Vec::new()
            };
            Branch { test, actions }
        })
        .collect();

    vec![response_condition(kept)]
}

/// One independent condition per referenced `<id>_choice_<option>`.
pub fn choice_feedback_rules(
    response: &ResponseInfo,
    referenced: &BTreeSet<String>,
) -> Vec<GenericNode> {
    let id = response.identifier.as_str();
    let single = declaration::cardinality(&response.declaration) == Cardinality::Single;

    response
        .option_ids
        .iter()
        .filter_map(|option| {
            let key = format!("{id}_choice_{option}");
            if !referenced.contains(&key) {
                return None;
            }
            let value = base_value(BaseType::Identifier, option.as_str());
            let test = if single {
                match_(variable(id), value)
            } else {
                member(value, variable(id))
            };
            Some(response_condition(vec![Branch::when(
                test,
                vec![add_feedback(&key)],
            )]))
        })
        .collect()
}
