//! # Response Processing
//!
//! Generates scoring and feedback markup from a named mode.
//!
//! - **allCorrect**: `SCORE` is 1 when every scorable response passes its
//!   correctness check, else 0.
//! - **sumScores**: each response contributes independently; mapped
//!   responses add their mapped value, unmapped ones add 1 or 0 through a
//!   `SCORE_<id>` intermediate outcome.
//! - **custom**: nothing is generated; the preserved payload is written back.
//!
//! Feedback rules are generated in both managed modes, but only for
//! identifiers some feedback node actually references.
//!
//! [`evaluate`] runs processing markup against candidate responses, which is
//! how the generated rules are checked.

pub mod evaluate;
pub mod rules;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codecs::CodecRegistry;
use crate::declaration::has_mapping;
use crate::model::GenericNode;

pub use evaluate::{CandidateResponses, EvaluationError, ItemScoring, Outcomes, Value};

/// Final score outcome.
pub const SCORE: &str = "SCORE";
/// Multiple-cardinality outcome collecting feedback identifiers.
pub const FEEDBACK: &str = "FEEDBACK";
/// Prefix of per-response intermediate outcomes.
pub const INTERMEDIATE_PREFIX: &str = "SCORE_";

pub fn intermediate_outcome(response_identifier: &str) -> String {
    format!("{INTERMEDIATE_PREFIX}{response_identifier}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessingMode {
    #[default]
    AllCorrect,
    SumScores,
    Custom,
}

impl ProcessingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingMode::AllCorrect => "allCorrect",
            ProcessingMode::SumScores => "sumScores",
            ProcessingMode::Custom => "custom",
        }
    }

    pub fn is_managed(self) -> bool {
        self != ProcessingMode::Custom
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allCorrect" | "all-correct" => Ok(ProcessingMode::AllCorrect),
            "sumScores" | "sum-scores" => Ok(ProcessingMode::SumScores),
            "custom" => Ok(ProcessingMode::Custom),
            other => Err(format!(
                "unknown processing mode '{other}' (expected allCorrect, sumScores or custom)"
            )),
        }
    }
}

/// Processing settings held on the document's metadata node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingConfig {
    pub mode: ProcessingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_payload: Option<GenericNode>,
}

impl ProcessingConfig {
    pub fn custom(payload: GenericNode) -> Self {
        Self {
            mode: ProcessingMode::Custom,
            custom_payload: Some(payload),
        }
    }

    /// A copy in `mode`. The custom payload survives every switch; entering
    /// custom without one starts from an empty `responseProcessing`.
    pub fn with_mode(&self, mode: ProcessingMode) -> ProcessingConfig {
        let custom_payload = match (mode, &self.custom_payload) {
            (ProcessingMode::Custom, None) => {
                Some(GenericNode::new(rules::RESPONSE_PROCESSING))
            }
            (_, payload) => payload.clone(),
        };
        ProcessingConfig {
            mode,
            custom_payload,
        }
    }
}

/// What the generator knows about one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseInfo {
    pub identifier: String,
    pub interaction_type: String,
    pub declaration: GenericNode,
    /// Option identifiers of choice-like interactions, in document order.
    pub option_ids: Vec<String>,
}

impl ResponseInfo {
    pub fn new(
        identifier: impl Into<String>,
        interaction_type: impl Into<String>,
        declaration: GenericNode,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            interaction_type: interaction_type.into(),
            declaration,
            option_ids: Vec::new(),
        }
    }
}

/// Everything the generator reads, collected by a serialize pass.
#[derive(Debug, Clone, Default)]
pub struct GeneratorInput {
    /// One entry per distinct response identifier, in document order.
    pub responses: Vec<ResponseInfo>,
    /// Intermediate outcome declarations already in the document, by
    /// outcome identifier.
    pub existing_outcomes: IndexMap<String, GenericNode>,
    /// Feedback identifiers referenced by feedback nodes.
    pub feedback_references: BTreeSet<String>,
}

/// Generated markup, split by where it goes in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingFragments {
    pub score_rules: Vec<GenericNode>,
    /// Intermediate outcome declarations the score rules need.
    pub outcome_declarations: Vec<GenericNode>,
    pub feedback_rules: Vec<GenericNode>,
}

impl ProcessingFragments {
    pub fn is_empty(&self) -> bool {
        self.score_rules.is_empty() && self.feedback_rules.is_empty()
    }

    /// The `responseProcessing` element, or `None` when there are no rules.
    pub fn response_processing(&self) -> Option<GenericNode> {
        if self.is_empty() {
            return None;
        }
        Some(
            GenericNode::new(rules::RESPONSE_PROCESSING)
                .with_children(self.score_rules.iter().cloned())
                .with_children(self.feedback_rules.iter().cloned()),
        )
    }

    /// Identifiers of the intermediate outcomes this output relies on.
    pub fn needed_intermediates(&self) -> Vec<String> {
        self.outcome_declarations
            .iter()
            .filter_map(|decl| decl.attribute("identifier").map(str::to_string))
            .collect()
    }
}

/// Generate scoring and feedback rules for `mode`. Custom mode generates
/// nothing.
pub fn generate(
    mode: ProcessingMode,
    input: &GeneratorInput,
    registry: &CodecRegistry,
) -> ProcessingFragments {
    let mut fragments = match mode {
        ProcessingMode::AllCorrect => all_correct(input, registry),
        ProcessingMode::SumScores => sum_scores(input, registry),
        ProcessingMode::Custom => return ProcessingFragments::default(),
    };

    for response in &input.responses {
        let generated = match registry.get(&response.interaction_type) {
            Some(codec) => codec.feedback_rules(response, &input.feedback_references),
            None => rules::standard_feedback_rules(response, &input.feedback_references),
        };
        fragments.feedback_rules.extend(generated);
    }

    log::debug!(
        "generated {} processing: {} score rules, {} intermediates, {} feedback rules",
        mode,
        fragments.score_rules.len(),
        fragments.outcome_declarations.len(),
        fragments.feedback_rules.len()
    );
    fragments
}

fn correctness_check(response: &ResponseInfo, registry: &CodecRegistry) -> Option<GenericNode> {
    match registry.get(&response.interaction_type) {
        Some(codec) => codec.correctness_check(response),
        None => rules::default_correctness_check(response),
    }
}

fn all_correct(input: &GeneratorInput, registry: &CodecRegistry) -> ProcessingFragments {
    let mut checks: Vec<GenericNode> = input
        .responses
        .iter()
        .filter_map(|response| correctness_check(response, registry))
        .collect();

    let test = match checks.len() {
        0 => return ProcessingFragments::default(),
        1 => checks.remove(0),
        _ => rules::and(checks),
    };

    ProcessingFragments {
        score_rules: vec![rules::response_condition(vec![
            rules::Branch::when(test, vec![rules::set_outcome(SCORE, rules::float(1.0))]),
            rules::Branch::otherwise(vec![rules::set_outcome(SCORE, rules::float(0.0))]),
        ])],
        ..ProcessingFragments::default()
    }
}

fn sum_scores(input: &GeneratorInput, registry: &CodecRegistry) -> ProcessingFragments {
    let mut fragments = ProcessingFragments::default();
    let mut terms = Vec::new();

    for response in &input.responses {
        let id = response.identifier.as_str();
        if has_mapping(&response.declaration) {
            terms.push(rules::map_response(id));
            continue;
        }
        let Some(check) = correctness_check(response, registry) else {
            continue;
        };

        let outcome = intermediate_outcome(id);
        fragments.score_rules.push(rules::response_condition(vec![
            rules::Branch::when(check, vec![rules::set_outcome(&outcome, rules::float(1.0))]),
            rules::Branch::otherwise(vec![rules::set_outcome(&outcome, rules::float(0.0))]),
        ]));
        fragments.outcome_declarations.push(
            input
                .existing_outcomes
                .get(&outcome)
                .cloned()
                .unwrap_or_else(|| rules::intermediate_declaration(id)),
        );
        terms.push(rules::variable(&outcome));
    }

    if !terms.is_empty() {
        fragments
            .score_rules
            .push(rules::set_outcome(SCORE, rules::sum(terms)));
    }
    fragments
}
