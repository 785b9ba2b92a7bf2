//! # Feedback Identifiers
//!
//! The identifiers a feedback node can be conditioned on, derived from each
//! interaction's type, declaration and options. Nothing here depends on
//! processing having been generated, so an editor can offer the choices
//! before a scoring mode is picked.

use indexmap::IndexMap;
use serde::Serialize;

use crate::codecs::{CodecRegistry, feedback::referenced_identifier};
use crate::declaration::has_mapping;
use crate::model::{EditableDocument, EditableNode, NodePath};
use crate::processing::ResponseInfo;
use crate::serializing;

/// One selectable feedback condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackIdentifier {
    /// Value a feedback node's `identifier` attribute takes.
    pub key: String,
    pub label: String,
    pub description: String,
    pub response_identifier: String,
}

impl FeedbackIdentifier {
    fn new(response: &str, suffix: &str, label: String, description: String) -> Self {
        Self {
            key: format!("{response}_{suffix}"),
            label,
            description,
            response_identifier: response.to_string(),
        }
    }
}

/// `_correct` and `_incorrect`, plus `_partial` when the response is mapped.
pub fn standard_identifiers(response: &ResponseInfo) -> Vec<FeedbackIdentifier> {
    let id = response.identifier.as_str();
    let mut out = vec![FeedbackIdentifier::new(
        id,
        "correct",
        format!("{id}: correct"),
        format!("Shown when the answer to {id} earns full credit."),
    )];
    if has_mapping(&response.declaration) {
        out.push(FeedbackIdentifier::new(
            id,
            "partial",
            format!("{id}: partially correct"),
            format!("Shown when the answer to {id} earns some, but not full, credit."),
        ));
    }
    out.push(FeedbackIdentifier::new(
        id,
        "incorrect",
        format!("{id}: incorrect"),
        format!("Shown when the answer to {id} earns no credit."),
    ));
    out
}

/// `_choice_<option>` for every option of a choice-like interaction.
pub fn choice_identifiers(response: &ResponseInfo) -> Vec<FeedbackIdentifier> {
    let id = response.identifier.as_str();
    response
        .option_ids
        .iter()
        .map(|option| {
            FeedbackIdentifier::new(
                id,
                &format!("choice_{option}"),
                format!("{id}: choice {option}"),
                format!("Shown when option {option} is selected for {id}."),
            )
        })
        .collect()
}

/// Identifiers for one interaction node. Empty for anything else.
pub fn interaction_identifiers(
    node: &EditableNode,
    registry: &CodecRegistry,
) -> Vec<FeedbackIdentifier> {
    let Some(codec) = registry.get(&node.node_type) else {
        return Vec::new();
    };
    let (Some(identifier), Some(declaration)) =
        (node.response_identifier(), codec.live_declaration(node))
    else {
        return Vec::new();
    };
    let response = ResponseInfo {
        option_ids: codec.option_ids(node),
        ..ResponseInfo::new(identifier, node.node_type.as_str(), declaration)
    };
    codec.feedback_identifiers(&response)
}

/// A feedback node pointing at an identifier no interaction offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleReference {
    pub path: NodePath,
    pub identifier: String,
}

/// Every feedback identifier the document's interactions offer, in
/// document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackCatalog {
    entries: IndexMap<String, FeedbackIdentifier>,
}

impl FeedbackCatalog {
    pub fn build(doc: &EditableDocument) -> Self {
        Self::build_with(doc, CodecRegistry::shared())
    }

    pub fn build_with(doc: &EditableDocument, registry: &CodecRegistry) -> Self {
        let context = serializing::collect(doc.content(), registry).context;
        let mut entries = IndexMap::new();

        for response in &context.responses {
            let identifiers = match registry.get(&response.interaction_type) {
                Some(codec) => codec.feedback_identifiers(response),
                None => standard_identifiers(response),
            };
            for identifier in identifiers {
                entries.entry(identifier.key.clone()).or_insert(identifier);
            }
        }
        log::debug!(
            "feedback catalog: {} identifiers over {} responses",
            entries.len(),
            context.responses.len()
        );
        Self { entries }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&FeedbackIdentifier> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedbackIdentifier> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feedback nodes in `doc` whose identifier is not in this catalog.
    pub fn stale_references(&self, doc: &EditableDocument) -> Vec<StaleReference> {
        doc.walk()
            .into_iter()
            .filter_map(|(path, node)| {
                let identifier = referenced_identifier(node)?;
                (!self.contains(identifier)).then(|| StaleReference {
                    path,
                    identifier: identifier.to_string(),
                })
            })
            .collect()
    }
}
