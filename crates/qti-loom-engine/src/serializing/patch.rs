//! Rewrites the managed regions of a prior document in place.
//!
//! Every change is a byte-range edit against the prior text, so anything
//! outside the edited ranges (prolog, comments, attribute quoting, stylesheet
//! references) comes through unchanged.

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

use indexmap::IndexMap;
use roxmltree::Node;

use super::{Collected, SerializeOptions, indent_blocks};
use crate::codecs::{CodecRegistry, Placement};
use crate::declaration::DECLARATION_TAG;
use crate::error::TransformError;
use crate::model::{Attributes, GenericNode, xml};
use crate::parsing::{BODY_TAG, ITEM_TAG, parsing_options};
use crate::processing::rules::{
    OUTCOME_DECLARATION, RESPONSE_PROCESSING, feedback_declaration, score_declaration,
};
use crate::processing::{
    FEEDBACK, INTERMEDIATE_PREFIX, ProcessingConfig, ProcessingFragments, SCORE, generate,
};

/// A replacement of `range` in the prior text. Empty ranges insert.
#[derive(Debug)]
struct Edit {
    range: Range<usize>,
    text: String,
}

impl Edit {
    fn insert(at: usize, text: String) -> Self {
        Self { range: at..at, text }
    }

    fn replace(range: Range<usize>, text: String) -> Self {
        Self { range, text }
    }

    /// Remove an element, along with the indentation and line break before it
    /// when it sits on a line of its own.
    fn remove(prior: &str, node: Node<'_, '_>) -> Self {
        let range = node.range();
        let start = match prior[..range.start].rfind('\n') {
            Some(newline)
                if prior[newline + 1..range.start]
                    .chars()
                    .all(|c| c == ' ' || c == '\t') =>
            {
                newline
            }
            _ => range.start,
        };
        Self {
            range: start..range.end,
            text: String::new(),
        }
    }

    fn is_insert(&self) -> bool {
        self.range.is_empty()
    }
}

/// Apply `edits` to `prior`. At equal offsets inserts go first, in the order
/// they were made. An edit starting inside one already applied is an error
/// rather than being dropped.
fn splice(prior: &str, mut edits: Vec<Edit>) -> Result<String, TransformError> {
    edits.sort_by_key(|edit| (edit.range.start, !edit.is_insert()));

    let mut out = String::with_capacity(prior.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.range.start < cursor {
            return Err(TransformError::ConflictingEdits {
                offset: edit.range.start,
            });
        }
        out.push_str(&prior[cursor..edit.range.start]);
        out.push_str(&edit.text);
        cursor = edit.range.end;
    }
    out.push_str(&prior[cursor..]);
    Ok(out)
}

/// Offset to insert at so the text lands just before `node`: the end of the
/// nearest preceding sibling that is not text, or the end of the parent's
/// start tag. No removal or replacement starts before such an offset and
/// ends after it, so inserted text should begin with its own line break.
fn before(node: Node<'_, '_>) -> usize {
    std::iter::successors(node.prev_sibling(), |sibling| sibling.prev_sibling())
        .find(|sibling| !sibling.is_text())
        .map(|sibling| sibling.range().end)
        .or_else(|| {
            node.parent()
                .and_then(|parent| parent.first_child())
                .map(|first| first.range().start)
        })
        .unwrap_or(node.range().start)
}

struct Writer<'a> {
    unit: String,
    prefix: String,
    registry: &'a CodecRegistry,
}

impl Writer<'_> {
    fn plain(&self, node: &GenericNode) -> String {
        node.to_pretty_xml(&self.unit, &self.prefix)
    }

    fn body(&self, node: &GenericNode) -> String {
        node.to_pretty_xml_with(&self.unit, &self.prefix, &indent_blocks(self.registry))
    }

    /// Nodes one per line, with a line break and indentation between them.
    fn lines<'n>(&self, nodes: impl IntoIterator<Item = &'n GenericNode>) -> String {
        nodes
            .into_iter()
            .map(|node| self.plain(node))
            .collect::<Vec<_>>()
            .join(&format!("\n{}", self.prefix))
    }
}

pub(super) fn apply(
    prior: &str,
    collected: &Collected,
    processing: &ProcessingConfig,
    registry: &CodecRegistry,
    options: &SerializeOptions,
) -> Result<String, TransformError> {
    let doc = roxmltree::Document::parse_with_options(prior, parsing_options())
        .map_err(|err| TransformError::parse_failure(err.to_string()))?;
    let root = doc.root_element();

    match xml::local_name(&root) {
        BODY_TAG => {
            let writer = Writer {
                unit: options.unit(),
                prefix: String::new(),
                registry,
            };
            let body = body_element(xml::attributes(&root), collected);
            splice(prior, vec![Edit::replace(root.range(), writer.body(&body))])
        }
        ITEM_TAG => patch_item(prior, root, collected, processing, registry, options),
        other => Err(TransformError::invalid_structure(format!(
            "root element is <{other}>, expected {ITEM_TAG} or {BODY_TAG}"
        ))),
    }
}

fn body_element(attributes: Attributes, collected: &Collected) -> GenericNode {
    GenericNode::new(BODY_TAG)
        .with_attributes(attributes)
        .with_children(collected.body.iter().cloned())
}

fn patch_item(
    prior: &str,
    root: Node<'_, '_>,
    collected: &Collected,
    processing: &ProcessingConfig,
    registry: &CodecRegistry,
    options: &SerializeOptions,
) -> Result<String, TransformError> {
    let children: Vec<Node> = root.children().filter(|c| c.is_element()).collect();
    let named = |name: &str| {
        children
            .iter()
            .copied()
            .filter(|c| xml::local_name(c) == name)
            .collect::<Vec<_>>()
    };
    let Some(body) = named(BODY_TAG).first().copied() else {
        return Err(TransformError::invalid_structure(format!(
            "<{}> has no {BODY_TAG}",
            xml::qualified_name(&root)
        )));
    };

    let writer = Writer {
        unit: options.unit(),
        prefix: child_indent(prior, &children, &options.unit()),
        registry,
    };
    let separator = format!("\n{}", writer.prefix);
    let context = &collected.context;
    let mut edits = Vec::new();

    // Response declarations: the first old one is replaced by all live ones.
    let old_declarations = named(DECLARATION_TAG);
    let declarations = writer.lines(context.declarations.values());
    match old_declarations.split_first() {
        Some((first, rest)) => {
            if declarations.is_empty() {
                edits.push(Edit::remove(prior, *first));
            } else {
                edits.push(Edit::replace(first.range(), declarations));
            }
            edits.extend(rest.iter().map(|node| Edit::remove(prior, *node)));
        }
        None if !declarations.is_empty() => {
            edits.push(Edit::insert(
                before(children[0]),
                format!("{separator}{declarations}"),
            ));
        }
        None => {}
    }

    let old_outcomes = named(OUTCOME_DECLARATION);
    let fragments = if processing.mode.is_managed() {
        let existing: IndexMap<String, GenericNode> = old_outcomes
            .iter()
            .filter_map(|node| {
                let identifier = node.attribute("identifier")?;
                identifier
                    .starts_with(INTERMEDIATE_PREFIX)
                    .then(|| (identifier.to_string(), GenericNode::from_xml(*node)))
            })
            .collect();
        Some(generate(
            processing.mode,
            &context.generator_input(existing),
            registry,
        ))
    } else {
        None
    };

    if let Some(fragments) = &fragments {
        let response_ids: BTreeSet<&str> = old_declarations
            .iter()
            .filter_map(|node| node.attribute("identifier"))
            .chain(context.response_identifiers.iter().map(String::as_str))
            .collect();
        edits.extend(stale_intermediates(prior, &old_outcomes, &response_ids, fragments));

        let additions = missing_outcomes(&old_outcomes, fragments);
        if !additions.is_empty() {
            let anchor = children
                .iter()
                .copied()
                .find(|c| !matches!(xml::local_name(c), DECLARATION_TAG | OUTCOME_DECLARATION))
                .unwrap_or(body);
            edits.push(Edit::insert(
                before(anchor),
                format!("{separator}{}", writer.lines(&additions)),
            ));
        }
    }

    let new_body = body_element(xml::attributes(&body), collected);
    edits.push(Edit::replace(body.range(), writer.body(&new_body)));

    let old_processing = named(RESPONSE_PROCESSING).first().copied();
    let wanted = match &fragments {
        Some(fragments) => Some(fragments.response_processing()),
        None => custom_processing(old_processing, processing),
    };
    if let Some(wanted) = wanted {
        match (old_processing, wanted) {
            (Some(old), Some(new)) => edits.push(Edit::replace(old.range(), writer.plain(&new))),
            (Some(old), None) => edits.push(Edit::remove(prior, old)),
            (None, Some(new)) => edits.push(Edit::insert(
                body.range().end,
                format!("{separator}{}", writer.plain(&new)),
            )),
            (None, None) => {}
        }
    }

    // Floating feedback is rewritten as a group after the processing.
    for node in children.iter().copied().filter(|c| is_floating(c, registry)) {
        edits.push(Edit::remove(prior, node));
    }
    if !collected.floating.is_empty() {
        let at = old_processing.map_or(body.range().end, |node| node.range().end);
        let text: String = collected
            .floating
            .iter()
            .map(|node| format!("{separator}{}", writer.body(node)))
            .collect();
        edits.push(Edit::insert(at, text));
    }

    log::debug!("patching prior document with {} edits", edits.len());
    splice(prior, edits)
}

/// Indentation of the item's direct children as written, or one unit when
/// the prior does not put them on their own lines.
fn child_indent(prior: &str, children: &[Node<'_, '_>], unit: &str) -> String {
    children
        .first()
        .and_then(|first| {
            let before = &prior[..first.range().start];
            let line = &before[before.rfind('\n')? + 1..];
            line.chars()
                .all(|c| c == ' ' || c == '\t')
                .then(|| line.to_string())
        })
        .unwrap_or_else(|| unit.to_string())
}

/// Intermediate outcomes of current or former responses that the generated
/// rules no longer use.
fn stale_intermediates(
    prior: &str,
    old_outcomes: &[Node<'_, '_>],
    response_ids: &BTreeSet<&str>,
    fragments: &ProcessingFragments,
) -> Vec<Edit> {
    let needed = fragments.needed_intermediates();
    old_outcomes
        .iter()
        .filter(|node| {
            let Some(identifier) = node.attribute("identifier") else {
                return false;
            };
            identifier
                .strip_prefix(INTERMEDIATE_PREFIX)
                .is_some_and(|response| response_ids.contains(response))
                && !needed.iter().any(|n| n == identifier)
        })
        .map(|node| Edit::remove(prior, *node))
        .collect()
}

/// Outcome declarations the generated rules write to but the prior lacks.
fn missing_outcomes(
    old_outcomes: &[Node<'_, '_>],
    fragments: &ProcessingFragments,
) -> Vec<GenericNode> {
    let present: HashSet<&str> = old_outcomes
        .iter()
        .filter_map(|node| node.attribute("identifier"))
        .collect();

    let mut additions = Vec::new();
    if !fragments.score_rules.is_empty() && !present.contains(SCORE) {
        additions.push(score_declaration());
    }
    if !fragments.feedback_rules.is_empty() && !present.contains(FEEDBACK) {
        additions.push(feedback_declaration());
    }
    for declaration in &fragments.outcome_declarations {
        if let Some(identifier) = declaration.attribute("identifier")
            && !present.contains(identifier)
        {
            additions.push(declaration.clone());
        }
    }
    additions
}

/// What to do with processing in custom mode: `None` leaves the prior alone.
/// The payload is written only when it differs from what is there, and never
/// inserted when it is empty.
fn custom_processing(
    old: Option<Node<'_, '_>>,
    processing: &ProcessingConfig,
) -> Option<Option<GenericNode>> {
    let payload = processing.custom_payload.as_ref()?;
    match old {
        Some(old) if GenericNode::from_xml(old) == *payload => None,
        None if payload.children.is_empty() && payload.attributes.is_empty() => None,
        _ => Some(Some(payload.clone())),
    }
}

fn is_floating(node: &Node<'_, '_>, registry: &CodecRegistry) -> bool {
    xml::is_item_namespace(node)
        && registry
            .for_markup(xml::local_name(node))
            .is_some_and(|codec| codec.placement() == Placement::Floating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn inserts_precede_replacements_at_the_same_offset() {
        let edits = vec![
            Edit::replace(2..4, "CD".to_string()),
            Edit::insert(2, "x".to_string()),
            Edit::insert(2, "y".to_string()),
        ];
        assert_eq!(splice("abcdef", edits), Ok("abxyCDef".to_string()));
    }

    #[test]
    fn overlapping_edits_are_an_error() {
        let edits = vec![
            Edit::replace(0..4, "x".to_string()),
            Edit::insert(2, "y".to_string()),
        ];
        assert_eq!(
            splice("abcdef", edits),
            Err(TransformError::ConflictingEdits { offset: 2 })
        );
    }

    #[test]
    fn inserts_before_a_removed_first_child_are_kept() {
        let prior = "<a>\n  <b/>\n  <c/>\n</a>";
        let doc = roxmltree::Document::parse(prior).unwrap();
        let b = doc.root_element().first_element_child().unwrap();
        let c = doc.root_element().last_element_child().unwrap();

        assert_eq!(before(b), 3);
        assert_eq!(before(c), b.range().end);

        let edits = vec![
            Edit::insert(before(b), "\n  <x/>".to_string()),
            Edit::remove(prior, b),
        ];
        assert_eq!(splice(prior, edits), Ok("<a>\n  <x/>\n  <c/>\n</a>".to_string()));
    }

    #[test]
    fn removal_takes_its_line() {
        let prior = "<a>\n  <b/>\n  <c/>\n</a>";
        let doc = roxmltree::Document::parse(prior).unwrap();
        let b = doc.root_element().first_element_child().unwrap();
        assert_eq!(
            splice(prior, vec![Edit::remove(prior, b)]),
            Ok("<a>\n  <c/>\n</a>".to_string())
        );
    }

    #[test]
    fn removal_on_a_shared_line_keeps_neighbours() {
        let prior = "<a><b/><c/></a>";
        let doc = roxmltree::Document::parse(prior).unwrap();
        let c = doc.root_element().last_element_child().unwrap();
        assert_eq!(
            splice(prior, vec![Edit::remove(prior, c)]),
            Ok("<a><b/></a>".to_string())
        );
    }

    #[test]
    fn child_indent_follows_the_prior() {
        let prior = "<a>\n\t<b/>\n</a>";
        let doc = roxmltree::Document::parse(prior).unwrap();
        let children: Vec<_> = doc.root_element().children().filter(|c| c.is_element()).collect();
        assert_eq!(child_indent(prior, &children, "  "), "\t");

        let compact = "<a><b/></a>";
        let doc = roxmltree::Document::parse(compact).unwrap();
        let children: Vec<_> = doc.root_element().children().filter(|c| c.is_element()).collect();
        assert_eq!(child_indent(compact, &children, "  "), "  ");
    }
}
