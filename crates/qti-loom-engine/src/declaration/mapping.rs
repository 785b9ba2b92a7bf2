use serde::{Deserialize, Serialize};

use super::{Cardinality, cardinality};
use crate::model::{GenericChild, GenericNode};

pub const MAPPING_TAG: &str = "mapping";
pub const MAP_ENTRY_TAG: &str = "mapEntry";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingMetadata {
    pub default_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub key: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
}

impl MapEntry {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            case_sensitive: None,
        }
    }

    /// Whether `candidate` selects this entry.
    pub fn matches(&self, candidate: &str) -> bool {
        match self.case_sensitive {
            Some(false) => self.key.to_lowercase() == candidate.to_lowercase(),
            _ => self.key == candidate,
        }
    }
}

/// A partial-credit table read from a declaration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mapping {
    pub metadata: MappingMetadata,
    pub entries: Vec<MapEntry>,
}

impl Mapping {
    /// Mapped score for a set of response values: each distinct value counts
    /// once, unmatched values score the default, and the total is clamped
    /// to the bounds.
    pub fn score<S: AsRef<str>>(&self, values: &[S]) -> f64 {
        let mut seen: Vec<&str> = Vec::new();
        let mut total = 0.0;
        for value in values {
            let value = value.as_ref();
            if seen.contains(&value) {
                continue;
            }
            seen.push(value);
            total += self
                .entries
                .iter()
                .find(|entry| entry.matches(value))
                .map_or(self.metadata.default_value, |entry| entry.value);
        }
        self.clamp(total)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let value = match self.metadata.lower_bound {
            Some(lower) if value < lower => lower,
            _ => value,
        };
        match self.metadata.upper_bound {
            Some(upper) if value > upper => upper,
            _ => value,
        }
    }
}

/// Format a number the way it appears in markup: integral values have no
/// fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub fn has_mapping(declaration: &GenericNode) -> bool {
    declaration.first_element(MAPPING_TAG).is_some()
}

/// Mapping metadata and entries, or `None` when the declaration has no
/// mapping. Unparseable numbers read as 0.
pub fn mapping(declaration: &GenericNode) -> Option<Mapping> {
    let node = declaration.first_element(MAPPING_TAG)?;
    let number = |name: &str| node.attribute(name).and_then(|v| v.trim().parse::<f64>().ok());

    let metadata = MappingMetadata {
        default_value: number("defaultValue").unwrap_or(0.0),
        lower_bound: number("lowerBound"),
        upper_bound: number("upperBound"),
    };

    let entries = node
        .elements_named(MAP_ENTRY_TAG)
        .filter_map(|entry| {
            let key = entry.attribute("mapKey")?;
            Some(MapEntry {
                key: key.to_string(),
                value: entry
                    .attribute("mappedValue")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0.0),
                case_sensitive: entry.attribute("caseSensitive").map(|v| v == "true"),
            })
        })
        .collect();

    Some(Mapping { metadata, entries })
}

/// Add an empty mapping with the given default, unless one exists.
pub fn with_empty_mapping(declaration: &GenericNode, default_value: f64) -> GenericNode {
    if has_mapping(declaration) {
        return declaration.clone();
    }
    let node = GenericNode::new(MAPPING_TAG)
        .with_attribute("defaultValue", format_number(default_value));
    declaration.clone().with_child(node)
}

/// Replace the mapping's default and bounds, keeping its entries. A
/// declaration with no mapping gets one.
pub fn with_mapping_metadata(declaration: &GenericNode, metadata: &MappingMetadata) -> GenericNode {
    let entries = mapping(declaration).map(|m| m.entries).unwrap_or_default();
    with_mapping(declaration, metadata, &entries)
}

/// Replace the mapping's entries, keeping its default and bounds.
pub fn with_mapping_entries(declaration: &GenericNode, entries: &[MapEntry]) -> GenericNode {
    let metadata = mapping(declaration).map(|m| m.metadata).unwrap_or_default();
    with_mapping(declaration, &metadata, entries)
}

/// Write a whole mapping, replacing any existing one in place.
pub fn with_mapping(
    declaration: &GenericNode,
    metadata: &MappingMetadata,
    entries: &[MapEntry],
) -> GenericNode {
    let node = mapping_node(metadata, entries);
    let position = declaration
        .children
        .iter()
        .position(|c| matches!(c, GenericChild::Node(n) if n.tag == MAPPING_TAG));

    match position {
        Some(index) => {
            let mut copy = declaration.clone();
            copy.children[index] = GenericChild::Node(node);
            copy
        }
        None => declaration.clone().with_child(node),
    }
}

pub fn without_mapping(declaration: &GenericNode) -> GenericNode {
    declaration.without_elements(MAPPING_TAG)
}

/// The highest score the mapping can award.
///
/// Single cardinality takes the largest positive entry; multiple and
/// ordered take the sum of positive entries. Either is clipped to the upper
/// bound: single cardinality too, because `mapResponse` clamps its result to
/// the bounds whatever the cardinality, so the clipped figure is the most a
/// response can score. `None` when nothing maps to a positive value.
pub fn max_mapped_value(declaration: &GenericNode) -> Option<f64> {
    let mapping = mapping(declaration)?;
    let positives = mapping
        .entries
        .iter()
        .map(|entry| entry.value)
        .filter(|value| *value > 0.0);

    let best = match cardinality(declaration) {
        Cardinality::Single => positives.fold(None, |best: Option<f64>, v| {
            Some(best.map_or(v, |b| b.max(v)))
        }),
        Cardinality::Multiple | Cardinality::Ordered => {
            positives.fold(None, |sum: Option<f64>, v| Some(sum.unwrap_or(0.0) + v))
        }
    }?;

    Some(match mapping.metadata.upper_bound {
        Some(upper) => best.min(upper),
        None => best,
    })
}

fn mapping_node(metadata: &MappingMetadata, entries: &[MapEntry]) -> GenericNode {
    let mut node = GenericNode::new(MAPPING_TAG);
    if let Some(lower) = metadata.lower_bound {
        node = node.with_attribute("lowerBound", format_number(lower));
    }
    if let Some(upper) = metadata.upper_bound {
        node = node.with_attribute("upperBound", format_number(upper));
    }
    node = node.with_attribute("defaultValue", format_number(metadata.default_value));

    node.with_children(entries.iter().map(|entry| {
        let mut element = GenericNode::new(MAP_ENTRY_TAG)
            .with_attribute("mapKey", entry.key.as_str())
            .with_attribute("mappedValue", format_number(entry.value));
        if let Some(case_sensitive) = entry.case_sensitive {
            element = element.with_attribute("caseSensitive", case_sensitive.to_string());
        }
        element
    }))
}
