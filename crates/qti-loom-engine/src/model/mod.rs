//! # Document Models
//!
//! Two tree shapes live here:
//!
//! - **`generic`**: `GenericNode`, a tag/attributes/children tree for markup the
//!   editor never edits live (response declarations, generated processing).
//! - **`editable`**: `EditableDocument` and `EditableNode`, the tree the editing
//!   surface works on. Text leaves are `TextRun`s carrying flat formatting flags.
//!
//! `xml` holds the small amount of glue for reading `roxmltree` nodes.

pub mod editable;
pub mod generic;
pub mod xml;

pub use editable::{
    ChoiceOption, DocumentMetadata, EditableChild, EditableDocument, EditableNode,
    InteractionState, Mark, NodeExtra, NodePath, OpaqueState, TextRun,
};
pub use generic::{GenericChild, GenericNode};

/// Attribute map preserving source order.
pub type Attributes = indexmap::IndexMap<String, String>;
