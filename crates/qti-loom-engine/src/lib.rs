pub mod codecs;
pub mod declaration;
pub mod error;
pub mod feedback;
pub mod model;
pub mod parsing;
pub mod processing;
pub mod serializing;

// Re-export key types for easier usage
pub use codecs::{Codec, CodecRegistry};
pub use error::TransformError;
pub use feedback::{FeedbackCatalog, FeedbackIdentifier, StaleReference};
pub use model::{EditableDocument, EditableNode, GenericNode, NodePath};
pub use parsing::{ParseOutput, parse, parse_with};
pub use processing::{ItemScoring, ProcessingConfig, ProcessingMode};
pub use serializing::{SerializeOptions, SerializeOutput, serialize, serialize_with};
