use serde::Serialize;

/// Conditions reported by `parse` and `serialize`.
///
/// Only `InvalidStructure`, `ConflictingEdits` and a malformed prior document
/// stop a full document serialize; every other variant is collected alongside a usable
/// result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformError {
    #[error("Malformed markup: {message}")]
    ParseFailure { message: String },

    #[error("Invalid document structure: {message}")]
    InvalidStructure { message: String },

    #[error("{interaction} has no responseIdentifier")]
    MissingIdentifier { interaction: String },

    #[error("Response identifier '{identifier}' is used by {count} interactions")]
    DuplicateIdentifier { identifier: String, count: usize },

    #[error("No node at path {path:?}")]
    NodeNotFound { path: Vec<usize> },

    #[error("Rewrites overlap at byte {offset} of the prior document")]
    ConflictingEdits { offset: usize },
}

impl TransformError {
    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::ParseFailure {
            message: message.into(),
        }
    }

    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Whether this error prevented the markup from being rewritten.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ParseFailure { .. }
                | Self::InvalidStructure { .. }
                | Self::ConflictingEdits { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_message_names_identifier_and_count() {
        let err = TransformError::DuplicateIdentifier {
            identifier: "R1".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Response identifier 'R1' is used by 2 interactions"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn structural_errors_are_fatal() {
        assert!(TransformError::invalid_structure("no itemBody").is_fatal());
        assert!(TransformError::parse_failure("unexpected end").is_fatal());
        assert!(
            !TransformError::MissingIdentifier {
                interaction: "textEntryInteraction".to_string()
            }
            .is_fatal()
        );
    }
}
