//! Document-structural errors raised while building the spec model

/// Why an operation (or the whole document) could not be modeled.
///
/// Everything except [`BuildError::InvalidDocument`] is scoped to a single
/// operation: the builder records it and carries on with the rest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("dangling reference: {pointer}")]
    DanglingReference { pointer: String },

    #[error("path parameter mismatch in {template}: {detail}")]
    PathParameterMismatch { template: String, detail: String },

    #[error("unsupported schema construct at {location}: {construct}")]
    UnsupportedSchemaConstruct { location: String, construct: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl BuildError {
    pub fn dangling(pointer: impl Into<String>) -> Self {
        Self::DanglingReference {
            pointer: pointer.into(),
        }
    }

    pub fn path_mismatch(template: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::PathParameterMismatch {
            template: template.into(),
            detail: detail.into(),
        }
    }

    pub fn unsupported(location: impl Into<String>, construct: impl Into<String>) -> Self {
        Self::UnsupportedSchemaConstruct {
            location: location.into(),
            construct: construct.into(),
        }
    }
}
