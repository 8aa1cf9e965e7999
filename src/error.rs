//! Error types for resource declaration, selection, serialization and schema emission.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while declaring resources and type tags.
#[derive(Debug, Error)]
pub enum DeclareError {
    #[error("invalid identifier \"{name}\"")]
    InvalidName { name: String },

    #[error("duplicate field `{field}` on resource `{resource}`")]
    DuplicateField { resource: String, field: String },

    #[error("invalid enum: {message}")]
    InvalidEnum { message: String },

    #[error("accessor `{field}` on resource `{resource}` has no matching field")]
    AccessorWithoutField { resource: String, field: String },

    #[error("resource link `{name}` is already defined")]
    AlreadyDefined { name: String },

    #[error("resource link `{link}` cannot be defined by resource `{resource}`")]
    NameMismatch { link: String, resource: String },
}

/// Errors raised while resolving a selection against a resource.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("unknown field `{field}` on resource `{resource}`")]
    UnknownField { resource: String, field: String },

    #[error("nested selection at position {index} must be the last item")]
    MisplacedMapping { index: usize },

    #[error("field `{field}` on resource `{resource}` is not a resource reference")]
    NotNestable { resource: String, field: String },

    #[error("invalid selection: {message}")]
    InvalidSpec { message: String },

    #[error("resource link `{name}` was never defined")]
    UnresolvedReference { name: String },
}

/// Errors raised while serializing objects through a resource.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("object {object} has no accessor for `{field}` ({resource})")]
    MissingAccessor {
        resource: String,
        field: String,
        object: String,
    },

    #[error("expected {expected}, got {found}")]
    Mismatch { expected: String, found: &'static str },

    #[error("resource link `{name}` was never defined")]
    UnresolvedReference { name: String },

    #[error(transparent)]
    Select(#[from] SelectError),
}

/// Errors raised while emitting JSON Schema or OpenAPI documents.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("resource link `{name}` was never defined")]
    UnresolvedReference { name: String },
}

/// Errors raised while loading declaration documents.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse and declaration errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported type {type_name} at {path}")]
    UnsupportedType { path: String, type_name: String },

    #[error("unknown resource `{name}` at {path}")]
    UnknownResource { path: String, name: String },

    #[error("invalid declaration document: {message}")]
    InvalidDocument { message: String },

    #[error(transparent)]
    Declare(#[from] DeclareError),

    #[error(transparent)]
    Select(#[from] SelectError),
}

impl SerializeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingAccessor { .. } | Self::Mismatch { .. } => 1,
            _ => 2,
        }
    }
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl SelectError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("api.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::UnsupportedType {
            path: "/resources/Product/fields/id".into(),
            type_name: "\"uuid\"".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = LoadError::from(DeclareError::InvalidName { name: "1st".into() });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn serialize_error_exit_codes() {
        let err = SerializeError::MissingAccessor {
            resource: "Product".into(),
            field: "price".into(),
            object: "{}".into(),
        };
        assert_eq!(err.exit_code(), 1);

        let err = SerializeError::from(SelectError::UnknownField {
            resource: "Product".into(),
            field: "prise".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_accessor_display() {
        let err = SerializeError::MissingAccessor {
            resource: "Product".into(),
            field: "price".into(),
            object: "Item { id: 1 }".into(),
        };
        assert_eq!(
            err.to_string(),
            "object Item { id: 1 } has no accessor for `price` (Product)"
        );
    }
}
