//! Error types for the metadata builder.
//!
//! Only structural problems are errors. Values that cannot be resolved,
//! ambiguous overrides and validation failures are reported through a
//! [`DiagnosticSink`](crate::DiagnosticSink) and never abort a build.

use annolith_types::DeclId;

/// Errors that abort building metadata for a declaration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Unknown declaration {0}")]
    UnknownDeclaration(DeclId),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors raised by declaration model queries and loading.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Declaration {0} has no declaring type")]
    NoDeclaringType(DeclId),

    #[error("Unknown declaration {0}")]
    UnknownDeclaration(DeclId),

    #[error("Declaration {from} references unknown declaration {to}")]
    DanglingReference { from: DeclId, to: DeclId },

    #[error("Declaration {from} references {to} as a {expected}, but it is a {found}")]
    WrongReferenceKind {
        from: DeclId,
        to: DeclId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Type '{0}' is declared more than once")]
    DuplicateType(String),

    #[error("Failed to read declaration model: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse declaration model: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while loading or validating a [`BuilderConfig`](crate::BuilderConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for builder operations.
pub type Result<T> = std::result::Result<T, BuildError>;
