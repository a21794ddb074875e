//! Rich diagnostic error types for the augur engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Recoverable query outcomes (insufficient
//! parameters, empty training sets) are not errors: they are tagged variants of
//! the values returned by the prediction and training APIs.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the augur engine.
#[derive(Debug, Error, Diagnostic)]
pub enum AugurError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Embedding store errors
// ---------------------------------------------------------------------------

/// Which registry an identifier was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Entity,
    Relation,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierKind::Entity => write!(f, "entity"),
            IdentifierKind::Relation => write!(f, "relation"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("unknown {kind} identifier: \"{id}\"")]
    #[diagnostic(
        code(augur::store::unknown_identifier),
        help(
            "The identifier has no embedding. It was either absent from the graph \
             when the store was built, or the store was loaded from a model that \
             never saw it. Rebuild the engine after adding it to the graph."
        )
    )]
    UnknownIdentifier { kind: IdentifierKind, id: String },

    #[error("dimension mismatch for \"{id}\": expected {expected}, got {actual}")]
    #[diagnostic(
        code(augur::store::dim_mismatch),
        help("Every embedding in a store shares the store's dimension, fixed at creation.")
    )]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid embedding dimension: {dim}")]
    #[diagnostic(
        code(augur::store::invalid_dimension),
        help("The embedding dimension must be greater than zero.")
    )]
    InvalidDimension { dim: usize },

    #[error("invalid initialization std-dev: {std_dev}")]
    #[diagnostic(
        code(augur::store::invalid_init),
        help("Embeddings are drawn from Normal(0, std_dev²); std_dev must be finite and non-negative.")
    )]
    InvalidInitialization { std_dev: f32 },
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("I/O error on {path}")]
    #[diagnostic(
        code(augur::persist::io),
        help("Check that the model path exists and has the right permissions.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(augur::persist::serde),
        help(
            "The model file could not be encoded or decoded. It may be truncated, \
             or written by an incompatible version. Retrain and save again."
        )
    )]
    Serialization { message: String },

    #[error("\"{id}\" has {actual} components, model dimension is {expected}")]
    #[diagnostic(
        code(augur::persist::dim_mismatch),
        help("The model file is inconsistent. The in-memory model was left unchanged.")
    )]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("model file declares invalid dimension {dim}")]
    #[diagnostic(
        code(augur::persist::invalid_dimension),
        help("A saved model must declare a dimension greater than zero.")
    )]
    InvalidDimension { dim: usize },
}

// ---------------------------------------------------------------------------
// Graph backend errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BackendError {
    #[error("graph backend unavailable: {message}")]
    #[diagnostic(
        code(augur::backend::unavailable),
        help(
            "A call to the graph backend failed. Only the current operation was \
             affected; retry it once the backend is reachable."
        )
    )]
    Unavailable { message: String },

    #[error("entity not found in graph: \"{id}\"")]
    #[diagnostic(
        code(augur::backend::unknown_entity),
        help("Add the entity to the graph before relating it to others.")
    )]
    UnknownEntity { id: String },

    #[error("graph import failed: {message}")]
    #[diagnostic(
        code(augur::backend::import),
        help(
            "The graph document could not be read. It must be a JSON object with \
             `nodes` and `relationships` arrays."
        )
    )]
    Import { message: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(augur::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(augur::config::parse),
        help("Check the TOML syntax of the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(augur::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(augur::config::invalid), help("Check the EngineConfig fields. {message}"))]
    Invalid { message: String },
}

/// Convenience alias for functions returning augur results.
pub type AugurResult<T> = std::result::Result<T, AugurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_augur_error() {
        let err = StoreError::UnknownIdentifier {
            kind: IdentifierKind::Entity,
            id: "Acme".into(),
        };
        let top: AugurError = err.into();
        assert!(matches!(
            top,
            AugurError::Store(StoreError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn backend_error_converts_to_augur_error() {
        let err = BackendError::Unavailable {
            message: "connection refused".into(),
        };
        let top: AugurError = err.into();
        assert!(matches!(top, AugurError::Backend(BackendError::Unavailable { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = PersistenceError::DimensionMismatch {
            id: "Acme".into(),
            expected: 128,
            actual: 64,
        };
        let msg = format!("{err}");
        assert!(msg.contains("Acme"));
        assert!(msg.contains("128"));
        assert!(msg.contains("64"));

        let err = StoreError::UnknownIdentifier {
            kind: IdentifierKind::Relation,
            id: "INVESTS_IN".into(),
        };
        assert_eq!(format!("{err}"), "unknown relation identifier: \"INVESTS_IN\"");
    }
}
