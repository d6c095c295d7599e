//! Error types for the model layer.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Schema configuration errors.
///
/// These are programmer errors raised while compiling a schema. A schema that
/// fails to compile must never be used to build entities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field was declared without a type.
    #[error("field `{field}` of schema `{schema}` declares no type")]
    MissingType { schema: String, field: String },

    /// A field names a type that is not registered.
    #[error("field `{field}` of schema `{schema}` uses unknown type `{type_name}`")]
    UnknownType {
        schema: String,
        field: String,
        type_name: String,
    },

    /// No field is marked as primary key.
    #[error("schema `{0}` has no primary key field")]
    NoPrimaryKey(String),

    /// More than one field is marked as primary key.
    #[error("schema `{schema}` has more than one primary key: {fields:?}")]
    MultiplePrimaryKeys { schema: String, fields: Vec<String> },

    /// Two fields share a name.
    #[error("schema `{schema}` declares field `{field}` twice")]
    DuplicateField { schema: String, field: String },

    /// The raw schema description is not shaped as expected.
    #[error("invalid raw schema `{schema}`: {reason}")]
    InvalidRaw { schema: String, reason: String },
}

/// Errors that can occur while building or mutating records.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Schema compilation failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A wire payload did not have the expected shape.
    #[error("malformed payload: {0}")]
    Payload(String),

    /// An entity of a different schema was handed to a collection or association.
    #[error("schema mismatch: expected `{expected}`, found `{found}`")]
    SchemaMismatch { expected: String, found: String },

    /// An entity was mutated with a collection or the other way around.
    #[error("cannot mutate {target} with {source_kind}")]
    RecordKind {
        target: &'static str,
        source_kind: &'static str,
    },

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
