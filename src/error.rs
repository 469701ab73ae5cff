//! Error types for the signature engine.

use thiserror::Error;

/// Fatal conditions that abort an evaluation pass.
///
/// Anything not listed here (malformed addresses, expired or ignored
/// signatures, unreadable signature files) is a normal outcome and never
/// surfaces as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// A `Run` directive named a module that is not registered.
    #[error("Missing extension module: {name}")]
    MissingModule { name: String },
}

/// Structured text that cannot be turned into a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Line is indented less than its block: {line:?}")]
    Dedent { line: String },

    #[error("Indented block has no owning key")]
    OrphanBlock,

    #[error("Key normalises to false: {key:?}")]
    FalsyKey { key: String },

    #[error("Block mixes list items and keys: {line:?}")]
    MixedBlock { line: String },

    #[error("Key not present in the existing document: {key}")]
    SchemaMismatch { key: String },

    #[error("Value cannot be rendered: {0}")]
    Unrenderable(String),
}
