//! Typed failures surfaced by the engine
//!
//! Everything returns `anyhow::Result`; the variants below are raised through `anyhow`
//! whenever a caller may want to react to a specific failure (retry a ref update,
//! inspect rejected patch hunks, resolve conflicts first). Use
//! `err.downcast_ref::<Error>()` to recover them.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::patch::Patch;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object {id} not found")]
    ObjectNotFound { id: ObjectId },

    #[error("object {id} is a {actual}, expected a {expected}")]
    TypeMismatch {
        id: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("object {id} is corrupt: its content hashes to {actual}")]
    HashMismatch { id: ObjectId, actual: ObjectId },

    #[error("malformed object: {reason}")]
    MalformedObject { reason: String },

    #[error("illegal diff operands: {reason}")]
    IllegalDiffOperands { reason: String },

    #[error("ref {name} was updated concurrently")]
    RefUpdateConflict { name: String },

    #[error("transaction conflicts with concurrent updates to {}", .names.join(", "))]
    TransactionConflict { names: Vec<String> },

    #[error("unresolved conflicts exist at {}", .paths.join(", "))]
    UnresolvedConflictExists { paths: Vec<String> },

    #[error("staging was aborted")]
    StagingAborted,

    #[error("patch cannot be applied: {} change(s) rejected", .rejected.count())]
    CannotApplyPatch { rejected: Patch },

    #[error("{key} not found in config. Use `geobit config {key} <value>` to set it")]
    MissingConfiguration { key: String },

    #[error("invalid path '{path}'")]
    InvalidPath { path: String },

    #[error("{0}")]
    Precondition(String),

    #[error("operation canceled")]
    Canceled,
}

impl Error {
    /// Shorthand used by commands rejecting a call before touching any state.
    pub fn precondition(message: impl Into<String>) -> anyhow::Error {
        Error::Precondition(message.into()).into()
    }
}
