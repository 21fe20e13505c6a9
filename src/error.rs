//! Error taxonomy for the rewrite pipeline (spec §7).
//!
//! Every kind below carries enough context to be logged usefully by the
//! coordinator; the core never swallows an error; the one soft failure
//! (missing parent mapping in the commit rewrite) is handled separately as a
//! logged warning rather than a `GraftError`, see [`crate::rewrite::commit`].

use crate::hash::ObjectHash;

#[derive(Debug, thiserror::Error)]
pub enum GraftError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed framing from external helper: {0}")]
    Protocol(String),

    #[error("object {hash} failed integrity check: expected this hash, stored object hashes to {actual}")]
    Integrity {
        hash: ObjectHash,
        actual: ObjectHash,
    },

    #[error("object {hash} has type {actual}, expected {expected}")]
    TypeMismatch {
        hash: ObjectHash,
        expected: &'static str,
        actual: String,
    },

    #[error("missing mapping for {hash} in {phase}")]
    MissingMapping { hash: ObjectHash, phase: &'static str },

    #[error("consistency violation: {hash} was rewritten to two different results ({first} vs {second})")]
    Consistency {
        hash: ObjectHash,
        first: ObjectHash,
        second: ObjectHash,
    },

    #[error("formatter failed on blob {hash}: {detail}")]
    Formatter { hash: ObjectHash, detail: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl GraftError {
    /// Process exit code for this error kind; distinct per §7's requirement
    /// that phase failures be distinguishable by the caller.
    pub fn exit_code(&self) -> i32 {
        match self {
            GraftError::Io(_) => 10,
            GraftError::Protocol(_) => 11,
            GraftError::Integrity { .. } => 12,
            GraftError::TypeMismatch { .. } => 13,
            GraftError::MissingMapping { .. } => 14,
            GraftError::Consistency { .. } => 15,
            GraftError::Formatter { .. } => 16,
            GraftError::NotFound(_) => 17,
            GraftError::Config(_) => 18,
            GraftError::TaskJoin(_) => 19,
        }
    }
}
