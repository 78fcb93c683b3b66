//! Crate-wide error type.

use thiserror::Error;

/// Errors reported by the polytrack library.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure while reading a shape library or contour file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON input.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Shape library document with an unsupported schema tag.
    #[error("unsupported shape library schema '{found}' (expected '{expected}')")]
    Schema {
        expected: &'static str,
        found: String,
    },

    /// Shape library entry whose flat corner list has an odd length.
    #[error("shape '{name}': corner list must contain x,y pairs")]
    OddCornerList { name: String },

    /// Lookup of a parameter key that was never defined. Silent defaulting
    /// is disallowed: downstream numerics depend on every parameter being
    /// set deliberately.
    #[error("the parameter '{0}' does not exist")]
    UnknownParam(String),

    /// Pose write for an id that is not in the tracked pool.
    #[error("no tracked object with id {0}")]
    UnknownObject(u64),
}
