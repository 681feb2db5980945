//! Error types of the frame generation engine.

use crate::catalog::{FieldId, HeaderType};
use thiserror::Error;

/// Invalid stream or header configuration, detected at `set` or at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The field is not part of the header it is set on.
    #[error("field {field:?} does not belong to header {header:?}")]
    UnknownFieldForHeader { field: FieldId, header: HeaderType },

    /// A numeric spec was given to a pattern field, or the reverse.
    #[error("field {field:?} expects a {expected} value")]
    TypeMismatch { field: FieldId, expected: &'static str },

    /// A pattern string does not have the expected format.
    #[error("malformed {kind} pattern \"{text}\"")]
    MalformedPattern { kind: &'static str, text: String },

    /// The total length of the frame headers is not a whole number of bytes.
    #[error("headers are {bits} bits long, which is not a multiple of 8")]
    NotByteAligned { bits: usize },

    /// A merge group does not start or end on a byte boundary.
    #[error("merge group led by {leader:?} spans {bits} bits at bit offset {offset}")]
    MergeGroupNotAligned {
        leader: FieldId,
        offset: usize,
        bits: usize,
    },

    /// A generation spec whose parameters cannot produce any value.
    #[error("invalid generation spec for {target}: {reason}")]
    InvalidSpec { target: String, reason: String },

    /// A frame size outside of what the headers and the engine allow.
    #[error("frame size {size} is outside [{min}, {max}]")]
    FrameSize { size: usize, min: usize, max: usize },

    /// A user-defined field that does not fit in the smallest frame.
    #[error("user-defined field \"{name}\" ends at bit {end} but frames may be {frame_bits} bits long")]
    UdfOutOfFrame {
        name: String,
        end: usize,
        frame_bits: usize,
    },

    /// The stream has no header.
    #[error("stream {0} has no header")]
    EmptyStream(u32),

    /// A frame was requested from a stream that was never bootstrapped.
    #[error("stream {0} is not bootstrapped")]
    NotBootstrapped(u32),

    /// Unknown header or field name in a declarative configuration.
    #[error("unknown {kind} \"{name}\"")]
    UnknownName { kind: &'static str, name: String },
}

/// A field or value wider than the engine can carry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("{target} is {bits} bits wide, at most {max} bits are supported")]
    FieldTooWide {
        target: String,
        bits: usize,
        max: usize,
    },

    #[error("value {value:#x} does not fit in the {bits} bits of {target}")]
    ValueTooWide {
        target: String,
        value: u128,
        bits: usize,
    },
}

/// Main error type of the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
