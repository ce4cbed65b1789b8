//! Decode errors for fields and command packets.

use thiserror::Error;

use crate::field::FieldTag;

/// Errors raised while decoding a field, a command packet or a chunk set.
///
/// Every variant is local to the packet being decoded: the caller drops that
/// packet (or the source it came from) and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes remain than the field's tag byte plus declared width.
    #[error("malformed field at offset {offset}: {tag:?} needs {needed} bytes, {available} available")]
    MalformedField {
        /// Tag the decoder expected (or found) at this position.
        tag: Option<FieldTag>,
        /// Byte offset of the field's tag byte.
        offset: usize,
        /// Bytes the field occupies, tag included.
        needed: usize,
        /// Bytes left in the input.
        available: usize,
    },

    /// The byte sequence does not follow the schema of the kind being decoded.
    #[error("protocol violation at offset {offset}: {detail}")]
    ProtocolViolation {
        /// Byte offset where the mismatch was detected.
        offset: usize,
        /// What the schema expected and what was found.
        detail: String,
    },

    /// A fixed body field or declared variable tail runs past the end of input.
    #[error("truncated payload at offset {offset}: declared {declared} bytes, {available} available")]
    TruncatedPayload {
        /// Byte offset where the payload section starts.
        offset: usize,
        /// Bytes the payload declares.
        declared: usize,
        /// Bytes left in the input.
        available: usize,
    },

    /// Text or filename bytes are not valid in their declared encoding.
    #[error("invalid text at offset {offset}")]
    InvalidText {
        /// Byte offset of the text section.
        offset: usize,
    },

    /// A set of wrapper chunks does not describe one consistent logical command.
    #[error("inconsistent chunk set for wrapped command {wrapped_command_id}: {detail}")]
    Chunk {
        /// Command id of the wrapped logical command.
        wrapped_command_id: u16,
        /// Which invariant failed.
        detail: String,
    },
}

impl WireError {
    pub(crate) fn violation(offset: usize, detail: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            offset,
            detail: detail.into(),
        }
    }
}

/// Result alias for wire decoding.
pub type Result<T> = std::result::Result<T, WireError>;
