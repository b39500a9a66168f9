//! Errors raised while decoding `.bin` mesh streams.

use std::io;

use thiserror::Error;

use super::reader::{ChunkKind, GroupState};

/// Fatal decode failures. A load that hits any of these returns no mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Top-level tag that the configured format revision does not know.
    #[error("mesh file: unknown chunk 0x{tag:08x} at {offset}")]
    MalformedFormat { tag: u32, offset: u64 },

    /// Known chunk arriving in a state that cannot accept it.
    #[error("mesh file: unexpected {chunk} chunk at {offset} while {state}")]
    UnexpectedChunk {
        chunk: ChunkKind,
        state: GroupState,
        offset: u64,
    },

    /// Stream ended after `VB`/`IB` without the closing `PRI`.
    #[error("mesh file: stream ended at {offset} inside an unfinished group")]
    IncompleteGroup { offset: u64 },

    /// Legacy declaration whose stored stride disagrees with its attributes.
    #[error("mesh file: declared stride {stored} does not match attribute layout ({computed})")]
    StrideMismatch { stored: u16, computed: u16 },

    /// Underlying stream ran out before a field was complete.
    #[error("mesh file: truncated input at {offset}")]
    TruncatedInput {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type MeshResult<T> = Result<T, MeshError>;

/// Attribute dropped from a revised vertex declaration because its semantic
/// or type id is outside the known tables. Recoverable: decoding continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsupportedAttribute {
    /// Index of the group whose declaration carried the attribute.
    pub group: usize,
    pub attrib_id: u16,
    pub type_id: u16,
    pub num: u8,
}

impl std::fmt::Display for UnsupportedAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "group {}: unsupported attribute id 0x{:04x} (type 0x{:04x}, num {})",
            self.group, self.attrib_id, self.type_id, self.num
        )
    }
}
