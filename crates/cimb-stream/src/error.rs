use thiserror::Error;

use crate::arena::{ClassId, InstanceId};

#[derive(Debug, Error)]
pub enum StreamError {
    /// The input ended before a field could be read.
    #[error("truncated stream at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid stream magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    #[error("unsupported stream version: {0}")]
    UnsupportedVersion(u32),

    /// A record's layout is inconsistent (bad kind, counts, or string bounds).
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// A class-resolution entry points past the class table.
    #[error("class index {index} out of range ({count} classes)")]
    ClassIndexOutOfRange { index: u64, count: usize },

    /// An external-reference slot holds a token missing from the reference table.
    #[error("unresolved external reference token {0}")]
    UnresolvedReference(u64),

    /// A reference names an instance that does not precede its owner.
    #[error("reference from instance {from} to instance {to} is not backward")]
    ForwardReference { from: usize, to: usize },

    #[error("{0} trailing bytes after last instance")]
    TrailingBytes(usize),

    #[error("section holds too many entries for the wire format: {0}")]
    CountOverflow(usize),

    #[error("record too large: {0} bytes")]
    RecordTooLarge(usize),

    /// Allocation for a decoded record failed. Fatal for the current call.
    #[error("out of memory allocating {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("cyclic external reference through {0}")]
    CyclicReference(InstanceId),

    #[error("reference chain deeper than {0}")]
    ReferenceTooDeep(usize),

    #[error("unknown class {0}")]
    UnknownClass(ClassId),

    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    #[error("class has no property {0:?}")]
    UnknownProperty(String),

    #[error("slot {slot} out of range ({count} slots)")]
    InvalidSlot { slot: usize, count: usize },
}

impl StreamError {
    /// True for failures caused by malformed or truncated input, as opposed
    /// to resource exhaustion or misuse of the arena API.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::InvalidMagic { .. }
                | Self::UnsupportedVersion(_)
                | Self::CorruptRecord(_)
                | Self::ClassIndexOutOfRange { .. }
                | Self::UnresolvedReference(_)
                | Self::ForwardReference { .. }
                | Self::TrailingBytes(_)
        )
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
