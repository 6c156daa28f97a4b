use std::io;
use std::path::PathBuf;

use bstr::BString;
use derive_more::Display;
use harmonia_utils_io::wire::WireError;
use thiserror::Error;

/// What a node has been committed to by its `type` field so far.
#[derive(Display, Debug, PartialEq, Eq, Clone, Copy)]
pub enum NodeKind {
    #[display("untyped")]
    Untyped,
    #[display("regular")]
    Regular,
    #[display("directory")]
    Directory,
    #[display("symlink")]
    Symlink,
}

/// A violation of the NAR grammar or of one of its length bounds.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("expected {expected:?}, got {actual:?}")]
    UnexpectedToken { expected: BString, actual: BString },

    #[error("unknown field {0:?}")]
    UnknownField(BString),

    #[error("unknown node type {0:?}")]
    UnknownType(BString),

    #[error("multiple type fields")]
    MultipleTypes,

    #[error("unexpected field {field:?} in {kind} node")]
    MisplacedField { field: BString, kind: NodeKind },

    #[error("duplicate field {field:?} in {kind} node")]
    DuplicateField { field: BString, kind: NodeKind },

    #[error("{kind} node is missing field {field:?}")]
    MissingField { field: &'static str, kind: NodeKind },

    #[error("invalid entry name {0:?}")]
    InvalidName(BString),

    #[error("entry {name:?} does not sort after {previous:?}")]
    UnsortedEntry { name: BString, previous: BString },

    #[error("duplicate entry {0:?}")]
    DuplicateEntry(BString),

    #[error("{context} too long: {length} exceeds maximum {max}")]
    TooLong {
        context: &'static str,
        length: u64,
        max: u64,
    },

    #[error("non-zero padding")]
    NonZeroPadding,

    #[error("content length mismatch: declared {declared}, delivered {delivered}")]
    ContentLength { declared: u64, delivered: u64 },
}

#[derive(Error, Debug)]
pub enum NarError {
    #[error("input doesn't look like a Nix archive: got version {0:?}")]
    MalformedVersionToken(BString),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unexpected end of input")]
    UnexpectedEndOfInput,

    #[error("unsupported file type {file_type} at {path}")]
    UnsupportedFileType { path: PathBuf, file_type: String },

    #[error("IO error: {0}")]
    Io(io::Error),
}

impl NarError {
    pub(crate) fn from_wire(err: WireError, context: &'static str) -> Self {
        match err {
            WireError::UnexpectedEof => NarError::UnexpectedEndOfInput,
            WireError::TooLong { length, max } => ProtocolError::TooLong {
                context,
                length,
                max,
            }
            .into(),
            WireError::NonZeroPadding => ProtocolError::NonZeroPadding.into(),
            WireError::Io(err) => NarError::Io(err),
        }
    }
}

impl From<io::Error> for NarError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            NarError::UnexpectedEndOfInput
        } else {
            NarError::Io(err)
        }
    }
}

impl From<WireError> for NarError {
    fn from(err: WireError) -> Self {
        NarError::from_wire(err, "string")
    }
}
