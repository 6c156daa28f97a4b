//! The NAR grammar:
//!
//! ```plain
//! archive ::= "nix-archive-1" node
//!
//! node ::= "(" "type" "symlink" "target" string ")"
//!      ||= "(" "type" "regular" ("executable" "")? "contents" string ")"
//!      ||= "(" "type" "directory" entry* ")"
//!
//! entry ::= "entry" "(" "name" string "node" node ")"
//! ```
//!
//! Every token is a padded byte string as written by
//! [`harmonia_utils_io::wire::write_bytes`].

use bstr::ByteSlice as _;

use crate::ByteString;
use crate::error::ProtocolError;

mod content;
mod dumper;
mod node;
mod parser;
mod restorer;
mod sink;
mod writer;

pub use content::{ContentRead, ContentReader};
pub use dumper::{DumpOptions, dump};
pub use node::{NarDirectoryBuilder, NarNode, NarNodeBuilder};
pub use parser::parse_nar;
pub use restorer::{
    NarDirectoryRestorer, NarRestorer, NarWriteError, NarWriteOperation, RestoreOptions, restore,
};
pub use sink::{DirectorySink, NarSink};
pub use writer::{NarDirectoryWriter, NarWriter, Nesting, copy_nar, write_nar};

pub const NAR_VERSION_MAGIC_1: &[u8] = b"nix-archive-1";

pub const CASE_HACK_SUFFIX: &str = "~nix~case~hack~";

/// Bound for grammar tokens such as `(`, `type` or `regular`.
pub const MAX_TOKEN_LEN: u64 = 32;
/// NAME_MAX on Linux.
pub const MAX_NAME_LEN: u64 = 255;
/// PATH_MAX on Linux, without the terminating NUL.
pub const MAX_TARGET_LEN: u64 = 4096 - 1;

pub(crate) fn validate_name(name: &[u8]) -> Result<(), ProtocolError> {
    if name.is_empty()
        || name == b"."
        || name == b".."
        || name.len() as u64 > MAX_NAME_LEN
        || name.contains(&b'/')
        || name.contains(&0)
    {
        return Err(ProtocolError::InvalidName(name.into()));
    }
    Ok(())
}

pub(crate) fn validate_target(target: &[u8]) -> Result<(), ProtocolError> {
    if target.len() as u64 > MAX_TARGET_LEN {
        return Err(ProtocolError::TooLong {
            context: "symlink target",
            length: target.len() as u64,
            max: MAX_TARGET_LEN,
        });
    }
    Ok(())
}

/// Strip a case hack suffix added by [`RestoreOptions::use_case_hack`].
pub(crate) fn strip_case_hack(name: ByteString) -> ByteString {
    match name.find(CASE_HACK_SUFFIX) {
        Some(pos) => name.slice(..pos),
        None => name,
    }
}

#[cfg(test)]
pub(crate) mod test_data;
