// SPDX-FileCopyrightText: 2024 griff
// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: EUPL-1.2 OR MIT
//
// This crate is derived from Nix.rs (https://github.com/griff/Nix.rs)
// Upstream commit: f5d129b71bb30b476ce21e6da2a53dcb28607a89

//! NAR (Nix ARchive) format handling.
//!
//! This crate packs filesystem trees into NAR and unpacks them again. A NAR
//! is a canonical serialization: the same tree always produces the same
//! bytes, which is what makes archive hashes usable as identities.
//!
//! Everything is built on two traits. [`archive::parse_nar`] drives a
//! [`archive::NarSink`] from a byte stream, and producers such as
//! [`archive::dump`] or [`archive::NarNode::write_to`] drive one from
//! their own data. [`archive::NarWriter`], [`archive::NarRestorer`] and
//! [`archive::NarNodeBuilder`] are the sinks shipped here.
//!
//! File contents are streamed through [`archive::ContentRead`] and never
//! buffered by the parser or writer.

pub use harmonia_utils_io::ByteString;

mod error;

pub mod archive;
pub mod hash;

pub use archive::{
    CASE_HACK_SUFFIX, ContentRead, DirectorySink, DumpOptions, NarNode, NarRestorer, NarSink,
    NarWriteError, NarWriter, RestoreOptions, copy_nar, dump, parse_nar, restore, write_nar,
};
pub use error::{NarError, NodeKind, ProtocolError};
pub use hash::{NarHash, hash_nar_node, nar_hash};

#[cfg(test)]
pub mod test;
