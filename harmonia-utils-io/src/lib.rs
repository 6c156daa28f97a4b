// SPDX-FileCopyrightText: 2024 griff
// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: EUPL-1.2 OR MIT
//
// This crate is derived from Nix.rs (https://github.com/griff/Nix.rs)
// Upstream commit: f5d129b71bb30b476ce21e6da2a53dcb28607a89

//! Blocking I/O utilities for Harmonia.
//!
//! The [`wire`] module holds the two primitives every Nix byte format is
//! built from: little-endian `u64` integers and length-prefixed byte strings
//! padded with zeros to an 8-byte boundary.

pub mod wire;

/// Byte string type alias.
pub type ByteString = bytes::Bytes;
