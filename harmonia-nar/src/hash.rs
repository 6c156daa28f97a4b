//! Computing the hash of a path's NAR serialization.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::archive::{NarNode, NarWriter, dump};
use crate::error::NarError;

/// A [`Write`] adapter that hashes every byte passed through it.
#[derive(Debug)]
pub struct HashingWriter<W> {
    inner: W,
    ctx: Sha256,
    written: u64,
}

impl<W> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            ctx: Sha256::new(),
            written: 0,
        }
    }

    /// Number of bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(self) -> (W, NarHash) {
        let hash = NarHash {
            digest: self.ctx.finalize().into(),
            size: self.written,
        };
        (self.inner, hash)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.ctx.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// SHA-256 digest and length of a NAR.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct NarHash {
    pub digest: [u8; 32],
    pub size: u64,
}

impl fmt::Display for NarHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", hex::encode(self.digest))
    }
}

/// Hash the NAR serialization of the tree at `path` without storing it.
pub fn nar_hash<P: AsRef<Path>>(path: P) -> Result<NarHash, NarError> {
    let mut out = HashingWriter::new(io::sink());
    dump(path, NarWriter::new(&mut out))?;
    Ok(out.finish().1)
}

/// Hash the NAR serialization of an in-memory tree.
pub fn hash_nar_node(node: &NarNode) -> Result<NarHash, NarError> {
    let mut out = HashingWriter::new(io::sink());
    node.write_to(NarWriter::new(&mut out))?;
    Ok(out.finish().1)
}
