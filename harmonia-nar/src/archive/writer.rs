use std::io::{self, Read, Write};

use bstr::ByteSlice as _;
use harmonia_utils_io::wire;
use tracing::trace;

use crate::ByteString;
use crate::error::{NarError, NodeKind, ProtocolError};

use super::{
    ContentRead, DirectorySink, NAR_VERSION_MAGIC_1, NarNode, NarSink, parse_nar, validate_name,
    validate_target,
};

fn write_tokens<W: Write + ?Sized>(out: &mut W, tokens: &[&[u8]]) -> io::Result<()> {
    for token in tokens {
        wire::write_bytes(out, token)?;
    }
    Ok(())
}

/// Where a writer's node sits in the archive.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Nesting {
    /// The archive's top-level node.
    Root,
    /// The node of a directory entry, which also closes the `entry (`
    /// wrapper once it is done.
    Entry,
}

impl Nesting {
    fn close<W: Write + ?Sized>(self, out: &mut W) -> Result<(), NarError> {
        if self == Nesting::Entry {
            wire::write_bytes(out, b")")?;
        }
        Ok(())
    }
}

/// Encodes the node it is given as NAR onto `out`.
///
/// [`NarWriter::new`] writes the archive header and returns the writer for
/// the root node. A writer that could not be set up is
/// [`NarWriter::Failed`] and returns the stored error from whichever
/// capability is called on it, without writing anything.
///
/// A root writer cannot tell whether it was ever used. [`copy_nar`] checks
/// that for a parsed archive.
#[derive(Debug)]
pub enum NarWriter<'w, W: ?Sized> {
    Active {
        out: &'w mut W,
        nesting: Nesting,
        /// Set once the node has been written in full.
        completed: Option<&'w mut bool>,
    },
    Failed(NarError),
}

fn untyped() -> NarError {
    ProtocolError::MissingField {
        field: "type",
        kind: NodeKind::Untyped,
    }
    .into()
}

fn finish_node<W: Write + ?Sized>(
    out: &mut W,
    nesting: Nesting,
    completed: Option<&mut bool>,
) -> Result<(), NarError> {
    nesting.close(out)?;
    if let Some(completed) = completed {
        *completed = true;
    }
    Ok(())
}

impl<'w, W: Write + ?Sized> NarWriter<'w, W> {
    pub fn new(out: &'w mut W) -> Self {
        Self::with_completion(out, None)
    }

    fn with_completion(out: &'w mut W, completed: Option<&'w mut bool>) -> Self {
        match wire::write_bytes(out, NAR_VERSION_MAGIC_1) {
            Ok(()) => NarWriter::Active {
                out,
                nesting: Nesting::Root,
                completed,
            },
            Err(err) => NarWriter::Failed(err.into()),
        }
    }

    #[allow(clippy::type_complexity)]
    fn into_active(self) -> Result<(&'w mut W, Nesting, Option<&'w mut bool>), NarError> {
        match self {
            NarWriter::Active {
                out,
                nesting,
                completed,
            } => Ok((out, nesting, completed)),
            NarWriter::Failed(err) => Err(err),
        }
    }
}

impl<'w, W: Write + ?Sized> NarSink for NarWriter<'w, W> {
    type Error = NarError;
    type Directory = NarDirectoryWriter<'w, W>;

    fn file<C>(self, executable: bool, contents: &mut C) -> Result<(), NarError>
    where
        C: ContentRead + ?Sized,
    {
        let (out, nesting, completed) = self.into_active()?;
        let declared = contents.remaining();
        trace!("Writing file of {declared} bytes, executable: {executable}");

        write_tokens(out, &[b"(", b"type", b"regular"])?;
        if executable {
            write_tokens(out, &[b"executable", b""])?;
        }
        wire::write_bytes(out, b"contents")?;
        wire::write_u64(out, declared)?;
        let delivered = io::copy(contents, out)?;
        if delivered < declared {
            return Err(NarError::UnexpectedEndOfInput);
        } else if delivered > declared {
            return Err(ProtocolError::ContentLength {
                declared,
                delivered,
            }
            .into());
        }
        wire::write_padding(out, declared)?;
        wire::write_bytes(out, b")")?;
        finish_node(out, nesting, completed)
    }

    fn directory(self) -> Result<NarDirectoryWriter<'w, W>, NarError> {
        let (out, nesting, completed) = self.into_active()?;
        write_tokens(out, &[b"(", b"type", b"directory"])?;
        Ok(NarDirectoryWriter {
            out,
            nesting,
            completed,
            previous: None,
            child_pending: false,
            child_completed: false,
        })
    }

    fn symlink(self, target: ByteString) -> Result<(), NarError> {
        let (out, nesting, completed) = self.into_active()?;
        validate_target(&target)?;
        trace!("Writing symlink to {}", target.as_bstr());
        write_tokens(
            out,
            &[b"(", b"type", b"symlink", b"target", &target, b")"],
        )?;
        finish_node(out, nesting, completed)
    }
}

/// Writes the entries of a directory opened by [`NarWriter::directory`].
///
/// Entry names must be valid path components and strictly increasing, which
/// is what makes the output canonical. Each entry handed out must be
/// written in full before the next entry or [`close`](DirectorySink::close).
#[derive(Debug)]
pub struct NarDirectoryWriter<'w, W: ?Sized> {
    out: &'w mut W,
    nesting: Nesting,
    completed: Option<&'w mut bool>,
    previous: Option<ByteString>,
    child_pending: bool,
    child_completed: bool,
}

impl<W: Write + ?Sized> NarDirectoryWriter<'_, W> {
    fn check_child(&self) -> Result<(), NarError> {
        if self.child_pending && !self.child_completed {
            return Err(untyped());
        }
        Ok(())
    }

    fn start_entry(&mut self, name: &ByteString) -> Result<(), NarError> {
        self.check_child()?;
        validate_name(name)?;
        if let Some(previous) = &self.previous {
            if name <= previous {
                return Err(ProtocolError::UnsortedEntry {
                    name: name.as_bstr().into(),
                    previous: previous.as_bstr().into(),
                }
                .into());
            }
        }
        trace!("Writing entry {}", name.as_bstr());
        write_tokens(self.out, &[b"entry", b"(", b"name", name, b"node"])?;
        Ok(())
    }
}

impl<'w, W: Write + ?Sized> DirectorySink for NarDirectoryWriter<'w, W> {
    type Error = NarError;
    type Entry<'a>
        = NarWriter<'a, W>
    where
        Self: 'a;

    fn entry(&mut self, name: ByteString) -> NarWriter<'_, W> {
        if let Err(err) = self.start_entry(&name) {
            return NarWriter::Failed(err);
        }
        self.previous = Some(name);
        self.child_pending = true;
        self.child_completed = false;
        NarWriter::Active {
            out: &mut *self.out,
            nesting: Nesting::Entry,
            completed: Some(&mut self.child_completed),
        }
    }

    fn close(self) -> Result<(), NarError> {
        self.check_child()?;
        wire::write_bytes(self.out, b")")?;
        finish_node(self.out, self.nesting, self.completed)
    }
}

/// Encode `node` as a complete archive.
pub fn write_nar<W: Write + ?Sized>(out: &mut W, node: &NarNode) -> Result<(), NarError> {
    node.write_to(NarWriter::new(out))
}

/// Re-encode the archive read from `reader` onto `out`.
///
/// The output is canonical, so this fails on archives with unsorted or
/// duplicate entries as well as on nodes that never declare a type.
pub fn copy_nar<R, W>(reader: &mut R, out: &mut W) -> Result<(), NarError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut completed = false;
    parse_nar(reader, NarWriter::with_completion(out, Some(&mut completed)))?;
    if !completed {
        return Err(untyped());
    }
    Ok(())
}
