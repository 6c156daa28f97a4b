use std::io::Read;

use crate::ByteString;
use crate::error::{NarError, NodeKind, ProtocolError};

use super::{ContentRead, ContentReader, DirectorySink, NarSink, parse_nar};

/// A NAR held entirely in memory.
///
/// Mostly useful for tests and small archives. Directory entries are kept in
/// the order they were parsed or built in.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub enum NarNode {
    File {
        executable: bool,
        contents: ByteString,
    },
    Symlink {
        target: ByteString,
    },
    Directory {
        entries: Vec<(ByteString, NarNode)>,
    },
}

impl NarNode {
    /// Replay this tree into `sink`.
    pub fn write_to<S: NarSink>(&self, sink: S) -> Result<(), S::Error> {
        match self {
            NarNode::File {
                executable,
                contents,
            } => {
                let mut reader = ContentReader::new(&contents[..], contents.len() as u64);
                sink.file(*executable, &mut reader)
            }
            NarNode::Symlink { target } => sink.symlink(target.clone()),
            NarNode::Directory { entries } => {
                let mut dir = sink.directory()?;
                for (name, node) in entries {
                    node.write_to(dir.entry(name.clone()))?;
                }
                dir.close()
            }
        }
    }

    /// Parse a complete archive into memory.
    pub fn parse<R: Read + ?Sized>(reader: &mut R) -> Result<NarNode, NarError> {
        let mut root = None;
        parse_nar(reader, NarNodeBuilder::new(&mut root))?;
        root.ok_or_else(|| untyped().into())
    }
}

fn untyped() -> ProtocolError {
    ProtocolError::MissingField {
        field: "type",
        kind: NodeKind::Untyped,
    }
}

/// A sink that materializes what it is given as a [`NarNode`].
///
/// The node lands in the slot passed to [`new`](Self::new). A slot that is
/// still `None` afterwards means the archive node never declared its type.
#[derive(Debug)]
pub struct NarNodeBuilder<'a> {
    slot: &'a mut Option<NarNode>,
}

impl<'a> NarNodeBuilder<'a> {
    pub fn new(slot: &'a mut Option<NarNode>) -> Self {
        Self { slot }
    }
}

impl<'a> NarSink for NarNodeBuilder<'a> {
    type Error = NarError;
    type Directory = NarDirectoryBuilder<'a>;

    fn file<C>(self, executable: bool, contents: &mut C) -> Result<(), NarError>
    where
        C: ContentRead + ?Sized,
    {
        let mut buf = Vec::new();
        contents.read_to_end(&mut buf)?;
        *self.slot = Some(NarNode::File {
            executable,
            contents: buf.into(),
        });
        Ok(())
    }

    fn directory(self) -> Result<NarDirectoryBuilder<'a>, NarError> {
        Ok(NarDirectoryBuilder {
            slot: self.slot,
            entries: Vec::new(),
        })
    }

    fn symlink(self, target: ByteString) -> Result<(), NarError> {
        *self.slot = Some(NarNode::Symlink { target });
        Ok(())
    }
}

#[derive(Debug)]
pub struct NarDirectoryBuilder<'a> {
    slot: &'a mut Option<NarNode>,
    entries: Vec<(ByteString, Option<NarNode>)>,
}

impl<'a> DirectorySink for NarDirectoryBuilder<'a> {
    type Error = NarError;
    type Entry<'b>
        = NarNodeBuilder<'b>
    where
        Self: 'b;

    fn entry(&mut self, name: ByteString) -> NarNodeBuilder<'_> {
        self.entries.push((name, None));
        let last = self.entries.len() - 1;
        NarNodeBuilder::new(&mut self.entries[last].1)
    }

    fn close(self) -> Result<(), NarError> {
        let entries = self
            .entries
            .into_iter()
            .map(|(name, node)| node.map(|node| (name, node)).ok_or_else(untyped))
            .collect::<Result<Vec<_>, _>>()?;
        *self.slot = Some(NarNode::Directory { entries });
        Ok(())
    }
}
