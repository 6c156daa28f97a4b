use std::io::Read;

use bstr::ByteSlice as _;
use harmonia_utils_io::wire::{self, WireError};
use tracing::{debug, trace};

use crate::ByteString;
use crate::error::{NarError, NodeKind, ProtocolError};

use super::{
    ContentReader, DirectorySink, MAX_NAME_LEN, MAX_TARGET_LEN, MAX_TOKEN_LEN,
    NAR_VERSION_MAGIC_1, NarSink, validate_name,
};

fn read_token<R: Read + ?Sized>(reader: &mut R) -> Result<ByteString, NarError> {
    wire::read_bytes(reader, MAX_TOKEN_LEN).map_err(|err| NarError::from_wire(err, "token"))
}

fn expect_token<R: Read + ?Sized>(reader: &mut R, expected: &[u8]) -> Result<(), NarError> {
    let actual = read_token(reader)?;
    if actual != expected {
        return Err(ProtocolError::UnexpectedToken {
            expected: expected.into(),
            actual: actual.as_bstr().into(),
        }
        .into());
    }
    Ok(())
}

/// Parser state for a single node, from its `(` up to the matching `)`.
enum NodeState<S: NarSink> {
    Untyped(S),
    Regular { sink: S, executable: bool },
    Symlink(S),
    /// `type directory` seen, but no entry yet.
    Directory(S),
    OpenDirectory(S::Directory),
    /// The sink has been handed its file or symlink; only `)` may follow.
    Done(NodeKind),
}

impl<S: NarSink> NodeState<S> {
    fn kind(&self) -> NodeKind {
        match self {
            NodeState::Untyped(_) => NodeKind::Untyped,
            NodeState::Regular { .. } => NodeKind::Regular,
            NodeState::Symlink(_) => NodeKind::Symlink,
            NodeState::Directory(_) | NodeState::OpenDirectory(_) => NodeKind::Directory,
            NodeState::Done(kind) => *kind,
        }
    }

    fn finish(self) -> Result<(), S::Error> {
        match self {
            NodeState::Untyped(_) | NodeState::Done(_) => Ok(()),
            NodeState::Regular { .. } => Err(NarError::from(ProtocolError::MissingField {
                field: "contents",
                kind: NodeKind::Regular,
            })
            .into()),
            NodeState::Symlink(_) => Err(NarError::from(ProtocolError::MissingField {
                field: "target",
                kind: NodeKind::Symlink,
            })
            .into()),
            NodeState::Directory(sink) => sink.directory()?.close(),
            NodeState::OpenDirectory(dir) => dir.close(),
        }
    }
}

fn misplaced(field: &[u8], kind: NodeKind) -> NarError {
    ProtocolError::MisplacedField {
        field: field.into(),
        kind,
    }
    .into()
}

fn duplicate(field: &[u8], kind: NodeKind) -> NarError {
    ProtocolError::DuplicateField {
        field: field.into(),
        kind,
    }
    .into()
}

fn parse_node<R, S>(reader: &mut R, sink: S) -> Result<(), S::Error>
where
    R: Read + ?Sized,
    S: NarSink,
{
    expect_token(reader, b"(")?;
    let mut state = NodeState::Untyped(sink);
    loop {
        let field = read_token(reader)?;
        trace!("Parsing field {} in {} node", field.as_bstr(), state.kind());
        state = match (&field[..], state) {
            (b")", state) => return state.finish(),
            (b"type", NodeState::Untyped(sink)) => {
                let node_type = read_token(reader)?;
                match &node_type[..] {
                    b"regular" => NodeState::Regular {
                        sink,
                        executable: false,
                    },
                    b"directory" => NodeState::Directory(sink),
                    b"symlink" => NodeState::Symlink(sink),
                    other => {
                        return Err(NarError::from(ProtocolError::UnknownType(
                            other.as_bstr().into(),
                        ))
                        .into());
                    }
                }
            }
            (b"type", _) => return Err(NarError::from(ProtocolError::MultipleTypes).into()),
            (
                b"executable",
                NodeState::Regular {
                    sink,
                    executable: false,
                },
            ) => {
                // The value is always the empty string, but is not checked.
                read_token(reader)?;
                NodeState::Regular {
                    sink,
                    executable: true,
                }
            }
            (b"executable", NodeState::Regular { .. }) => {
                return Err(duplicate(&field, NodeKind::Regular).into());
            }
            (b"contents", NodeState::Regular { sink, executable }) => {
                parse_contents(reader, sink, executable)?;
                NodeState::Done(NodeKind::Regular)
            }
            (b"contents", NodeState::Done(NodeKind::Regular)) => {
                return Err(duplicate(&field, NodeKind::Regular).into());
            }
            (b"target", NodeState::Symlink(sink)) => {
                let target = wire::read_bytes(reader, MAX_TARGET_LEN)
                    .map_err(|err| NarError::from_wire(err, "symlink target"))?;
                sink.symlink(target)?;
                NodeState::Done(NodeKind::Symlink)
            }
            (b"target", NodeState::Done(NodeKind::Symlink)) => {
                return Err(duplicate(&field, NodeKind::Symlink).into());
            }
            (b"entry", NodeState::Directory(sink)) => {
                let name = parse_entry_name(reader)?;
                let mut dir = sink.directory()?;
                parse_entry(reader, &mut dir, name)?;
                NodeState::OpenDirectory(dir)
            }
            (b"entry", NodeState::OpenDirectory(mut dir)) => {
                let name = parse_entry_name(reader)?;
                parse_entry(reader, &mut dir, name)?;
                NodeState::OpenDirectory(dir)
            }
            (b"executable" | b"contents" | b"target" | b"entry", state) => {
                return Err(misplaced(&field, state.kind()).into());
            }
            (other, _) => {
                return Err(NarError::from(ProtocolError::UnknownField(other.as_bstr().into())).into());
            }
        };
    }
}

/// Read `( name <name> node` of a directory entry.
///
/// The name is complete and validated before the directory sink hears
/// about the entry.
fn parse_entry_name<R: Read + ?Sized>(reader: &mut R) -> Result<ByteString, NarError> {
    expect_token(reader, b"(")?;
    expect_token(reader, b"name")?;
    let name = wire::read_bytes(reader, MAX_NAME_LEN)
        .map_err(|err| NarError::from_wire(err, "entry name"))?;
    validate_name(&name)?;
    expect_token(reader, b"node")?;
    Ok(name)
}

fn parse_entry<R, D>(reader: &mut R, dir: &mut D, name: ByteString) -> Result<(), D::Error>
where
    R: Read + ?Sized,
    D: DirectorySink,
{
    parse_node(reader, dir.entry(name))?;
    expect_token(reader, b")")?;
    Ok(())
}

fn parse_contents<R, S>(reader: &mut R, sink: S, executable: bool) -> Result<(), S::Error>
where
    R: Read + ?Sized,
    S: NarSink,
{
    let size = wire::read_u64(reader).map_err(NarError::from)?;
    trace!("Parsing file of {size} bytes, executable: {executable}");
    let mut contents = ContentReader::new(&mut *reader, size);
    sink.file(executable, &mut contents)?;
    // Skip whatever the sink left unread so the next token lines up.
    let skipped = contents.drain().map_err(NarError::from)?;
    if skipped > 0 {
        trace!("Skipped {skipped} unread content bytes");
    }
    wire::read_padding(reader, size).map_err(NarError::from)?;
    Ok(())
}

/// Parse a complete archive from `reader`, replaying it into `sink`.
///
/// Entry order and uniqueness inside a directory are not checked; that is
/// left to sinks that care, such as [`NarWriter`](super::NarWriter).
pub fn parse_nar<R, S>(reader: &mut R, sink: S) -> Result<(), S::Error>
where
    R: Read + ?Sized,
    S: NarSink,
{
    let version = match wire::read_bytes(reader, MAX_TOKEN_LEN) {
        Ok(version) => version,
        // Too long to be a token, so report the raw length prefix instead.
        Err(WireError::TooLong { length, .. }) => {
            return Err(NarError::MalformedVersionToken(length.to_le_bytes()[..].into()).into());
        }
        Err(err) => return Err(NarError::from_wire(err, "version").into()),
    };
    if version != NAR_VERSION_MAGIC_1 {
        return Err(NarError::MalformedVersionToken(version.as_bstr().into()).into());
    }
    parse_node(reader, sink)?;
    debug!("Parsed NAR");
    Ok(())
}


#[cfg(test)]
mod proptests {
    use std::io::Cursor;

    use harmonia_utils_test::pretty_prop_assert_eq;
    use proptest::prelude::*;

    use crate::archive::{NarNode, write_nar};
    use crate::test::arbitrary::archive::arb_nar_node;

    proptest! {
        #[test]
        fn proptest_write_parse(node in arb_nar_node(8, 256, 10)) {
            let mut nar = Vec::new();
            write_nar(&mut nar, &node).unwrap();
            prop_assert_eq!(nar.len() % 8, 0);
            let parsed = NarNode::parse(&mut Cursor::new(&nar)).unwrap();
            pretty_prop_assert_eq!(parsed, node);
        }

        #[test]
        fn proptest_truncated_is_short_input(
            node in arb_nar_node(4, 32, 4),
            cut in any::<prop::sample::Index>(),
        ) {
            let mut nar = Vec::new();
            write_nar(&mut nar, &node).unwrap();
            nar.truncate(cut.index(nar.len()));
            let err = NarNode::parse(&mut Cursor::new(&nar)).unwrap_err();
            prop_assert!(
                matches!(err, crate::NarError::UnexpectedEndOfInput),
                "{:?}",
                err
            );
        }
    }
}
