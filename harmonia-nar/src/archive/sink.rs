use crate::ByteString;
use crate::error::NarError;

use super::ContentRead;

/// Destination for one node of a NAR.
///
/// The capabilities take `self` by value, so exactly one of them is invoked
/// per sink. [`parse_nar`](super::parse_nar) drives a sink from an archive,
/// while [`NarWriter`](super::NarWriter) and
/// [`NarRestorer`](super::NarRestorer) implement it to produce an archive or
/// a filesystem tree respectively.
pub trait NarSink: Sized {
    type Error: From<NarError>;
    type Directory: DirectorySink<Error = Self::Error>;

    /// Consume a regular file.
    ///
    /// The sink may stop reading `contents` early. Whoever supplied the
    /// reader is responsible for skipping what is left.
    fn file<C>(self, executable: bool, contents: &mut C) -> Result<(), Self::Error>
    where
        C: ContentRead + ?Sized;

    fn directory(self) -> Result<Self::Directory, Self::Error>;

    fn symlink(self, target: ByteString) -> Result<(), Self::Error>;
}

/// Destination for the entries of a directory opened by
/// [`NarSink::directory`].
///
/// Entries are handed out in archive order. Dropping a directory sink
/// releases whatever it holds; [`close`](Self::close) is the success path.
pub trait DirectorySink: Sized {
    type Error: From<NarError>;
    type Entry<'a>: NarSink<Error = Self::Error>
    where
        Self: 'a;

    /// Start the entry called `name`.
    ///
    /// Never fails directly. A sink that cannot accept the entry returns a
    /// child that reports the failure on its first capability call.
    fn entry(&mut self, name: ByteString) -> Self::Entry<'_>;

    fn close(self) -> Result<(), Self::Error>;
}
