use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write as _};
use std::os::unix::ffi::OsStrExt as _;
use std::os::unix::fs::OpenOptionsExt as _;
use std::path::{Path, PathBuf};

use bstr::ByteSlice as _;
use derive_more::Display;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ByteString;
use crate::error::NarError;

use super::{
    CASE_HACK_SUFFIX, ContentRead, DirectorySink, NarSink, parse_nar, validate_name,
    validate_target,
};

#[derive(Display, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum NarWriteOperation {
    #[display("creating directory")]
    CreateDirectory,
    #[display("creating symlink")]
    CreateSymlink,
    #[display("creating file")]
    CreateFile,
    #[display("writing file")]
    WriteFile,
}

#[derive(Error, Debug)]
pub enum NarWriteError {
    #[error("{operation} {}: {source}", .path.display())]
    Io {
        operation: NarWriteOperation,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Nar(#[from] NarError),
}

impl NarWriteError {
    pub fn new(operation: NarWriteOperation, path: PathBuf, source: io::Error) -> Self {
        Self::Io {
            operation,
            path,
            source,
        }
    }
    pub fn create_dir_error(path: PathBuf, err: io::Error) -> Self {
        Self::new(NarWriteOperation::CreateDirectory, path, err)
    }
    pub fn create_symlink_error(path: PathBuf, err: io::Error) -> Self {
        Self::new(NarWriteOperation::CreateSymlink, path, err)
    }
    pub fn create_file_error(path: PathBuf, err: io::Error) -> Self {
        Self::new(NarWriteOperation::CreateFile, path, err)
    }
    pub fn write_file_error(path: PathBuf, err: io::Error) -> Self {
        Self::new(NarWriteOperation::WriteFile, path, err)
    }
}

/// Materializes a node at `path`, which must not exist yet.
///
/// Nothing is ever overwritten. On failure whatever was already created is
/// left in place.
#[derive(Debug)]
pub struct NarRestorer {
    path: PathBuf,
    use_case_hack: bool,
    invalid_name: Option<NarError>,
}

impl NarRestorer {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::new_restorer(path, false)
    }

    pub fn with_case_hack<P: Into<PathBuf>>(path: P) -> Self {
        Self::new_restorer(path, true)
    }

    fn new_restorer<P>(path: P, use_case_hack: bool) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            path: path.into(),
            use_case_hack,
            invalid_name: None,
        }
    }

    fn into_path(self) -> Result<PathBuf, NarWriteError> {
        match self.invalid_name {
            Some(err) => Err(err.into()),
            None => Ok(self.path),
        }
    }
}

impl NarSink for NarRestorer {
    type Error = NarWriteError;
    type Directory = NarDirectoryRestorer;

    fn file<C>(self, executable: bool, contents: &mut C) -> Result<(), NarWriteError>
    where
        C: ContentRead + ?Sized,
    {
        let path = self.into_path()?;
        trace!("Creating file {}", path.display());
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(if executable { 0o777 } else { 0o666 })
            .open(&path)
            .map_err(|err| NarWriteError::create_file_error(path.clone(), err))?;

        let mut buf = [0u8; 8192];
        loop {
            let n = match contents.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(NarError::from(err).into()),
            };
            file.write_all(&buf[..n])
                .map_err(|err| NarWriteError::write_file_error(path.clone(), err))?;
        }
        file.flush()
            .map_err(|err| NarWriteError::write_file_error(path, err))
    }

    fn directory(self) -> Result<NarDirectoryRestorer, NarWriteError> {
        let use_case_hack = self.use_case_hack;
        let path = self.into_path()?;
        trace!("Creating directory {}", path.display());
        fs::create_dir(&path).map_err(|err| NarWriteError::create_dir_error(path.clone(), err))?;
        Ok(NarDirectoryRestorer {
            path,
            use_case_hack,
            entries: Entries::default(),
        })
    }

    fn symlink(self, target: ByteString) -> Result<(), NarWriteError> {
        let path = self.into_path()?;
        validate_target(&target).map_err(NarError::from)?;
        trace!("Creating symlink {} -> {}", path.display(), target.as_bstr());
        std::os::unix::fs::symlink(OsStr::from_bytes(&target), &path)
            .map_err(|err| NarWriteError::create_symlink_error(path, err))
    }
}

/// Creates the entries of a directory made by [`NarRestorer::directory`].
#[derive(Debug)]
pub struct NarDirectoryRestorer {
    path: PathBuf,
    use_case_hack: bool,
    entries: Entries,
}

impl NarDirectoryRestorer {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DirectorySink for NarDirectoryRestorer {
    type Error = NarWriteError;
    type Entry<'a>
        = NarRestorer
    where
        Self: 'a;

    fn entry(&mut self, name: ByteString) -> NarRestorer {
        let invalid_name = validate_name(&name).err().map(NarError::from);
        let name = if self.use_case_hack && invalid_name.is_none() {
            self.entries.hack_name(name)
        } else {
            name
        };
        NarRestorer {
            path: self.path.join(OsStr::from_bytes(&name)),
            use_case_hack: self.use_case_hack,
            invalid_name,
        }
    }

    fn close(self) -> Result<(), NarWriteError> {
        Ok(())
    }
}

/// A name together with its lowercase form, compared on the latter.
struct CIString(ByteString, String);

impl PartialEq for CIString {
    fn eq(&self, other: &Self) -> bool {
        self.1.eq(&other.1)
    }
}

impl fmt::Display for CIString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_bstr())
    }
}

impl fmt::Debug for CIString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.as_bstr())
    }
}

impl Eq for CIString {}

impl std::hash::Hash for CIString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.1.hash(state)
    }
}

#[derive(Default, Debug)]
struct Entries(HashMap<CIString, u32>);

impl Entries {
    fn hack_name(&mut self, name: ByteString) -> ByteString {
        use std::collections::hash_map::Entry;

        let lower = String::from_utf8_lossy(&name).to_lowercase();
        match self.0.entry(CIString(name.clone(), lower)) {
            Entry::Occupied(mut o) => {
                debug!("case collision between '{}' and '{}'", o.key(), name.as_bstr());
                let idx = o.get() + 1;
                o.insert(idx);
                let mut new_name = name.to_vec();
                new_name.extend_from_slice(format!("{CASE_HACK_SUFFIX}{idx}").as_bytes());
                ByteString::from(new_name)
            }
            Entry::Vacant(v) => {
                v.insert(0);
                name
            }
        }
    }
}

/// Settings for unpacking NAR onto the filesystem.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    use_case_hack: bool,
}

impl RestoreOptions {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        let use_case_hack = true;
        #[cfg(not(target_os = "macos"))]
        let use_case_hack = false;
        Self { use_case_hack }
    }

    /// Rename entries whose names only differ by case from an earlier sibling
    /// by appending [`CASE_HACK_SUFFIX`] and a counter.
    pub fn use_case_hack(mut self, use_case_hack: bool) -> Self {
        self.use_case_hack = use_case_hack;
        self
    }

    pub fn restorer<P: Into<PathBuf>>(&self, path: P) -> NarRestorer {
        NarRestorer::new_restorer(path, self.use_case_hack)
    }

    pub fn restore<R, P>(&self, reader: &mut R, path: P) -> Result<(), NarWriteError>
    where
        R: Read + ?Sized,
        P: Into<PathBuf>,
    {
        let restorer = self.restorer(path);
        debug!("Restoring to {}", restorer.path.display());
        parse_nar(reader, restorer)
    }
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Unpack the archive read from `reader` to `path` with default
/// [`RestoreOptions`].
pub fn restore<R, P>(reader: &mut R, path: P) -> Result<(), NarWriteError>
where
    R: Read + ?Sized,
    P: Into<PathBuf>,
{
    RestoreOptions::new().restore(reader, path)
}
