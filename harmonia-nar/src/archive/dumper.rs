use std::fs::{self, File, FileType};
use std::io;
use std::os::unix::ffi::OsStrExt as _;
use std::os::unix::fs::{FileTypeExt as _, PermissionsExt as _};
use std::path::{Path, PathBuf};

use bstr::ByteSlice as _;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::ByteString;
use crate::error::{NarError, ProtocolError};

use super::{ContentReader, DirectorySink, NarSink, strip_case_hack};

/// Settings for turning a filesystem tree into NAR.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    use_case_hack: bool,
}

impl DumpOptions {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        let use_case_hack = true;
        #[cfg(not(target_os = "macos"))]
        let use_case_hack = false;
        Self { use_case_hack }
    }

    /// Strip suffixes added by a restore with the case hack enabled.
    pub fn use_case_hack(mut self, use_case_hack: bool) -> Self {
        self.use_case_hack = use_case_hack;
        self
    }

    /// Feed the tree rooted at `path` into `sink`.
    ///
    /// Symlinks are never followed. Directory entries are delivered sorted by
    /// their raw name bytes.
    pub fn dump<P, S>(&self, path: P, sink: S) -> Result<(), S::Error>
    where
        P: AsRef<Path>,
        S: NarSink,
    {
        let path = path.as_ref();
        debug!("Dumping {}", path.display());
        self.dump_path(path, sink)
    }

    fn dump_path<S: NarSink>(&self, path: &Path, sink: S) -> Result<(), S::Error> {
        let metadata = fs::symlink_metadata(path).map_err(NarError::from)?;
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(NarError::from)?;
            trace!("Dumping symlink {}", path.display());
            sink.symlink(ByteString::copy_from_slice(target.as_os_str().as_bytes()))
        } else if file_type.is_file() {
            let executable = metadata.permissions().mode() & 0o100 != 0;
            let file = File::open(path).map_err(NarError::from)?;
            trace!("Dumping file {} of {} bytes", path.display(), metadata.len());
            sink.file(executable, &mut ContentReader::new(file, metadata.len()))
        } else if file_type.is_dir() {
            let entries = self.read_entries(path)?;
            let mut dir = sink.directory()?;
            for (name, entry_path) in entries {
                self.dump_path(&entry_path, dir.entry(name))?;
            }
            dir.close()
        } else {
            Err(NarError::UnsupportedFileType {
                path: path.to_owned(),
                file_type: describe(&file_type).to_owned(),
            }
            .into())
        }
    }

    fn read_entries(&self, path: &Path) -> Result<Vec<(ByteString, PathBuf)>, NarError> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            let mut name = ByteString::copy_from_slice(entry.file_name().as_bytes());
            if self.use_case_hack {
                name = strip_case_hack(name);
            }
            entries.push((name, entry.into_path()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(ProtocolError::DuplicateEntry(pair[0].0.as_bstr().into()).into());
        }
        Ok(entries)
    }
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(file_type: &FileType) -> &'static str {
    if file_type.is_socket() {
        "socket"
    } else if file_type.is_fifo() {
        "fifo"
    } else if file_type.is_block_device() {
        "block device"
    } else if file_type.is_char_device() {
        "character device"
    } else {
        "unknown"
    }
}

/// Feed the tree rooted at `path` into `sink` with default [`DumpOptions`].
pub fn dump<P, S>(path: P, sink: S) -> Result<(), S::Error>
where
    P: AsRef<Path>,
    S: NarSink,
{
    DumpOptions::new().dump(path, sink)
}
