//! Value types describing where content lives: byte ranges and snapshots of
//! filesystem metadata.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A contiguous range of bytes, relative to some enclosing content.
///
/// The end offset is exclusive: `end() == start() + size()`. A range can
/// always compute its end without overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    start: u64,
    size: u64,
}

impl ByteRange {
    /// Returns None if `start + size` doesn't fit into a u64.
    pub fn new(start: u64, size: u64) -> Option<Self> {
        start.checked_add(size)?;
        Some(Self { start, size })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    /// Narrows this range to `size` bytes starting at `offset` bytes into it.
    /// Returns None if the requested range doesn't lie fully inside.
    pub fn sub_range(&self, offset: u64, size: u64) -> Option<Self> {
        let end = offset.checked_add(size)?;
        if end > self.size {
            return None;
        }
        Self::new(self.start + offset, size)
    }
}

/// Immutable snapshot of a filesystem object's metadata, taken at
/// construction time.
///
/// Only attached to sources actually backed by something on the local
/// filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsMetadata {
    canonical_path: PathBuf,
    exists: bool,
    readable: bool,
    hidden: bool,
    special: bool,
    directory: bool,
    size: u64,
    modified: Option<SystemTime>,
}

impl FsMetadata {
    /// Captures the metadata for `path`, following symlinks.
    ///
    /// A path that doesn't resolve yields a snapshot with `exists() == false`
    /// rather than an error. Other I/O failures are returned.
    pub async fn capture(path: &Path) -> io::Result<Self> {
        let canonical_path = match tokio::fs::canonicalize(path).await {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::missing(path));
            }
            Err(e) => return Err(e),
        };

        let metadata = tokio::fs::metadata(&canonical_path).await?;
        let file_type = metadata.file_type();

        let readable = if file_type.is_dir() {
            tokio::fs::read_dir(&canonical_path).await.is_ok()
        } else {
            readability_check_options(file_type.is_file())
                .open(&canonical_path)
                .await
                .is_ok()
        };

        Ok(Self {
            hidden: is_hidden(path),
            exists: true,
            readable,
            special: !file_type.is_file() && !file_type.is_dir(),
            directory: file_type.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
            canonical_path,
        })
    }

    fn missing(path: &Path) -> Self {
        Self {
            canonical_path: path.to_path_buf(),
            exists: false,
            readable: false,
            hidden: is_hidden(path),
            special: false,
            directory: false,
            size: 0,
            modified: None,
        }
    }

    /// The canonical path, or the path as given if it doesn't exist.
    pub fn canonical_path(&self) -> &Path {
        &self.canonical_path
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn readable(&self) -> bool {
        self.readable
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Neither a regular file nor a directory (devices, fifos, sockets).
    pub fn special(&self) -> bool {
        self.special
    }

    pub fn is_directory(&self) -> bool {
        self.directory
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }
}

/// Options for checking a file can be opened for reading. Opening a fifo
/// blocks until a writer shows up, so anything but regular files is opened
/// non-blocking.
#[cfg(unix)]
fn readability_check_options(regular: bool) -> tokio::fs::OpenOptions {
    let mut options = tokio::fs::OpenOptions::new();
    options.read(true);
    if !regular {
        options.custom_flags(libc::O_NONBLOCK);
    }
    options
}

#[cfg(not(unix))]
fn readability_check_options(_regular: bool) -> tokio::fs::OpenOptions {
    let mut options = tokio::fs::OpenOptions::new();
    options.read(true);
    options
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}
