use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::resource::ByteRange;

/// A lazy, re-openable view over the bytes of a source.
///
/// Nothing is opened until [InputAccessor::open] is called, and every call
/// returns a fresh reader starting at the first byte of the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputAccessor {
    /// No content, e.g. directories and groupings.
    Empty,
    /// The whole file at `path`.
    File { path: PathBuf },
    /// A range inside the file at `path`.
    Range { path: PathBuf, range: ByteRange },
}

impl InputAccessor {
    pub async fn open(&self) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        match self {
            InputAccessor::Empty => Ok(Box::new(tokio::io::empty())),
            InputAccessor::File { path } => Ok(Box::new(tokio::fs::File::open(path).await?)),
            InputAccessor::Range { path, range } => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(range.start())).await?;
                Ok(Box::new(file.take(range.size())))
            }
        }
    }

    /// Reads the whole view into memory.
    pub async fn read_to_end(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open().await?.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// The file this view reads from, if any.
    pub fn backing_path(&self) -> Option<&Path> {
        match self {
            InputAccessor::Empty => None,
            InputAccessor::File { path } | InputAccessor::Range { path, .. } => Some(path),
        }
    }

    /// A view over `size` bytes starting `offset` bytes into this one.
    ///
    /// For whole-file views the caller is responsible for checking the
    /// requested range against the file's length.
    pub(crate) fn slice(&self, offset: u64, size: u64) -> Option<InputAccessor> {
        match self {
            InputAccessor::Empty => None,
            InputAccessor::File { path } => Some(InputAccessor::Range {
                path: path.clone(),
                range: ByteRange::new(offset, size)?,
            }),
            InputAccessor::Range { path, range } => Some(InputAccessor::Range {
                path: path.clone(),
                range: range.sub_range(offset, size)?,
            }),
        }
    }
}
