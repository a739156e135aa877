use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Identity, Named, SourceCore, SourceKind, Unit};
use crate::input::InputAccessor;
use crate::resource::FsMetadata;

/// A file on the local filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    core: SourceCore,
    path: PathBuf,
    name: String,
    metadata: FsMetadata,
}

impl FileSource {
    pub(crate) fn new(path: &Path, metadata: FsMetadata) -> Self {
        Self {
            core: SourceCore::new(),
            name: display_name(path),
            path: path.to_path_buf(),
            metadata,
        }
    }

    /// The path as it was given to the factory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &FsMetadata {
        &self.metadata
    }

    pub fn size(&self) -> u64 {
        self.metadata.size()
    }
}

impl Unit for FileSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn identity(&self) -> Identity {
        Identity::File(self.metadata.canonical_path().to_path_buf())
    }

    fn input(&self) -> InputAccessor {
        InputAccessor::File {
            path: self.metadata.canonical_path().to_path_buf(),
        }
    }

    fn content_len(&self) -> Option<u64> {
        Some(self.size())
    }
}

impl Named for FileSource {
    fn name(&self) -> &str {
        &self.name
    }
}

/// The last path component, or the whole path if there is none (e.g. `/`).
pub(super) fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}
