use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::file::display_name;
use super::{Aggregate, Identity, Named, SourceCore, SourceKind, Unit};
use crate::input::InputAccessor;
use crate::resource::FsMetadata;

/// A directory, either scanned from the local filesystem or virtual.
///
/// Virtual directories have no filesystem counterpart and no metadata
/// snapshot. Their children are whatever callers add.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySource {
    core: SourceCore,
    path: PathBuf,
    name: String,
    metadata: Option<FsMetadata>,
}

impl DirectorySource {
    pub(crate) fn new(path: &Path, metadata: FsMetadata) -> Self {
        Self {
            core: SourceCore::new(),
            name: display_name(path),
            path: path.to_path_buf(),
            metadata: Some(metadata),
        }
    }

    pub(crate) fn new_virtual(path: &Path) -> Self {
        Self {
            core: SourceCore::new(),
            name: display_name(path),
            path: path.to_path_buf(),
            metadata: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> Option<&FsMetadata> {
        self.metadata.as_ref()
    }

    pub fn is_virtual(&self) -> bool {
        self.metadata.is_none()
    }
}

impl Unit for DirectorySource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Directory
    }

    fn identity(&self) -> Identity {
        Identity::Directory(match &self.metadata {
            Some(metadata) => metadata.canonical_path().to_path_buf(),
            None => self.path.clone(),
        })
    }

    fn input(&self) -> InputAccessor {
        InputAccessor::Empty
    }
}

impl Aggregate for DirectorySource {}

impl Named for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }
}
