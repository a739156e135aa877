use std::path::{Path, PathBuf};
use std::time::SystemTime;

use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

use super::{Aggregate, Identity, Named, SourceCore, SourceKind, Unit};
use crate::input::InputAccessor;
use crate::temp::Materialized;

/// A checksum value as recorded by an archive format itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Checksum {
    /// CRC-32 as stored by zip-style formats. The tar walk never produces
    /// it; readers of such formats set it on the [crate::factory::ArchiveEntryHeader]
    /// they pass to [crate::SourceFactory::source_for_archive_entry].
    Crc32(u32),
    /// The header checksum of a tar member.
    TarHeader(u32),
}

impl Checksum {
    /// Lowercase hex of the big-endian value.
    pub fn to_hex(&self) -> String {
        match self {
            Checksum::Crc32(v) | Checksum::TarHeader(v) => HEXLOWER.encode(&v.to_be_bytes()),
        }
    }
}

/// Archive-specific metadata attached to archive members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntryInfo {
    pub compressed_size: u64,
    /// Hex-encoded checksum, see [Checksum::to_hex].
    pub checksum: Option<String>,
    pub comment: Option<String>,
    pub modified: Option<SystemTime>,
}

/// A regular archive member, extracted into a temporary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveFileSource {
    core: SourceCore,
    path: String,
    name: String,
    backing: PathBuf,
    size: u64,
    info: ArchiveEntryInfo,
}

impl ArchiveFileSource {
    pub(crate) fn new(
        path: String,
        name: String,
        materialized: Materialized,
        info: ArchiveEntryInfo,
    ) -> Self {
        Self {
            core: SourceCore::new_ephemeral(),
            path,
            name,
            backing: materialized.path,
            size: materialized.size,
            info,
        }
    }

    /// The member's full name inside the archive.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Uncompressed size.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn info(&self) -> &ArchiveEntryInfo {
        &self.info
    }
}

impl Unit for ArchiveFileSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ArchiveFile
    }

    fn identity(&self) -> Identity {
        Identity::ArchiveFile {
            path: self.path.clone(),
            modified: self.info.modified,
            comment: self.info.comment.clone(),
            checksum: self.info.checksum.clone(),
        }
    }

    fn input(&self) -> InputAccessor {
        InputAccessor::File {
            path: self.backing.clone(),
        }
    }

    fn content_len(&self) -> Option<u64> {
        Some(self.size)
    }

    fn ephemeral_backing(&self) -> Option<&Path> {
        Some(&self.backing)
    }
}

impl Named for ArchiveFileSource {
    fn name(&self) -> &str {
        &self.name
    }
}

/// An archive member flagged as a directory. It has no backing file, its
/// children are the members nested below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveDirectorySource {
    core: SourceCore,
    path: String,
    name: String,
    info: ArchiveEntryInfo,
}

impl ArchiveDirectorySource {
    pub(crate) fn new(path: String, name: String, info: ArchiveEntryInfo) -> Self {
        Self {
            core: SourceCore::new(),
            path,
            name,
            info,
        }
    }

    /// The member's name without the trailing separator.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn info(&self) -> &ArchiveEntryInfo {
        &self.info
    }
}

impl Unit for ArchiveDirectorySource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ArchiveDirectory
    }

    fn identity(&self) -> Identity {
        Identity::ArchiveDirectory {
            path: self.path.clone(),
            modified: self.info.modified,
            comment: self.info.comment.clone(),
        }
    }

    fn input(&self) -> InputAccessor {
        InputAccessor::Empty
    }
}

impl Aggregate for ArchiveDirectorySource {}

impl Named for ArchiveDirectorySource {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::Source;

    fn dir(path: &str, modified: Option<u64>, comment: Option<&str>) -> Source {
        Source::ArchiveDirectory(ArchiveDirectorySource::new(
            path.to_string(),
            path.to_string(),
            ArchiveEntryInfo {
                modified: modified.map(|s| UNIX_EPOCH + Duration::from_secs(s)),
                comment: comment.map(str::to_string),
                ..Default::default()
            },
        ))
    }

    #[test]
    fn checksum_hex() {
        assert_eq!("0000beef", Checksum::Crc32(0xbeef).to_hex());
        assert_eq!("deadbeef", Checksum::TarHeader(0xdeadbeef).to_hex());
    }

    #[test]
    fn directory_ordering() {
        // path first
        assert!(dir("a", Some(9), Some("z")) < dir("b", None, None));
        // then modification time, absent first
        assert!(dir("a", None, None) < dir("a", Some(0), None));
        assert!(dir("a", Some(1), None) < dir("a", Some(2), None));
        // then comment, absent first
        assert!(dir("a", Some(1), None) < dir("a", Some(1), Some("")));
        assert!(dir("a", Some(1), Some("x")) < dir("a", Some(1), Some("y")));
        // structurally equal, despite different ids
        assert_eq!(dir("a", Some(1), Some("x")), dir("a", Some(1), Some("x")));
    }
}
