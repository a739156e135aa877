//! Archive member headers, and the walk over a tar stream.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::AsyncRead;
use tokio_stream::StreamExt;
use tokio_tar::{Archive, Entry, EntryType};
use tracing::{debug, instrument, warn};

use super::SourceFactory;
use crate::persist::SourcePersister;
use crate::source::{ArchiveEntryInfo, Checksum, Child};
use crate::{Error, InvocationConfig, Source, Unit};

/// What an archive reader knows about a member before its content is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveEntryHeader {
    /// The member's full name, as stored in the archive.
    pub name: String,
    pub is_dir: bool,
    pub compressed_size: u64,
    pub checksum: Option<Checksum>,
    pub comment: Option<String>,
    pub modified: Option<SystemTime>,
}

impl ArchiveEntryHeader {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            ..Default::default()
        }
    }

    /// The member's path. Directory names lose exactly one trailing
    /// separator.
    pub fn member_path(&self) -> &str {
        if self.is_dir {
            self.name.strip_suffix(is_separator).unwrap_or(&self.name)
        } else {
            &self.name
        }
    }

    /// The part of [ArchiveEntryHeader::member_path] after the last
    /// separator.
    pub fn base_name(&self) -> &str {
        base_name(self.member_path())
    }

    pub(super) fn info(&self) -> ArchiveEntryInfo {
        ArchiveEntryInfo {
            compressed_size: self.compressed_size,
            checksum: self.checksum.as_ref().map(Checksum::to_hex),
            comment: self.comment.clone(),
            modified: self.modified,
        }
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn base_name(path: &str) -> &str {
    path.rsplit(is_separator).next().unwrap_or(path)
}

/// The directory part of `path`, if it has one.
fn parent_path(path: &str) -> Option<&str> {
    path.rfind(is_separator).map(|idx| &path[..idx])
}

/// Reads the header of a tar member. Returns None for members that don't
/// become sources.
fn tar_entry_header<R>(entry: &Entry<R>) -> io::Result<Option<ArchiveEntryHeader>>
where
    R: AsyncRead + Unpin,
{
    let header = entry.header();
    let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

    let is_dir = match header.entry_type() {
        EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => false,
        EntryType::Directory => true,
        EntryType::XGlobalHeader
        | EntryType::XHeader
        | EntryType::GNULongName
        | EntryType::GNULongLink => return Ok(None),
        entry_type => {
            warn!(name, ?entry_type, "skipping unsupported tar member");
            return Ok(None);
        }
    };

    // Strip any leading "./", which some tar implementations add.
    let name = name.trim_start_matches("./");
    if name.is_empty() || name == "." {
        return Ok(None);
    }

    Ok(Some(ArchiveEntryHeader {
        name: name.to_string(),
        is_dir,
        compressed_size: header.entry_size()?,
        checksum: header.cksum().ok().map(Checksum::TarHeader),
        comment: None,
        modified: header
            .mtime()
            .ok()
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
    }))
}

/// A slot in a directory being assembled.
enum Slot {
    /// Index into [MemberTree::dirs].
    Dir(usize),
    /// An already persisted file member.
    File(Source),
}

struct PendingDir {
    header: ArchiveEntryHeader,
    slots: Vec<Slot>,
}

/// Collects the members of an archive, nested by path.
///
/// Archives can list members in any order and omit directory members
/// entirely, so directories are only built once the whole archive was read.
/// A directory is always created before anything nested below it, so its
/// index is lower than the index of every directory below it.
#[derive(Default)]
struct MemberTree {
    top: Vec<Slot>,
    dirs: Vec<PendingDir>,
    dir_index: HashMap<String, usize>,
}

impl MemberTree {
    /// Returns the index of the directory at `path`, creating it (and its
    /// parents) if necessary.
    fn ensure_dir(&mut self, path: &str) -> usize {
        if let Some(idx) = self.dir_index.get(path) {
            return *idx;
        }

        let parent = parent_path(path).map(|p| self.ensure_dir(p));

        let idx = self.dirs.len();
        self.dirs.push(PendingDir {
            header: ArchiveEntryHeader::directory(path),
            slots: Vec::new(),
        });
        self.dir_index.insert(path.to_string(), idx);

        match parent {
            Some(parent) => self.dirs[parent].slots.push(Slot::Dir(idx)),
            None => self.top.push(Slot::Dir(idx)),
        }

        idx
    }

    /// Records a directory member. Its header replaces the synthesized one
    /// if the directory was already seen as the parent of another member.
    fn add_dir(&mut self, header: ArchiveEntryHeader) {
        let idx = self.ensure_dir(header.member_path());
        self.dirs[idx].header = header;
    }

    fn add_file(&mut self, path: &str, source: Source) {
        match parent_path(path) {
            Some(parent) => {
                let idx = self.ensure_dir(parent);
                self.dirs[idx].slots.push(Slot::File(source));
            }
            None => self.top.push(Slot::File(source)),
        }
    }
}

impl<P> SourceFactory<P>
where
    P: SourcePersister,
{
    /// Walks the tar stream in `reader` and appends one source per top-level
    /// member to `archive`. Members nested below a directory become children
    /// of its [crate::source::ArchiveDirectorySource], in archive order.
    ///
    /// File members are persisted as they are read, directories once all
    /// their children are attached. On failure, every temp file created by
    /// the walk is removed and `archive` is left untouched.
    #[instrument(skip_all, fields(source.id = %archive.id()), err)]
    pub async fn expand_tar<R>(
        &self,
        archive: &mut Source,
        reader: R,
        config: &InvocationConfig,
    ) -> Result<(), Error>
    where
        R: AsyncRead + Unpin,
    {
        let mut scope = self.temps.scope();
        let mut tree = MemberTree::default();

        let mut tar = Archive::new(reader);
        let mut entries = tar
            .entries()
            .map_err(|e| Error::Io("archive".to_string(), e))?;

        while let Some(mut entry) = entries
            .try_next()
            .await
            .map_err(|e| Error::Io("archive".to_string(), e))?
        {
            let Some(header) =
                tar_entry_header(&entry).map_err(|e| Error::Io("archive".to_string(), e))?
            else {
                continue;
            };

            if header.is_dir {
                tree.add_dir(header);
                continue;
            }

            let member = self
                .archive_member(&header, &mut entry, config, &mut scope)
                .await?;
            let member = self.persist(member).await?;
            tree.add_file(header.member_path(), member);
        }

        // Build directories bottom-up, so each is persisted after all its
        // children.
        let mut built: Vec<Option<Source>> = Vec::with_capacity(tree.dirs.len());
        built.resize_with(tree.dirs.len(), || None);

        for idx in (0..tree.dirs.len()).rev() {
            let PendingDir { header, slots } = std::mem::replace(
                &mut tree.dirs[idx],
                PendingDir {
                    header: ArchiveEntryHeader::default(),
                    slots: Vec::new(),
                },
            );

            let mut dir = self
                .archive_member(&header, &mut tokio::io::empty(), config, &mut scope)
                .await?;
            for slot in slots {
                dir.core_mut().push_child(Child::Live(take_slot(slot, &mut built)?));
            }
            built[idx] = Some(self.persist(dir).await?);
        }

        let mut members = Vec::with_capacity(tree.top.len());
        for slot in tree.top {
            members.push(take_slot(slot, &mut built)?);
        }

        debug!(members = members.len(), "expanded archive");

        for member in members {
            archive.core_mut().push_child(Child::Live(member));
        }

        scope.commit();
        Ok(())
    }
}

fn take_slot(slot: Slot, built: &mut [Option<Source>]) -> Result<Source, Error> {
    match slot {
        Slot::File(source) => Ok(source),
        Slot::Dir(idx) => built
            .get_mut(idx)
            .and_then(Option::take)
            .ok_or_else(|| Error::construction(format!("archive directory {} built twice", idx))),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{base_name, parent_path, ArchiveEntryHeader, MemberTree, Slot};

    #[rstest]
    #[case::dir("photos/2020/", true, "photos/2020", "2020")]
    #[case::dir_backslash("photos\\2020\\", true, "photos\\2020", "2020")]
    #[case::dir_only_one_separator("photos//", true, "photos/", "")]
    #[case::dir_without_separator("photos", true, "photos", "photos")]
    #[case::file("photos/2020/img.jpg", false, "photos/2020/img.jpg", "img.jpg")]
    #[case::file_backslash("photos\\img.jpg", false, "photos\\img.jpg", "img.jpg")]
    #[case::file_top_level("img.jpg", false, "img.jpg", "img.jpg")]
    fn member_names(
        #[case] name: &str,
        #[case] is_dir: bool,
        #[case] exp_path: &str,
        #[case] exp_name: &str,
    ) {
        let header = if is_dir {
            ArchiveEntryHeader::directory(name)
        } else {
            ArchiveEntryHeader::file(name)
        };

        assert_eq!(exp_path, header.member_path());
        assert_eq!(exp_name, header.base_name());
    }

    #[rstest]
    #[case("a/b/c", Some("a/b"))]
    #[case("a", None)]
    #[case("a\\b", Some("a"))]
    fn test_parent_path(#[case] path: &str, #[case] exp: Option<&str>) {
        assert_eq!(exp, parent_path(path));
    }

    #[test]
    fn test_base_name() {
        assert_eq!("c", base_name("a/b/c"));
        assert_eq!("", base_name("a/"));
    }

    #[test]
    fn parents_are_synthesized_first() {
        let mut tree = MemberTree::default();
        let idx = tree.ensure_dir("a/b/c");

        assert_eq!(2, idx);
        assert_eq!(3, tree.dirs.len());
        assert!(matches!(tree.top.as_slice(), [Slot::Dir(0)]));
        assert!(matches!(tree.dirs[0].slots.as_slice(), [Slot::Dir(1)]));
        assert!(matches!(tree.dirs[1].slots.as_slice(), [Slot::Dir(2)]));

        // seen again, nothing new
        assert_eq!(1, tree.ensure_dir("a/b"));
        assert_eq!(3, tree.dirs.len());
    }

    #[test]
    fn dir_member_replaces_synthesized_header() {
        let mut tree = MemberTree::default();
        tree.ensure_dir("a/b");

        let mut header = ArchiveEntryHeader::directory("a/");
        header.comment = Some("real".to_string());
        tree.add_dir(header.clone());

        assert_eq!(2, tree.dirs.len());
        assert_eq!(header, tree.dirs[0].header);
    }
}
