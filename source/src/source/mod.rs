//! The source unit model.
//!
//! [Source] is a tagged union over the concrete kinds of unit. What a unit
//! can do beyond the basics is expressed by the capability traits
//! [Aggregate], [Measurable] and [Named], implemented only by the variants
//! that support them. Code holding a concrete variant gets the capabilities
//! statically; code holding a [Source] asks via [Source::as_aggregate] and
//! friends.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::input::InputAccessor;
use crate::temp::{Ephemeral, TempResources};
use crate::SourceId;

mod archive;
mod byte_stream;
mod directory;
mod file;
mod grouping;
mod stored;
mod url;

pub use archive::{ArchiveDirectorySource, ArchiveEntryInfo, ArchiveFileSource, Checksum};
pub use byte_stream::ByteStreamSource;
pub use directory::DirectorySource;
pub use file::FileSource;
pub use grouping::{ClumpSource, FileSetSource};
pub use self::url::UrlSource;
pub use stored::StoredSource;

pub(crate) use self::url::url_name;

/// An entry a processing module leaves on a source it touched.
/// Its contents are opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub module: String,
    pub note: Option<String>,
}

impl Annotation {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A temp file backing a unit, with its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backing {
    pub path: PathBuf,
    pub lifecycle: Ephemeral,
}

/// State every source carries, regardless of its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCore {
    id: SourceId,
    annotations: Vec<Annotation>,
    children: Vec<Child>,
    ephemeral: Option<Ephemeral>,
}

impl SourceCore {
    pub(crate) fn new() -> Self {
        Self {
            id: SourceId::next(),
            annotations: Vec::new(),
            children: Vec::new(),
            ephemeral: None,
        }
    }

    pub(crate) fn new_ephemeral() -> Self {
        Self {
            ephemeral: Some(Ephemeral::DeleteOnClose),
            ..Self::new()
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Children are only ever appended, so positions are stable.
    pub(crate) fn push_child(&mut self, child: Child) {
        self.children.push(child);
    }

    /// Appends a live child and returns a handle to it.
    pub(crate) fn push_live(&mut self, source: Source) -> &mut Source {
        self.children.push(Child::Live(source));
        match self.children.last_mut() {
            Some(Child::Live(source)) => source,
            _ => unreachable!("just pushed a live child"),
        }
    }

    /// Gives in-place access to the children, for replacing live children
    /// by their stored stubs.
    pub(crate) fn children_mut(&mut self) -> &mut [Child] {
        &mut self.children
    }
}

/// The kinds of source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    File,
    Directory,
    ByteStream,
    Url,
    ArchiveFile,
    ArchiveDirectory,
    Clump,
    FileSet,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SourceKind::File => "file",
            SourceKind::Directory => "directory",
            SourceKind::ByteStream => "bytestream",
            SourceKind::Url => "url",
            SourceKind::ArchiveFile => "archive file",
            SourceKind::ArchiveDirectory => "archive directory",
            SourceKind::Clump => "clump",
            SourceKind::FileSet => "fileset",
        })
    }
}

/// The identity sources are compared and ordered by.
///
/// Variants are ordered by kind first, then structurally within the kind.
/// Absent optional fields order before present ones. Kinds without a
/// structural identity use their [SourceId].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Identity {
    File(PathBuf),
    Directory(PathBuf),
    ByteStream {
        parent: SourceId,
        start: u64,
        size: u64,
    },
    /// Lowercased URL string.
    Url(String),
    ArchiveFile {
        path: String,
        modified: Option<SystemTime>,
        comment: Option<String>,
        checksum: Option<String>,
    },
    ArchiveDirectory {
        path: String,
        modified: Option<SystemTime>,
        comment: Option<String>,
    },
    Clump(SourceId),
    FileSet(SourceId),
}

/// Capabilities every source has.
pub trait Unit {
    fn core(&self) -> &SourceCore;
    fn core_mut(&mut self) -> &mut SourceCore;
    fn kind(&self) -> SourceKind;
    fn identity(&self) -> Identity;

    /// A re-openable view over this unit's bytes.
    fn input(&self) -> InputAccessor;

    /// Length of the bytes behind [Unit::input], for units that have any.
    fn content_len(&self) -> Option<u64> {
        None
    }

    /// The temp file backing this unit, if it has one.
    fn ephemeral_backing(&self) -> Option<&Path> {
        None
    }

    fn id(&self) -> SourceId {
        self.core().id
    }

    /// Processing annotations, in the order they were added.
    fn annotations(&self) -> &[Annotation] {
        self.core().annotations()
    }

    fn annotate(&mut self, annotation: Annotation) {
        self.core_mut().annotations.push(annotation);
    }

    fn is_ephemeral(&self) -> bool {
        self.core().ephemeral.is_some()
    }

    /// Whether closing this unit deletes its ephemeral backing.
    /// True unless the lifecycle was switched to
    /// [Ephemeral::RetainForStreamCompat].
    fn delete_on_close(&self) -> bool {
        self.core().ephemeral != Some(Ephemeral::RetainForStreamCompat)
    }

    fn lifecycle(&self) -> Option<Ephemeral> {
        self.core().ephemeral
    }

    /// Overrides the lifecycle of this unit's ephemeral backing.
    /// Has no effect on units that aren't ephemeral.
    fn set_lifecycle(&mut self, lifecycle: Ephemeral) {
        if let Some(ephemeral) = self.core_mut().ephemeral.as_mut() {
            *ephemeral = lifecycle;
        }
    }
}

/// Units owning an ordered sequence of children.
pub trait Aggregate: Unit {
    /// Children in discovery order.
    fn children(&self) -> &[Child] {
        self.core().children()
    }

    /// Appends a child. Children can't be removed or reordered.
    fn add_child(&mut self, child: Source) {
        self.core_mut().push_child(Child::Live(child));
    }
}

/// Units covering a byte range relative to their parent.
///
/// The ending offset is exclusive for every implementation.
pub trait Measurable {
    fn starting_offset(&self) -> u64;
    fn size(&self) -> u64;

    fn ending_offset(&self) -> u64 {
        self.starting_offset() + self.size()
    }
}

/// Units with a human-readable name, distinct from any path.
pub trait Named {
    fn name(&self) -> &str;
}

/// A source unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Source {
    File(FileSource),
    Directory(DirectorySource),
    ByteStream(ByteStreamSource),
    Url(UrlSource),
    ArchiveFile(ArchiveFileSource),
    ArchiveDirectory(ArchiveDirectorySource),
    Clump(ClumpSource),
    FileSet(FileSetSource),
}

impl Source {
    fn unit(&self) -> &dyn Unit {
        match self {
            Source::File(s) => s,
            Source::Directory(s) => s,
            Source::ByteStream(s) => s,
            Source::Url(s) => s,
            Source::ArchiveFile(s) => s,
            Source::ArchiveDirectory(s) => s,
            Source::Clump(s) => s,
            Source::FileSet(s) => s,
        }
    }

    fn unit_mut(&mut self) -> &mut dyn Unit {
        match self {
            Source::File(s) => s,
            Source::Directory(s) => s,
            Source::ByteStream(s) => s,
            Source::Url(s) => s,
            Source::ArchiveFile(s) => s,
            Source::ArchiveDirectory(s) => s,
            Source::Clump(s) => s,
            Source::FileSet(s) => s,
        }
    }

    /// Children of this unit in discovery order. Non-aggregate units can
    /// still have byte stream children.
    pub fn children(&self) -> &[Child] {
        self.core().children()
    }

    /// The live children of this unit, for appending children below them.
    pub fn live_children_mut(&mut self) -> impl Iterator<Item = &mut Source> + '_ {
        self.core_mut()
            .children_mut()
            .iter_mut()
            .filter_map(Child::as_live_mut)
    }

    pub fn as_aggregate(&self) -> Option<&dyn Aggregate> {
        match self {
            Source::Directory(s) => Some(s),
            Source::ArchiveDirectory(s) => Some(s),
            Source::Clump(s) => Some(s),
            Source::FileSet(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_aggregate_mut(&mut self) -> Option<&mut dyn Aggregate> {
        match self {
            Source::Directory(s) => Some(s),
            Source::ArchiveDirectory(s) => Some(s),
            Source::Clump(s) => Some(s),
            Source::FileSet(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_measurable(&self) -> Option<&dyn Measurable> {
        match self {
            Source::ByteStream(s) => Some(s),
            Source::Url(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_named(&self) -> Option<&dyn Named> {
        match self {
            Source::File(s) => Some(s),
            Source::Directory(s) => Some(s),
            Source::Url(s) => Some(s),
            Source::ArchiveFile(s) => Some(s),
            Source::ArchiveDirectory(s) => Some(s),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.as_named().map(Named::name)
    }

    /// The temp files backing this unit and every unit below it, including
    /// the ones recorded on stored stubs, depth first.
    pub fn backings(&self) -> Vec<Backing> {
        let mut backings = Vec::new();
        self.collect_backings(&mut backings);
        backings
    }

    fn collect_backings(&self, backings: &mut Vec<Backing>) {
        if let (Some(path), Some(lifecycle)) = (self.ephemeral_backing(), self.lifecycle()) {
            backings.push(Backing {
                path: path.to_path_buf(),
                lifecycle,
            });
        }

        for child in self.children() {
            match child {
                Child::Live(child) => child.collect_backings(backings),
                Child::Stored(stub) => backings.extend_from_slice(stub.backings()),
            }
        }
    }

    /// Releases the temp files of this unit and of every unit below it whose
    /// lifecycle asks for deletion on close. Stored children are released
    /// through the backings recorded on their stub.
    pub async fn close(&self, temps: &TempResources) -> io::Result<()> {
        for backing in self.backings() {
            if backing.lifecycle == Ephemeral::DeleteOnClose {
                temps.release(&backing.path).await?;
            }
        }

        Ok(())
    }
}

impl Unit for Source {
    fn core(&self) -> &SourceCore {
        self.unit().core()
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        self.unit_mut().core_mut()
    }

    fn kind(&self) -> SourceKind {
        self.unit().kind()
    }

    fn identity(&self) -> Identity {
        self.unit().identity()
    }

    fn input(&self) -> InputAccessor {
        self.unit().input()
    }

    fn content_len(&self) -> Option<u64> {
        self.unit().content_len()
    }

    fn ephemeral_backing(&self) -> Option<&Path> {
        self.unit().ephemeral_backing()
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Source {}

impl PartialOrd for Source {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Source {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.identity().cmp(&other.identity())
    }
}

/// A child slot of a source: either the live unit, or a stub left behind
/// after the unit was spilled to a [crate::persist::SourceStore].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Child {
    Live(Source),
    Stored(StoredSource),
}

impl Child {
    pub fn id(&self) -> SourceId {
        match self {
            Child::Live(source) => source.id(),
            Child::Stored(stored) => stored.id(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Child::Live(source) => source.kind(),
            Child::Stored(stored) => stored.kind(),
        }
    }

    pub fn identity(&self) -> Identity {
        match self {
            Child::Live(source) => source.identity(),
            Child::Stored(stored) => stored.identity().clone(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Child::Live(source) => source.name(),
            Child::Stored(stored) => stored.name(),
        }
    }

    pub fn as_live(&self) -> Option<&Source> {
        match self {
            Child::Live(source) => Some(source),
            Child::Stored(_) => None,
        }
    }

    pub fn as_live_mut(&mut self) -> Option<&mut Source> {
        match self {
            Child::Live(source) => Some(source),
            Child::Stored(_) => None,
        }
    }

    pub fn as_stored(&self) -> Option<&StoredSource> {
        match self {
            Child::Live(_) => None,
            Child::Stored(stored) => Some(stored),
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Child::Stored(_))
    }
}

impl PartialEq for Child {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Child {}

impl PartialOrd for Child {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Child {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.identity().cmp(&other.identity())
    }
}
