//! The recursive construction of source trees.
//!
//! Every entry point of [SourceFactory] fully builds the requested unit,
//! including all of its children, before returning it. Each constructed
//! node is handed to the factory's [SourcePersister] exactly once, after
//! its children were attached, and the persister's return value is what
//! the caller gets back. Children are built one after another, in the order
//! they are discovered.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;
use tracing::{debug, instrument, warn};
use url::Url;
use walkdir::WalkDir;

use crate::input::InputAccessor;
use crate::persist::SourcePersister;
use crate::resource::{ByteRange, FsMetadata};
use crate::source::{
    url_name, ArchiveDirectorySource, ArchiveFileSource, ByteStreamSource, Child, ClumpSource,
    DirectorySource, FileSetSource, FileSource, UrlSource,
};
use crate::temp::{Ephemeral, TempResources, TempScope};
use crate::{Aggregate, ConstructionError, Error, InvocationConfig, Source, Unit};

mod archive;
mod fetch;

pub use archive::ArchiveEntryHeader;

/// URL schemes names are recognized as URLs for. Anything else is a path.
pub const URL_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// Builds source trees, persisting every node it constructs.
pub struct SourceFactory<P> {
    persister: P,
    temps: TempResources,
    http_client: reqwest::Client,
}

impl<P> SourceFactory<P>
where
    P: SourcePersister,
{
    pub fn new(persister: P) -> Self {
        Self::with_temp_resources(persister, TempResources::new())
    }

    /// Constructs a factory sharing an existing temp file registry.
    pub fn with_temp_resources(persister: P, temps: TempResources) -> Self {
        Self {
            persister,
            temps,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// The registry tracking the temp files created by this factory.
    pub fn temp_resources(&self) -> &TempResources {
        &self.temps
    }

    /// Builds the source for a single name, which is either an URL with a
    /// recognized scheme, or a filesystem path.
    #[instrument(skip(self, config), err)]
    pub async fn source_for_name(
        &self,
        name: &str,
        config: &InvocationConfig,
    ) -> Result<Source, Error> {
        match parse_url(name) {
            Some(url) => self.source_for_url(&url, config).await,
            None => self.source_for_path(Path::new(name)).await,
        }
    }

    /// Builds the source for a list of names.
    ///
    /// A single name is dispatched like [SourceFactory::source_for_name].
    /// Any other number of names is grouped into a fileset, holding one
    /// child per name, in order. If any child or the fileset itself fails,
    /// the temp files of the children built so far are removed.
    #[instrument(skip_all, fields(names.len = names.len()), err)]
    pub async fn source_for_names<S>(
        &self,
        names: &[S],
        config: &InvocationConfig,
    ) -> Result<Source, Error>
    where
        S: AsRef<str>,
    {
        if let [name] = names {
            return self.source_for_name(name.as_ref(), config).await;
        }

        let mut scope = self.temps.scope();
        let mut file_set = Source::FileSet(FileSetSource::new());
        for name in names {
            let child = self.source_for_name(name.as_ref(), config).await?;
            for backing in child.backings() {
                scope.track(backing.path);
            }
            file_set.core_mut().push_child(Child::Live(child));
        }

        let file_set = self.persist(file_set).await?;

        scope.commit();
        Ok(file_set)
    }

    /// Builds the source for a filesystem path.
    ///
    /// Directories are walked recursively, following symlinks. Children keep
    /// the order the directory listing returned them in. A symlink pointing
    /// back to one of its own ancestors is skipped, as is the content of
    /// directories that can't be listed.
    #[instrument(skip(self), fields(path = %path.display()), err)]
    pub async fn source_for_path(&self, path: &Path) -> Result<Source, Error> {
        let metadata = FsMetadata::capture(path)
            .await
            .map_err(|e| Error::io(path.display(), e))?;

        if !metadata.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        let root = path.to_path_buf();
        let entries = tokio::task::spawn_blocking(move || {
            WalkDir::new(root)
                .follow_links(true)
                .contents_first(true)
                .into_iter()
                .collect::<Vec<_>>()
        })
        .await
        .map_err(Error::construction)?;

        // levels[d] holds the finished entries at depth d whose directory
        // wasn't emitted yet. With contents_first, a directory always comes
        // right after everything below it.
        let mut levels: Vec<Vec<Source>> = Vec::new();

        for entry in entries {
            let (entry_path, depth) = match entry {
                Ok(entry) => {
                    let depth = entry.depth();
                    (entry.into_path(), depth)
                }
                Err(e) => match walk_error(e)? {
                    Some(dangling) => dangling,
                    None => continue,
                },
            };

            let source = self.build_entry(&entry_path, depth, &mut levels).await?;

            if levels.len() <= depth {
                levels.resize_with(depth + 1, Vec::new);
            }
            levels[depth].push(source);
        }

        levels
            .into_iter()
            .next()
            .and_then(|mut top| top.pop())
            .ok_or_else(|| Error::NotFound(path.display().to_string()))
    }

    /// Builds and persists the source for one walked entry at `depth`.
    /// Directories take their children from the level below.
    async fn build_entry(
        &self,
        path: &Path,
        depth: usize,
        levels: &mut [Vec<Source>],
    ) -> Result<Source, Error> {
        let metadata = FsMetadata::capture(path)
            .await
            .map_err(|e| Error::io(path.display(), e))?;

        if !metadata.is_directory() {
            return self
                .persist(Source::File(FileSource::new(path, metadata)))
                .await;
        }

        let mut directory = DirectorySource::new(path, metadata);
        if let Some(children) = levels.get_mut(depth + 1) {
            for child in children.drain(..) {
                directory.add_child(child);
            }
        }

        self.persist(Source::Directory(directory)).await
    }

    /// Fetches `url` into a temp file and builds a source measuring all of
    /// its bytes.
    #[instrument(skip(self, config), fields(url = %fetch::redact_url(url)), err)]
    pub async fn source_for_url(
        &self,
        url: &Url,
        config: &InvocationConfig,
    ) -> Result<Source, Error> {
        let mut scope = self.temps.scope();

        let mut reader = fetch::download(&self.http_client, url).await?;
        let materialized = scope
            .materialize(&mut reader, &url_name(url), config)
            .await
            .map_err(|e| Error::io(fetch::redact_url(url), e))?;

        let source = self
            .persist(Source::Url(UrlSource::new(url.clone(), materialized)))
            .await?;

        scope.commit();
        Ok(source)
    }

    /// Builds the source for a single archive member, reading its content
    /// from `reader`.
    ///
    /// Directory members become archive directories without a temp file.
    /// All other members are copied into a temp file, which is retained
    /// after the source is closed, see [Ephemeral::RetainForStreamCompat].
    #[instrument(skip(self, reader, config), fields(name = %header.name), err)]
    pub async fn source_for_archive_entry<R>(
        &self,
        header: &ArchiveEntryHeader,
        reader: &mut R,
        config: &InvocationConfig,
    ) -> Result<Source, Error>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut scope = self.temps.scope();

        let member = self
            .archive_member(header, reader, config, &mut scope)
            .await?;
        let member = self.persist(member).await?;

        scope.commit();
        Ok(member)
    }

    /// Builds an archive member without persisting it.
    async fn archive_member<R>(
        &self,
        header: &ArchiveEntryHeader,
        reader: &mut R,
        config: &InvocationConfig,
        scope: &mut TempScope<'_>,
    ) -> Result<Source, Error>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let path = header.member_path().to_string();
        let name = header.base_name().to_string();

        if header.is_dir {
            return Ok(Source::ArchiveDirectory(ArchiveDirectorySource::new(
                path,
                name,
                header.info(),
            )));
        }

        let materialized = scope
            .materialize(reader, &name, config)
            .await
            .map_err(|e| Error::io(&header.name, e))?;

        let mut member = Source::ArchiveFile(ArchiveFileSource::new(
            path,
            name,
            materialized,
            header.info(),
        ));
        member.set_lifecycle(Ephemeral::RetainForStreamCompat);

        Ok(member)
    }

    /// Builds a byte stream covering `size` bytes at `offset` inside
    /// `parent`, and appends it as the last child of `parent`.
    ///
    /// Returns the byte stream, as it is stored in `parent`.
    #[instrument(skip(self, parent), fields(parent.id = %parent.id()), err)]
    pub async fn byte_stream<'a>(
        &self,
        parent: &'a mut Source,
        offset: u64,
        size: u64,
    ) -> Result<&'a mut Source, Error> {
        let len = parent
            .content_len()
            .ok_or(ConstructionError::NoContent(parent.kind()))?;

        let out_of_bounds = ConstructionError::RangeOutOfBounds { offset, size, len };

        let range = ByteRange::new(offset, size)
            .filter(|range| range.end() <= len)
            .ok_or(out_of_bounds.clone())?;
        let input: InputAccessor = parent
            .input()
            .slice(offset, size)
            .ok_or(out_of_bounds)?;

        let stream = self
            .persist(Source::ByteStream(ByteStreamSource::new(
                parent.id(),
                range,
                input,
            )))
            .await?;

        Ok(parent.core_mut().push_live(stream))
    }

    /// An empty clump, for grouping sources by hand.
    pub async fn clump(&self) -> Result<Source, Error> {
        self.persist(Source::Clump(ClumpSource::new())).await
    }

    /// An empty fileset, for grouping sources by hand.
    pub async fn file_set(&self) -> Result<Source, Error> {
        self.persist(Source::FileSet(FileSetSource::new())).await
    }

    /// An empty directory that has no counterpart on the filesystem.
    pub async fn virtual_directory(&self, path: &Path) -> Result<Source, Error> {
        self.persist(Source::Directory(DirectorySource::new_virtual(path)))
            .await
    }

    async fn persist(&self, source: Source) -> Result<Source, Error> {
        let id = source.id();
        let kind = source.kind();

        let source = self.persister.persist(source).await?;
        debug!(source.id = %id, source.kind = %kind, "persisted source");

        Ok(source)
    }
}

/// Sorts out an error of the filesystem walk.
///
/// Dangling symlinks still become (missing) file sources, so their path and
/// depth are returned. Symlink loops and directories that can't be listed
/// are skipped with a warning. Everything else fails the walk.
fn walk_error(e: walkdir::Error) -> Result<Option<(PathBuf, usize)>, Error> {
    if let Some(ancestor) = e.loop_ancestor() {
        warn!(
            path = ?e.path(),
            ancestor = %ancestor.display(),
            "skipping directory symlink cycle"
        );
        return Ok(None);
    }

    let depth = e.depth();
    let path = e.path().map(Path::to_path_buf);
    let Some(path) = path else {
        return Err(Error::construction(e));
    };

    match e.into_io_error() {
        Some(e) if e.kind() == io::ErrorKind::NotFound => Ok(Some((path, depth))),
        Some(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            warn!(path = %path.display(), err = %e, "unable to list directory, leaving it empty");
            Ok(None)
        }
        Some(e) => Err(Error::io(path.display(), e)),
        None => Err(Error::construction(format!(
            "walking {} failed",
            path.display()
        ))),
    }
}

/// Parses `name` as an URL, if it has one of the [URL_SCHEMES].
fn parse_url(name: &str) -> Option<Url> {
    Url::parse(name)
        .ok()
        .filter(|url| URL_SCHEMES.contains(&url.scheme()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::parse_url;

    #[rstest]
    #[case::http("http://example.com/a", true)]
    #[case::https("https://example.com/a", true)]
    #[case::file("file:///tmp/a", true)]
    #[case::uppercase_scheme("HTTPS://example.com/a", true)]
    #[case::ftp("ftp://example.com/a", false)]
    #[case::relative_path("some/dir", false)]
    #[case::absolute_path("/some/dir", false)]
    #[case::windows_path("C:\\some\\dir", false)]
    fn test_parse_url(#[case] name: &str, #[case] exp_url: bool) {
        assert_eq!(exp_url, parse_url(name).is_some());
    }
}
