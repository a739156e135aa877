//! Creation and tracking of the temporary files backing network-fetched and
//! archive-extracted content.
//!
//! Every file materialized through [TempResources] is recorded in a shared
//! registry. Removing a file always goes through that registry, so each
//! backing file is deleted at most once no matter how many handles to the
//! owning source exist.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, instrument, warn};

use crate::InvocationConfig;

/// Longest chunk of a suggested name that ends up in a temp file name.
const MAX_NAME_HINT_LEN: usize = 32;

/// Lifecycle of an ephemeral backing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ephemeral {
    /// Deleted when the owning source is closed.
    #[default]
    DeleteOnClose,
    /// Kept after the owning source is closed, so consumers holding a raw
    /// stream over the file can keep reading it. These files accumulate
    /// until [TempResources::sweep] is called.
    RetainForStreamCompat,
}

/// A freshly written temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub path: PathBuf,
    /// Exact number of bytes copied from the input stream.
    pub size: u64,
}

/// Creates and tracks temporary backing files. Cloning is cheap and all
/// clones share the same registry.
#[derive(Clone, Default)]
pub struct TempResources {
    registry: Arc<Mutex<HashSet<PathBuf>>>,
}

impl TempResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `reader` to EOF into a new, uniquely named file inside
    /// `config.temp_dir`, named `{prefix}{name_hint}-XXXXXX{suffix}`.
    ///
    /// The reader is not closed, the caller keeps owning it. If the copy
    /// fails, the partially written file is removed before returning.
    #[instrument(skip(self, reader, config), fields(temp_dir = %config.temp_dir.display()), err)]
    pub async fn materialize<R>(
        &self,
        reader: &mut R,
        name_hint: &str,
        config: &InvocationConfig,
    ) -> io::Result<Materialized>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let prefix = format!("{}{}-", config.temp_prefix, sanitize_name_hint(name_hint));
        let suffix = config.temp_suffix.clone();
        let temp_dir = config.temp_dir.clone();

        let named_file = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&suffix)
                .tempfile_in(temp_dir)
        })
        .await
        .map_err(io::Error::other)??;

        // The TempPath removes the file when dropped, which covers every
        // early return below.
        let (file, temp_path) = named_file.into_parts();

        let buffer_size = config.effective_buffer_size();
        let mut reader = BufReader::with_capacity(buffer_size, reader);
        let mut writer = BufWriter::with_capacity(buffer_size, tokio::fs::File::from_std(file));

        let size = tokio::io::copy_buf(&mut reader, &mut writer).await?;
        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        let path = temp_path.keep().map_err(|e| e.error)?;
        self.registry.lock().insert(path.clone());

        debug!(path = %path.display(), size, "materialized temp file");

        Ok(Materialized { path, size })
    }

    /// Starts a scope that removes every file it materializes, unless it is
    /// committed.
    pub fn scope(&self) -> TempScope<'_> {
        TempScope {
            temps: self,
            created: Vec::new(),
        }
    }

    /// Whether `path` is a tracked temp file that hasn't been deleted yet.
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.registry.lock().contains(path)
    }

    /// Number of tracked temp files.
    pub fn tracked(&self) -> usize {
        self.registry.lock().len()
    }

    /// Deletes a tracked temp file. Returns false if the file is not (or no
    /// longer) tracked, in which case nothing is touched.
    #[instrument(skip(self), fields(path = %path.display()), err)]
    pub async fn release(&self, path: &Path) -> io::Result<bool> {
        if !self.registry.lock().remove(path) {
            return Ok(false);
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Deletes every tracked temp file, including the ones retained for
    /// stream consumers. Returns the number of files removed.
    #[instrument(skip(self), ret, err)]
    pub async fn sweep(&self) -> io::Result<usize> {
        let paths: Vec<PathBuf> = self.registry.lock().drain().collect();

        let mut removed = 0;
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(removed)
    }

    /// Synchronous removal, used from [TempScope]'s Drop.
    fn discard(&self, path: &Path) {
        if !self.registry.lock().remove(path) {
            return;
        }

        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), err = %e, "failed to remove temp file");
            }
        }
    }
}

/// Tracks the temp files created within one dispatch path.
///
/// Dropping an uncommitted scope deletes all of them, so a failing
/// construction never leaves orphaned files behind.
pub struct TempScope<'a> {
    temps: &'a TempResources,
    created: Vec<PathBuf>,
}

impl TempScope<'_> {
    /// Like [TempResources::materialize], recording the file in this scope.
    pub async fn materialize<R>(
        &mut self,
        reader: &mut R,
        name_hint: &str,
        config: &InvocationConfig,
    ) -> io::Result<Materialized>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let materialized = self.temps.materialize(reader, name_hint, config).await?;
        self.created.push(materialized.path.clone());
        Ok(materialized)
    }

    /// Records a file materialized elsewhere, so it's also removed if this
    /// scope is dropped uncommitted.
    pub fn track(&mut self, path: PathBuf) {
        self.created.push(path);
    }

    /// Keeps all files created in this scope.
    pub fn commit(mut self) {
        self.created.clear();
    }
}

impl Drop for TempScope<'_> {
    fn drop(&mut self) {
        for path in self.created.drain(..) {
            debug!(path = %path.display(), "discarding temp file of failed construction");
            self.temps.discard(&path);
        }
    }
}

/// Keeps the characters of a suggested name that are safe in file names.
fn sanitize_name_hint(name_hint: &str) -> String {
    name_hint
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_NAME_HINT_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::TempDir;

    use super::*;
    use crate::fixtures::HELLOWORLD_BLOB_CONTENTS;
    use crate::tests::{config, dir_entries, FailingReader};

    #[tokio::test]
    async fn materialize_copies_everything() {
        let tmpdir = TempDir::new().unwrap();
        let temps = TempResources::new();

        let mut reader = Cursor::new(HELLOWORLD_BLOB_CONTENTS);
        let materialized = temps
            .materialize(&mut reader, "hello world.txt", &config(&tmpdir))
            .await
            .expect("must succeed");

        assert_eq!(HELLOWORLD_BLOB_CONTENTS.len() as u64, materialized.size);
        assert_eq!(
            HELLOWORLD_BLOB_CONTENTS,
            std::fs::read(&materialized.path).unwrap()
        );
        assert!(materialized.path.starts_with(tmpdir.path()));

        let file_name = materialized.path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("fotreehelloworld.txt-"), "{file_name}");
        assert!(file_name.ends_with(".tmp"), "{file_name}");
        assert!(temps.is_tracked(&materialized.path));
    }

    #[tokio::test]
    async fn materialize_tiny_buffer() {
        let tmpdir = TempDir::new().unwrap();
        let temps = TempResources::new();
        let config = InvocationConfig {
            buffer_size: 1,
            ..config(&tmpdir)
        };

        let data = (0..=255).collect::<Vec<u8>>().repeat(16);
        let materialized = temps
            .materialize(&mut Cursor::new(data.clone()), "", &config)
            .await
            .expect("must succeed");

        assert_eq!(data.len() as u64, materialized.size);
        assert_eq!(data, std::fs::read(&materialized.path).unwrap());
    }

    #[tokio::test]
    async fn materialize_unique_names() {
        let tmpdir = TempDir::new().unwrap();
        let temps = TempResources::new();
        let config = config(&tmpdir);

        let mut reader_a = Cursor::new(b"a".to_vec());
        let mut reader_b = Cursor::new(b"b".to_vec());
        let (a, b) = tokio::join!(
            temps.materialize(&mut reader_a, "same", &config),
            temps.materialize(&mut reader_b, "same", &config),
        );

        assert_ne!(a.unwrap().path, b.unwrap().path);
        assert_eq!(2, temps.tracked());
    }

    #[tokio::test]
    async fn materialize_failure_leaves_nothing() {
        let tmpdir = TempDir::new().unwrap();
        let temps = TempResources::new();

        let mut reader = FailingReader::new(vec![0x42; 1024]);
        temps
            .materialize(&mut reader, "broken", &config(&tmpdir))
            .await
            .expect_err("must fail");

        assert_eq!(0, dir_entries(tmpdir.path()));
        assert_eq!(0, temps.tracked());
    }

    #[tokio::test]
    async fn release_exactly_once() {
        let tmpdir = TempDir::new().unwrap();
        let temps = TempResources::new();

        let materialized = temps
            .materialize(&mut Cursor::new(b"x".to_vec()), "x", &config(&tmpdir))
            .await
            .unwrap();

        assert!(temps.release(&materialized.path).await.unwrap());
        assert!(!materialized.path.exists());
        assert!(!temps.release(&materialized.path).await.unwrap());
    }

    #[tokio::test]
    async fn uncommitted_scope_discards() {
        let tmpdir = TempDir::new().unwrap();
        let temps = TempResources::new();

        {
            let mut scope = temps.scope();
            scope
                .materialize(&mut Cursor::new(b"x".to_vec()), "x", &config(&tmpdir))
                .await
                .unwrap();
            assert_eq!(1, dir_entries(tmpdir.path()));
        }

        assert_eq!(0, dir_entries(tmpdir.path()));
        assert_eq!(0, temps.tracked());
    }

    #[tokio::test]
    async fn committed_scope_keeps() {
        let tmpdir = TempDir::new().unwrap();
        let temps = TempResources::new();

        let mut scope = temps.scope();
        scope
            .materialize(&mut Cursor::new(b"x".to_vec()), "x", &config(&tmpdir))
            .await
            .unwrap();
        scope.commit();

        assert_eq!(1, dir_entries(tmpdir.path()));
        assert_eq!(1, temps.sweep().await.unwrap());
        assert_eq!(0, dir_entries(tmpdir.path()));
    }

    #[test]
    fn sanitize() {
        assert_eq!("img.jpg", sanitize_name_hint("img.jpg"));
        assert_eq!("..etcpasswd", sanitize_name_hint("../etc/passwd"));
        assert_eq!(MAX_NAME_HINT_LEN, sanitize_name_hint(&"a".repeat(100)).len());
    }
}
