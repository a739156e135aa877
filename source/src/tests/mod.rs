use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::io::{AsyncRead, ReadBuf};

use crate::persist::{SourcePersister, StoreError};
use crate::{InvocationConfig, Source, SourceId, SourceKind, Unit};


/// Records every source it is handed.
#[derive(Clone, Default)]
pub struct CountingPersister {
    count: Arc<AtomicUsize>,
    ids: Arc<Mutex<Vec<SourceId>>>,
}

impl CountingPersister {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Ids of the persisted sources, in persist order.
    pub fn ids(&self) -> Vec<SourceId> {
        self.ids.lock().clone()
    }
}

#[async_trait]
impl SourcePersister for CountingPersister {
    async fn persist(&self, source: Source) -> Result<Source, StoreError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.ids.lock().push(source.id());
        Ok(source)
    }
}

/// Fails persist calls, either all of them or only those for one kind of
/// source.
#[derive(Default)]
pub struct FailingPersister {
    only: Option<SourceKind>,
}

impl FailingPersister {
    pub fn only(kind: SourceKind) -> Self {
        Self { only: Some(kind) }
    }
}

#[async_trait]
impl SourcePersister for FailingPersister {
    async fn persist(&self, source: Source) -> Result<Source, StoreError> {
        match self.only {
            Some(kind) if kind != source.kind() => Ok(source),
            _ => Err(StoreError::StorageError("injected failure".to_string())),
        }
    }
}

/// Yields `data`, then fails instead of signalling EOF.
pub struct FailingReader {
    data: Vec<u8>,
    pos: usize,
}

impl FailingReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos >= self.data.len() {
            return Poll::Ready(Err(io::Error::other("injected failure")));
        }

        let start = self.pos;
        let n = std::cmp::min(buf.remaining(), self.data.len() - start);
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;

        Poll::Ready(Ok(()))
    }
}

pub fn config(tmpdir: &TempDir) -> InvocationConfig {
    InvocationConfig::default().with_temp_dir(tmpdir.path())
}

pub fn dir_entries(path: &Path) -> usize {
    std::fs::read_dir(path).unwrap().count()
}

/// Ids of `source` and of all live sources below it, depth first.
pub fn tree_ids(source: &Source) -> Vec<SourceId> {
    let mut ids = vec![source.id()];
    for child in source.children() {
        match child.as_live() {
            Some(child) => ids.extend(tree_ids(child)),
            None => ids.push(child.id()),
        }
    }
    ids
}

pub fn assert_unique(ids: &[SourceId]) {
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len(), "ids must be unique: {:?}", ids);
}
