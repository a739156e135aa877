//! The persistence indirection every constructed source passes through.
//!
//! A [SourcePersister] receives each new source exactly once, by value, and
//! returns the canonical handle the caller continues with. Persisters may
//! hand back the same unit, or a modified copy. [SpillingPersister] moves
//! every child of the persisted unit into a [SourceStore] and leaves a
//! [StoredSource] stub in its place, which keeps huge trees from having to
//! be fully memory-resident.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::source::{Child, Source, StoredSource, Unit};

mod errors;
mod from_addr;
mod key;
mod memory;
mod redb;

pub use self::errors::StoreError;
pub use self::from_addr::from_addr;
pub use self::key::StoreKey;
pub use self::memory::MemorySourceStore;
pub use self::redb::RedbSourceStore;

/// Invoked exactly once for every source the factory constructs.
///
/// Implementations must be safe to call concurrently for unrelated sources.
#[async_trait]
pub trait SourcePersister: Send + Sync {
    /// Takes ownership of `source` and returns its canonical handle.
    async fn persist(&self, source: Source) -> Result<Source, StoreError>;

    /// The store stubs left behind by this persister can be loaded from.
    fn store(&self) -> Option<Arc<dyn SourceStore>> {
        None
    }
}

#[async_trait]
impl<A> SourcePersister for A
where
    A: AsRef<dyn SourcePersister> + Send + Sync,
{
    async fn persist(&self, source: Source) -> Result<Source, StoreError> {
        self.as_ref().persist(source).await
    }

    fn store(&self) -> Option<Arc<dyn SourceStore>> {
        self.as_ref().store()
    }
}

/// Storage for spilled sources, addressed by the digest of their
/// serialized form.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Stores `source`, returning the key it can be retrieved with.
    async fn put(&self, source: &Source) -> Result<StoreKey, StoreError>;

    async fn get(&self, key: &StoreKey) -> Result<Option<Source>, StoreError>;

    async fn has(&self, key: &StoreKey) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

#[async_trait]
impl<A> SourceStore for A
where
    A: AsRef<dyn SourceStore> + Send + Sync,
{
    async fn put(&self, source: &Source) -> Result<StoreKey, StoreError> {
        self.as_ref().put(source).await
    }

    async fn get(&self, key: &StoreKey) -> Result<Option<Source>, StoreError> {
        self.as_ref().get(key).await
    }

    async fn has(&self, key: &StoreKey) -> Result<bool, StoreError> {
        self.as_ref().has(key).await
    }
}

/// Serializes a source into the form stores keep, along with its key.
pub(crate) fn encode(source: &Source) -> Result<(StoreKey, Vec<u8>), StoreError> {
    let data = serde_json::to_vec(source)?;
    Ok((StoreKey::of(&data), data))
}

pub(crate) fn decode(data: &[u8]) -> Result<Source, StoreError> {
    Ok(serde_json::from_slice(data)?)
}

/// Keeps every source in memory, as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPersister;

#[async_trait]
impl SourcePersister for PassthroughPersister {
    async fn persist(&self, source: Source) -> Result<Source, StoreError> {
        Ok(source)
    }
}

/// Spills the children of every persisted source into a [SourceStore].
///
/// Children are persisted before their parent, so by the time a parent is
/// persisted all its children are final and can be written out. The parent
/// itself stays live until its own parent is persisted. Children appended
/// after a source was persisted (byte streams, mostly) stay live.
#[derive(Clone)]
pub struct SpillingPersister {
    store: Arc<dyn SourceStore>,
}

impl SpillingPersister {
    pub fn new(store: Arc<dyn SourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SourcePersister for SpillingPersister {
    #[instrument(skip_all, fields(source.id = %source.id(), source.kind = %source.kind()), err)]
    async fn persist(&self, mut source: Source) -> Result<Source, StoreError> {
        let mut spilled = 0;
        for child in source.core_mut().children_mut() {
            if let Child::Live(live) = child {
                let key = self.store.put(live).await?;
                let stub = StoredSource::describe(key, live);
                *child = Child::Stored(stub);
                spilled += 1;
            }
        }

        if spilled > 0 {
            debug!(spilled, "spilled children to store");
        }

        Ok(source)
    }

    fn store(&self) -> Option<Arc<dyn SourceStore>> {
        Some(self.store.clone())
    }
}

#[cfg(test)]
mod tests;
