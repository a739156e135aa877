use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::instrument;

use super::{decode, encode, SourceStore, StoreError, StoreKey};
use crate::source::{Source, Unit};

/// Keeps serialized sources in a map in memory.
#[derive(Clone, Default)]
pub struct MemorySourceStore {
    db: Arc<RwLock<HashMap<StoreKey, Vec<u8>>>>,
}

impl MemorySourceStore {
    /// Number of stored sources.
    pub fn len(&self) -> usize {
        self.db.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.read().is_empty()
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    #[instrument(skip_all, fields(source.id = %source.id()))]
    async fn put(&self, source: &Source) -> Result<StoreKey, StoreError> {
        let (key, data) = encode(source)?;
        self.db.write().entry(key.clone()).or_insert(data);
        Ok(key)
    }

    #[instrument(skip(self), fields(store.key = %key))]
    async fn get(&self, key: &StoreKey) -> Result<Option<Source>, StoreError> {
        let db = self.db.read();
        db.get(key).map(|data| decode(data)).transpose()
    }

    async fn has(&self, key: &StoreKey) -> Result<bool, StoreError> {
        Ok(self.db.read().contains_key(key))
    }
}
