use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{instrument, warn};

use super::key::STORE_KEY_LEN;
use super::{decode, encode, SourceStore, StoreError, StoreKey};
use crate::source::{Source, Unit};

const SOURCE_TABLE: TableDefinition<[u8; STORE_KEY_LEN], Vec<u8>> =
    TableDefinition::new("source");

/// Stores serialized sources in a redb database.
#[derive(Clone)]
pub struct RedbSourceStore {
    // Wrapped in an Arc so it can be moved into spawn_blocking.
    db: Arc<Database>,
}

impl RedbSourceStore {
    /// Opens (or creates) the database at `path`.
    pub async fn new(path: PathBuf) -> Result<Self, StoreError> {
        if path == PathBuf::from("/") {
            return Err(StoreError::StorageError(
                "cowardly refusing to open / with redb".to_string(),
            ));
        }

        let db = tokio::task::spawn_blocking(|| -> Result<_, redb::Error> {
            let db = redb::Database::create(path)?;
            create_schema(&db)?;
            Ok(db)
        })
        .await??;

        Ok(Self { db: Arc::new(db) })
    }

    /// Constructs a new instance using the in-memory backend.
    pub fn new_temporary() -> Result<Self, StoreError> {
        let db =
            redb::Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;

        create_schema(&db)?;

        Ok(Self { db: Arc::new(db) })
    }
}

/// Opens a write transaction and calls open_table on SOURCE_TABLE, which
/// creates it if not present.
fn create_schema(db: &redb::Database) -> Result<(), redb::Error> {
    let txn = db.begin_write()?;
    txn.open_table(SOURCE_TABLE)?;
    txn.commit()?;

    Ok(())
}

#[async_trait]
impl SourceStore for RedbSourceStore {
    #[instrument(skip_all, fields(source.id = %source.id()))]
    async fn put(&self, source: &Source) -> Result<StoreKey, StoreError> {
        let (key, data) = encode(source)?;

        tokio::task::spawn_blocking({
            let db = self.db.clone();
            let key: [u8; STORE_KEY_LEN] = key.clone().into();
            move || -> Result<(), StoreError> {
                let txn = db.begin_write()?;
                {
                    let mut table = txn.open_table(SOURCE_TABLE)?;
                    table.insert(key, data)?;
                }
                txn.commit()?;
                Ok(())
            }
        })
        .await??;

        Ok(key)
    }

    #[instrument(skip(self), fields(store.key = %key))]
    async fn get(&self, key: &StoreKey) -> Result<Option<Source>, StoreError> {
        let db = self.db.clone();

        let data = tokio::task::spawn_blocking({
            let key: [u8; STORE_KEY_LEN] = key.clone().into();
            move || -> Result<Option<Vec<u8>>, redb::Error> {
                let txn = db.begin_read()?;
                let table = txn.open_table(SOURCE_TABLE)?;
                Ok(table.get(key)?.map(|v| v.value()))
            }
        })
        .await?
        .map_err(|e| {
            warn!(err=%e, "failed to retrieve source");
            StoreError::StorageError("failed to retrieve source".to_string())
        })?;

        let Some(data) = data else {
            return Ok(None);
        };

        // The key is the digest of the stored bytes, make sure they match.
        if StoreKey::of(&data) != *key {
            warn!("stored source has the wrong digest");
            return Err(StoreError::StorageError(
                "stored source has the wrong digest".to_string(),
            ));
        }

        decode(&data).map(Some)
    }
}
