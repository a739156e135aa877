use serde::{Deserialize, Serialize};

use super::{Backing, Identity, Source, SourceKind, Unit};
use crate::persist::{SourceStore, StoreError, StoreKey};
use crate::SourceId;

/// Stands in for a child that was spilled to a [SourceStore].
///
/// Carries enough to identify, order and list the child without loading it.
/// The full unit is reloaded with [StoredSource::load].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSource {
    key: StoreKey,
    id: SourceId,
    kind: SourceKind,
    identity: Identity,
    name: Option<String>,
    /// Temp files backing the spilled unit and everything below it.
    #[serde(default)]
    backings: Vec<Backing>,
}

impl StoredSource {
    pub(crate) fn describe(key: StoreKey, source: &Source) -> Self {
        Self {
            key,
            id: source.id(),
            kind: source.kind(),
            identity: source.identity(),
            name: source.name().map(str::to_string),
            backings: source.backings(),
        }
    }

    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The temp files of the spilled subtree, so they can be released
    /// without loading it.
    pub fn backings(&self) -> &[Backing] {
        &self.backings
    }

    /// Reloads the full unit from `store`.
    pub async fn load<S>(&self, store: &S) -> Result<Source, StoreError>
    where
        S: SourceStore + ?Sized,
    {
        store
            .get(&self.key)
            .await?
            .ok_or_else(|| StoreError::StorageError(format!("source {} missing", self.key)))
    }
}
