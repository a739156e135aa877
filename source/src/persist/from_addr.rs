use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use super::{
    MemorySourceStore, PassthroughPersister, RedbSourceStore, SourcePersister, SpillingPersister,
    StoreError,
};

/// Constructs a [SourcePersister] from an URI.
///
/// The following URIs are supported:
/// - `passthrough://`
///   Keeps every source in memory, unchanged.
/// - `memory://`
///   Spills children into an in-memory store.
/// - `redb://`
///   Spills children into a temporary, in-memory redb database.
/// - `redb:///absolute/path/to/somewhere`
///   Spills children into a redb database at the given path.
pub async fn from_addr(uri: &str) -> Result<Arc<dyn SourcePersister>, StoreError> {
    let url = Url::parse(uri)
        .map_err(|e| StoreError::InvalidRequest(format!("unable to parse url: {}", e)))?;

    let persister: Arc<dyn SourcePersister> = match url.scheme() {
        "passthrough" => {
            if url.has_host() || !url.path().is_empty() {
                return Err(StoreError::InvalidRequest("invalid url".to_string()));
            }
            Arc::new(PassthroughPersister)
        }
        "memory" => {
            // memory doesn't support host or path in the URL.
            if url.has_host() || !url.path().is_empty() {
                return Err(StoreError::InvalidRequest("invalid url".to_string()));
            }
            Arc::new(SpillingPersister::new(Arc::new(
                MemorySourceStore::default(),
            )))
        }
        "redb" => {
            // redb doesn't support host, and a path can be provided (otherwise
            // it'll live in memory only).
            if url.has_host() {
                return Err(StoreError::InvalidRequest("no host allowed".to_string()));
            }

            let store = if url.path().is_empty() {
                RedbSourceStore::new_temporary()?
            } else {
                RedbSourceStore::new(PathBuf::from(url.path())).await?
            };

            Arc::new(SpillingPersister::new(Arc::new(store)))
        }
        _ => {
            return Err(StoreError::InvalidRequest(format!(
                "unknown scheme: {}",
                url.scheme()
            )))
        }
    };

    Ok(persister)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::from_addr;

    #[rstest]
    #[case::passthrough("passthrough://", true, false)]
    #[case::passthrough_with_host("passthrough://foo", false, false)]
    #[case::memory("memory://", true, true)]
    #[case::memory_with_path("memory:///foo", false, false)]
    #[case::redb_temporary("redb://", true, true)]
    #[case::redb_with_host("redb://foo/bar", false, false)]
    #[case::redb_root("redb:///", false, false)]
    #[case::unknown_scheme("sled://", false, false)]
    #[case::garbage("not a url", false, false)]
    #[tokio::test]
    async fn test_from_addr(
        #[case] uri: &str,
        #[case] exp_succeed: bool,
        #[case] exp_store: bool,
    ) {
        match from_addr(uri).await {
            Ok(persister) => {
                assert!(exp_succeed, "{uri} should have failed");
                assert_eq!(exp_store, persister.store().is_some());
            }
            Err(_) => assert!(!exp_succeed, "{uri} should have succeeded"),
        }
    }

    #[tokio::test]
    async fn redb_on_disk() {
        let tmpdir = TempDir::new().unwrap();
        let uri = format!("redb://{}", tmpdir.path().join("sources.redb").display());

        let persister = from_addr(&uri).await.expect("must succeed");
        assert!(persister.store().is_some());
        assert!(tmpdir.path().join("sources.redb").exists());
    }
}
