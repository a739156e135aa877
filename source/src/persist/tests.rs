//! Scenarios every [SourceStore] needs to pass, applied to all stores via an
//! [rstest] template, plus the behaviour of the persisters on top of them.

use std::sync::Arc;

use rstest::*;
use rstest_reuse::{self, *};

use super::{
    MemorySourceStore, PassthroughPersister, RedbSourceStore, SourcePersister, SourceStore,
    SpillingPersister, StoreKey,
};
use crate::input::InputAccessor;
use crate::resource::ByteRange;
use crate::source::{ByteStreamSource, ClumpSource};
use crate::{Child, Source, SourceKind, Unit};

/// A clump holding a nested clump and a byte stream.
fn clump_with_children() -> Source {
    let mut clump = Source::Clump(ClumpSource::new());
    let id = clump.id();

    let aggregate = clump.as_aggregate_mut().expect("clump is an aggregate");
    aggregate.add_child(Source::Clump(ClumpSource::new()));
    aggregate.add_child(Source::ByteStream(ByteStreamSource::new(
        id,
        ByteRange::new(0, 5).expect("valid range"),
        InputAccessor::Empty,
    )));

    clump
}

#[template]
#[rstest]
#[case::memory(MemorySourceStore::default())]
#[case::redb(RedbSourceStore::new_temporary().unwrap())]
pub fn source_stores(#[case] store: impl SourceStore) {}

/// Asking for a key that was never stored returns Ok(None).
#[apply(source_stores)]
#[tokio::test]
async fn get_missing(store: impl SourceStore) {
    let key = StoreKey::of(b"nothing");

    assert_eq!(None, store.get(&key).await.unwrap().map(|s| s.id()));
    assert!(!store.has(&key).await.unwrap());
}

/// A stored source comes back with the same id, identity and children.
#[apply(source_stores)]
#[tokio::test]
async fn put_get(store: impl SourceStore) {
    let source = clump_with_children();

    let key = store.put(&source).await.expect("put must succeed");
    assert!(store.has(&key).await.unwrap());

    let loaded = store
        .get(&key)
        .await
        .expect("get must succeed")
        .expect("must be present");

    assert_eq!(source.id(), loaded.id());
    assert_eq!(source.identity(), loaded.identity());
    assert_eq!(
        source.children().iter().map(Child::id).collect::<Vec<_>>(),
        loaded.children().iter().map(Child::id).collect::<Vec<_>>(),
    );
}

/// Storing the same source twice yields the same key.
#[apply(source_stores)]
#[tokio::test]
async fn put_twice(store: impl SourceStore) {
    let source = clump_with_children();

    let key1 = store.put(&source).await.unwrap();
    let key2 = store.put(&source).await.unwrap();

    assert_eq!(key1, key2);
}

/// The spilling persister replaces every live child with a stub, which can
/// be loaded back from its store.
#[apply(source_stores)]
#[tokio::test]
async fn spilling_replaces_children(store: impl SourceStore + 'static) {
    let store: Arc<dyn SourceStore> = Arc::new(store);
    let persister = SpillingPersister::new(store.clone());

    let source = clump_with_children();
    let child_ids: Vec<_> = source.children().iter().map(Child::id).collect();

    let persisted = persister.persist(source).await.expect("persist must succeed");

    assert_eq!(2, persisted.children().len());
    assert!(persisted.children().iter().all(Child::is_stored));
    assert_eq!(
        child_ids,
        persisted.children().iter().map(Child::id).collect::<Vec<_>>(),
        "stubs keep the children's ids, in order"
    );

    let Child::Stored(stub) = &persisted.children()[1] else {
        panic!("expected a stub");
    };
    assert_eq!(SourceKind::ByteStream, stub.kind());

    let loaded = stub.load(store.as_ref()).await.expect("load must succeed");
    assert_eq!(stub.id(), loaded.id());
    assert_eq!(stub.identity(), &loaded.identity());
    assert!(persister.store().is_some());
}

#[tokio::test]
async fn passthrough_keeps_children_live() {
    let source = clump_with_children();
    let id = source.id();

    let persisted = PassthroughPersister.persist(source).await.unwrap();

    assert_eq!(id, persisted.id());
    assert!(persisted.children().iter().all(|c| c.as_live().is_some()));
    assert!(PassthroughPersister.store().is_none());
}

/// Persisting through an Arc'd trait object behaves like the persister
/// itself.
#[tokio::test]
async fn persister_behind_arc() {
    let persister: Arc<dyn SourcePersister> = Arc::new(SpillingPersister::new(Arc::new(
        MemorySourceStore::default(),
    )));

    let persisted = persister.persist(clump_with_children()).await.unwrap();
    assert!(persisted.children().iter().all(Child::is_stored));
}
