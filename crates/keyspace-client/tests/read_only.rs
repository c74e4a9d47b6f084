//! Integration tests for read-only degradation
//!
//! The in-memory backend is switched into read-only mode to simulate a
//! replica or a failover in progress.

use keyspace_client::{NamespacedStore, ReadOnlyTracker, StoreMode};
use keyspace_core::{
    Error, MemoryBackend, StaticNamespace, StoreConfig, StoreError, StoreErrorKind, TenantId,
};
use std::sync::Arc;
use std::time::Duration;

fn store_with(backend: &MemoryBackend, tracker: Arc<ReadOnlyTracker>) -> NamespacedStore {
    NamespacedStore::new(
        StoreConfig::default(),
        Arc::new(backend.clone()),
        Arc::new(StaticNamespace::new(TenantId::new("site_a").unwrap())),
        tracker,
    )
}

fn setup() -> (NamespacedStore, MemoryBackend) {
    let backend = MemoryBackend::new();
    let store = store_with(&backend, Arc::new(ReadOnlyTracker::new()));
    (store, backend)
}

#[tokio::test]
async fn test_write_during_read_only_is_a_noop() {
    let (store, backend) = setup();
    backend.set_read_only(true);

    store.set("x", "y").await.unwrap();

    assert!(store.tracker().is_recently_read_only());
    assert_eq!(store.tracker().mode(), StoreMode::ReadOnly);
    assert_eq!(store.tracker().warnings_emitted(), 1);
    assert!(backend.stored_keys().is_empty());
}

#[tokio::test]
async fn test_repeated_failures_warn_once_per_window() {
    let (store, backend) = setup();
    backend.set_read_only(true);

    store.set("x", "y").await.unwrap();
    store.set("x", "y").await.unwrap();
    store.incr("counter").await.unwrap();

    assert_eq!(store.tracker().warnings_emitted(), 1);
    // Every command still reaches the store
    assert_eq!(backend.command_names(), vec!["SET", "SET", "INCR"]);
}

#[tokio::test]
async fn test_warning_repeats_after_cooldown() {
    let backend = MemoryBackend::new();
    let tracker = Arc::new(ReadOnlyTracker::with_cooldown(Duration::from_millis(50)));
    let store = store_with(&backend, tracker);
    backend.set_read_only(true);

    store.set("x", "y").await.unwrap();
    assert!(store.tracker().is_recently_read_only());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!store.tracker().is_recently_read_only());
    assert_eq!(store.tracker().mode(), StoreMode::Normal);

    store.set("x", "y").await.unwrap();
    assert_eq!(store.tracker().warnings_emitted(), 2);
}

#[tokio::test]
async fn test_reads_keep_working_while_read_only() {
    let (store, backend) = setup();
    store.set("x", "before").await.unwrap();
    backend.set_read_only(true);

    store.set("x", "after").await.unwrap();
    assert_eq!(store.get("x").await.unwrap(), Some("before".to_string()));
    assert_eq!(store.keys(None).await.unwrap(), vec!["x"]);
}

#[tokio::test]
async fn test_suppressed_commands_return_nil_readings() {
    let (store, backend) = setup();
    backend.set_read_only(true);

    assert_eq!(store.incr("n").await.unwrap(), 0);
    assert!(!store.set_nx("k", "v").await.unwrap());
    assert_eq!(store.sadd("s", ["a"]).await.unwrap(), 0);
    assert_eq!(store.lpop("l").await.unwrap(), None);
    assert_eq!(store.del("k").await.unwrap(), 0);
}

#[tokio::test]
async fn test_read_only_reply_on_read_is_suppressed() {
    let (store, backend) = setup();
    store.hset("h", "f", "v").await.unwrap();

    backend.fail_next(StoreError::read_only());
    assert!(store.hgetall("h").await.unwrap().is_empty());
    assert!(store.tracker().is_recently_read_only());

    assert_eq!(store.hgetall("h").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_read_only_recognised_by_message() {
    let (store, backend) = setup();
    backend.fail_next(StoreError::new(
        StoreErrorKind::Response,
        "READONLY You can't write against a read only replica.",
    ));

    store.set("x", "y").await.unwrap();
    assert!(store.tracker().is_recently_read_only());
}

#[tokio::test]
async fn test_other_errors_propagate() {
    let (store, backend) = setup();
    backend.fail_next(StoreError::new(StoreErrorKind::Connection, "connection reset"));

    let result = store.get("x").await;
    assert!(matches!(
        result,
        Err(Error::Store(e)) if e.kind == StoreErrorKind::Connection
    ));
    assert!(!store.tracker().is_recently_read_only());

    store.set("s", "string").await.unwrap();
    assert!(matches!(store.lpush("s", ["x"]).await, Err(Error::Store(_))));
    assert_eq!(store.tracker().warnings_emitted(), 0);
}

#[tokio::test]
async fn test_tracker_is_shared_between_stores() {
    let tracker = Arc::new(ReadOnlyTracker::new());
    let backend_a = MemoryBackend::new();
    let backend_b = MemoryBackend::new();
    let store_a = store_with(&backend_a, Arc::clone(&tracker));
    let store_b = store_with(&backend_b, Arc::clone(&tracker));

    backend_a.set_read_only(true);
    backend_b.set_read_only(true);

    store_a.set("x", "1").await.unwrap();
    assert!(store_b.tracker().is_recently_read_only());

    store_b.set("x", "1").await.unwrap();
    assert_eq!(tracker.warnings_emitted(), 1);
}

#[tokio::test]
async fn test_recovery_after_failover() {
    let (store, backend) = setup();
    backend.set_read_only(true);
    store.set("x", "1").await.unwrap();

    backend.set_read_only(false);
    store.tracker().clear_read_only();

    store.set("x", "2").await.unwrap();
    assert_eq!(store.get("x").await.unwrap(), Some("2".to_string()));
    assert_eq!(store.tracker().mode(), StoreMode::Normal);
}

#[tokio::test]
async fn test_flush_namespace_while_read_only_keeps_keys() {
    let (store, backend) = setup();
    store.set("a", "1").await.unwrap();
    store.set("b", "2").await.unwrap();
    backend.set_read_only(true);

    assert_eq!(store.flush_namespace().await.unwrap(), 0);
    assert_eq!(backend.stored_keys().len(), 2);
    assert_eq!(store.tracker().warnings_emitted(), 1);
}

#[tokio::test]
async fn test_reconnect_reaches_backend() {
    let (store, backend) = setup();
    store.reconnect().await.unwrap();
    store.reconnect().await.unwrap();
    assert_eq!(backend.reconnect_count(), 2);
}
