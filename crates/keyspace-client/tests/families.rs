//! Integration tests for the typed command families

use keyspace_client::{NamespacedStore, ReadOnlyTracker, SetCondition, SetOptions};
use keyspace_core::{MemoryBackend, StaticNamespace, StoreConfig, TenantId};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (NamespacedStore, MemoryBackend) {
    let backend = MemoryBackend::new();
    let store = NamespacedStore::new(
        StoreConfig::default(),
        Arc::new(backend.clone()),
        Arc::new(StaticNamespace::new(TenantId::new("site_a").unwrap())),
        Arc::new(ReadOnlyTracker::new()),
    );
    (store, backend)
}

#[tokio::test]
async fn test_strings() {
    let (store, _backend) = setup();

    store.set("name", "discourse").await.unwrap();
    assert_eq!(store.get("name").await.unwrap(), Some("discourse".to_string()));
    assert_eq!(store.get_bytes("name").await.unwrap(), Some(b"discourse".to_vec()));
    assert_eq!(store.strlen("name").await.unwrap(), 9);
    assert_eq!(store.append("name", "!").await.unwrap(), 10);
    assert_eq!(
        store.getset("name", "new").await.unwrap(),
        Some("discourse!".to_string())
    );

    assert!(store.set_nx("fresh", "1").await.unwrap());
    assert!(!store.set_nx("fresh", "2").await.unwrap());

    assert_eq!(store.incr("n").await.unwrap(), 1);
    assert_eq!(store.incr_by("n", 10).await.unwrap(), 11);
    assert_eq!(store.decr("n").await.unwrap(), 10);
    assert_eq!(store.decr_by("n", 4).await.unwrap(), 6);
    assert_eq!(store.incr_by_float("f", 1.5).await.unwrap(), 1.5);
}

#[tokio::test]
async fn test_set_with_options() {
    let (store, _backend) = setup();

    let absent = SetOptions::new().only_if(SetCondition::IfAbsent);
    assert!(store.set_with("k", "1", &absent).await.unwrap());
    assert!(!store.set_with("k", "2", &absent).await.unwrap());

    let present = SetOptions::new()
        .only_if(SetCondition::IfPresent)
        .with_ttl(Duration::from_secs(60));
    assert!(store.set_with("k", "3", &present).await.unwrap());
    assert!(!store.set_with("missing", "3", &present).await.unwrap());

    assert_eq!(store.get("k").await.unwrap(), Some("3".to_string()));
    let ttl = store.ttl("k").await.unwrap();
    assert!(ttl > 0 && ttl <= 60);
}

#[tokio::test]
async fn test_expiry() {
    let (store, _backend) = setup();

    store
        .set_ex("session", "abc", Duration::from_secs(100))
        .await
        .unwrap();
    let ttl = store.ttl("session").await.unwrap();
    assert!(ttl > 90 && ttl <= 100);

    assert!(store.persist("session").await.unwrap());
    assert_eq!(store.ttl("session").await.unwrap(), -1);
    assert_eq!(store.ttl("missing").await.unwrap(), -2);

    assert!(store.pexpire("session", Duration::from_millis(30)).await.unwrap());
    assert!(store.pttl("session").await.unwrap() <= 30);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!store.exists("session").await.unwrap());

    store.set("later", "x").await.unwrap();
    assert!(store.expire("later", Duration::from_secs(10)).await.unwrap());
    assert!(!store.expire("missing", Duration::from_secs(10)).await.unwrap());
}

#[tokio::test]
async fn test_lists() {
    let (store, _backend) = setup();

    assert_eq!(store.rpush("queue", ["a", "b", "c"]).await.unwrap(), 3);
    assert_eq!(store.lpush("queue", ["z"]).await.unwrap(), 4);
    assert_eq!(store.llen("queue").await.unwrap(), 4);
    assert_eq!(
        store.lrange("queue", 0, -1).await.unwrap(),
        vec!["z", "a", "b", "c"]
    );
    assert_eq!(store.lindex("queue", -1).await.unwrap(), Some("c".to_string()));

    store.lset("queue", 1, "A").await.unwrap();
    store.rpush("queue", ["A"]).await.unwrap();
    assert_eq!(store.lrem("queue", 0, "A").await.unwrap(), 2);

    store.ltrim("queue", 0, 1).await.unwrap();
    assert_eq!(store.lrange("queue", 0, -1).await.unwrap(), vec!["z", "b"]);

    assert_eq!(store.lpop("queue").await.unwrap(), Some("z".to_string()));
    assert_eq!(store.rpop("queue").await.unwrap(), Some("b".to_string()));
    assert_eq!(store.rpop("queue").await.unwrap(), None);
}

#[tokio::test]
async fn test_hashes() {
    let (store, _backend) = setup();

    assert!(store.hset("user:1", "name", "sam").await.unwrap());
    assert!(!store.hset("user:1", "name", "sam").await.unwrap());
    assert_eq!(
        store
            .hset_multiple("user:1", &[("email", "sam@example.com"), ("age", "30")])
            .await
            .unwrap(),
        2
    );
    assert!(!store.hsetnx("user:1", "age", "31").await.unwrap());

    assert_eq!(store.hget("user:1", "name").await.unwrap(), Some("sam".to_string()));
    assert_eq!(
        store.hmget("user:1", &["name", "nope"]).await.unwrap(),
        vec![Some("sam".to_string()), None]
    );
    assert_eq!(store.hincrby("user:1", "age", 1).await.unwrap(), 31);
    assert_eq!(store.hlen("user:1").await.unwrap(), 3);
    assert!(store.hexists("user:1", "email").await.unwrap());

    let all = store.hgetall("user:1").await.unwrap();
    assert_eq!(all.get("age").map(String::as_str), Some("31"));

    let mut keys = store.hkeys("user:1").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["age", "email", "name"]);
    assert_eq!(store.hvals("user:1").await.unwrap().len(), 3);

    assert_eq!(store.hdel("user:1", &["email", "nope"]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_sets() {
    let (store, _backend) = setup();

    assert_eq!(store.sadd("tags", ["rust", "redis", "rust"]).await.unwrap(), 2);
    assert!(store.sismember("tags", "rust").await.unwrap());
    assert_eq!(store.scard("tags").await.unwrap(), 2);
    assert_eq!(store.srem("tags", ["redis"]).await.unwrap(), 1);
    assert_eq!(store.smembers("tags").await.unwrap(), vec!["rust"]);

    store.sadd("other", ["go", "rust"]).await.unwrap();
    let mut union = store.sunion(&["tags", "other"]).await.unwrap();
    union.sort();
    assert_eq!(union, vec!["go", "rust"]);
    assert_eq!(store.sdiff(&["other", "tags"]).await.unwrap(), vec!["go"]);
}

#[tokio::test]
async fn test_sorted_sets() {
    let (store, _backend) = setup();

    assert!(store.zadd("scores", 10.0, "alice").await.unwrap());
    assert_eq!(
        store
            .zadd_multiple("scores", &[(5.0, "bob"), (20.0, "carol")])
            .await
            .unwrap(),
        2
    );
    assert_eq!(store.zcard("scores").await.unwrap(), 3);
    assert_eq!(store.zscore("scores", "bob").await.unwrap(), Some(5.0));
    assert_eq!(store.zscore("scores", "dave").await.unwrap(), None);
    assert_eq!(store.zincrby("scores", 10.0, "bob").await.unwrap(), 15.0);
    assert_eq!(store.zrank("scores", "bob").await.unwrap(), Some(1));

    assert_eq!(
        store.zrange("scores", 0, -1).await.unwrap(),
        vec!["alice", "bob", "carol"]
    );
    assert_eq!(
        store.zrevrange("scores", 0, 0).await.unwrap(),
        vec!["carol"]
    );
    assert_eq!(
        store.zrange_withscores("scores", 0, 1).await.unwrap(),
        vec![("alice".to_string(), 10.0), ("bob".to_string(), 15.0)]
    );
    assert_eq!(store.zrem("scores", ["alice"]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_key_commands() {
    let (store, backend) = setup();

    store.set("a", "1").await.unwrap();
    assert_eq!(store.key_type("a").await.unwrap(), Some("string".to_string()));
    assert_eq!(store.key_type("nope").await.unwrap(), Some("none".to_string()));

    store.rename("a", "b").await.unwrap();
    assert!(!store.exists("a").await.unwrap());
    assert!(store.exists("b").await.unwrap());
    assert_eq!(backend.stored_keys(), vec!["site_a:b"]);

    assert_eq!(store.ping().await.unwrap(), Some("PONG".to_string()));
}
