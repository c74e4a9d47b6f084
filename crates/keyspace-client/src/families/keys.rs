//! Key-level commands: existence, expiry, renaming

use std::time::Duration;

use keyspace_core::{Command, Result};

use crate::proxy::NamespacedStore;

impl NamespacedStore {
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.run(Command::new("EXISTS").arg(key)).await
    }

    /// Expire `key` after `ttl`, rounded down to whole seconds
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.run(Command::new("EXPIRE").arg(key).arg(ttl.as_secs()))
            .await
    }

    pub async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.run(Command::new("PEXPIRE").arg(key).arg(ttl.as_millis() as u64))
            .await
    }

    /// Remove the expiry of `key`; returns whether it had one
    pub async fn persist(&self, key: &str) -> Result<bool> {
        self.run(Command::new("PERSIST").arg(key)).await
    }

    /// Seconds to live: `-1` without expiry, `-2` if the key is missing
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.run(Command::new("TTL").arg(key)).await
    }

    /// Milliseconds to live, with the same sentinels as `ttl`
    pub async fn pttl(&self, key: &str) -> Result<i64> {
        self.run(Command::new("PTTL").arg(key)).await
    }

    /// Rename a key within the current namespace
    pub async fn rename(&self, key: &str, new_key: &str) -> Result<()> {
        self.run(Command::new("RENAME").arg(key).arg(new_key)).await
    }

    /// The type of the value at `key` (`string`, `list`, ..., `none`)
    pub async fn key_type(&self, key: &str) -> Result<Option<String>> {
        self.run(Command::new("TYPE").arg(key)).await
    }

    pub async fn ping(&self) -> Result<Option<String>> {
        self.run(Command::new("PING")).await
    }
}
