//! List commands

use keyspace_core::{Arg, Command, Result};

use super::with_all;
use crate::proxy::NamespacedStore;

impl NamespacedStore {
    /// Push values onto the head of a list; returns the new length
    pub async fn lpush<V: Into<Arg>>(
        &self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<i64> {
        self.run(with_all(Command::new("LPUSH").arg(key), values))
            .await
    }

    /// Push values onto the tail of a list; returns the new length
    pub async fn rpush<V: Into<Arg>>(
        &self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<i64> {
        self.run(with_all(Command::new("RPUSH").arg(key), values))
            .await
    }

    pub async fn lpop(&self, key: &str) -> Result<Option<String>> {
        self.run(Command::new("LPOP").arg(key)).await
    }

    pub async fn rpop(&self, key: &str) -> Result<Option<String>> {
        self.run(Command::new("RPOP").arg(key)).await
    }

    pub async fn llen(&self, key: &str) -> Result<i64> {
        self.run(Command::new("LLEN").arg(key)).await
    }

    /// Elements `start..=stop`; negative indexes count from the tail
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.run(Command::new("LRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    pub async fn lindex(&self, key: &str, index: i64) -> Result<Option<String>> {
        self.run(Command::new("LINDEX").arg(key).arg(index)).await
    }

    pub async fn lset(&self, key: &str, index: i64, value: impl Into<Arg>) -> Result<()> {
        self.run(Command::new("LSET").arg(key).arg(index).arg(value))
            .await
    }

    /// Keep only elements `start..=stop`
    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<()> {
        self.run(Command::new("LTRIM").arg(key).arg(start).arg(stop))
            .await
    }

    /// Remove up to `count` occurrences of `value`; returns how many went
    pub async fn lrem(&self, key: &str, count: i64, value: impl Into<Arg>) -> Result<i64> {
        self.run(Command::new("LREM").arg(key).arg(count).arg(value))
            .await
    }
}
