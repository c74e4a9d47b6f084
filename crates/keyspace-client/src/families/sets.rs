//! Set commands
//!
//! Multi-key operations (`sinter`, `sunion`, `sdiff`) namespace every key,
//! so they only ever combine sets of the current tenant.

use keyspace_core::{Arg, Command, Result};

use super::with_all;
use crate::proxy::NamespacedStore;

impl NamespacedStore {
    /// Add members; returns how many were new
    pub async fn sadd<V: Into<Arg>>(
        &self,
        key: &str,
        members: impl IntoIterator<Item = V>,
    ) -> Result<i64> {
        self.run(with_all(Command::new("SADD").arg(key), members))
            .await
    }

    /// Remove members; returns how many were present
    pub async fn srem<V: Into<Arg>>(
        &self,
        key: &str,
        members: impl IntoIterator<Item = V>,
    ) -> Result<i64> {
        self.run(with_all(Command::new("SREM").arg(key), members))
            .await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.run(Command::new("SMEMBERS").arg(key)).await
    }

    pub async fn sismember(&self, key: &str, member: impl Into<Arg>) -> Result<bool> {
        self.run(Command::new("SISMEMBER").arg(key).arg(member))
            .await
    }

    pub async fn scard(&self, key: &str) -> Result<i64> {
        self.run(Command::new("SCARD").arg(key)).await
    }

    pub async fn sinter(&self, keys: &[&str]) -> Result<Vec<String>> {
        self.run(with_all(Command::new("SINTER"), keys.iter().copied()))
            .await
    }

    pub async fn sunion(&self, keys: &[&str]) -> Result<Vec<String>> {
        self.run(with_all(Command::new("SUNION"), keys.iter().copied()))
            .await
    }

    pub async fn sdiff(&self, keys: &[&str]) -> Result<Vec<String>> {
        self.run(with_all(Command::new("SDIFF"), keys.iter().copied()))
            .await
    }
}
