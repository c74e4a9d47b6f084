//! Hash commands

use std::collections::HashMap;

use keyspace_core::{Arg, Command, Result};

use super::with_all;
use crate::proxy::NamespacedStore;

impl NamespacedStore {
    /// Set one field; returns whether the field is new
    pub async fn hset(&self, key: &str, field: &str, value: impl Into<Arg>) -> Result<bool> {
        self.run(Command::new("HSET").arg(key).arg(field).arg(value))
            .await
    }

    /// Set several fields; returns how many were new
    pub async fn hset_multiple(&self, key: &str, fields: &[(&str, &str)]) -> Result<i64> {
        let args = fields.iter().flat_map(|(f, v)| [*f, *v]);
        self.run(with_all(Command::new("HSET").arg(key), args))
            .await
    }

    pub async fn hsetnx(&self, key: &str, field: &str, value: impl Into<Arg>) -> Result<bool> {
        self.run(Command::new("HSETNX").arg(key).arg(field).arg(value))
            .await
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.run(Command::new("HGET").arg(key).arg(field)).await
    }

    pub async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        self.run(with_all(
            Command::new("HMGET").arg(key),
            fields.iter().copied(),
        ))
        .await
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.run(Command::new("HGETALL").arg(key)).await
    }

    /// Delete fields; returns how many existed
    pub async fn hdel(&self, key: &str, fields: &[&str]) -> Result<i64> {
        self.run(with_all(
            Command::new("HDEL").arg(key),
            fields.iter().copied(),
        ))
        .await
    }

    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        self.run(Command::new("HEXISTS").arg(key).arg(field)).await
    }

    pub async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.run(Command::new("HINCRBY").arg(key).arg(field).arg(delta))
            .await
    }

    pub async fn hkeys(&self, key: &str) -> Result<Vec<String>> {
        self.run(Command::new("HKEYS").arg(key)).await
    }

    pub async fn hvals(&self, key: &str) -> Result<Vec<String>> {
        self.run(Command::new("HVALS").arg(key)).await
    }

    pub async fn hlen(&self, key: &str) -> Result<i64> {
        self.run(Command::new("HLEN").arg(key)).await
    }
}
