//! String commands: GET, SET and friends

use std::time::Duration;

use keyspace_core::{Arg, Command, Result, Value};

use super::with_all;
use crate::proxy::NamespacedStore;

/// Condition under which `set_with` writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// Only if the key doesn't exist (NX)
    IfAbsent,
    /// Only if the key already exists (XX)
    IfPresent,
}

/// Options for `set_with`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub condition: Option<SetCondition>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn only_if(mut self, condition: SetCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    fn apply(&self, mut command: Command) -> Command {
        if let Some(ttl) = self.ttl {
            // Whole seconds where possible, otherwise milliseconds; never below 1ms
            command = if ttl.as_secs() > 0 && ttl.subsec_millis() == 0 {
                command.arg("EX").arg(ttl.as_secs())
            } else {
                command.arg("PX").arg((ttl.as_millis() as u64).max(1))
            };
        }
        match self.condition {
            Some(SetCondition::IfAbsent) => command.arg("NX"),
            Some(SetCondition::IfPresent) => command.arg("XX"),
            None => command,
        }
    }
}

impl NamespacedStore {
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(Command::new("GET").arg(key)).await
    }

    /// Get a value as raw bytes
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.run(Command::new("GET").arg(key)).await? {
            Value::Data(bytes) => Ok(Some(bytes)),
            _ => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: impl Into<Arg>) -> Result<()> {
        self.run(Command::new("SET").arg(key).arg(value)).await
    }

    /// Set a value that expires after `ttl` (SETEX, whole seconds)
    pub async fn set_ex(&self, key: &str, value: impl Into<Arg>, ttl: Duration) -> Result<()> {
        self.run(
            Command::new("SETEX")
                .arg(key)
                .arg(ttl.as_secs().max(1))
                .arg(value),
        )
        .await
    }

    /// Set only if the key doesn't exist; returns whether it was set
    pub async fn set_nx(&self, key: &str, value: impl Into<Arg>) -> Result<bool> {
        self.run(Command::new("SETNX").arg(key).arg(value)).await
    }

    /// SET with expiry and condition; returns whether the value was written
    pub async fn set_with(
        &self,
        key: &str,
        value: impl Into<Arg>,
        options: &SetOptions,
    ) -> Result<bool> {
        let command = options.apply(Command::new("SET").arg(key).arg(value));
        self.run(command).await
    }

    /// Set a value, returning the previous one
    pub async fn getset(&self, key: &str, value: impl Into<Arg>) -> Result<Option<String>> {
        self.run(Command::new("GETSET").arg(key).arg(value)).await
    }

    pub async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        self.run(with_all(Command::new("MGET"), keys.iter().copied()))
            .await
    }

    pub async fn mset(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let args = pairs.iter().flat_map(|(k, v)| [*k, *v]);
        self.run(with_all(Command::new("MSET"), args)).await
    }

    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.run(Command::new("INCR").arg(key)).await
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.run(Command::new("INCRBY").arg(key).arg(delta)).await
    }

    pub async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64> {
        self.run(Command::new("INCRBYFLOAT").arg(key).arg(delta))
            .await
    }

    pub async fn decr(&self, key: &str) -> Result<i64> {
        self.run(Command::new("DECR").arg(key)).await
    }

    pub async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.run(Command::new("DECRBY").arg(key).arg(delta)).await
    }

    /// Append to a string; returns the new length
    pub async fn append(&self, key: &str, value: impl Into<Arg>) -> Result<i64> {
        self.run(Command::new("APPEND").arg(key).arg(value)).await
    }

    pub async fn strlen(&self, key: &str) -> Result<i64> {
        self.run(Command::new("STRLEN").arg(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command.args().iter().map(|a| a.to_string_lossy()).collect()
    }

    #[test]
    fn test_set_options_seconds() {
        let options = SetOptions::new()
            .with_ttl(Duration::from_secs(30))
            .only_if(SetCondition::IfAbsent);
        let command = options.apply(Command::new("SET").arg("k").arg("v"));
        assert_eq!(args(&command), vec!["k", "v", "EX", "30", "NX"]);
    }

    #[test]
    fn test_set_options_millis() {
        let options = SetOptions::new()
            .with_ttl(Duration::from_millis(1500))
            .only_if(SetCondition::IfPresent);
        let command = options.apply(Command::new("SET").arg("k").arg("v"));
        assert_eq!(args(&command), vec!["k", "v", "PX", "1500", "XX"]);
    }

    #[test]
    fn test_set_options_sub_millisecond_ttl() {
        for ttl in [Duration::ZERO, Duration::from_micros(300)] {
            let command = SetOptions::new()
                .with_ttl(ttl)
                .apply(Command::new("SET").arg("k").arg("v"));
            assert_eq!(args(&command), vec!["k", "v", "PX", "1"]);
        }
    }

    #[test]
    fn test_default_set_options() {
        let command = SetOptions::default().apply(Command::new("SET").arg("k").arg("v"));
        assert_eq!(args(&command), vec!["k", "v"]);
    }
}
