//! Sorted set commands

use keyspace_core::{Arg, Command, Error, FromValue, Result, Value};

use super::with_all;
use crate::proxy::NamespacedStore;

/// Decode a WITHSCORES reply
///
/// RESP2 servers reply with a flat `[member, score, ...]` array, RESP3
/// servers with an array of `[member, score]` pairs.
fn scored_members(command: &str, value: Value) -> Result<Vec<(String, f64)>> {
    let unexpected = |reason: String| Error::UnexpectedReply {
        command: command.to_string(),
        reason,
    };

    let items = Vec::<Value>::from_value(value).map_err(unexpected)?;
    if items.iter().all(|item| matches!(item, Value::Array(_))) {
        return items
            .into_iter()
            .map(<(String, f64)>::from_value)
            .collect::<std::result::Result<_, _>>()
            .map_err(unexpected);
    }

    if items.len() % 2 != 0 {
        return Err(unexpected("odd number of elements in scored reply".to_string()));
    }
    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(member), Some(score)) = (items.next(), items.next()) {
        pairs.push((
            String::from_value(member).map_err(unexpected)?,
            f64::from_value(score).map_err(unexpected)?,
        ));
    }
    Ok(pairs)
}

impl NamespacedStore {
    /// Add or update one member; returns whether it is new
    pub async fn zadd(&self, key: &str, score: f64, member: impl Into<Arg>) -> Result<bool> {
        self.run(Command::new("ZADD").arg(key).arg(score).arg(member))
            .await
    }

    /// Add or update several members; returns how many are new
    pub async fn zadd_multiple(&self, key: &str, members: &[(f64, &str)]) -> Result<i64> {
        let args = members
            .iter()
            .flat_map(|(score, member)| [Arg::from(*score), Arg::from(*member)]);
        self.run(with_all(Command::new("ZADD").arg(key), args))
            .await
    }

    pub async fn zrem<V: Into<Arg>>(
        &self,
        key: &str,
        members: impl IntoIterator<Item = V>,
    ) -> Result<i64> {
        self.run(with_all(Command::new("ZREM").arg(key), members))
            .await
    }

    pub async fn zscore(&self, key: &str, member: impl Into<Arg>) -> Result<Option<f64>> {
        self.run(Command::new("ZSCORE").arg(key).arg(member)).await
    }

    pub async fn zincrby(&self, key: &str, delta: f64, member: impl Into<Arg>) -> Result<f64> {
        self.run(Command::new("ZINCRBY").arg(key).arg(delta).arg(member))
            .await
    }

    pub async fn zcard(&self, key: &str) -> Result<i64> {
        self.run(Command::new("ZCARD").arg(key)).await
    }

    /// Zero-based rank of `member`, lowest score first
    pub async fn zrank(&self, key: &str, member: impl Into<Arg>) -> Result<Option<i64>> {
        self.run(Command::new("ZRANK").arg(key).arg(member)).await
    }

    /// Members ranked `start..=stop`, lowest score first
    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.run(Command::new("ZRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    /// Members ranked `start..=stop`, highest score first
    pub async fn zrevrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.run(Command::new("ZREVRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    /// Like `zrange`, with scores
    pub async fn zrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(String, f64)>> {
        let reply = self
            .run(
                Command::new("ZRANGE")
                    .arg(key)
                    .arg(start)
                    .arg(stop)
                    .arg("WITHSCORES"),
            )
            .await?;
        scored_members("ZRANGE", reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_scored_reply() {
        let reply = Value::Array(vec![
            Value::from("a"),
            Value::from("1"),
            Value::from("b"),
            Value::from("2.5"),
        ]);
        let pairs = scored_members("ZRANGE", reply).unwrap();
        assert_eq!(pairs, vec![("a".to_string(), 1.0), ("b".to_string(), 2.5)]);
    }

    #[test]
    fn test_nested_scored_reply() {
        let reply = Value::Array(vec![Value::Array(vec![
            Value::from("a"),
            Value::Double(3.0),
        ])]);
        let pairs = scored_members("ZRANGE", reply).unwrap();
        assert_eq!(pairs, vec![("a".to_string(), 3.0)]);
    }

    #[test]
    fn test_nil_scored_reply() {
        assert!(scored_members("ZRANGE", Value::Nil).unwrap().is_empty());
    }

    #[test]
    fn test_odd_scored_reply() {
        let reply = Value::Array(vec![Value::from("a")]);
        assert!(matches!(
            scored_members("ZRANGE", reply),
            Err(Error::UnexpectedReply { .. })
        ));
    }
}
