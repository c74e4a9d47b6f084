//! Keyed command table
//!
//! Maps every command whose arguments name keys to the positions of those
//! keys. Commands outside this table are forwarded untouched.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use keyspace_core::{Arg, Command, TenantId};

/// Which arguments of a command are keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// `GET key`, `HSET key field value`, ...
    First,
    /// `RENAME src dst`, `RPOPLPUSH src dst`
    FirstTwo,
    /// `DEL key [key ...]`, `SINTER key [key ...]`
    All,
    /// `BLPOP key [key ...] timeout`
    AllButLast,
    /// `MSET key value [key value ...]`
    Alternating,
    /// `SORT key [BY pattern] [GET pattern ...] [STORE destination]`
    ///
    /// The source, the destination and every pattern are keys, except the
    /// `nosort` and `#` placeholders.
    Sort,
}

impl KeySpec {
    /// Which of `args` are keys
    pub fn key_positions(self, args: &[Arg]) -> Vec<bool> {
        let count = args.len();
        match self {
            KeySpec::First => (0..count).map(|i| i == 0).collect(),
            KeySpec::FirstTwo => (0..count).map(|i| i < 2).collect(),
            KeySpec::All => vec![true; count],
            KeySpec::AllButLast => (0..count).map(|i| i + 1 < count).collect(),
            KeySpec::Alternating => (0..count).map(|i| i % 2 == 0).collect(),
            KeySpec::Sort => sort_key_positions(args),
        }
    }
}

fn sort_key_positions(args: &[Arg]) -> Vec<bool> {
    let mut keys = vec![false; args.len()];
    if args.is_empty() {
        return keys;
    }
    keys[0] = true;

    let mut index = 1;
    while index < args.len() {
        let option = args[index].to_string_lossy().to_ascii_uppercase();
        let operand = args.get(index + 1).map(|arg| arg.as_bytes());
        match (option.as_str(), operand) {
            ("BY", Some(pattern)) => {
                keys[index + 1] = !pattern.eq_ignore_ascii_case(b"nosort");
                index += 2;
            }
            ("GET", Some(pattern)) => {
                keys[index + 1] = pattern != b"#";
                index += 2;
            }
            ("STORE", Some(_)) => {
                keys[index + 1] = true;
                index += 2;
            }
            // LIMIT offset count
            ("LIMIT", _) => index += 3,
            _ => index += 1,
        }
    }
    keys
}

const FIRST: &[&str] = &[
    // strings
    "APPEND", "DECR", "DECRBY", "GET", "GETBIT", "GETRANGE", "GETSET", "INCR", "INCRBY",
    "INCRBYFLOAT", "PSETEX", "SET", "SETBIT", "SETEX", "SETNX", "SETRANGE", "STRLEN",
    // hashes
    "HDEL", "HEXISTS", "HGET", "HGETALL", "HINCRBY", "HINCRBYFLOAT", "HKEYS", "HLEN", "HMGET",
    "HMSET", "HSET", "HSETNX", "HVALS",
    // lists
    "LINDEX", "LINSERT", "LLEN", "LPOP", "LPUSH", "LPUSHX", "LRANGE", "LREM", "LSET", "LTRIM",
    "RPOP", "RPUSH", "RPUSHX",
    // sets
    "SADD", "SCARD", "SISMEMBER", "SMEMBERS", "SPOP", "SRANDMEMBER", "SREM",
    // sorted sets
    "ZADD", "ZCARD", "ZCOUNT", "ZINCRBY", "ZRANGE", "ZRANGEBYSCORE", "ZRANK", "ZREM",
    "ZREMRANGEBYRANK", "ZREMRANGEBYSCORE", "ZREVRANGE", "ZREVRANGEBYSCORE", "ZREVRANK",
    "ZSCORE",
    // keys
    "EXPIRE", "EXPIREAT", "MOVE", "PERSIST", "PEXPIRE", "PEXPIREAT", "PTTL", "TTL",
    "TYPE",
];

const FIRST_TWO: &[&str] = &["BRPOPLPUSH", "RENAME", "RENAMENX", "RPOPLPUSH"];

const ALL: &[&str] = &["DEL", "EXISTS", "MGET", "SDIFF", "SINTER", "SUNION", "WATCH"];

const ALL_BUT_LAST: &[&str] = &["BLPOP", "BRPOP"];

const ALTERNATING: &[&str] = &["MSET", "MSETNX"];

const SORT: &[&str] = &["SORT"];

/// Every keyed command, by upper-case name
pub static KEYED_COMMANDS: Lazy<HashMap<&'static str, KeySpec>> = Lazy::new(|| {
    let groups = [
        (FIRST, KeySpec::First),
        (FIRST_TWO, KeySpec::FirstTwo),
        (ALL, KeySpec::All),
        (ALL_BUT_LAST, KeySpec::AllButLast),
        (ALTERNATING, KeySpec::Alternating),
        (SORT, KeySpec::Sort),
    ];
    groups
        .into_iter()
        .flat_map(|(names, spec)| names.iter().map(move |name| (*name, spec)))
        .collect()
});

/// Look up the key layout of a command, case-insensitively
pub fn key_spec(name: &str) -> Option<KeySpec> {
    KEYED_COMMANDS
        .get(name.to_ascii_uppercase().as_str())
        .copied()
}

/// Prefix every key argument of `command` with `tenant`'s namespace
///
/// Returns `false`, leaving the command unchanged, when the command isn't
/// in the keyed table.
pub fn namespace_command(command: &mut Command, tenant: &TenantId) -> bool {
    let Some(spec) = key_spec(command.name()) else {
        return false;
    };
    let prefix = tenant.qualify("");
    let keys = spec.key_positions(command.args());
    for (arg, is_key) in command.args_mut().iter_mut().zip(keys) {
        if is_key {
            *arg = arg.prefixed(&prefix);
        }
    }
    true
}
