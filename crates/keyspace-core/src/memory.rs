//! In-process store backend
//!
//! `MemoryBackend` understands the subset of Redis commands that the typed
//! command families issue, with Redis reply shapes and error messages. It
//! also lets tests steer failure modes:
//! - `set_read_only(true)` rejects every write with a `READONLY` error
//! - `fail_next(error)` scripts the reply of the next command
//! - `commands()` returns every command received, in order

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::backend::{Arg, Command, StoreBackend, Value};
use crate::error::{StoreError, StoreErrorKind};
use crate::Result;

/// Commands rejected while the backend is read-only
const WRITE_COMMANDS: &[&str] = &[
    "SET", "SETEX", "PSETEX", "SETNX", "GETSET", "MSET", "APPEND", "INCR", "INCRBY", "DECR",
    "DECRBY", "INCRBYFLOAT", "DEL", "EXPIRE", "PEXPIRE", "PERSIST", "RENAME", "FLUSHDB",
    "FLUSHALL", "LPUSH", "RPUSH", "LPOP", "RPOP", "LTRIM", "LSET", "LREM", "HSET", "HSETNX",
    "HMSET", "HDEL", "HINCRBY", "SADD", "SREM", "ZADD", "ZREM", "ZINCRBY",
];

fn is_write(name: &str) -> bool {
    WRITE_COMMANDS.contains(&name)
}

#[derive(Debug, Clone)]
enum Entry {
    String(Vec<u8>),
    List(VecDeque<Vec<u8>>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    SortedSet(HashMap<Vec<u8>, f64>),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Entry::String(_) => "string",
            Entry::List(_) => "list",
            Entry::Hash(_) => "hash",
            Entry::Set(_) => "set",
            Entry::SortedSet(_) => "zset",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Entry::String(_) => false,
            Entry::List(l) => l.is_empty(),
            Entry::Hash(h) => h.is_empty(),
            Entry::Set(s) => s.is_empty(),
            Entry::SortedSet(z) => z.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(entry: Entry) -> Self {
        Self {
            entry,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Reply = std::result::Result<Value, StoreError>;

#[derive(Debug, Default)]
struct State {
    data: BTreeMap<Vec<u8>, Slot>,
    read_only: bool,
    scripted: VecDeque<StoreError>,
    log: Vec<Command>,
    reconnects: u64,
}

/// In-memory key-value store
///
/// Clones share the same data, so a test can keep a handle while a store
/// wrapper owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject (or accept again) every write command
    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }

    /// Fail the next command with `error`, whatever it is
    pub fn fail_next(&self, error: StoreError) {
        self.lock().scripted.push_back(error);
    }

    /// Every command received so far
    pub fn commands(&self) -> Vec<Command> {
        self.lock().log.clone()
    }

    /// Names of every command received so far
    pub fn command_names(&self) -> Vec<String> {
        self.lock().log.iter().map(|c| c.name().to_string()).collect()
    }

    /// Every live key, exactly as stored
    pub fn stored_keys(&self) -> Vec<String> {
        let mut state = self.lock();
        state.purge_expired();
        state
            .data
            .keys()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect()
    }

    /// Number of times `reconnect` was called
    pub fn reconnect_count(&self) -> u64 {
        self.lock().reconnects
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn execute(&self, command: &Command) -> Result<Value> {
        let mut state = self.lock();
        state.log.push(command.clone());

        if let Some(error) = state.scripted.pop_front() {
            debug!(command = command.name(), "Returning scripted error");
            return Err(error.into());
        }
        if state.read_only && is_write(command.name()) {
            return Err(StoreError::read_only().into());
        }

        Ok(state.apply(command)?)
    }

    async fn reconnect(&self) -> Result<()> {
        self.lock().reconnects += 1;
        Ok(())
    }
}

fn err(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorKind::Response, message)
}

fn wrong_type() -> StoreError {
    err("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn not_integer() -> StoreError {
    err("ERR value is not an integer or out of range")
}

fn syntax_error() -> StoreError {
    err("ERR syntax error")
}

fn bulk(bytes: &[u8]) -> Value {
    Value::Data(bytes.to_vec())
}

fn int(n: usize) -> Value {
    Value::Int(n as i64)
}

fn format_float(value: f64) -> Vec<u8> {
    value.to_string().into_bytes()
}

fn int_arg(arg: &Arg) -> std::result::Result<i64, StoreError> {
    std::str::from_utf8(arg.as_bytes())
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(not_integer)
}

fn float_arg(arg: &Arg) -> std::result::Result<f64, StoreError> {
    std::str::from_utf8(arg.as_bytes())
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| !f.is_nan())
        .ok_or_else(|| err("ERR value is not a valid float"))
}

fn parse_int(bytes: &[u8]) -> std::result::Result<i64, StoreError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(not_integer)
}

/// Resolve an inclusive Redis range against a sequence of `len` items
fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

/// Translate a Redis glob into an anchored byte regex
fn glob_to_regex(pattern: &[u8]) -> std::result::Result<regex::bytes::Regex, StoreError> {
    let mut out = String::from("(?s-u)^");
    let mut chars = pattern.iter().copied().peekable();
    while let Some(c) = chars.next() {
        match c {
            b'*' => out.push_str(".*"),
            b'?' => out.push('.'),
            b'[' => {
                out.push('[');
                if chars.peek() == Some(&b'^') {
                    chars.next();
                    out.push('^');
                }
                for c in chars.by_ref() {
                    if c == b']' {
                        break;
                    }
                    if c == b'\\' || c == b'[' {
                        out.push('\\');
                    }
                    push_byte(&mut out, c);
                }
                out.push(']');
            }
            b'\\' => {
                if let Some(escaped) = chars.next() {
                    push_literal(&mut out, escaped);
                }
            }
            other => push_literal(&mut out, other),
        }
    }
    out.push('$');
    regex::bytes::Regex::new(&out).map_err(|e| err(format!("ERR invalid pattern: {}", e)))
}

fn push_byte(out: &mut String, byte: u8) {
    if byte.is_ascii() && !byte.is_ascii_control() {
        out.push(byte as char);
    } else {
        out.push_str(&format!("\\x{:02x}", byte));
    }
}

fn push_literal(out: &mut String, byte: u8) {
    if byte.is_ascii_alphanumeric() {
        out.push(byte as char);
    } else {
        out.push_str(&format!("\\x{:02x}", byte));
    }
}

impl State {
    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.data.retain(|_, slot| !slot.is_expired(now));
    }

    fn purge_if_expired(&mut self, key: &[u8]) {
        let now = Instant::now();
        if self.data.get(key).is_some_and(|slot| slot.is_expired(now)) {
            self.data.remove(key);
        }
    }

    fn slot(&mut self, key: &[u8]) -> Option<&mut Slot> {
        self.purge_if_expired(key);
        self.data.get_mut(key)
    }

    fn remove_if_empty(&mut self, key: &[u8]) {
        if self.data.get(key).is_some_and(|slot| slot.entry.is_empty()) {
            self.data.remove(key);
        }
    }

    fn string(&mut self, key: &[u8]) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        match self.slot(key) {
            None => Ok(None),
            Some(Slot {
                entry: Entry::String(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type()),
        }
    }

    fn put_string(&mut self, key: &[u8], value: Vec<u8>, expires_at: Option<Instant>) {
        self.data.insert(
            key.to_vec(),
            Slot {
                entry: Entry::String(value),
                expires_at,
            },
        );
    }

    fn entry_or_insert(&mut self, key: &[u8], empty: fn() -> Entry) -> &mut Entry {
        self.purge_if_expired(key);
        &mut self
            .data
            .entry(key.to_vec())
            .or_insert_with(|| Slot::new(empty()))
            .entry
    }

    fn list(&mut self, key: &[u8]) -> std::result::Result<Option<&mut VecDeque<Vec<u8>>>, StoreError> {
        match self.slot(key) {
            None => Ok(None),
            Some(Slot {
                entry: Entry::List(l),
                ..
            }) => Ok(Some(l)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn hash(&mut self, key: &[u8]) -> std::result::Result<Option<&mut BTreeMap<Vec<u8>, Vec<u8>>>, StoreError> {
        match self.slot(key) {
            None => Ok(None),
            Some(Slot {
                entry: Entry::Hash(h),
                ..
            }) => Ok(Some(h)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn set(&mut self, key: &[u8]) -> std::result::Result<Option<&mut BTreeSet<Vec<u8>>>, StoreError> {
        match self.slot(key) {
            None => Ok(None),
            Some(Slot {
                entry: Entry::Set(s),
                ..
            }) => Ok(Some(s)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn zset(&mut self, key: &[u8]) -> std::result::Result<Option<&mut HashMap<Vec<u8>, f64>>, StoreError> {
        match self.slot(key) {
            None => Ok(None),
            Some(Slot {
                entry: Entry::SortedSet(z),
                ..
            }) => Ok(Some(z)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn apply(&mut self, command: &Command) -> Reply {
        let name = command.name();
        let args = command.args();
        let arity = |min: usize| -> std::result::Result<(), StoreError> {
            if args.len() < min {
                Err(err(format!(
                    "ERR wrong number of arguments for '{}' command",
                    name.to_ascii_lowercase()
                )))
            } else {
                Ok(())
            }
        };
        let key = move |i: usize| args[i].as_bytes();

        match name {
            "PING" => Ok(match args.first() {
                Some(message) => bulk(message.as_bytes()),
                None => Value::Status("PONG".to_string()),
            }),
            "DBSIZE" => {
                self.purge_expired();
                Ok(int(self.data.len()))
            }
            "FLUSHDB" | "FLUSHALL" => {
                self.data.clear();
                Ok(Value::Okay)
            }

            // Strings
            "GET" => {
                arity(1)?;
                Ok(self.string(key(0))?.map(|v| Value::Data(v)).unwrap_or(Value::Nil))
            }
            "SET" => {
                arity(2)?;
                self.cmd_set(args)
            }
            "SETEX" | "PSETEX" => {
                arity(3)?;
                let ttl = int_arg(&args[1])?;
                if ttl <= 0 {
                    return Err(err(format!(
                        "ERR invalid expire time in '{}' command",
                        name.to_ascii_lowercase()
                    )));
                }
                let ttl = if name == "SETEX" {
                    Duration::from_secs(ttl as u64)
                } else {
                    Duration::from_millis(ttl as u64)
                };
                self.put_string(key(0), args[2].as_bytes().to_vec(), Some(Instant::now() + ttl));
                Ok(Value::Okay)
            }
            "SETNX" => {
                arity(2)?;
                if self.slot(key(0)).is_some() {
                    Ok(Value::Int(0))
                } else {
                    self.put_string(key(0), args[1].as_bytes().to_vec(), None);
                    Ok(Value::Int(1))
                }
            }
            "GETSET" => {
                arity(2)?;
                let old = self.string(key(0))?;
                self.put_string(key(0), args[1].as_bytes().to_vec(), None);
                Ok(old.map(Value::Data).unwrap_or(Value::Nil))
            }
            "MGET" => {
                arity(1)?;
                let values = args
                    .iter()
                    .map(|k| match self.string(k.as_bytes()) {
                        Ok(Some(v)) => Value::Data(v),
                        _ => Value::Nil,
                    })
                    .collect();
                Ok(Value::Array(values))
            }
            "MSET" => {
                arity(2)?;
                if args.len() % 2 != 0 {
                    return Err(err("ERR wrong number of arguments for 'mset' command"));
                }
                for pair in args.chunks(2) {
                    self.put_string(pair[0].as_bytes(), pair[1].as_bytes().to_vec(), None);
                }
                Ok(Value::Okay)
            }
            "APPEND" => {
                arity(2)?;
                let expires_at = self.slot(key(0)).and_then(|s| s.expires_at);
                let mut current = self.string(key(0))?.unwrap_or_default();
                current.extend_from_slice(args[1].as_bytes());
                let len = current.len();
                self.put_string(key(0), current, expires_at);
                Ok(int(len))
            }
            "STRLEN" => {
                arity(1)?;
                Ok(int(self.string(key(0))?.map(|v| v.len()).unwrap_or(0)))
            }
            "INCR" | "DECR" | "INCRBY" | "DECRBY" => {
                let delta = match name {
                    "INCR" => {
                        arity(1)?;
                        1
                    }
                    "DECR" => {
                        arity(1)?;
                        -1
                    }
                    "INCRBY" => {
                        arity(2)?;
                        int_arg(&args[1])?
                    }
                    _ => {
                        arity(2)?;
                        int_arg(&args[1])?.checked_neg().ok_or_else(not_integer)?
                    }
                };
                self.incr_by(key(0), delta)
            }
            "INCRBYFLOAT" => {
                arity(2)?;
                let delta = float_arg(&args[1])?;
                let expires_at = self.slot(key(0)).and_then(|s| s.expires_at);
                let current = match self.string(key(0))? {
                    Some(v) => std::str::from_utf8(&v)
                        .ok()
                        .and_then(|s| s.parse::<f64>().ok())
                        .ok_or_else(|| err("ERR value is not a valid float"))?,
                    None => 0.0,
                };
                let updated = format_float(current + delta);
                self.put_string(key(0), updated.clone(), expires_at);
                Ok(Value::Data(updated))
            }

            // Keys
            "DEL" => {
                arity(1)?;
                let mut removed = 0;
                for k in args {
                    self.purge_if_expired(k.as_bytes());
                    if self.data.remove(k.as_bytes()).is_some() {
                        removed += 1;
                    }
                }
                Ok(int(removed))
            }
            "EXISTS" => {
                arity(1)?;
                let count = args
                    .iter()
                    .filter(|k| self.slot(k.as_bytes()).is_some())
                    .count();
                Ok(int(count))
            }
            "KEYS" => {
                arity(1)?;
                let pattern = glob_to_regex(key(0))?;
                self.purge_expired();
                let keys = self
                    .data
                    .keys()
                    .filter(|k| pattern.is_match(k))
                    .map(|k| bulk(k))
                    .collect();
                Ok(Value::Array(keys))
            }
            "TYPE" => {
                arity(1)?;
                let type_name = self
                    .slot(key(0))
                    .map(|s| s.entry.type_name())
                    .unwrap_or("none");
                Ok(Value::Status(type_name.to_string()))
            }
            "EXPIRE" | "PEXPIRE" => {
                arity(2)?;
                let amount = int_arg(&args[1])?;
                let ttl = if name == "EXPIRE" {
                    Duration::from_secs(amount.max(0) as u64)
                } else {
                    Duration::from_millis(amount.max(0) as u64)
                };
                if self.slot(key(0)).is_none() {
                    return Ok(Value::Int(0));
                }
                if amount <= 0 {
                    self.data.remove(key(0));
                } else if let Some(slot) = self.slot(key(0)) {
                    slot.expires_at = Some(Instant::now() + ttl);
                }
                Ok(Value::Int(1))
            }
            "TTL" | "PTTL" => {
                arity(1)?;
                let reply = match self.slot(key(0)) {
                    None => -2,
                    Some(Slot {
                        expires_at: None, ..
                    }) => -1,
                    Some(Slot {
                        expires_at: Some(at),
                        ..
                    }) => {
                        let remaining = at.saturating_duration_since(Instant::now());
                        if name == "TTL" {
                            ((remaining.as_millis() + 500) / 1000) as i64
                        } else {
                            remaining.as_millis() as i64
                        }
                    }
                };
                Ok(Value::Int(reply))
            }
            "PERSIST" => {
                arity(1)?;
                match self.slot(key(0)) {
                    Some(slot) if slot.expires_at.is_some() => {
                        slot.expires_at = None;
                        Ok(Value::Int(1))
                    }
                    _ => Ok(Value::Int(0)),
                }
            }
            "RENAME" => {
                arity(2)?;
                self.purge_if_expired(key(0));
                let slot = self
                    .data
                    .remove(key(0))
                    .ok_or_else(|| err("ERR no such key"))?;
                self.data.insert(key(1).to_vec(), slot);
                Ok(Value::Okay)
            }

            // Lists
            "LPUSH" | "RPUSH" => {
                arity(2)?;
                let Entry::List(list) = self.entry_or_insert(key(0), || Entry::List(VecDeque::new()))
                else {
                    return Err(wrong_type());
                };
                for value in &args[1..] {
                    if name == "LPUSH" {
                        list.push_front(value.as_bytes().to_vec());
                    } else {
                        list.push_back(value.as_bytes().to_vec());
                    }
                }
                Ok(int(list.len()))
            }
            "LPOP" | "RPOP" => {
                arity(1)?;
                let popped = match self.list(key(0))? {
                    Some(list) if name == "LPOP" => list.pop_front(),
                    Some(list) => list.pop_back(),
                    None => None,
                };
                self.remove_if_empty(key(0));
                Ok(popped.map(Value::Data).unwrap_or(Value::Nil))
            }
            "LLEN" => {
                arity(1)?;
                Ok(int(self.list(key(0))?.map(|l| l.len()).unwrap_or(0)))
            }
            "LINDEX" => {
                arity(2)?;
                let index = int_arg(&args[1])?;
                let value = self.list(key(0))?.and_then(|list| {
                    let len = list.len() as i64;
                    let index = if index < 0 { len + index } else { index };
                    usize::try_from(index).ok().and_then(|i| list.get(i).cloned())
                });
                Ok(value.map(Value::Data).unwrap_or(Value::Nil))
            }
            "LRANGE" => {
                arity(3)?;
                let (start, stop) = (int_arg(&args[1])?, int_arg(&args[2])?);
                let items = match self.list(key(0))? {
                    Some(list) => match normalize_range(start, stop, list.len()) {
                        Some((from, to)) => list
                            .iter()
                            .skip(from)
                            .take(to - from + 1)
                            .map(|v| bulk(v))
                            .collect(),
                        None => Vec::new(),
                    },
                    None => Vec::new(),
                };
                Ok(Value::Array(items))
            }
            "LTRIM" => {
                arity(3)?;
                let (start, stop) = (int_arg(&args[1])?, int_arg(&args[2])?);
                if let Some(list) = self.list(key(0))? {
                    match normalize_range(start, stop, list.len()) {
                        Some((from, to)) => {
                            list.truncate(to + 1);
                            list.rotate_left(from);
                            list.truncate(to + 1 - from);
                        }
                        None => list.clear(),
                    }
                }
                self.remove_if_empty(key(0));
                Ok(Value::Okay)
            }
            "LSET" => {
                arity(3)?;
                let index = int_arg(&args[1])?;
                let list = self.list(key(0))?.ok_or_else(|| err("ERR no such key"))?;
                let len = list.len() as i64;
                let index = if index < 0 { len + index } else { index };
                let slot = usize::try_from(index)
                    .ok()
                    .and_then(|i| list.get_mut(i))
                    .ok_or_else(|| err("ERR index out of range"))?;
                *slot = args[2].as_bytes().to_vec();
                Ok(Value::Okay)
            }

            "LREM" => {
                arity(3)?;
                let count = int_arg(&args[1])?;
                let target = args[2].as_bytes();
                let removed = match self.list(key(0))? {
                    Some(list) => {
                        let limit = if count == 0 {
                            usize::MAX
                        } else {
                            count.unsigned_abs() as usize
                        };
                        let mut positions: Vec<usize> = list
                            .iter()
                            .enumerate()
                            .filter(|(_, v)| v.as_slice() == target)
                            .map(|(i, _)| i)
                            .collect();
                        if count < 0 {
                            positions.reverse();
                        }
                        positions.truncate(limit);
                        positions.sort_unstable_by(|a, b| b.cmp(a));
                        for i in &positions {
                            list.remove(*i);
                        }
                        positions.len()
                    }
                    None => 0,
                };
                self.remove_if_empty(key(0));
                Ok(int(removed))
            }

            // Hashes
            "HSET" | "HMSET" => {
                arity(3)?;
                if args.len() % 2 != 1 {
                    return Err(err(format!(
                        "ERR wrong number of arguments for '{}' command",
                        name.to_ascii_lowercase()
                    )));
                }
                let Entry::Hash(hash) = self.entry_or_insert(key(0), || Entry::Hash(BTreeMap::new()))
                else {
                    return Err(wrong_type());
                };
                let mut added = 0;
                for pair in args[1..].chunks(2) {
                    if hash
                        .insert(pair[0].as_bytes().to_vec(), pair[1].as_bytes().to_vec())
                        .is_none()
                    {
                        added += 1;
                    }
                }
                Ok(if name == "HMSET" { Value::Okay } else { int(added) })
            }
            "HSETNX" => {
                arity(3)?;
                let Entry::Hash(hash) = self.entry_or_insert(key(0), || Entry::Hash(BTreeMap::new()))
                else {
                    return Err(wrong_type());
                };
                if hash.contains_key(args[1].as_bytes()) {
                    Ok(Value::Int(0))
                } else {
                    hash.insert(args[1].as_bytes().to_vec(), args[2].as_bytes().to_vec());
                    Ok(Value::Int(1))
                }
            }
            "HGET" => {
                arity(2)?;
                let value = self
                    .hash(key(0))?
                    .and_then(|h| h.get(args[1].as_bytes()).cloned());
                Ok(value.map(Value::Data).unwrap_or(Value::Nil))
            }
            "HMGET" => {
                arity(2)?;
                let hash = self.hash(key(0))?;
                let values = args[1..]
                    .iter()
                    .map(|field| {
                        hash.as_ref()
                            .and_then(|h| h.get(field.as_bytes()))
                            .map(|v| bulk(v))
                            .unwrap_or(Value::Nil)
                    })
                    .collect();
                Ok(Value::Array(values))
            }
            "HDEL" => {
                arity(2)?;
                let removed = match self.hash(key(0))? {
                    Some(hash) => args[1..]
                        .iter()
                        .filter(|field| hash.remove(field.as_bytes()).is_some())
                        .count(),
                    None => 0,
                };
                self.remove_if_empty(key(0));
                Ok(int(removed))
            }
            "HGETALL" | "HKEYS" | "HVALS" => {
                arity(1)?;
                let items = match self.hash(key(0))? {
                    Some(hash) => hash
                        .iter()
                        .flat_map(|(field, value)| match name {
                            "HKEYS" => vec![bulk(field)],
                            "HVALS" => vec![bulk(value)],
                            _ => vec![bulk(field), bulk(value)],
                        })
                        .collect(),
                    None => Vec::new(),
                };
                Ok(Value::Array(items))
            }
            "HLEN" => {
                arity(1)?;
                Ok(int(self.hash(key(0))?.map(|h| h.len()).unwrap_or(0)))
            }
            "HEXISTS" => {
                arity(2)?;
                let exists = self
                    .hash(key(0))?
                    .is_some_and(|h| h.contains_key(args[1].as_bytes()));
                Ok(Value::Int(exists as i64))
            }
            "HINCRBY" => {
                arity(3)?;
                let delta = int_arg(&args[2])?;
                let Entry::Hash(hash) = self.entry_or_insert(key(0), || Entry::Hash(BTreeMap::new()))
                else {
                    return Err(wrong_type());
                };
                let current = match hash.get(args[1].as_bytes()) {
                    Some(v) => parse_int(v)?,
                    None => 0,
                };
                let updated = current.checked_add(delta).ok_or_else(not_integer)?;
                hash.insert(
                    args[1].as_bytes().to_vec(),
                    updated.to_string().into_bytes(),
                );
                Ok(Value::Int(updated))
            }

            // Sets
            "SADD" => {
                arity(2)?;
                let Entry::Set(set) = self.entry_or_insert(key(0), || Entry::Set(BTreeSet::new()))
                else {
                    return Err(wrong_type());
                };
                let added = args[1..]
                    .iter()
                    .filter(|m| set.insert(m.as_bytes().to_vec()))
                    .count();
                Ok(int(added))
            }
            "SREM" => {
                arity(2)?;
                let removed = match self.set(key(0))? {
                    Some(set) => args[1..]
                        .iter()
                        .filter(|m| set.remove(m.as_bytes()))
                        .count(),
                    None => 0,
                };
                self.remove_if_empty(key(0));
                Ok(int(removed))
            }
            "SMEMBERS" => {
                arity(1)?;
                let members = self
                    .set(key(0))?
                    .map(|s| s.iter().map(|m| bulk(m)).collect())
                    .unwrap_or_default();
                Ok(Value::Array(members))
            }
            "SISMEMBER" => {
                arity(2)?;
                let member = self
                    .set(key(0))?
                    .is_some_and(|s| s.contains(args[1].as_bytes()));
                Ok(Value::Int(member as i64))
            }
            "SCARD" => {
                arity(1)?;
                Ok(int(self.set(key(0))?.map(|s| s.len()).unwrap_or(0)))
            }
            "SINTER" | "SUNION" | "SDIFF" => {
                arity(1)?;
                let mut sets = Vec::with_capacity(args.len());
                for k in args {
                    sets.push(self.set(k.as_bytes())?.cloned().unwrap_or_default());
                }
                let mut sets = sets.into_iter();
                let first = sets.next().unwrap_or_default();
                let result = sets.fold(first, |acc, next| match name {
                    "SINTER" => acc.intersection(&next).cloned().collect(),
                    "SUNION" => acc.union(&next).cloned().collect(),
                    _ => acc.difference(&next).cloned().collect(),
                });
                Ok(Value::Array(result.iter().map(|m| bulk(m)).collect()))
            }

            // Sorted sets
            "ZADD" => {
                arity(3)?;
                if args.len() % 2 != 1 {
                    return Err(syntax_error());
                }
                let mut pairs = Vec::with_capacity(args.len() / 2);
                for pair in args[1..].chunks(2) {
                    pairs.push((float_arg(&pair[0])?, pair[1].as_bytes().to_vec()));
                }
                let Entry::SortedSet(zset) =
                    self.entry_or_insert(key(0), || Entry::SortedSet(HashMap::new()))
                else {
                    return Err(wrong_type());
                };
                let added = pairs
                    .into_iter()
                    .filter(|(score, member)| zset.insert(member.clone(), *score).is_none())
                    .count();
                Ok(int(added))
            }
            "ZINCRBY" => {
                arity(3)?;
                let delta = float_arg(&args[1])?;
                let Entry::SortedSet(zset) =
                    self.entry_or_insert(key(0), || Entry::SortedSet(HashMap::new()))
                else {
                    return Err(wrong_type());
                };
                let score = zset.entry(args[2].as_bytes().to_vec()).or_insert(0.0);
                *score += delta;
                Ok(Value::Data(format_float(*score)))
            }
            "ZREM" => {
                arity(2)?;
                let removed = match self.zset(key(0))? {
                    Some(zset) => args[1..]
                        .iter()
                        .filter(|m| zset.remove(m.as_bytes()).is_some())
                        .count(),
                    None => 0,
                };
                self.remove_if_empty(key(0));
                Ok(int(removed))
            }
            "ZSCORE" => {
                arity(2)?;
                let score = self
                    .zset(key(0))?
                    .and_then(|z| z.get(args[1].as_bytes()).copied());
                Ok(score
                    .map(|s| Value::Data(format_float(s)))
                    .unwrap_or(Value::Nil))
            }
            "ZCARD" => {
                arity(1)?;
                Ok(int(self.zset(key(0))?.map(|z| z.len()).unwrap_or(0)))
            }
            "ZRANK" => {
                arity(2)?;
                let rank = self.zset(key(0))?.and_then(|z| {
                    sorted_members(z)
                        .iter()
                        .position(|(member, _)| member.as_slice() == args[1].as_bytes())
                });
                Ok(rank.map(int).unwrap_or(Value::Nil))
            }
            "ZRANGE" | "ZREVRANGE" => {
                arity(3)?;
                let (start, stop) = (int_arg(&args[1])?, int_arg(&args[2])?);
                let with_scores = match args.get(3) {
                    Some(flag) if flag.as_bytes().eq_ignore_ascii_case(b"WITHSCORES") => true,
                    Some(_) => return Err(syntax_error()),
                    None => false,
                };
                let mut members = self.zset(key(0))?.map(|z| sorted_members(z)).unwrap_or_default();
                if name == "ZREVRANGE" {
                    members.reverse();
                }
                let items = match normalize_range(start, stop, members.len()) {
                    Some((from, to)) => members[from..=to]
                        .iter()
                        .flat_map(|(member, score)| {
                            let mut out = vec![bulk(member)];
                            if with_scores {
                                out.push(Value::Data(format_float(*score)));
                            }
                            out
                        })
                        .collect(),
                    None => Vec::new(),
                };
                Ok(Value::Array(items))
            }

            other => Err(err(format!(
                "ERR unknown command '{}'",
                other.to_ascii_lowercase()
            ))),
        }
    }

    fn cmd_set(&mut self, args: &[Arg]) -> Reply {
        let key = args[0].as_bytes();
        let mut expires_at = None;
        let mut nx = false;
        let mut xx = false;

        let mut options = args[2..].iter();
        while let Some(option) = options.next() {
            let option = option.to_string_lossy().to_ascii_uppercase();
            match option.as_str() {
                "NX" => nx = true,
                "XX" => xx = true,
                "EX" | "PX" => {
                    let amount = options.next().ok_or_else(syntax_error)?;
                    let amount = int_arg(amount)?;
                    if amount <= 0 {
                        return Err(err("ERR invalid expire time in 'set' command"));
                    }
                    let ttl = if option == "EX" {
                        Duration::from_secs(amount as u64)
                    } else {
                        Duration::from_millis(amount as u64)
                    };
                    expires_at = Some(Instant::now() + ttl);
                }
                _ => return Err(syntax_error()),
            }
        }
        if nx && xx {
            return Err(syntax_error());
        }

        let exists = self.slot(key).is_some();
        if (nx && exists) || (xx && !exists) {
            return Ok(Value::Nil);
        }
        self.put_string(key, args[1].as_bytes().to_vec(), expires_at);
        Ok(Value::Okay)
    }

    fn incr_by(&mut self, key: &[u8], delta: i64) -> Reply {
        let expires_at = self.slot(key).and_then(|s| s.expires_at);
        let current = match self.string(key)? {
            Some(v) => parse_int(&v)?,
            None => 0,
        };
        let updated = current.checked_add(delta).ok_or_else(not_integer)?;
        self.put_string(key, updated.to_string().into_bytes(), expires_at);
        Ok(Value::Int(updated))
    }
}

fn sorted_members(zset: &HashMap<Vec<u8>, f64>) -> Vec<(Vec<u8>, f64)> {
    let mut members: Vec<(Vec<u8>, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    members
}
