//! Store backend trait and the command/reply types it exchanges
//!
//! The `StoreBackend` trait is the black-box key-value client: it sends one
//! command and returns the raw reply. Namespacing and read-only handling are
//! layered on top by `keyspace-client`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::Result;

/// A single command argument, as raw bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Arg(Vec<u8>);

impl Arg {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The argument as text, replacing invalid UTF-8
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Prepend `prefix` to this argument
    pub fn prefixed(&self, prefix: &str) -> Arg {
        let mut bytes = Vec::with_capacity(prefix.len() + self.0.len());
        bytes.extend_from_slice(prefix.as_bytes());
        bytes.extend_from_slice(&self.0);
        Arg(bytes)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg(value.as_bytes().to_vec())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg(value.into_bytes())
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg(value.to_vec())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg(value)
    }
}

macro_rules! arg_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg(value.to_string().into_bytes())
                }
            }
        )*
    };
}

arg_from_display!(i64, u64, i32, u32, usize, f64);

/// A command to send to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
}

impl Command {
    /// Create a command; the name is normalised to upper case
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            args: Vec::new(),
        }
    }

    pub fn with_args(name: &str, args: Vec<Arg>) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            args,
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Arg> {
        &mut self.args
    }
}

/// A reply from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    Data(Vec<u8>),
    Status(String),
    Okay,
    Double(f64),
    Boolean(bool),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Data(value.as_bytes().to_vec())
    }
}

/// Conversion from a store reply into a Rust type.
///
/// `Nil` decodes to the type's empty reading (`None`, `0`, `false`, empty
/// collection) wherever one exists.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> std::result::Result<Self, String>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        Ok(value)
    }
}

impl FromValue for () {
    fn from_value(_value: Value) -> std::result::Result<Self, String> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Nil => Ok(false),
            Value::Int(n) => Ok(n != 0),
            Value::Boolean(b) => Ok(b),
            Value::Okay => Ok(true),
            Value::Status(s) => Ok(s == "OK"),
            Value::Data(d) => Ok(d == b"1" || d == b"OK"),
            other => Err(format!("cannot read {:?} as bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Nil => Ok(0),
            Value::Int(n) => Ok(n),
            Value::Data(d) => parse_text(&d),
            Value::Status(s) => s.parse().map_err(|e| format!("invalid integer: {}", e)),
            other => Err(format!("cannot read {:?} as integer", other)),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        let n = i64::from_value(value)?;
        u64::try_from(n).map_err(|_| format!("negative value {} for unsigned integer", n))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Nil => Ok(0.0),
            Value::Double(d) => Ok(d),
            Value::Int(n) => Ok(n as f64),
            Value::Data(d) => parse_text(&d),
            Value::Status(s) => s.parse().map_err(|e| format!("invalid float: {}", e)),
            other => Err(format!("cannot read {:?} as float", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Data(d) => String::from_utf8(d).map_err(|e| format!("invalid UTF-8: {}", e)),
            Value::Status(s) => Ok(s),
            Value::Okay => Ok("OK".to_string()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Double(d) => Ok(d.to_string()),
            other => Err(format!("cannot read {:?} as string", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Nil => Ok(Vec::new()),
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(format!("cannot read {:?} as array", other)),
        }
    }
}

impl<A: FromValue, B: FromValue> FromValue for (A, B) {
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(a), Some(b)) => Ok((A::from_value(a)?, B::from_value(b)?)),
                    _ => Err("expected a pair".to_string()),
                }
            }
            other => Err(format!("cannot read {:?} as pair", other)),
        }
    }
}

impl<K, V> FromValue for HashMap<K, V>
where
    K: FromValue + Eq + Hash,
    V: FromValue,
{
    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Nil => Ok(HashMap::new()),
            Value::Array(items) => {
                if items.len() % 2 != 0 {
                    return Err("odd number of elements in map reply".to_string());
                }
                let mut map = HashMap::with_capacity(items.len() / 2);
                let mut items = items.into_iter();
                while let (Some(k), Some(v)) = (items.next(), items.next()) {
                    map.insert(K::from_value(k)?, V::from_value(v)?);
                }
                Ok(map)
            }
            other => Err(format!("cannot read {:?} as map", other)),
        }
    }
}

fn parse_text<T: std::str::FromStr>(bytes: &[u8]) -> std::result::Result<T, String>
where
    T::Err: fmt::Display,
{
    std::str::from_utf8(bytes)
        .map_err(|e| format!("invalid UTF-8: {}", e))?
        .parse()
        .map_err(|e| format!("invalid number: {}", e))
}

/// A key-value store client.
///
/// Implementations:
/// - `RedisBackend` (crate `keyspace-redis`): a Redis connection manager
/// - `MemoryBackend`: in-process store for tests and local tooling
///
/// Implementations must report store rejections as `Error::Store` so that
/// read-only replies can be recognised.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Send one command and return the raw reply
    async fn execute(&self, command: &Command) -> Result<Value>;

    /// Re-establish the underlying connection
    async fn reconnect(&self) -> Result<()>;
}
