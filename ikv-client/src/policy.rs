//! # Reply Decode Policies
//!
//! Purpose: Map a `Reply` to a typed `Value` according to the contract of the
//! command that produced it.
//!
//! ## Rules
//! 1. **Errors First**: every policy turns an `Error` reply into
//!    `ClientError::Command` before looking at anything else.
//! 2. **Exhaustive**: each policy matches every `ReplyKind`; an unexpected kind
//!    is a protocol error, never a silent fallback.
//! 3. **Status-OK is `true`**: `+OK` decodes to a boolean, not to its text.

use std::fmt;

use bytes::Bytes;
use ikv_common::{parse_integer, ClientError, ClientResult, Reply, ReplyKind};

/// How a command's reply is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyPolicy {
    /// Decode driven by the reply kind alone.
    PassThrough,
    /// Integer reply read as a flag.
    Boolean,
    /// Status reply, or an integer flag from boolean-like commands.
    Status,
    /// Space-separated bulk payload split into a sequence.
    ListSplit,
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Bool(bool),
    Bytes(Bytes),
    List(Vec<Bytes>),
    Nil,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "(integer) {}", value),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Bytes(data) => write!(f, "\"{}\"", String::from_utf8_lossy(data).escape_debug()),
            Value::List(items) if items.is_empty() => f.write_str("(empty list)"),
            Value::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", idx + 1, String::from_utf8_lossy(item))?;
                }
                Ok(())
            }
            Value::Nil => f.write_str("(nil)"),
        }
    }
}

impl ReplyPolicy {
    /// Applies this policy to `reply`.
    pub fn decode(self, reply: Reply) -> ClientResult<Value> {
        match self {
            ReplyPolicy::PassThrough => pass_through(reply),
            ReplyPolicy::Boolean => boolean(reply),
            ReplyPolicy::Status => status(reply),
            ReplyPolicy::ListSplit => list_split(reply),
        }
    }
}

fn pass_through(reply: Reply) -> ClientResult<Value> {
    match reply.kind() {
        ReplyKind::Error => Err(ClientError::command(reply.into_data())),
        ReplyKind::Integer => Ok(Value::Integer(integer(&reply)?)),
        ReplyKind::Ok => Ok(Value::Bool(true)),
        ReplyKind::Bulk => Ok(Value::Bytes(reply.into_data())),
        ReplyKind::Nil | ReplyKind::None => Ok(Value::Nil),
    }
}

fn boolean(reply: Reply) -> ClientResult<Value> {
    match reply.kind() {
        ReplyKind::Error => Err(ClientError::command(reply.into_data())),
        ReplyKind::Integer => Ok(Value::Bool(flag(&reply))),
        kind @ (ReplyKind::Ok | ReplyKind::Bulk | ReplyKind::Nil | ReplyKind::None) => {
            Err(unexpected(kind))
        }
    }
}

fn status(reply: Reply) -> ClientResult<Value> {
    match reply.kind() {
        ReplyKind::Error => Err(ClientError::command(reply.into_data())),
        ReplyKind::Ok => Ok(Value::Bool(true)),
        // Some boolean-like commands answer with an integer instead of +OK.
        ReplyKind::Integer => Ok(Value::Bool(flag(&reply))),
        kind @ (ReplyKind::Bulk | ReplyKind::Nil | ReplyKind::None) => Err(unexpected(kind)),
    }
}

fn list_split(reply: Reply) -> ClientResult<Value> {
    match reply.kind() {
        ReplyKind::Error => Err(ClientError::command(reply.into_data())),
        ReplyKind::Bulk => Ok(Value::List(split_on_space(reply.into_data()))),
        ReplyKind::Nil | ReplyKind::None => Ok(Value::List(Vec::new())),
        kind @ (ReplyKind::Ok | ReplyKind::Integer) => Err(unexpected(kind)),
    }
}

fn flag(reply: &Reply) -> bool {
    reply.data().as_ref() != b"0"
}

fn integer(reply: &Reply) -> ClientResult<i64> {
    parse_integer(reply.data()).ok_or_else(|| {
        ClientError::protocol(format!(
            "malformed integer reply {:?}",
            String::from_utf8_lossy(reply.data())
        ))
    })
}

fn unexpected(kind: ReplyKind) -> ClientError {
    ClientError::protocol(format!("unexpected reply kind: {}", kind))
}

// Slices share the reply's buffer instead of copying each element.
fn split_on_space(data: Bytes) -> Vec<Bytes> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut start = 0;
    for (idx, &b) in data.iter().enumerate() {
        if b == b' ' {
            items.push(data.slice(start..idx));
            start = idx + 1;
        }
    }
    items.push(data.slice(start..));
    items
}

/// Conversion from a decoded `Value` into a command's Rust result type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> ClientResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> ClientError {
    ClientError::protocol(format!("expected {}, got {:?}", expected, value))
}

impl FromValue for Value {
    fn from_value(value: Value) -> ClientResult<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> ClientResult<Self> {
        match value {
            Value::Integer(n) => Ok(n),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> ClientResult<Self> {
        match value {
            Value::Bool(flag) => Ok(flag),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> ClientResult<Self> {
        match value {
            Value::Bytes(data) => Ok(data),
            other => Err(mismatch("bulk", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> ClientResult<Self> {
        utf8(Bytes::from_value(value)?)
    }
}

/// Scores arrive as bulk text; integers are accepted as well.
impl FromValue for f64 {
    fn from_value(value: Value) -> ClientResult<Self> {
        match value {
            Value::Integer(n) => Ok(n as f64),
            Value::Bytes(data) => std::str::from_utf8(&data)
                .ok()
                .and_then(|text| text.parse().ok())
                .ok_or_else(|| {
                    ClientError::protocol(format!(
                        "malformed number {:?}",
                        String::from_utf8_lossy(&data)
                    ))
                }),
            other => Err(mismatch("number", &other)),
        }
    }
}

impl FromValue for Vec<String> {
    fn from_value(value: Value) -> ClientResult<Self> {
        match value {
            Value::List(items) => items.into_iter().map(utf8).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> ClientResult<Self> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn utf8(data: Bytes) -> ClientResult<String> {
    String::from_utf8(data.to_vec())
        .map_err(|_| ClientError::protocol("reply is not valid UTF-8"))
}
