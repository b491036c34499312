//! # Reply Model
//!
//! One decoded unit of server response: a kind tag plus the raw payload.
//!
//! `Nil` and `None` are distinct absence markers. `Nil` is a null bulk
//! (`$-1`); `None` is a reply that carries no element at all (`*-1`, `*0`).

use std::fmt;

use bytes::Bytes;

/// Classification of a server reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    /// `+OK` status line.
    Ok,
    /// `:<n>` integer; payload holds the decimal digits.
    Integer,
    /// `$<len>` bulk payload (also used for non-OK status text).
    Bulk,
    /// `$-1` null bulk.
    Nil,
    /// Reply without any element.
    None,
    /// `-<message>` error reply.
    Error,
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyKind::Ok => "status",
            ReplyKind::Integer => "integer",
            ReplyKind::Bulk => "bulk",
            ReplyKind::Nil => "nil",
            ReplyKind::None => "none",
            ReplyKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// A server reply with its raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    kind: ReplyKind,
    data: Bytes,
}

impl Reply {
    /// Builds a reply from a kind and raw payload.
    pub fn new(kind: ReplyKind, data: impl Into<Bytes>) -> Self {
        Reply {
            kind,
            data: data.into(),
        }
    }

    pub fn ok() -> Self {
        Reply::new(ReplyKind::Ok, Bytes::from_static(b"OK"))
    }

    /// Integer reply carrying the canonical decimal digits of `value`.
    pub fn integer(value: i64) -> Self {
        Reply::new(ReplyKind::Integer, value.to_string())
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::new(ReplyKind::Bulk, data)
    }

    pub fn nil() -> Self {
        Reply::new(ReplyKind::Nil, Bytes::new())
    }

    pub fn none() -> Self {
        Reply::new(ReplyKind::None, Bytes::new())
    }

    pub fn error(message: impl Into<Bytes>) -> Self {
        Reply::new(ReplyKind::Error, message)
    }

    /// Returns the reply kind.
    #[inline]
    pub fn kind(&self) -> ReplyKind {
        self.kind
    }

    /// Returns the raw payload.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns the payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consumes the reply, returning its payload.
    pub fn into_data(self) -> Bytes {
        self.data
    }
}
