//! # Command Descriptor Table
//!
//! Purpose: Declare every supported command once, as data, and derive the
//! typed client methods from that declaration.
//!
//! ## Design Principles
//! 1. **Table-Driven**: A command is a `(keyword, argument kinds, policy)`
//!    triple. Behaviour lives in one generic procedure (`Client::call`).
//! 2. **Static Arity**: `CommandDescriptor<N>` only accepts `[Arg; N]`, so a
//!    wrong argument count does not compile. The dynamic path
//!    (`Client::call_info`) checks arity at call time instead.
//! 3. **Blob Last**: At most one binary-safe argument, always in final
//!    position.

use std::fmt;

use bytes::Bytes;
use ikv_common::{ClientError, ClientResult};

use crate::batch::Batch;
use crate::client::Client;
use crate::policy::ReplyPolicy;
use crate::transport::Connection;

/// Wire kind of a command argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    /// Raw token; must not contain space or CRLF.
    Str,
    /// Signed decimal integer.
    Int,
    /// Length-prefixed, binary-safe payload.
    Blob,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArgType::Str => "string",
            ArgType::Int => "integer",
            ArgType::Blob => "blob",
        })
    }
}

/// A positional argument value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a> {
    Str(&'a [u8]),
    Int(i64),
    Blob(&'a [u8]),
}

impl Arg<'_> {
    pub fn arg_type(&self) -> ArgType {
        match self {
            Arg::Str(_) => ArgType::Str,
            Arg::Int(_) => ArgType::Int,
            Arg::Blob(_) => ArgType::Blob,
        }
    }
}

/// Immutable description of one command with `N` arguments.
#[derive(Debug)]
pub struct CommandDescriptor<const N: usize> {
    pub keyword: &'static str,
    pub args: [ArgType; N],
    pub policy: ReplyPolicy,
}

impl<const N: usize> CommandDescriptor<N> {
    /// Arity-erased view of a registered descriptor.
    pub fn info(&'static self) -> CommandInfo {
        CommandInfo {
            keyword: self.keyword,
            args: &self.args,
            policy: self.policy,
        }
    }
}

/// Descriptor with its arity erased, for table listings and dynamic calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub keyword: &'static str,
    pub args: &'static [ArgType],
    pub policy: ReplyPolicy,
}

impl CommandInfo {
    /// Checks `args` against the descriptor without writing anything.
    pub fn validate(&self, args: &[Arg<'_>]) -> ClientResult<()> {
        if args.len() != self.args.len() {
            return Err(ClientError::Argument(format!(
                "{} expects {} argument(s), got {}",
                self.keyword,
                self.args.len(),
                args.len()
            )));
        }
        for (idx, (expected, arg)) in self.args.iter().zip(args).enumerate() {
            if arg.arg_type() != *expected {
                return Err(ClientError::Argument(format!(
                    "{} argument {} must be {}, got {}",
                    self.keyword,
                    idx + 1,
                    expected,
                    arg.arg_type()
                )));
            }
        }
        Ok(())
    }

    /// Validates `args` and appends one finished command to `batch`.
    pub fn encode(&self, batch: &mut Batch, args: &[Arg<'_>]) -> ClientResult<()> {
        self.validate(args)?;
        batch.start_command(self.keyword)?;
        for (idx, arg) in args.iter().enumerate() {
            if idx > 0 {
                batch.write_separator();
            }
            match *arg {
                Arg::Str(value) => batch.write_string(value),
                Arg::Int(value) => batch.write_integer(value),
                Arg::Blob(value) => batch.write_blob(value),
            }
        }
        batch.finish_command()
    }
}

/// Looks a command up by keyword, ignoring ASCII case.
pub fn find(keyword: &str) -> Option<CommandInfo> {
    all()
        .into_iter()
        .find(|info| info.keyword.eq_ignore_ascii_case(keyword))
}

macro_rules! count_args {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count_args!($($tail)*) };
}

macro_rules! arg_param {
    (Str) => { &[u8] };
    (Int) => { i64 };
    (Blob) => { &[u8] };
}

macro_rules! arg_value {
    (Str, $value:expr) => { Arg::Str($value) };
    (Int, $value:expr) => { Arg::Int($value) };
    (Blob, $value:expr) => { Arg::Blob($value) };
}

macro_rules! commands {
    ($(
        $(#[$doc:meta])*
        $method:ident => $desc:ident($keyword:literal, [$($param:ident: $kind:ident),*], $policy:ident) -> $out:ty;
    )*) => {
        $(
            #[doc = concat!("`", $keyword, "` descriptor.")]
            pub static $desc: CommandDescriptor<{ count_args!($($kind)*) }> = CommandDescriptor {
                keyword: $keyword,
                args: [$(ArgType::$kind),*],
                policy: ReplyPolicy::$policy,
            };
        )*

        /// Every registered command, in declaration order.
        pub fn all() -> Vec<CommandInfo> {
            vec![$($desc.info()),*]
        }

        impl<C: Connection> Client<C> {
            $(
                $(#[$doc])*
                pub fn $method(&mut self $(, $param: arg_param!($kind))*) -> ClientResult<$out> {
                    self.call(&$desc, [$(arg_value!($kind, $param)),*])
                }
            )*
        }
    };
}

commands! {
    // Connection
    /// Asks the server to close the connection.
    quit => QUIT("QUIT", [], Status) -> bool;
    auth => AUTH("AUTH", [password: Str], Status) -> bool;

    // Keyspace
    /// Returns true if `key` exists.
    exists => EXISTS("EXISTS", [key: Str], Boolean) -> bool;
    /// Removes `key`, returning the number of keys removed.
    del => DEL("DEL", [key: Str], PassThrough) -> i64;
    /// Returns the type name stored at `key` ("none" when missing).
    key_type => TYPE("TYPE", [key: Str], PassThrough) -> String;
    /// Lists keys matching a glob-style `pattern`.
    keys => KEYS("KEYS", [pattern: Str], ListSplit) -> Vec<String>;
    random_key => RANDOMKEY("RANDOMKEY", [], PassThrough) -> Option<Bytes>;
    rename => RENAME("RENAME", [from: Str, to: Str], Status) -> bool;
    /// Renames only if `to` does not exist yet; false otherwise.
    renamenx => RENAMENX("RENAMENX", [from: Str, to: Str], Status) -> bool;
    dbsize => DBSIZE("DBSIZE", [], PassThrough) -> i64;
    /// Sets a time-to-live of `seconds` on `key`.
    expire => EXPIRE("EXPIRE", [key: Str, seconds: Int], Boolean) -> bool;
    /// Expires `key` at a unix timestamp in seconds.
    expire_at => EXPIREAT("EXPIREAT", [key: Str, timestamp: Int], Boolean) -> bool;
    /// Seconds left before `key` expires; negative when no TTL applies.
    ttl => TTL("TTL", [key: Str], PassThrough) -> i64;
    select => SELECT("SELECT", [db: Int], Status) -> bool;
    /// Moves `key` into database `db`.
    move_key => MOVE("MOVE", [key: Str, db: Int], Boolean) -> bool;
    flush_db => FLUSHDB("FLUSHDB", [], Status) -> bool;
    flush_all => FLUSHALL("FLUSHALL", [], Status) -> bool;

    // Strings
    /// Stores a binary-safe `value` at `key`.
    set => SET("SET", [key: Str, value: Blob], Status) -> bool;
    /// Fetches the value at `key`; `None` when missing.
    get => GET("GET", [key: Str], PassThrough) -> Option<Bytes>;
    /// Stores `value` and returns the previous value.
    getset => GETSET("GETSET", [key: Str, value: Blob], PassThrough) -> Option<Bytes>;
    setnx => SETNX("SETNX", [key: Str, value: Blob], Boolean) -> bool;
    incr => INCR("INCR", [key: Str], PassThrough) -> i64;
    incrby => INCRBY("INCRBY", [key: Str, delta: Int], PassThrough) -> i64;
    decr => DECR("DECR", [key: Str], PassThrough) -> i64;
    decrby => DECRBY("DECRBY", [key: Str, delta: Int], PassThrough) -> i64;

    // Lists
    rpush => RPUSH("RPUSH", [key: Str, value: Blob], Status) -> bool;
    lpush => LPUSH("LPUSH", [key: Str, value: Blob], Status) -> bool;
    llen => LLEN("LLEN", [key: Str], PassThrough) -> i64;
    /// Keeps only the elements between `start` and `stop` (inclusive).
    ltrim => LTRIM("LTRIM", [key: Str, start: Int, stop: Int], Status) -> bool;
    /// Element at `index`; negative indexes count from the tail.
    lindex => LINDEX("LINDEX", [key: Str, index: Int], PassThrough) -> Option<Bytes>;
    lset => LSET("LSET", [key: Str, index: Int, value: Blob], Status) -> bool;
    /// Removes up to `count` occurrences of `value`.
    lrem => LREM("LREM", [key: Str, count: Int, value: Blob], PassThrough) -> i64;
    lpop => LPOP("LPOP", [key: Str], PassThrough) -> Option<Bytes>;
    rpop => RPOP("RPOP", [key: Str], PassThrough) -> Option<Bytes>;
    /// Pops the tail of `source` and pushes it onto the head of `destination`.
    rpoplpush => RPOPLPUSH("RPOPLPUSH", [source: Str, destination: Str], PassThrough) -> Option<Bytes>;

    // Sets
    sadd => SADD("SADD", [key: Str, member: Blob], Boolean) -> bool;
    srem => SREM("SREM", [key: Str, member: Blob], Boolean) -> bool;
    spop => SPOP("SPOP", [key: Str], PassThrough) -> Option<Bytes>;
    smove => SMOVE("SMOVE", [source: Str, destination: Str, member: Blob], Boolean) -> bool;
    scard => SCARD("SCARD", [key: Str], PassThrough) -> i64;
    /// Returns true if `member` belongs to the set at `key`.
    sismember => SISMEMBER("SISMEMBER", [key: Str, member: Blob], Boolean) -> bool;
    srandmember => SRANDMEMBER("SRANDMEMBER", [key: Str], PassThrough) -> Option<Bytes>;

    // Sorted sets
    /// Adds `member` with an integer `score`; returns the number added.
    zadd => ZADD("ZADD", [key: Str, score: Int, member: Blob], PassThrough) -> i64;
    zrem => ZREM("ZREM", [key: Str, member: Blob], Boolean) -> bool;
    /// Adds `delta` to the score of `member`; returns the new score.
    zincrby => ZINCRBY("ZINCRBY", [key: Str, delta: Int, member: Blob], PassThrough) -> f64;
    zrank => ZRANK("ZRANK", [key: Str, member: Blob], PassThrough) -> Option<i64>;
    zrevrank => ZREVRANK("ZREVRANK", [key: Str, member: Blob], PassThrough) -> Option<i64>;
    zcard => ZCARD("ZCARD", [key: Str], PassThrough) -> i64;
    zscore => ZSCORE("ZSCORE", [key: Str, member: Blob], PassThrough) -> Option<f64>;
    zremrangebyrank => ZREMRANGEBYRANK("ZREMRANGEBYRANK", [key: Str, start: Int, stop: Int], PassThrough) -> i64;
    zremrangebyscore => ZREMRANGEBYSCORE("ZREMRANGEBYSCORE", [key: Str, min: Int, max: Int], PassThrough) -> i64;

    // Persistence
    save => SAVE("SAVE", [], Status) -> bool;
    /// Starts a background save; returns the server's status text.
    bgsave => BGSAVE("BGSAVE", [], PassThrough) -> String;
    /// Unix time of the last successful save.
    lastsave => LASTSAVE("LASTSAVE", [], PassThrough) -> i64;
}
