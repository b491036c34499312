//! # Connection Transport
//!
//! Purpose: Own one server endpoint, push request bytes to it and classify
//! each reply line into a `Reply`.
//!
//! ## Design Principles
//! 1. **Deadline-Driven IO**: Every socket call is bounded by the time left
//!    until the caller's deadline.
//! 2. **Buffer Reuse**: The line buffer lives on the connection.
//! 3. **Binary-Safe**: Bulk payloads are read by length, never by delimiter.
//! 4. **Fail Closed**: After any IO failure the connection is marked broken;
//!    late replies would otherwise be paired with the wrong command.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::Bytes;
use ikv_common::{parse_integer, Reply, ReplyKind};

/// Largest bulk payload accepted from the server (512 MiB).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// A connection to one server endpoint.
///
/// Implementations perform the actual network IO; the execution bridge only
/// decides how many replies to wait for and until when.
pub trait Connection {
    /// Endpoint identifier, e.g. "127.0.0.1:6379".
    fn endpoint(&self) -> &str;

    /// Writes the full request before `deadline`.
    fn send(&mut self, request: &[u8], deadline: Instant) -> io::Result<()>;

    /// Reads and classifies one reply before `deadline`.
    fn receive(&mut self, deadline: Instant) -> io::Result<Reply>;
}

/// Blocking TCP connection speaking the inline protocol.
pub struct TcpConnection {
    endpoint: String,
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    broken: bool,
}

impl TcpConnection {
    /// Resolves `endpoint` and connects to the first reachable address.
    pub fn open(endpoint: &str, connect_timeout: Option<Duration>) -> io::Result<Self> {
        let addrs: Vec<SocketAddr> = endpoint.to_socket_addrs()?.collect();
        let mut last_err = io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} did not resolve to any address", endpoint),
        );

        for addr in addrs {
            let attempt = match connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    // Disable Nagle to keep request latency low for small payloads.
                    stream.set_nodelay(true)?;
                    tracing::debug!(endpoint, %addr, "connected");
                    return Ok(TcpConnection {
                        endpoint: endpoint.to_string(),
                        reader: BufReader::new(stream),
                        line_buf: Vec::with_capacity(128),
                        broken: false,
                    });
                }
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }

    /// True once an IO failure has poisoned the connection.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn ensure_usable(&self) -> io::Result<()> {
        if self.broken {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is broken after an earlier failure",
            ));
        }
        Ok(())
    }

    fn poison<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if result.is_err() {
            self.broken = true;
        }
        result
    }
}

impl Connection for TcpConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&mut self, request: &[u8], deadline: Instant) -> io::Result<()> {
        self.ensure_usable()?;
        let result = (|| {
            let stream = self.reader.get_mut();
            stream.set_write_timeout(Some(remaining(deadline)?))?;
            stream.write_all(request)?;
            stream.flush()
        })();
        self.poison(result)
    }

    fn receive(&mut self, deadline: Instant) -> io::Result<Reply> {
        self.ensure_usable()?;
        let result = (|| {
            self.reader
                .get_ref()
                .set_read_timeout(Some(remaining(deadline)?))?;
            read_reply(&mut self.reader, &mut self.line_buf)
        })();
        let result = self.poison(result);
        if let Ok(reply) = &result {
            tracing::trace!(kind = %reply.kind(), len = reply.len(), "reply received");
        }
        result
    }
}

/// Time left until `deadline`, or `TimedOut` once it has passed.
pub fn remaining(deadline: Instant) -> io::Result<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
        .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed"))
}

/// Reads one reply from the buffered reader and classifies it.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> io::Result<Reply> {
    read_line(reader, line_buf)?;
    let (&tag, rest) = line_buf
        .split_first()
        .ok_or_else(|| invalid_data("empty reply line"))?;

    match tag {
        b'+' if rest == b"OK" => Ok(Reply::ok()),
        // Status text other than OK (e.g. TYPE's "string") is surfaced as bulk.
        b'+' => Ok(Reply::bulk(Bytes::copy_from_slice(rest))),
        b'-' => Ok(Reply::error(Bytes::copy_from_slice(rest))),
        b':' => {
            parse_integer(rest).ok_or_else(|| invalid_data("malformed integer reply"))?;
            Ok(Reply::new(ReplyKind::Integer, Bytes::copy_from_slice(rest)))
        }
        b'$' => {
            let len = parse_integer(rest).ok_or_else(|| invalid_data("malformed bulk length"))?;
            read_bulk(reader, len)
        }
        b'*' => match parse_integer(rest) {
            Some(len) if len <= 0 => Ok(Reply::none()),
            Some(_) => Err(invalid_data("multi-bulk replies are not supported")),
            None => Err(invalid_data("malformed multi-bulk length")),
        },
        other => Err(invalid_data(format!("unknown reply tag 0x{:02x}", other))),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> io::Result<Reply> {
    if len < 0 {
        return Ok(Reply::nil());
    }
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= MAX_BULK_LEN)
        .ok_or_else(|| {
            invalid_data(format!("bulk length {} exceeds {} bytes", len, MAX_BULK_LEN))
        })?;

    // Grow with the bytes that actually arrive, not with the announced length.
    let mut data = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "bulk payload truncated",
        ));
    }

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != [b'\r', b'\n'] {
        return Err(invalid_data("bulk payload not terminated by CRLF"));
    }
    Ok(Reply::bulk(data))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "server closed the connection",
        ));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(invalid_data("reply line not terminated by CRLF"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}
