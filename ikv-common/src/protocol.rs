//! # Inline Request Encoding
//!
//! Purpose: Serialize command arguments into the inline form of the server's
//! line protocol.
//!
//! ## Design Principles
//!
//! 1. **Append-Only**: Encoders only ever extend the caller's buffer.
//! 2. **Allocation-Free Digits**: Integers are rendered through a stack buffer.
//! 3. **Binary-Safe Tail**: Blob arguments are length-prefixed so their bytes
//!    never need escaping.
//!
//! ## Usage Notes
//!
//! - `write_string` copies bytes verbatim. The caller guarantees they contain
//!   no space and no CRLF; this is not checked at runtime.
//! - A blob is the last argument of a command. Its payload may hold any byte,
//!   including CRLF and NUL, because the server reads exactly `len` bytes.
//!
//! ## Wire Layout Example
//!
//! ```text
//! GET user:1\r\n
//! +-----+-----+--------+------+
//! | GET | ' ' | user:1 | CRLF |
//! +-----+-----+--------+------+
//!
//! SET greeting 5\r\nhello\r\n
//! +-----+-----+----------+-----+-----+------+-------+------+
//! | SET | ' ' | greeting | ' ' | len | CRLF | bytes | CRLF |
//! +-----+-----+----------+-----+-----+------+-------+------+
//! ```

use bytes::{BufMut, BytesMut};

/// Line terminator used by requests and replies.
pub const CRLF: &[u8] = b"\r\n";

/// Separator between successive arguments of one command.
pub const SEPARATOR: u8 = b' ';

/// Longest decimal rendering of an `i64` (`-9223372036854775808`).
pub const MAX_DECIMAL_LEN: usize = 20;

/// Appends a plain argument verbatim.
#[inline]
pub fn write_string(out: &mut BytesMut, value: &[u8]) {
    out.put_slice(value);
}

/// Appends the canonical decimal form of a signed integer.
pub fn write_integer(out: &mut BytesMut, value: i64) {
    let (buf, start) = encode_i64(value);
    out.put_slice(&buf[start..]);
}

/// Appends a binary-safe argument as `<len>\r\n<bytes>`.
pub fn write_blob(out: &mut BytesMut, value: &[u8]) {
    let (buf, start) = encode_u64(value.len() as u64);
    out.reserve(buf.len() - start + CRLF.len() + value.len());
    out.put_slice(&buf[start..]);
    out.put_slice(CRLF);
    out.put_slice(value);
}

/// Appends the single space between two arguments.
#[inline]
pub fn write_separator(out: &mut BytesMut) {
    out.put_u8(SEPARATOR);
}

/// Appends the CRLF that ends a command.
#[inline]
pub fn write_terminator(out: &mut BytesMut) {
    out.put_slice(CRLF);
}

fn encode_i64(value: i64) -> ([u8; MAX_DECIMAL_LEN], usize) {
    let (mut buf, mut start) = encode_u64(value.unsigned_abs());
    if value < 0 {
        start -= 1;
        buf[start] = b'-';
    }
    (buf, start)
}

// Digits are written right-aligned so the sign can be prepended in place.
fn encode_u64(mut value: u64) -> ([u8; MAX_DECIMAL_LEN], usize) {
    let mut buf = [0u8; MAX_DECIMAL_LEN];
    let mut start = MAX_DECIMAL_LEN;
    loop {
        start -= 1;
        buf[start] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    (buf, start)
}

/// Parses a signed decimal integer as produced by the server.
///
/// Returns `None` for empty input, stray characters or overflow.
pub fn parse_integer(data: &[u8]) -> Option<i64> {
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some(_) => (false, data),
        None => return None,
    };
    if digits.is_empty() {
        return None;
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        let digit = (b - b'0') as i64;
        // Accumulate negatively so i64::MIN round-trips.
        value = value.checked_mul(10)?.checked_sub(digit)?;
    }

    if negative {
        Some(value)
    } else {
        value.checked_neg()
    }
}
