//! # Batch
//!
//! Purpose: Accumulate one or more encoded commands in a single buffer so they
//! can be transmitted together, then hand back their replies in order.
//!
//! ## Design Principles
//! 1. **Single Owner**: A batch belongs to exactly one call and is dropped
//!    with it, on success and on every error path.
//! 2. **Forward-Only Cursor**: Replies are popped FIFO; there is no rewind.
//! 3. **Amortized Growth**: `BytesMut` grows geometrically as commands land.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::BytesMut;
use ikv_common::{
    write_blob, write_integer, write_separator, write_string, write_terminator, ClientError,
    ClientResult, Reply,
};

use crate::metrics::ClientMetrics;

const INITIAL_CAPACITY: usize = 256;

/// Encoded commands plus the replies delivered for them.
#[derive(Debug)]
pub struct Batch {
    buf: BytesMut,
    commands: usize,
    open: bool,
    replies: VecDeque<Reply>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    /// Creates an empty, untracked batch.
    pub fn new() -> Self {
        Batch {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
            commands: 0,
            open: false,
            replies: VecDeque::new(),
            metrics: None,
        }
    }

    /// Creates a batch counted in the `live_batches` gauge until dropped.
    pub fn tracked(metrics: Arc<ClientMetrics>) -> Self {
        metrics.record_batch_created();
        let mut batch = Batch::new();
        batch.metrics = Some(metrics);
        batch
    }

    /// Starts a command by writing `<KEYWORD> `.
    ///
    /// Fails without touching the buffer while another command is open.
    pub fn start_command(&mut self, keyword: &str) -> ClientResult<()> {
        if self.open {
            return Err(ClientError::protocol(format!(
                "cannot start {} while a command is open",
                keyword
            )));
        }
        self.open = true;
        write_string(&mut self.buf, keyword.as_bytes());
        write_separator(&mut self.buf);
        Ok(())
    }

    /// Appends a plain argument. Must not contain space or CRLF.
    pub fn write_string(&mut self, value: &[u8]) {
        write_string(&mut self.buf, value);
    }

    /// Appends a signed integer argument.
    pub fn write_integer(&mut self, value: i64) {
        write_integer(&mut self.buf, value);
    }

    /// Appends a binary-safe argument.
    pub fn write_blob(&mut self, value: &[u8]) {
        write_blob(&mut self.buf, value);
    }

    /// Appends the separator between two arguments.
    pub fn write_separator(&mut self) {
        write_separator(&mut self.buf);
    }

    /// Terminates the current command with CRLF.
    pub fn finish_command(&mut self) -> ClientResult<()> {
        if !self.open {
            return Err(ClientError::protocol("no open command to finish"));
        }
        write_terminator(&mut self.buf);
        self.open = false;
        self.commands += 1;
        Ok(())
    }

    /// Number of finished commands.
    pub fn command_count(&self) -> usize {
        self.commands
    }

    /// True while a command has been started but not finished.
    pub fn has_open_command(&self) -> bool {
        self.open
    }

    /// Encoded request bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of replies still waiting to be popped.
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }

    pub(crate) fn push_reply(&mut self, reply: Reply) {
        self.replies.push_back(reply);
    }

    /// Pops the next reply in submission order.
    ///
    /// Fails with a protocol error once every delivered reply was consumed.
    pub fn next_reply(&mut self) -> ClientResult<Reply> {
        self.replies.pop_front().ok_or_else(|| {
            ClientError::protocol(format!(
                "no pending reply ({} command(s) in batch)",
                self.commands
            ))
        })
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        if let Some(metrics) = self.metrics.take() {
            metrics.record_batch_released();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_keyword_and_arguments() {
        let mut batch = Batch::new();
        batch.start_command("ZADD").unwrap();
        batch.write_string(b"scores");
        batch.write_separator();
        batch.write_integer(-3);
        batch.write_separator();
        batch.write_blob(b"a\r\nb");
        batch.finish_command().unwrap();

        assert_eq!(batch.as_bytes(), b"ZADD scores -3 4\r\na\r\nb\r\n");
        assert_eq!(batch.command_count(), 1);
        assert!(!batch.has_open_command());
    }

    #[test]
    fn command_without_arguments_keeps_trailing_space() {
        let mut batch = Batch::new();
        batch.start_command("DBSIZE").unwrap();
        batch.finish_command().unwrap();
        assert_eq!(batch.as_bytes(), b"DBSIZE \r\n");
    }

    #[test]
    fn pipelined_commands_are_concatenated() {
        let mut batch = Batch::new();
        batch.start_command("INCR").unwrap();
        batch.write_string(b"a");
        batch.finish_command().unwrap();
        batch.start_command("GET").unwrap();
        batch.write_string(b"a");
        batch.finish_command().unwrap();

        assert_eq!(batch.as_bytes(), b"INCR a\r\nGET a\r\n");
        assert_eq!(batch.command_count(), 2);
    }

    #[test]
    fn replies_drain_in_order_then_fail() {
        let mut batch = Batch::new();
        for _ in 0..2 {
            batch.start_command("PING").unwrap();
            batch.finish_command().unwrap();
        }
        batch.push_reply(Reply::integer(1));
        batch.push_reply(Reply::bulk(&b"two"[..]));

        assert_eq!(batch.next_reply().unwrap(), Reply::integer(1));
        assert_eq!(batch.next_reply().unwrap(), Reply::bulk(&b"two"[..]));
        assert!(matches!(
            batch.next_reply(),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn next_reply_before_execution_fails() {
        let mut batch = Batch::new();
        batch.start_command("GET").unwrap();
        batch.write_string(b"k");
        batch.finish_command().unwrap();
        assert!(matches!(
            batch.next_reply(),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn misnested_commands_are_rejected_without_writing() {
        let mut batch = Batch::new();
        assert!(matches!(
            batch.finish_command(),
            Err(ClientError::Protocol(_))
        ));
        assert!(batch.as_bytes().is_empty());

        batch.start_command("GET").unwrap();
        batch.write_string(b"k");
        assert!(matches!(
            batch.start_command("SET"),
            Err(ClientError::Protocol(_))
        ));
        assert_eq!(batch.as_bytes(), b"GET k");
        assert_eq!(batch.command_count(), 0);

        batch.finish_command().unwrap();
        assert_eq!(batch.as_bytes(), b"GET k\r\n");
        assert_eq!(batch.command_count(), 1);
    }

    #[test]
    fn tracked_batch_releases_on_drop() {
        let metrics = Arc::new(ClientMetrics::new());
        {
            let _batch = Batch::tracked(metrics.clone());
            assert_eq!(metrics.snapshot().live_batches, 1);
        }
        assert_eq!(metrics.snapshot().live_batches, 0);
    }
}
