//! In-memory connection used by unit tests.

use std::collections::VecDeque;
use std::io;
use std::time::Instant;

use ikv_common::Reply;

use crate::transport::Connection;

/// Records every request and answers from a fixed reply script.
///
/// An exhausted script behaves like a server that never answers.
pub struct ScriptedConnection {
    replies: VecDeque<Reply>,
    sent: Vec<u8>,
    fail_send: bool,
}

impl ScriptedConnection {
    pub fn new(replies: Vec<Reply>) -> Self {
        ScriptedConnection {
            replies: replies.into(),
            sent: Vec::new(),
            fail_send: false,
        }
    }

    pub fn failing_send() -> Self {
        ScriptedConnection {
            fail_send: true,
            ..ScriptedConnection::new(Vec::new())
        }
    }

    pub fn sent(&self) -> &[u8] {
        &self.sent
    }
}

impl Connection for ScriptedConnection {
    fn endpoint(&self) -> &str {
        "scripted:0"
    }

    fn send(&mut self, request: &[u8], _deadline: Instant) -> io::Result<()> {
        if self.fail_send {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        self.sent.extend_from_slice(request);
        Ok(())
    }

    fn receive(&mut self, _deadline: Instant) -> io::Result<Reply> {
        self.replies
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed"))
    }
}
