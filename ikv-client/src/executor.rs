//! # Execution Bridge
//!
//! Purpose: Hand a finished `Batch` to a `Connection`, block until every
//! command has been answered or the timeout elapses, and report how many
//! replies were delivered.
//!
//! ## Contract
//! - A return value of `0` means failure. The diagnostic text is stored in the
//!   caller's `ErrorContext` and stays valid until the next execution.
//! - On success the batch holds exactly one reply per command.
//! - No retries are issued here.

use std::time::{Duration, Instant};

use crate::batch::Batch;
use crate::transport::Connection;

/// Timeout applied to every generated command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Per-client slot holding the most recent diagnostic message.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    last: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the slot with a new diagnostic.
    pub fn record(&mut self, message: impl Into<String>) {
        self.last = Some(message.into());
    }

    /// Returns the most recent diagnostic, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

/// Runs `batch` against `conn`, waiting at most `timeout` in total.
///
/// Returns the number of replies delivered into the batch, or `0` on failure.
#[must_use]
pub fn execute<C: Connection + ?Sized>(
    conn: &mut C,
    batch: &mut Batch,
    timeout: Duration,
    errors: &mut ErrorContext,
) -> usize {
    let expected = batch.command_count();
    if batch.has_open_command() {
        errors.record("batch has an unterminated command");
        return 0;
    }
    if expected == 0 {
        errors.record("batch is empty");
        return 0;
    }

    let deadline = Instant::now() + timeout;
    tracing::debug!(
        endpoint = conn.endpoint(),
        commands = expected,
        bytes = batch.as_bytes().len(),
        "executing batch"
    );

    if let Err(err) = conn.send(batch.as_bytes(), deadline) {
        return fail(conn.endpoint(), errors, timeout, 0, expected, &err);
    }

    for received in 0..expected {
        match conn.receive(deadline) {
            Ok(reply) => batch.push_reply(reply),
            Err(err) => return fail(conn.endpoint(), errors, timeout, received, expected, &err),
        }
    }

    expected
}

fn fail(
    endpoint: &str,
    errors: &mut ErrorContext,
    timeout: Duration,
    received: usize,
    expected: usize,
    err: &std::io::Error,
) -> usize {
    let message = match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => format!(
            "{}: timed out after {}ms ({} of {} replies received)",
            endpoint,
            timeout.as_millis(),
            received,
            expected
        ),
        _ => format!(
            "{}: {} ({} of {} replies received)",
            endpoint, err, received, expected
        ),
    };
    tracing::warn!(error = %message, "batch execution failed");
    errors.record(message);
    0
}
