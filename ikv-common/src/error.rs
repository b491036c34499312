//! # Error Taxonomy
//!
//! Purpose: Give every failure of the client core one of a few well-defined
//! classes so callers can tell transport trouble from server refusals.
//!
//! ## Classes
//! - `Connection`: the transport failed or the deadline elapsed.
//! - `Command`: the request was well formed and the server answered with an
//!   error reply. The message is kept byte-for-byte.
//! - `Protocol`: the reply did not have the shape the command expects.
//! - `Argument`: a dynamic call did not match the command's signature.
//! - `Config`: the client could not be configured.

use bytes::Bytes;
use thiserror::Error;

/// Result type used throughout the client core.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Transport or timeout failure. Carries the last diagnostic text.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server returned an error reply.
    #[error("command error: {}", String::from_utf8_lossy(.message))]
    Command { message: Bytes },

    /// Reply kind or value did not match the command contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Argument count or kind does not match the command descriptor.
    #[error("argument error: {0}")]
    Argument(String),

    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    /// Builds a command error from a raw server message.
    pub fn command(message: impl Into<Bytes>) -> Self {
        ClientError::Command {
            message: message.into(),
        }
    }

    /// Builds a protocol error.
    pub fn protocol(reason: impl Into<String>) -> Self {
        ClientError::Protocol(reason.into())
    }

    /// Returns true for transport-level failures.
    pub fn is_connection(&self) -> bool {
        matches!(self, ClientError::Connection(_))
    }

    /// Returns the raw server message for command errors.
    pub fn server_message(&self) -> Option<&[u8]> {
        match self {
            ClientError::Command { message } => Some(message.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_keeps_raw_message() {
        let err = ClientError::command(&b"ERR wrong kind\x00"[..]);
        assert_eq!(err.server_message(), Some(&b"ERR wrong kind\x00"[..]));
        assert!(!err.is_connection());
    }

    #[test]
    fn display_includes_class() {
        let err = ClientError::Connection("timed out".to_string());
        assert_eq!(err.to_string(), "connection error: timed out");
        assert!(err.is_connection());

        let err = ClientError::command(&b"ERR no such key"[..]);
        assert_eq!(err.to_string(), "command error: ERR no such key");
    }
}
