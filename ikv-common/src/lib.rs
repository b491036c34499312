// ikv-common - Shared wire format, reply and error definitions for InlineKV
//
// This crate defines the inline request encoding and the reply model that the
// client core decodes.

pub mod error;
pub mod protocol;
pub mod reply;

// Re-export for convenience
pub use error::*;
pub use protocol::*;
pub use reply::*;
