//! # InlineKV Sync Client
//!
//! Purpose: Encode typed commands into the inline request form, pipeline
//! them in batches, execute them under a timeout and decode the replies.
//!
//! ## Design Principles
//! 1. **One Table, One Procedure**: Commands are declared as descriptors and
//!    all of them run through `Client::call`.
//! 2. **Scoped Resources**: Batches are created and dropped within one call.
//! 3. **Typed Failures**: Connection, command, protocol and argument errors
//!    are distinct `ClientError` variants.
//! 4. **Pluggable Transport**: `Connection` is a trait; `TcpConnection` is the
//!    blocking implementation.

mod batch;
mod client;
pub mod command;
mod executor;
mod metrics;
mod pipeline;
mod policy;
#[cfg(test)]
mod testing;
mod transport;

pub use batch::Batch;
pub use bytes::Bytes;
pub use client::{Client, ClientConfig};
pub use command::{Arg, ArgType, CommandDescriptor, CommandInfo};
pub use executor::{execute, ErrorContext, DEFAULT_TIMEOUT};
pub use ikv_common::{ClientError, ClientResult, Reply, ReplyKind};
pub use metrics::{ClientMetrics, LatencySnapshot, MetricsSnapshot};
pub use pipeline::Pipeline;
pub use policy::{FromValue, ReplyPolicy, Value};
pub use transport::{Connection, TcpConnection};
