//! # Synchronous Client API
//!
//! Purpose: Expose a compact, blocking API over one server connection. Every
//! command goes through the same encode, execute, decode procedure.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides batching, execution and decoding.
//! 2. **Borrow-Friendly API**: Keys and values are passed as `&[u8]`.
//! 3. **Scoped Batches**: A batch lives for one call and is dropped on every
//!    exit path, including decode errors and timeouts.
//! 4. **Per-Client Diagnostics**: The last error message belongs to the client
//!    instance, never to the process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ikv_common::{ClientError, ClientResult};
use serde::Deserialize;

use crate::batch::Batch;
use crate::command::{Arg, CommandDescriptor, CommandInfo};
use crate::executor::{execute, ErrorContext, DEFAULT_TIMEOUT};
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::pipeline::Pipeline;
use crate::policy::{FromValue, Value};
use crate::transport::{Connection, TcpConnection};

/// Configuration for the synchronous client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Time allowed for one execution, send through last reply.
    pub command_timeout_ms: u64,
    /// Optional TCP connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:6379".to_string(),
            command_timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `addr`.
    pub fn new(addr: impl Into<String>) -> Self {
        ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        }
    }

    pub fn command_timeout_ms(mut self, ms: u64) -> Self {
        self.command_timeout_ms = ms;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Rejects configurations that could never execute a command.
    pub fn validate(&self) -> ClientResult<()> {
        if self.addr.is_empty() {
            return Err(ClientError::Config("address is empty".to_string()));
        }
        if self.command_timeout_ms == 0 {
            return Err(ClientError::Config(
                "command timeout must be positive".to_string(),
            ));
        }
        if self.connect_timeout_ms == Some(0) {
            return Err(ClientError::Config(
                "connect timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Synchronous client bound to one connection.
///
/// Not meant to be shared between threads; give each thread its own client.
pub struct Client<C = TcpConnection> {
    conn: C,
    endpoints: Vec<String>,
    errors: ErrorContext,
    timeout: Duration,
    metrics: Arc<ClientMetrics>,
}

impl Client<TcpConnection> {
    /// Connects to `addr` with the default configuration.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        Self::with_config(ClientConfig::new(addr))
    }

    /// Connects eagerly; fails if the endpoint cannot be reached.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let conn = TcpConnection::open(&config.addr, config.connect_timeout())
            .map_err(|err| ClientError::Connection(format!("{}: {}", config.addr, err)))?;
        tracing::info!(endpoint = %config.addr, timeout_ms = config.command_timeout_ms, "client connected");
        Ok(Client::from_connection(conn, config.command_timeout()))
    }
}

impl<C: Connection> Client<C> {
    /// Wraps an already established connection.
    pub fn from_connection(conn: C, timeout: Duration) -> Self {
        let endpoints = vec![conn.endpoint().to_string()];
        Client {
            conn,
            endpoints,
            errors: ErrorContext::new(),
            timeout,
            metrics: Arc::new(ClientMetrics::new()),
        }
    }

    /// Configured endpoint identifiers.
    pub fn connections(&self) -> &[String] {
        &self.endpoints
    }

    /// Diagnostic from the most recent failed execution.
    ///
    /// Only meaningful right after the failing call; the next call on this
    /// client may overwrite it.
    pub fn last_error(&self) -> Option<&str> {
        self.errors.last_error()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Runs one command described by `desc` and converts its reply to `T`.
    ///
    /// This is the single procedure behind every generated command method.
    pub fn call<T: FromValue, const N: usize>(
        &mut self,
        desc: &'static CommandDescriptor<N>,
        args: [Arg<'_>; N],
    ) -> ClientResult<T> {
        let value = self.call_info(desc.info(), &args)?;
        T::from_value(value).map_err(|err| self.observe(err))
    }

    /// Runs one command with arguments checked at call time.
    pub fn call_info(&mut self, info: CommandInfo, args: &[Arg<'_>]) -> ClientResult<Value> {
        let mut batch = self.new_batch();
        info.encode(&mut batch, args)?;
        self.dispatch(&mut batch)?;
        batch
            .next_reply()
            .and_then(|reply| info.policy.decode(reply))
            .map_err(|err| self.observe(err))
    }

    /// Starts a pipeline that sends several commands in one transmission.
    pub fn pipeline(&mut self) -> Pipeline<'_, C> {
        let batch = self.new_batch();
        Pipeline::new(self, batch)
    }

    pub(crate) fn new_batch(&self) -> Batch {
        Batch::tracked(self.metrics.clone())
    }

    /// Executes a finished batch, turning a failed execution into a
    /// connection error carrying the recorded diagnostic.
    pub(crate) fn dispatch(&mut self, batch: &mut Batch) -> ClientResult<()> {
        let started = Instant::now();
        let delivered = execute(&mut self.conn, batch, self.timeout, &mut self.errors);
        self.metrics
            .record_execute(batch.command_count(), started.elapsed());

        if delivered == 0 {
            let message = self
                .errors
                .last_error()
                .unwrap_or("execution failed")
                .to_string();
            return Err(self.observe(ClientError::Connection(message)));
        }
        Ok(())
    }

    pub(crate) fn observe(&self, err: ClientError) -> ClientError {
        self.metrics.record_error(&err);
        err
    }
}
