//! # Pipelining
//!
//! Queue several commands in one batch, transmit them once, and decode the
//! replies in submission order, each with its own command's policy.

use ikv_common::ClientResult;

use crate::batch::Batch;
use crate::client::Client;
use crate::command::{Arg, CommandDescriptor, CommandInfo};
use crate::policy::{ReplyPolicy, Value};
use crate::transport::Connection;

/// Commands waiting to be sent together.
pub struct Pipeline<'a, C: Connection> {
    client: &'a mut Client<C>,
    batch: Batch,
    policies: Vec<ReplyPolicy>,
}

impl<'a, C: Connection> Pipeline<'a, C> {
    pub(crate) fn new(client: &'a mut Client<C>, batch: Batch) -> Self {
        Pipeline {
            client,
            batch,
            policies: Vec::new(),
        }
    }

    /// Queues a command; its arity is checked at compile time.
    pub fn add<const N: usize>(
        &mut self,
        desc: &'static CommandDescriptor<N>,
        args: [Arg<'_>; N],
    ) -> ClientResult<&mut Self> {
        self.add_info(desc.info(), &args)
    }

    /// Queues a command whose arguments are checked at call time.
    ///
    /// A rejected command leaves the pipeline untouched.
    pub fn add_info(&mut self, info: CommandInfo, args: &[Arg<'_>]) -> ClientResult<&mut Self> {
        info.encode(&mut self.batch, args)?;
        self.policies.push(info.policy);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Sends every queued command and decodes one reply per command.
    ///
    /// A transport failure fails the whole pipeline; decode failures are
    /// reported per command.
    pub fn execute(mut self) -> ClientResult<Vec<ClientResult<Value>>> {
        if self.policies.is_empty() {
            return Ok(Vec::new());
        }
        self.client.dispatch(&mut self.batch)?;

        let mut results = Vec::with_capacity(self.policies.len());
        for policy in &self.policies {
            let result = self
                .batch
                .next_reply()
                .and_then(|reply| policy.decode(reply))
                .map_err(|err| self.client.observe(err));
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use crate::command::{GET, INCR, SET, SISMEMBER};
    use crate::executor::DEFAULT_TIMEOUT;
    use crate::policy::Value;
    use crate::testing::ScriptedConnection;
    use crate::{Arg, Client};
    use bytes::Bytes;
    use ikv_common::{ClientError, Reply};

    fn client(replies: Vec<Reply>) -> Client<ScriptedConnection> {
        Client::from_connection(ScriptedConnection::new(replies), DEFAULT_TIMEOUT)
    }

    #[test]
    fn replies_decode_in_submission_order() {
        let mut client = client(vec![
            Reply::ok(),
            Reply::integer(1),
            Reply::bulk(&b"v"[..]),
            Reply::error(&b"ERR wrong kind"[..]),
        ]);

        let mut pipeline = client.pipeline();
        pipeline
            .add(&SET, [Arg::Str(b"k"), Arg::Blob(b"v")])
            .unwrap()
            .add(&INCR, [Arg::Str(b"n")])
            .unwrap()
            .add(&GET, [Arg::Str(b"k")])
            .unwrap()
            .add(&SISMEMBER, [Arg::Str(b"k"), Arg::Blob(b"m")])
            .unwrap();
        assert_eq!(pipeline.len(), 4);

        let results = pipeline.execute().unwrap();
        assert_eq!(results[0], Ok(Value::Bool(true)));
        assert_eq!(results[1], Ok(Value::Integer(1)));
        assert_eq!(results[2], Ok(Value::Bytes(Bytes::from_static(b"v"))));
        assert!(matches!(results[3], Err(ClientError::Command { .. })));

        assert_eq!(
            client.connection().sent(),
            &b"SET k 1\r\nv\r\nINCR n\r\nGET k\r\nSISMEMBER k 1\r\nm\r\n"[..]
        );
        let metrics = client.metrics();
        assert_eq!(metrics.commands_total, 4);
        assert_eq!(metrics.live_batches, 0);
    }

    #[test]
    fn empty_pipeline_does_no_io() {
        let mut client = client(vec![]);
        let results = client.pipeline().execute().unwrap();
        assert!(results.is_empty());
        assert!(client.connection().sent().is_empty());
        assert!(client.last_error().is_none());
    }

    #[test]
    fn short_reply_stream_fails_whole_pipeline() {
        let mut client = client(vec![Reply::integer(1)]);
        let mut pipeline = client.pipeline();
        pipeline.add(&INCR, [Arg::Str(b"a")]).unwrap();
        pipeline.add(&INCR, [Arg::Str(b"b")]).unwrap();

        let err = pipeline.execute().unwrap_err();
        assert!(err.is_connection());
        assert!(client.last_error().unwrap().contains("1 of 2"));
        assert_eq!(client.metrics().live_batches, 0);
    }

    #[test]
    fn rejected_command_is_not_queued() {
        let mut client = client(vec![]);
        let mut pipeline = client.pipeline();
        let err = pipeline
            .add(&SET, [Arg::Str(b"k"), Arg::Int(3)])
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ClientError::Argument(_)));
        assert!(pipeline.is_empty());
    }
}
