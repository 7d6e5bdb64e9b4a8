use futures_util::{future::BoxFuture, FutureExt};
use serde::Deserialize;

use super::{
    entry_sizes,
    max_batch_count,
    max_command_payload_size,
    run_command,
    send_unanswered,
    split_into_batches,
    WriteProtocol,
};
use crate::{
    bson::{doc, Document},
    bson_util,
    cmap::{conn::command::Command, Connection, StreamDescription},
    error::{BulkWriteError, Result, WriteConcernError},
    operation::{WriteKind, WriteOperation},
    results::{BatchOutcome, BulkWriteResult, BulkWriteUpsert, ResultAggregator},
    trace::command::CommandTracingEventEmitter,
};

/// Sends each batch of requests as an `insert`, `update` or `delete` command.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WriteCommandProtocol;

impl WriteProtocol for WriteCommandProtocol {
    fn name(&self) -> &'static str {
        "write command"
    }

    fn execute<'a>(
        &'a self,
        operation: &'a WriteOperation,
        connection: &'a mut dyn Connection,
        description: &'a StreamDescription,
        emitter: &'a CommandTracingEventEmitter,
    ) -> BoxFuture<'a, Result<BulkWriteResult>> {
        self.execute_batches(operation, connection, description, emitter)
            .boxed()
    }
}

impl WriteCommandProtocol {
    async fn execute_batches(
        &self,
        operation: &WriteOperation,
        connection: &mut dyn Connection,
        description: &StreamDescription,
        emitter: &CommandTracingEventEmitter,
    ) -> Result<BulkWriteResult> {
        let kind = operation.kind();
        let entries: Vec<Document> = operation
            .requests()
            .iter()
            .map(|request| request.command_entry())
            .collect();

        let sizes = entry_sizes(operation, description, &entries)?;
        let body = command_body(operation)?;
        let batches = split_into_batches(
            &sizes,
            max_batch_count(description),
            max_command_payload_size(
                description,
                bson_util::doc_size_bytes(&body)?,
                kind.payload_identifier(),
            ),
        );
        let acknowledged = operation.write_concern().is_acknowledged();

        let mut aggregator = ResultAggregator::new(kind);
        let mut entries = entries.into_iter();
        for batch in batches {
            let documents: Vec<Document> = entries.by_ref().take(batch.len()).collect();
            let batch_size = documents.len();
            let command = Command::new(
                kind.command_name(),
                operation.namespace().db.clone(),
                body.clone(),
            )
            .with_documents(kind.payload_identifier(), documents);

            if !acknowledged {
                self.send_unacknowledged(connection, description, command, batch_size, emitter)
                    .await?;
                continue;
            }

            let response = run_command(
                self.name(),
                connection,
                description,
                command,
                batch_size,
                emitter,
            )
            .await?;
            response.validate()?;

            let reply: WriteResponseBody = response.body()?;
            aggregator.merge(batch.start, reply.into_outcome(kind));
            if operation.is_ordered() && aggregator.has_write_errors() {
                break;
            }
        }

        if !acknowledged {
            return Ok(BulkWriteResult::unacknowledged(kind));
        }
        Ok(aggregator.finish())
    }

    /// Servers that accept OP_MSG do not answer a command sent with `moreToCome`. Older ones
    /// answer every OP_QUERY, so the reply is read and only checked for a command failure.
    async fn send_unacknowledged(
        &self,
        connection: &mut dyn Connection,
        description: &StreamDescription,
        command: Command,
        batch_size: usize,
        emitter: &CommandTracingEventEmitter,
    ) -> Result<()> {
        if description.supports_op_msg() {
            let command_document = command.command_document();
            let name = command.name.clone();
            let database_name = command.target_db.clone();
            send_unanswered(
                self.name(),
                connection,
                &name,
                &database_name,
                &command_document,
                command.into_op_msg(false),
                batch_size,
                emitter,
            )
            .await
        } else {
            let response = run_command(
                self.name(),
                connection,
                description,
                command,
                batch_size,
                emitter,
            )
            .await?;
            response.validate()
        }
    }
}

/// The write command for `operation` without its entries.
fn command_body(operation: &WriteOperation) -> Result<Document> {
    let kind = operation.kind();
    let mut body = doc! {
        kind.command_name(): operation.namespace().coll.clone(),
        "ordered": operation.is_ordered(),
    };
    let write_concern = operation.write_concern();
    if !write_concern.is_empty() {
        body.insert("writeConcern", crate::bson::to_bson(write_concern)?);
    }
    Ok(body)
}

/// The reply to a write command.
#[derive(Debug, Deserialize)]
struct WriteResponseBody {
    #[serde(default)]
    n: u64,

    #[serde(rename = "nModified")]
    n_modified: Option<u64>,

    upserted: Option<Vec<BulkWriteUpsert>>,

    #[serde(rename = "writeErrors")]
    write_errors: Option<Vec<BulkWriteError>>,

    #[serde(rename = "writeConcernError")]
    write_concern_error: Option<WriteConcernError>,
}

impl WriteResponseBody {
    fn into_outcome(self, kind: WriteKind) -> BatchOutcome {
        let upserts = self.upserted.unwrap_or_default();
        let mut outcome = BatchOutcome {
            modified: Some(0),
            write_errors: self.write_errors.unwrap_or_default(),
            write_concern_error: self.write_concern_error,
            ..Default::default()
        };

        match kind {
            WriteKind::Insert => outcome.inserted = self.n,
            // `n` counts the upserted documents along with the matched ones.
            WriteKind::Update => {
                outcome.matched = self.n.saturating_sub(upserts.len() as u64);
                outcome.modified = Some(self.n_modified.unwrap_or(0));
                outcome.upserts = upserts;
            }
            WriteKind::Delete => outcome.deleted = self.n,
        }
        outcome
    }
}
