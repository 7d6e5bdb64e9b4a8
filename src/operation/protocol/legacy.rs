
use futures_util::{future::BoxFuture, FutureExt};

use super::{
    entry_sizes,
    max_batch_count,
    max_message_payload_size,
    run_command,
    send_unanswered,
    split_into_batches,
    WriteProtocol,
};
use crate::{
    bson::{doc, Bson, Document},
    bson_util,
    cmap::{
        conn::{command::Command, wire::Message},
        Connection,
        StreamDescription,
    },
    error::{BulkWriteError, Result, WriteConcernError},
    operation::{insert, LegacyAcknowledgement, WriteKind, WriteOperation, WriteRequest},
    results::{BatchOutcome, BulkWriteResult, ResultAggregator},
    trace::command::CommandTracingEventEmitter,
};

/// Code reported for a write error whose `getlasterror` reply carried no code.
const UNKNOWN_ERROR_CODE: i32 = 8;

/// Code reported for a write concern that timed out without a code in the reply.
const WRITE_CONCERN_FAILED_CODE: i32 = 64;

/// Code reported for a write concern the server could not satisfy, e.g. journaling on a server
/// running without a journal.
const UNSATISFIABLE_WRITE_CONCERN_CODE: i32 = 100;

/// Sends each request as its own OP_INSERT, OP_UPDATE or OP_DELETE, asking for acknowledgement
/// with a `getlasterror` command after each one when the write concern requires it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LegacyWriteProtocol;

impl WriteProtocol for LegacyWriteProtocol {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn execute<'a>(
        &'a self,
        operation: &'a WriteOperation,
        connection: &'a mut dyn Connection,
        description: &'a StreamDescription,
        emitter: &'a CommandTracingEventEmitter,
    ) -> BoxFuture<'a, Result<BulkWriteResult>> {
        async move {
            let entries: Vec<Document> = operation
                .requests()
                .iter()
                .map(WriteRequest::command_entry)
                .collect();
            let sizes = entry_sizes(operation, description, &entries)?;

            if operation.write_concern().is_acknowledged() {
                self.execute_acknowledged(operation, connection, description, emitter)
                    .await
            } else {
                self.execute_unacknowledged(operation, connection, description, &sizes, emitter)
                    .await
            }
        }
        .boxed()
    }
}

impl LegacyWriteProtocol {
    async fn execute_acknowledged(
        &self,
        operation: &WriteOperation,
        connection: &mut dyn Connection,
        description: &StreamDescription,
        emitter: &CommandTracingEventEmitter,
    ) -> Result<BulkWriteResult> {
        let namespace = operation.namespace();
        let get_last_error = operation.write_concern().get_last_error_command();

        let mut aggregator = ResultAggregator::new(operation.kind());
        for (index, request) in operation.requests().iter().enumerate() {
            self.send_request(operation, connection, request, emitter)
                .await?;

            let command = Command::new("getlasterror", namespace.db.clone(), get_last_error.clone());
            let response =
                run_command(self.name(), connection, description, command, 1, emitter).await?;
            response.validate()?;

            aggregator.merge(index, interpret_reply(request, &response.raw_response));
            if operation.is_ordered() && aggregator.has_write_errors() {
                break;
            }
        }

        Ok(aggregator.finish())
    }

    /// Nothing is read back, so nothing can stop an ordered operation early: every request is
    /// sent. Inserts are coalesced into as few OP_INSERTs as the server's limits allow.
    async fn execute_unacknowledged(
        &self,
        operation: &WriteOperation,
        connection: &mut dyn Connection,
        description: &StreamDescription,
        sizes: &[usize],
        emitter: &CommandTracingEventEmitter,
    ) -> Result<BulkWriteResult> {
        let namespace = operation.namespace();

        if operation.kind() == WriteKind::Insert {
            let batches = split_into_batches(
                sizes,
                max_batch_count(description),
                max_message_payload_size(description),
            );
            for batch in batches {
                let documents: Vec<Document> = operation.requests()[batch.clone()]
                    .iter()
                    .map(WriteRequest::command_entry)
                    .collect();
                let summary = doc! {
                    "insert": namespace.coll.clone(),
                    "ordered": operation.is_ordered(),
                    "documents": documents.len() as i64,
                };
                let message = Message::new(insert::legacy_batch(
                    namespace,
                    operation.is_ordered(),
                    documents,
                ));
                send_unanswered(
                    self.name(),
                    connection,
                    "OP_INSERT",
                    &namespace.db,
                    &summary,
                    message,
                    batch.len(),
                    emitter,
                )
                .await?;
            }
        } else {
            for request in operation.requests() {
                self.send_request(operation, connection, request, emitter)
                    .await?;
            }
        }

        Ok(BulkWriteResult::unacknowledged(operation.kind()))
    }

    async fn send_request(
        &self,
        operation: &WriteOperation,
        connection: &mut dyn Connection,
        request: &WriteRequest,
        emitter: &CommandTracingEventEmitter,
    ) -> Result<()> {
        let namespace = operation.namespace();
        let message = Message::new(request.legacy_message(namespace));
        let op_code = message.op_code().to_string();
        send_unanswered(
            self.name(),
            connection,
            &op_code,
            &namespace.db,
            &request.command_entry(),
            message,
            1,
            emitter,
        )
        .await
    }
}

/// Shapes the `getlasterror` reply acknowledging `request` into the outcome of that request.
///
/// A non-null `err` is a write error, unless `wtimeout` is set, in which case the write itself
/// was applied and only the write concern failed.
fn interpret_reply(request: &WriteRequest, reply: &Document) -> BatchOutcome {
    let code = reply
        .get("code")
        .and_then(bson_util::get_int)
        .and_then(|code| i32::try_from(code).ok());
    let code_name = reply.get_str("codeName").ok().map(String::from);

    let acknowledgement = LegacyAcknowledgement {
        n: bson_util::get_u64_or_zero(reply, "n"),
        updated_existing: reply.get_bool("updatedExisting").ok(),
        upserted: reply
            .get("upserted")
            .filter(|id| !matches!(id, Bson::Null))
            .cloned(),
    };

    let error_message = reply.get_str("err").ok();
    let timed_out = reply.get_bool("wtimeout").unwrap_or(false);

    match error_message {
        Some(message) if !timed_out => {
            let mut error =
                BulkWriteError::new(0, code.unwrap_or(UNKNOWN_ERROR_CODE), message.to_string());
            error.code_name = code_name;
            BatchOutcome {
                modified: match request.kind() {
                    WriteKind::Update => None,
                    _ => Some(0),
                },
                write_errors: vec![error],
                ..Default::default()
            }
        }
        Some(message) => {
            let mut outcome = request.legacy_outcome(&acknowledgement);
            outcome.write_concern_error = Some(WriteConcernError {
                code: code.unwrap_or(WRITE_CONCERN_FAILED_CODE),
                code_name: code_name.unwrap_or_else(|| "WriteConcernFailed".to_string()),
                message: message.to_string(),
                details: Some(doc! { "wtimeout": true }),
            });
            outcome
        }
        None => {
            let mut outcome = request.legacy_outcome(&acknowledgement);
            if let Some(note) = reply
                .get_str("jnote")
                .or_else(|_| reply.get_str("wnote"))
                .ok()
            {
                outcome.write_concern_error = Some(WriteConcernError {
                    code: code.unwrap_or(UNSATISFIABLE_WRITE_CONCERN_CODE),
                    code_name: code_name.unwrap_or_default(),
                    message: note.to_string(),
                    details: None,
                });
            }
            outcome
        }
    }
}
