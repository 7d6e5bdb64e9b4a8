//! The two wire protocols a write can be carried by. Servers that accept the write commands get
//! one `insert`, `update` or `delete` command per batch; older servers get the legacy opcodes,
//! each followed by a `getlasterror` command when the write concern asks for acknowledgement.

mod command;
mod legacy;
#[cfg(test)]
mod test;

use std::{ops::Range, time::Instant};

use futures_util::future::BoxFuture;

pub(crate) use self::{command::WriteCommandProtocol, legacy::LegacyWriteProtocol};
use crate::{
    bson::Document,
    bson_util,
    cmap::{
        conn::{
            command::{Command, CommandResponse},
            wire::Message,
        },
        Connection,
        StreamDescription,
    },
    error::{Error, Result},
    operation::{WriteOperation, COMMAND_OVERHEAD_SIZE},
    results::BulkWriteResult,
    trace::command::{CommandContext, CommandTracingEventEmitter},
};

/// Executes a [`WriteOperation`] over a connection using one wire protocol.
pub(crate) trait WriteProtocol: Send + Sync {
    /// The name this protocol is reported under in tracing events.
    fn name(&self) -> &'static str;

    /// Sends every request of `operation` that has to be sent and shapes what the server
    /// reported into a [`BulkWriteResult`]. Network errors end the operation immediately.
    fn execute<'a>(
        &'a self,
        operation: &'a WriteOperation,
        connection: &'a mut dyn Connection,
        description: &'a StreamDescription,
        emitter: &'a CommandTracingEventEmitter,
    ) -> BoxFuture<'a, Result<BulkWriteResult>>;
}

/// Picks the protocol the server described by `description` supports.
pub(crate) fn select_protocol(description: &StreamDescription) -> &'static dyn WriteProtocol {
    if description.supports_write_commands() {
        &WriteCommandProtocol
    } else {
        &LegacyWriteProtocol
    }
}

/// How far past `max_bson_object_size` a server accepts a command document.
const COMMAND_DOCUMENT_HEADROOM: usize = 16 * 1024;

/// Sends `command` and waits for the reply, emitting tracing events around the round trip.
/// Servers that do not accept OP_MSG get the command as an OP_QUERY.
async fn run_command(
    protocol: &'static str,
    connection: &mut dyn Connection,
    description: &StreamDescription,
    command: Command,
    batch_size: usize,
    emitter: &CommandTracingEventEmitter,
) -> Result<CommandResponse> {
    let command_document = command.command_document();
    let name = command.name.clone();
    let database_name = command.target_db.clone();
    let message = if description.supports_op_msg() {
        command.into_op_msg(true)
    } else {
        command.into_op_query()
    };

    let address = connection.address().clone();
    let context = CommandContext {
        protocol,
        command_name: &name,
        database_name: &database_name,
        request_id: message.request_id(),
        address: &address,
        batch_size,
    };
    emitter.emit_started_event(&context, &command_document);

    let start = Instant::now();
    let result = match connection.send_and_receive_message(message).await {
        Ok(reply) => CommandResponse::new(address.clone(), reply),
        Err(error) => Err(error),
    };

    match result {
        Ok(response) => {
            emitter.emit_succeeded_event(&context, Some(&response.raw_response), start.elapsed());
            Ok(response)
        }
        Err(error) => {
            emitter.emit_failed_event(&context, &error, start.elapsed());
            Err(error)
        }
    }
}

/// Sends `message`, which the server does not answer. `summary` stands in for the message in
/// tracing events.
#[allow(clippy::too_many_arguments)]
async fn send_unanswered(
    protocol: &'static str,
    connection: &mut dyn Connection,
    command_name: &str,
    database_name: &str,
    summary: &Document,
    message: Message,
    batch_size: usize,
    emitter: &CommandTracingEventEmitter,
) -> Result<()> {
    let address = connection.address().clone();
    let context = CommandContext {
        protocol,
        command_name,
        database_name,
        request_id: message.request_id(),
        address: &address,
        batch_size,
    };
    emitter.emit_started_event(&context, summary);

    let start = Instant::now();
    match connection.send_message(message).await {
        Ok(()) => {
            emitter.emit_succeeded_event(&context, None, start.elapsed());
            Ok(())
        }
        Err(error) => {
            emitter.emit_failed_event(&context, &error, start.elapsed());
            Err(error)
        }
    }
}

/// The serialized sizes of `entries`, the command entries of `operation`'s requests. Fails
/// before anything is sent if one of them is larger than the server accepts.
fn entry_sizes(
    operation: &WriteOperation,
    description: &StreamDescription,
    entries: &[Document],
) -> Result<Vec<usize>> {
    let max_document_size = usize::try_from(description.max_bson_object_size).unwrap_or(0);
    let mut sizes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let size = bson_util::doc_size_bytes(entry)?;
        if size > max_document_size {
            return Err(Error::invalid_argument(format!(
                "{} request {index} must be within {max_document_size} bytes, but is {size} \
                 bytes",
                operation.kind()
            )));
        }
        sizes.push(size);
    }
    Ok(sizes)
}

/// Splits the entries whose serialized sizes are `sizes` into consecutive batches of at most
/// `max_count` entries whose array encoding fits in `max_bytes`. An entry that does not fit in
/// `max_bytes` on its own is sent in a batch of its own.
fn split_into_batches(sizes: &[usize], max_count: usize, max_bytes: usize) -> Vec<Range<usize>> {
    let max_count = max_count.max(1);
    let mut batches = Vec::new();
    let mut start = 0;
    let mut batch_bytes = 0;

    for (index, &size) in sizes.iter().enumerate() {
        let entry_size = bson_util::array_entry_size_bytes(index - start, size);
        let full = index - start == max_count || batch_bytes + entry_size > max_bytes;
        if index > start && full {
            batches.push(start..index);
            start = index;
            batch_bytes = bson_util::array_entry_size_bytes(0, size);
        } else {
            batch_bytes += entry_size;
        }
    }

    if start < sizes.len() {
        batches.push(start..sizes.len());
    }
    batches
}

fn max_batch_count(description: &StreamDescription) -> usize {
    usize::try_from(description.max_write_batch_size)
        .unwrap_or(0)
        .max(1)
}

/// The room left for request documents in one legacy OP_INSERT.
fn max_message_payload_size(description: &StreamDescription) -> usize {
    usize::try_from(description.max_message_size_bytes)
        .unwrap_or(0)
        .saturating_sub(COMMAND_OVERHEAD_SIZE)
}

/// The room left for the entries of one write command whose body, without its entries, takes
/// `body_size` bytes. OP_MSG carries the entries in a document sequence bounded by the message
/// size. OP_QUERY inlines them in the command document, which the server only accepts up to
/// `max_bson_object_size` plus [`COMMAND_DOCUMENT_HEADROOM`].
fn max_command_payload_size(
    description: &StreamDescription,
    body_size: usize,
    identifier: &str,
) -> usize {
    if description.supports_op_msg() {
        return max_message_payload_size(description);
    }

    // The array element: type byte, key, null terminator, array length and array terminator.
    let array_overhead = 1 + identifier.len() + 1 + 4 + 1;
    usize::try_from(description.max_bson_object_size)
        .unwrap_or(0)
        .saturating_add(COMMAND_DOCUMENT_HEADROOM)
        .saturating_sub(body_size + array_overhead)
}
