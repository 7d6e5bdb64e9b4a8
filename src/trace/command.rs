use std::time::Duration;

use crate::{
    bson::Document,
    error::Error,
    options::ServerAddress,
    trace::{serialize_command_or_reply, TracingRepresentation, COMMAND_TRACING_EVENT_TARGET},
};

use super::DEFAULT_MAX_DOCUMENT_LENGTH_BYTES;

/// Identifies one message sent as part of a write: the protocol carrying it, the command or
/// opcode it encodes, and where it went.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CommandContext<'a> {
    pub(crate) protocol: &'static str,
    pub(crate) command_name: &'a str,
    pub(crate) database_name: &'a str,
    pub(crate) request_id: i32,
    pub(crate) address: &'a ServerAddress,
    pub(crate) batch_size: usize,
}

/// Type responsible for emitting tracing events for the messages a write sends.
#[derive(Debug, Clone)]
pub(crate) struct CommandTracingEventEmitter {
    max_document_length_bytes: usize,
}

impl CommandTracingEventEmitter {
    pub(crate) fn new(max_document_length_bytes: Option<usize>) -> CommandTracingEventEmitter {
        CommandTracingEventEmitter {
            max_document_length_bytes: max_document_length_bytes
                .unwrap_or(DEFAULT_MAX_DOCUMENT_LENGTH_BYTES),
        }
    }

    pub(crate) fn emit_started_event(&self, context: &CommandContext<'_>, command: &Document) {
        tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            protocol = context.protocol,
            command = serialize_command_or_reply(command, self.max_document_length_bytes),
            databaseName = context.database_name,
            commandName = context.command_name,
            requestId = context.request_id,
            batchSize = context.batch_size,
            serverHost = context.address.host(),
            serverPort = context.address.port_tracing_representation(),
            "Command started"
        );
    }

    /// `reply` is `None` for a message the server does not answer.
    pub(crate) fn emit_succeeded_event(
        &self,
        context: &CommandContext<'_>,
        reply: Option<&Document>,
        duration: Duration,
    ) {
        tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            protocol = context.protocol,
            reply = reply.map(|reply| serialize_command_or_reply(reply, self.max_document_length_bytes)),
            commandName = context.command_name,
            requestId = context.request_id,
            serverHost = context.address.host(),
            serverPort = context.address.port_tracing_representation(),
            durationMS = duration.as_millis(),
            "Command succeeded"
        );
    }

    pub(crate) fn emit_failed_event(
        &self,
        context: &CommandContext<'_>,
        error: &Error,
        duration: Duration,
    ) {
        tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            protocol = context.protocol,
            failure = error.tracing_representation(),
            commandName = context.command_name,
            requestId = context.request_id,
            serverHost = context.address.host(),
            serverPort = context.address.port_tracing_representation(),
            durationMS = duration.as_millis(),
            "Command failed"
        );
    }
}

impl Default for CommandTracingEventEmitter {
    fn default() -> Self {
        Self::new(None)
    }
}
