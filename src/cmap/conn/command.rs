use serde::de::DeserializeOwned;

use super::wire::{DocumentSequence, Message, MessageBody, MessageFlags, OpMsg, OpQuery};
use crate::{
    bson::{Bson, Document},
    bson_util,
    error::{CommandError, Error, ErrorKind, Result},
    options::ServerAddress,
};

/// `Command` is a driver side abstraction of a server command containing all the information
/// necessary to serialize it to a wire message.
#[derive(Debug, Clone)]
pub(crate) struct Command {
    pub(crate) name: String,
    pub(crate) target_db: String,
    pub(crate) body: Document,
    pub(crate) document_sequence: Option<DocumentSequence>,
}

impl Command {
    /// Constructs a new command.
    pub(crate) fn new(
        name: impl Into<String>,
        target_db: impl Into<String>,
        body: Document,
    ) -> Self {
        Self {
            name: name.into(),
            target_db: target_db.into(),
            body,
            document_sequence: None,
        }
    }

    /// Attaches `documents` as the array field `identifier` of the command. Over OP_MSG they are
    /// sent as a payload type 1 section; over OP_QUERY they are inlined in the command document.
    pub(crate) fn with_documents(
        mut self,
        identifier: impl Into<String>,
        documents: Vec<Document>,
    ) -> Self {
        self.document_sequence = Some(DocumentSequence {
            identifier: identifier.into(),
            documents,
        });
        self
    }

    /// The command as the server will interpret it, with its documents inlined.
    pub(crate) fn command_document(&self) -> Document {
        let mut command = self.body.clone();
        if let Some(ref sequence) = self.document_sequence {
            let documents: Vec<Bson> = sequence
                .documents
                .iter()
                .cloned()
                .map(Bson::Document)
                .collect();
            command.insert(sequence.identifier.clone(), documents);
        }
        command
    }

    /// Frames this command as an OP_MSG, with `moreToCome` set when `expect_reply` is false.
    pub(crate) fn into_op_msg(self, expect_reply: bool) -> Message {
        let mut document_payload = self.body;
        document_payload.insert("$db", self.target_db);

        let mut message = OpMsg::new(document_payload);
        if !expect_reply {
            message.flags |= MessageFlags::MORE_TO_COME;
        }
        message.document_sequences.extend(self.document_sequence);
        Message::new(MessageBody::Command(message))
    }

    /// Frames this command as an OP_QUERY against the `$cmd` collection of the target database.
    pub(crate) fn into_op_query(self) -> Message {
        let command = self.command_document();
        Message::new(MessageBody::Query(OpQuery::command(&self.target_db, command)))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CommandResponse {
    source: ServerAddress,
    pub(crate) raw_response: Document,
}

impl CommandResponse {
    pub(crate) fn new(source: ServerAddress, message: Message) -> Result<Self> {
        Ok(Self {
            source,
            raw_response: message.into_reply_document()?,
        })
    }

    /// Returns whether this response indicates a success or not (i.e. if "ok: 1")
    pub(crate) fn is_success(&self) -> bool {
        match self.raw_response.get("ok") {
            Some(b) => bson_util::get_int(b) == Some(1),
            _ => false,
        }
    }

    /// Returns a result indicating whether this response corresponds to a command failure.
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.is_success() {
            let command_error: CommandError =
                crate::bson::from_document(self.raw_response.clone()).map_err(|_| {
                    Error::invalid_response(format!(
                        "invalid server response from {}: {}",
                        self.source, self.raw_response
                    ))
                })?;
            Err(ErrorKind::Command(command_error).into())
        } else {
            Ok(())
        }
    }

    /// Deserialize the body of the response.
    pub(crate) fn body<T: DeserializeOwned>(&self) -> Result<T> {
        crate::bson::from_document(self.raw_response.clone()).map_err(|e| {
            Error::invalid_response(format!("invalid server response from {}: {e}", self.source))
        })
    }

    /// The address of the server that sent this response.
    pub(crate) fn source_address(&self) -> &ServerAddress {
        &self.source
    }
}
