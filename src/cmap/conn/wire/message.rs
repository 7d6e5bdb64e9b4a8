use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{
    header::{Header, OpCode},
    legacy_write::{OpDelete, OpInsert, OpUpdate},
    next_request_id,
    op_message::{MessageFlags, OpMsg},
    query::OpQuery,
    reply::{OpReply, ResponseFlags},
};
use crate::{
    bson::Document,
    error::{Error, ErrorKind, Result},
    sdam::DEFAULT_MAX_MESSAGE_SIZE_BYTES,
};

/// A complete wire protocol message: the identifiers carried in its header plus its body.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub(crate) request_id: i32,
    pub(crate) response_to: i32,
    pub(crate) body: MessageBody,
}

/// The body of a wire protocol message, one variant per opcode.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum MessageBody {
    /// OP_MSG
    Command(OpMsg),
    /// OP_QUERY
    Query(OpQuery),
    /// OP_REPLY
    Reply(OpReply),
    /// OP_INSERT
    Insert(OpInsert),
    /// OP_UPDATE
    Update(OpUpdate),
    /// OP_DELETE
    Delete(OpDelete),
}

impl Message {
    /// Creates a request with a fresh request id.
    pub(crate) fn new(body: MessageBody) -> Self {
        Self {
            request_id: next_request_id(),
            response_to: 0,
            body,
        }
    }

    /// Creates a reply to the request with id `request_id`.
    pub(crate) fn reply_to(request_id: i32, body: MessageBody) -> Self {
        Self {
            request_id: next_request_id(),
            response_to: request_id,
            body,
        }
    }

    /// The id the sender assigned to this message.
    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    /// The id of the request this message replies to, or 0 for a request.
    pub fn response_to(&self) -> i32 {
        self.response_to
    }

    /// The body of this message.
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// The opcode this message is framed with.
    pub fn op_code(&self) -> OpCode {
        match self.body {
            MessageBody::Command(_) => OpCode::Message,
            MessageBody::Query(_) => OpCode::Query,
            MessageBody::Reply(_) => OpCode::Reply,
            MessageBody::Insert(_) => OpCode::Insert,
            MessageBody::Update(_) => OpCode::Update,
            MessageBody::Delete(_) => OpCode::Delete,
        }
    }

    /// Whether the server answers this message. The legacy write opcodes are never answered, and
    /// neither is an OP_MSG with the `moreToCome` flag set.
    pub fn expects_reply(&self) -> bool {
        match self.body {
            MessageBody::Command(ref message) => {
                !message.flags.contains(MessageFlags::MORE_TO_COME)
            }
            MessageBody::Query(_) => true,
            MessageBody::Reply(_)
            | MessageBody::Insert(_)
            | MessageBody::Update(_)
            | MessageBody::Delete(_) => false,
        }
    }

    /// Serializes the Message to bytes and writes them to `writer`.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        let mut body = Vec::new();
        match self.body {
            MessageBody::Command(ref message) => message.write_body(&mut body)?,
            MessageBody::Query(ref query) => query.write_body(&mut body)?,
            MessageBody::Reply(ref reply) => reply.write_body(&mut body)?,
            MessageBody::Insert(ref insert) => insert.write_body(&mut body)?,
            MessageBody::Update(ref update) => update.write_body(&mut body)?,
            MessageBody::Delete(ref delete) => delete.write_body(&mut body)?,
        }

        let header = Header {
            length: i32::try_from(Header::LENGTH + body.len()).map_err(|_| {
                Error::invalid_argument(format!("message of {} bytes is too large", body.len()))
            })?,
            request_id: self.request_id,
            response_to: self.response_to,
            op_code: self.op_code(),
        };

        header.write_to(writer).await?;
        writer.write_all(&body).await?;
        writer.flush().await?;

        Ok(())
    }

    /// Reads bytes from `reader` and deserializes them into a Message.
    pub async fn read_from<R: AsyncRead + Unpin>(
        reader: &mut R,
        max_message_size_bytes: Option<i32>,
    ) -> Result<Self> {
        let header = Header::read_from(reader).await?;
        let max_len = max_message_size_bytes.unwrap_or(DEFAULT_MAX_MESSAGE_SIZE_BYTES);
        if header.length > max_len {
            return Err(ErrorKind::InvalidResponse {
                message: format!("Message length {} over maximum {}", header.length, max_len),
            }
            .into());
        }

        let body_length = usize::try_from(header.length)
            .ok()
            .and_then(|length| length.checked_sub(Header::LENGTH))
            .ok_or_else(|| {
                Error::invalid_response(format!("invalid message length {}", header.length))
            })?;
        let mut buf = vec![0u8; body_length];
        reader.read_exact(&mut buf).await?;
        let reader = buf.as_slice();

        let body = match header.op_code {
            OpCode::Message => MessageBody::Command(OpMsg::read_body(reader)?),
            OpCode::Query => MessageBody::Query(OpQuery::read_body(reader)?),
            OpCode::Reply => MessageBody::Reply(OpReply::read_body(reader)?),
            OpCode::Insert => MessageBody::Insert(OpInsert::read_body(reader)?),
            OpCode::Update => MessageBody::Update(OpUpdate::read_body(reader)?),
            OpCode::Delete => MessageBody::Delete(OpDelete::read_body(reader)?),
        };

        Ok(Self {
            request_id: header.request_id,
            response_to: header.response_to,
            body,
        })
    }

    /// Extracts the command reply document carried by this message.
    pub(crate) fn into_reply_document(self) -> Result<Document> {
        match self.body {
            MessageBody::Command(message) => Ok(message.document_payload),
            MessageBody::Reply(reply) => {
                if reply.response_flags.contains(ResponseFlags::QUERY_FAILURE) {
                    let reason = reply
                        .documents
                        .first()
                        .and_then(|document| document.get_str("$err").ok())
                        .unwrap_or("unknown failure")
                        .to_string();
                    return Err(Error::invalid_response(format!("query failure: {reason}")));
                }
                reply.documents.into_iter().next().ok_or_else(|| {
                    Error::invalid_response("OP_REPLY to a command contained no documents")
                })
            }
            _ => Err(Error::invalid_response(format!(
                "expected a reply, got {}",
                self.op_code()
            ))),
        }
    }
}
