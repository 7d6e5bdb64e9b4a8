use bitflags::bitflags;

use super::util::{read_documents, write_document, SyncLittleEndianRead};
use crate::{bson::Document, error::Result};

bitflags! {
    /// The bitwise flags of an OP_REPLY.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ResponseFlags: i32 {
        /// The cursor requested by a get more is gone.
        const CURSOR_NOT_FOUND  = 0b0000_0001;
        /// The query failed; the single document in the reply describes the error.
        const QUERY_FAILURE     = 0b0000_0010;
        /// The server supports the `AWAIT_DATA` query flag.
        const AWAIT_CAPABLE     = 0b0000_1000;
    }
}

/// An OP_REPLY, the reply to an OP_QUERY.
#[derive(Clone, Debug, PartialEq)]
pub struct OpReply {
    pub(crate) response_flags: ResponseFlags,
    pub(crate) cursor_id: i64,
    pub(crate) starting_from: i32,
    pub(crate) documents: Vec<Document>,
}

impl OpReply {
    /// A reply carrying a single command reply document.
    pub(crate) fn command_reply(document: Document) -> Self {
        Self {
            response_flags: ResponseFlags::empty(),
            cursor_id: 0,
            starting_from: 0,
            documents: vec![document],
        }
    }

    /// The flags set by the server.
    pub fn response_flags(&self) -> ResponseFlags {
        self.response_flags
    }

    /// The documents carried by this reply.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub(super) fn write_body(&self, buffer: &mut Vec<u8>) -> Result<()> {
        let num_returned = i32::try_from(self.documents.len()).unwrap_or(i32::MAX);
        buffer.extend_from_slice(&self.response_flags.bits().to_le_bytes());
        buffer.extend_from_slice(&self.cursor_id.to_le_bytes());
        buffer.extend_from_slice(&self.starting_from.to_le_bytes());
        buffer.extend_from_slice(&num_returned.to_le_bytes());
        for document in &self.documents {
            write_document(buffer, document)?;
        }
        Ok(())
    }

    pub(super) fn read_body(mut reader: &[u8]) -> Result<Self> {
        let response_flags = ResponseFlags::from_bits_truncate(reader.read_i32_sync()?);
        let cursor_id = reader.read_i64_sync()?;
        let starting_from = reader.read_i32_sync()?;
        let num_returned = reader.read_i32_sync()?;
        let documents = read_documents(reader)?;

        if usize::try_from(num_returned).ok() != Some(documents.len()) {
            return Err(crate::error::Error::invalid_response(format!(
                "The server indicated that the reply would contain {} documents, but it instead \
                 contained {}",
                num_returned,
                documents.len(),
            )));
        }

        Ok(Self {
            response_flags,
            cursor_id,
            starting_from,
            documents,
        })
    }
}
