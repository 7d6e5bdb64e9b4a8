use bitflags::bitflags;

use super::util::{read_documents, write_cstring, write_document, SyncLittleEndianRead};
use crate::{
    bson::{Array, Document},
    bson_util,
    error::{Error, Result},
};

bitflags! {
    /// Represents the bitwise flags for an OP_MSG.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MessageFlags: u32 {
        /// The message ends with a CRC-32C checksum.
        const CHECKSUM_PRESENT = 0b_0000_0000_0000_0000_0000_0000_0000_0001;
        /// The sender will not wait for a reply to this message.
        const MORE_TO_COME     = 0b_0000_0000_0000_0000_0000_0000_0000_0010;
        /// The client is prepared for multiple replies to this message.
        const EXHAUST_ALLOWED  = 0b_0000_0000_0000_0001_0000_0000_0000_0000;
    }
}

/// A payload type 1 section: a named sequence of documents that the server treats as an array
/// field of the command.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSequence {
    pub(crate) identifier: String,
    pub(crate) documents: Vec<Document>,
}

/// Represents an OP_MSG wire protocol operation.
#[derive(Clone, Debug, PartialEq)]
pub struct OpMsg {
    pub(crate) flags: MessageFlags,
    // OP_MSG payload type 0
    pub(crate) document_payload: Document,
    // OP_MSG payload type 1
    pub(crate) document_sequences: Vec<DocumentSequence>,
}

impl OpMsg {
    pub(crate) fn new(document_payload: Document) -> Self {
        Self {
            flags: MessageFlags::empty(),
            document_payload,
            document_sequences: Vec::new(),
        }
    }

    /// The flags of this message.
    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    /// Gets this message's command as a Document, with any document sequences folded in as
    /// array fields.
    pub fn command_document(&self) -> Document {
        let mut command = self.document_payload.clone();
        for document_sequence in &self.document_sequences {
            let documents: Array = document_sequence
                .documents
                .iter()
                .cloned()
                .map(Into::into)
                .collect();
            command.insert(document_sequence.identifier.clone(), documents);
        }
        command
    }

    pub(super) fn write_body(&self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.extend_from_slice(&self.flags.bits().to_le_bytes());

        // Payload type 0
        buffer.push(0);
        write_document(buffer, &self.document_payload)?;

        for document_sequence in &self.document_sequences {
            // Payload type 1
            buffer.push(1);

            let mut section = Vec::new();
            write_cstring(&mut section, &document_sequence.identifier)?;
            for document in &document_sequence.documents {
                write_document(&mut section, document)?;
            }

            // Size bytes + identifier bytes + null-terminator byte + document bytes
            let size = i32::try_from(section.len() + 4)
                .map_err(|_| Error::invalid_argument("document sequence too large"))?;
            buffer.extend_from_slice(&size.to_le_bytes());
            buffer.extend_from_slice(&section);
        }

        Ok(())
    }

    pub(super) fn read_body(mut reader: &[u8]) -> Result<Self> {
        let flags = MessageFlags::from_bits_truncate(reader.read_u32_sync()?);
        if flags.contains(MessageFlags::CHECKSUM_PRESENT) {
            let body_length = reader.len().checked_sub(4).ok_or_else(|| {
                Error::invalid_response("OP_MSG is too short to contain its checksum")
            })?;
            reader = &reader[..body_length];
        }

        let mut document_payload = None;
        let mut document_sequences = Vec::new();
        while !reader.is_empty() {
            match reader.read_u8_sync()? {
                0 => {
                    if document_payload.is_some() {
                        return Err(Error::invalid_response(
                            "an OP_MSG must contain exactly one payload type 0 section",
                        ));
                    }
                    document_payload = Some(bson_util::read_document(&mut reader)?);
                }
                1 => {
                    let size = usize::try_from(reader.read_i32_sync()?)
                        .ok()
                        .and_then(|size| size.checked_sub(4))
                        .filter(|size| *size <= reader.len())
                        .ok_or_else(|| {
                            Error::invalid_response("invalid OP_MSG document sequence size")
                        })?;
                    let (mut section, rest) = reader.split_at(size);
                    reader = rest;

                    let identifier = section.read_cstring_sync()?;
                    document_sequences.push(DocumentSequence {
                        identifier,
                        documents: read_documents(section)?,
                    });
                }
                other => {
                    return Err(Error::invalid_response(format!(
                        "invalid OP_MSG payload type {other}"
                    )))
                }
            }
        }

        Ok(Self {
            flags,
            document_payload: document_payload.ok_or_else(|| {
                Error::invalid_response("an OP_MSG must contain exactly one payload type 0 section")
            })?,
            document_sequences,
        })
    }
}
