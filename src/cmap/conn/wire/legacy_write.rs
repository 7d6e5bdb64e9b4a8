//! The legacy write opcodes. None of them is answered by the server; acknowledgement, when
//! requested, comes from a `getlasterror` command sent afterwards on the same connection.

use bitflags::bitflags;

use super::util::{read_documents, write_cstring, write_document, SyncLittleEndianRead};
use crate::{bson::Document, bson_util, error::Result};

bitflags! {
    /// The bitwise flags of an OP_INSERT.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct InsertFlags: i32 {
        /// Keep inserting the remaining documents after one fails.
        const CONTINUE_ON_ERROR = 0b0000_0001;
    }
}

bitflags! {
    /// The bitwise flags of an OP_UPDATE.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct UpdateFlags: i32 {
        /// Insert the update as a new document if nothing matches the selector.
        const UPSERT       = 0b0000_0001;
        /// Update every matching document instead of the first.
        const MULTI_UPDATE = 0b0000_0010;
    }
}

bitflags! {
    /// The bitwise flags of an OP_DELETE.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DeleteFlags: i32 {
        /// Remove only the first matching document.
        const SINGLE_REMOVE = 0b0000_0001;
    }
}

/// An OP_INSERT of one or more documents.
#[derive(Clone, Debug, PartialEq)]
pub struct OpInsert {
    pub(crate) flags: InsertFlags,
    pub(crate) full_collection_name: String,
    pub(crate) documents: Vec<Document>,
}

impl OpInsert {
    /// The documents to insert.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub(super) fn write_body(&self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.extend_from_slice(&self.flags.bits().to_le_bytes());
        write_cstring(buffer, &self.full_collection_name)?;
        for document in &self.documents {
            write_document(buffer, document)?;
        }
        Ok(())
    }

    pub(super) fn read_body(mut reader: &[u8]) -> Result<Self> {
        let flags = InsertFlags::from_bits_truncate(reader.read_i32_sync()?);
        let full_collection_name = reader.read_cstring_sync()?;
        Ok(Self {
            flags,
            full_collection_name,
            documents: read_documents(reader)?,
        })
    }
}

/// An OP_UPDATE of the documents matching a selector.
#[derive(Clone, Debug, PartialEq)]
pub struct OpUpdate {
    pub(crate) full_collection_name: String,
    pub(crate) flags: UpdateFlags,
    pub(crate) selector: Document,
    pub(crate) update: Document,
}

impl OpUpdate {
    pub(super) fn write_body(&self, buffer: &mut Vec<u8>) -> Result<()> {
        // ZERO, reserved for future use.
        buffer.extend_from_slice(&0_i32.to_le_bytes());
        write_cstring(buffer, &self.full_collection_name)?;
        buffer.extend_from_slice(&self.flags.bits().to_le_bytes());
        write_document(buffer, &self.selector)?;
        write_document(buffer, &self.update)?;
        Ok(())
    }

    pub(super) fn read_body(mut reader: &[u8]) -> Result<Self> {
        let _reserved = reader.read_i32_sync()?;
        let full_collection_name = reader.read_cstring_sync()?;
        let flags = UpdateFlags::from_bits_truncate(reader.read_i32_sync()?);
        let selector = bson_util::read_document(&mut reader)?;
        let update = bson_util::read_document(&mut reader)?;
        Ok(Self {
            full_collection_name,
            flags,
            selector,
            update,
        })
    }
}

/// An OP_DELETE of the documents matching a selector.
#[derive(Clone, Debug, PartialEq)]
pub struct OpDelete {
    pub(crate) full_collection_name: String,
    pub(crate) flags: DeleteFlags,
    pub(crate) selector: Document,
}

impl OpDelete {
    pub(super) fn write_body(&self, buffer: &mut Vec<u8>) -> Result<()> {
        // ZERO, reserved for future use.
        buffer.extend_from_slice(&0_i32.to_le_bytes());
        write_cstring(buffer, &self.full_collection_name)?;
        buffer.extend_from_slice(&self.flags.bits().to_le_bytes());
        write_document(buffer, &self.selector)?;
        Ok(())
    }

    pub(super) fn read_body(mut reader: &[u8]) -> Result<Self> {
        let _reserved = reader.read_i32_sync()?;
        let full_collection_name = reader.read_cstring_sync()?;
        let flags = DeleteFlags::from_bits_truncate(reader.read_i32_sync()?);
        let selector = bson_util::read_document(&mut reader)?;
        Ok(Self {
            full_collection_name,
            flags,
            selector,
        })
    }
}
