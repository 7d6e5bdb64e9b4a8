use bitflags::bitflags;

use super::util::{write_cstring, write_document, SyncLittleEndianRead};
use crate::{bson::Document, bson_util, error::Result};

bitflags! {
    /// The bitwise flags of an OP_QUERY.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct QueryFlags: i32 {
        /// Tailable cursor.
        const TAILABLE_CURSOR   = 0b0000_0010;
        /// The query may run on a secondary.
        const SECONDARY_OK      = 0b0000_0100;
        /// Internal replication use only.
        const OPLOG_RELAY       = 0b0000_1000;
        /// Disable the idle cursor timeout.
        const NO_CURSOR_TIMEOUT = 0b0001_0000;
        /// Block for more data on a tailable cursor.
        const AWAIT_DATA        = 0b0010_0000;
        /// Stream all results.
        const EXHAUST           = 0b0100_0000;
        /// Allow partial results from a sharded cluster.
        const PARTIAL           = 0b1000_0000;
    }
}

/// An OP_QUERY. Used here only to run commands against `<db>.$cmd`, with a batch size of -1 so
/// the server replies with exactly one document.
#[derive(Clone, Debug, PartialEq)]
pub struct OpQuery {
    pub(crate) flags: QueryFlags,
    pub(crate) full_collection_name: String,
    pub(crate) num_to_skip: i32,
    pub(crate) num_to_return: i32,
    pub(crate) query: Document,
    pub(crate) return_field_selector: Option<Document>,
}

impl OpQuery {
    /// An OP_QUERY running `command` against the `$cmd` collection of `db`.
    pub(crate) fn command(db: &str, command: Document) -> Self {
        Self {
            flags: QueryFlags::empty(),
            full_collection_name: format!("{db}.$cmd"),
            num_to_skip: 0,
            num_to_return: -1,
            query: command,
            return_field_selector: None,
        }
    }

    /// The namespace this query targets.
    pub fn full_collection_name(&self) -> &str {
        &self.full_collection_name
    }

    /// The query document; for a command, the command itself.
    pub fn query(&self) -> &Document {
        &self.query
    }

    pub(super) fn write_body(&self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.extend_from_slice(&self.flags.bits().to_le_bytes());
        write_cstring(buffer, &self.full_collection_name)?;
        buffer.extend_from_slice(&self.num_to_skip.to_le_bytes());
        buffer.extend_from_slice(&self.num_to_return.to_le_bytes());
        write_document(buffer, &self.query)?;
        if let Some(ref return_field_selector) = self.return_field_selector {
            write_document(buffer, return_field_selector)?;
        }
        Ok(())
    }

    pub(super) fn read_body(mut reader: &[u8]) -> Result<Self> {
        let flags = QueryFlags::from_bits_truncate(reader.read_i32_sync()?);
        let full_collection_name = reader.read_cstring_sync()?;
        let num_to_skip = reader.read_i32_sync()?;
        let num_to_return = reader.read_i32_sync()?;
        let query = bson_util::read_document(&mut reader)?;
        let return_field_selector = if reader.is_empty() {
            None
        } else {
            Some(bson_util::read_document(&mut reader)?)
        };

        Ok(Self {
            flags,
            full_collection_name,
            num_to_skip,
            num_to_return,
            query,
            return_field_selector,
        })
    }
}
