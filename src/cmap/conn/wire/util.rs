use std::{
    io::Read,
    sync::atomic::{AtomicI32, Ordering},
};

use crate::error::{Error, Result};

static REQUEST_ID: AtomicI32 = AtomicI32::new(0);

/// Obtain a new, unique request ID.
pub(crate) fn next_request_id() -> i32 {
    REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Serializes `string` to bytes and appends them to `buffer` with a null terminator appended.
pub(super) fn write_cstring(buffer: &mut Vec<u8>, string: &str) -> Result<()> {
    if string.as_bytes().contains(&0) {
        return Err(Error::invalid_argument(format!(
            "\"{string}\" cannot be written as a C string because it contains a null byte"
        )));
    }
    buffer.extend_from_slice(string.as_bytes());
    buffer.push(0);
    Ok(())
}

pub(super) trait SyncLittleEndianRead: Read {
    /// Read an `i32` in little-endian order.
    fn read_i32_sync(&mut self) -> Result<i32> {
        let mut buf: [u8; 4] = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Read a `u32` in little-endian order.
    fn read_u32_sync(&mut self) -> Result<u32> {
        let mut buf: [u8; 4] = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read an `i64` in little-endian order.
    fn read_i64_sync(&mut self) -> Result<i64> {
        let mut buf: [u8; 8] = [0; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    fn read_u8_sync(&mut self) -> Result<u8> {
        let mut buf: [u8; 1] = [0; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads bytes up to and excluding a null terminator, consuming the terminator.
    fn read_cstring_sync(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8_sync()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        String::from_utf8(bytes)
            .map_err(|e| Error::invalid_response(format!("invalid C string: {e}")))
    }
}

impl<R: Read> SyncLittleEndianRead for R {}

/// Appends the serialized form of `document` to `buffer`.
pub(super) fn write_document(buffer: &mut Vec<u8>, document: &crate::bson::Document) -> Result<()> {
    document.to_writer(buffer)?;
    Ok(())
}

/// Reads documents from `reader` until it is exhausted.
pub(super) fn read_documents(mut reader: &[u8]) -> Result<Vec<crate::bson::Document>> {
    let mut documents = Vec::new();
    while !reader.is_empty() {
        documents.push(crate::bson_util::read_document(&mut reader)?);
    }
    Ok(documents)
}
