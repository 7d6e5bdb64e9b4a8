use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// The wire protocol op codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
#[non_exhaustive]
pub enum OpCode {
    /// OP_REPLY, the legacy reply to an OP_QUERY.
    #[display("OP_REPLY")]
    Reply = 1,

    /// OP_UPDATE, a legacy update with no reply.
    #[display("OP_UPDATE")]
    Update = 2001,

    /// OP_INSERT, a legacy insert with no reply.
    #[display("OP_INSERT")]
    Insert = 2002,

    /// OP_QUERY, used here to run commands against servers that predate OP_MSG.
    #[display("OP_QUERY")]
    Query = 2004,

    /// OP_DELETE, a legacy delete with no reply.
    #[display("OP_DELETE")]
    Delete = 2006,

    /// OP_MSG, the command message of modern servers.
    #[display("OP_MSG")]
    Message = 2013,
}

impl OpCode {
    /// Attempt to infer the op code based on the numeric value.
    fn from_i32(i: i32) -> Result<Self> {
        match i {
            1 => Ok(OpCode::Reply),
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2004 => Ok(OpCode::Query),
            2006 => Ok(OpCode::Delete),
            2013 => Ok(OpCode::Message),
            other => Err(Error::invalid_response(format!(
                "Invalid wire protocol opcode: {other}"
            ))),
        }
    }
}

/// The header for any wire protocol message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Header {
    pub(crate) length: i32,
    pub(crate) request_id: i32,
    pub(crate) response_to: i32,
    pub(crate) op_code: OpCode,
}

impl Header {
    pub(crate) const LENGTH: usize = 4 * std::mem::size_of::<i32>();

    /// Serializes the Header and writes the bytes to `stream`.
    pub(crate) async fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut W) -> Result<()> {
        stream.write_i32_le(self.length).await?;
        stream.write_i32_le(self.request_id).await?;
        stream.write_i32_le(self.response_to).await?;
        stream.write_i32_le(self.op_code as i32).await?;

        Ok(())
    }

    /// Reads bytes from `stream` and deserializes them into a header.
    pub(crate) async fn read_from<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Self> {
        let length = stream.read_i32_le().await?;
        let request_id = stream.read_i32_le().await?;
        let response_to = stream.read_i32_le().await?;
        let op_code = OpCode::from_i32(stream.read_i32_le().await?)?;
        Ok(Self {
            length,
            request_id,
            response_to,
            op_code,
        })
    }
}
