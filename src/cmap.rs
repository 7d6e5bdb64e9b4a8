pub(crate) mod conn;

use futures_util::future::BoxFuture;

pub use self::conn::{Connection, StreamConnection};
use crate::{
    error::Result,
    options::ServerAddress,
    sdam::{ServerDescription, ServerType, OP_MSG_WIRE_VERSION, WRITE_COMMANDS_WIRE_VERSION},
};

/// A source of connections to the servers of a deployment.
///
/// Establishing, authenticating and pooling connections is the business of the implementor; the
/// client only asks for a connection to the server it selected and uses it exclusively for the
/// duration of one operation.
pub trait ConnectionPool: Send + Sync {
    /// Returns a connection to the server at `address`.
    fn check_out<'a>(
        &'a self,
        address: &'a ServerAddress,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>>>;
}

/// Contains information about a given server in a format digestible by a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescription {
    /// The address of the server.
    pub(crate) server_address: ServerAddress,

    /// The type of the server when it was selected.
    pub(crate) initial_server_type: ServerType,

    /// The maximum wire version that the server understands.
    pub(crate) max_wire_version: i32,

    /// The minimum wire version that the server understands.
    pub(crate) min_wire_version: i32,

    /// The maximum size of a single document the server accepts.
    pub(crate) max_bson_object_size: i32,

    /// The maximum number of inserts, updates, or deletes that can be included in a write
    /// batch. If more than this number of writes are included, the server cannot guarantee space
    /// in the response document to reply to the batch.
    pub(crate) max_write_batch_size: i32,

    /// The maximum permitted size of a BSON wire protocol message.
    pub(crate) max_message_size_bytes: i32,
}

impl StreamDescription {
    /// Constructs a new StreamDescription from the description of the server a connection was
    /// checked out for.
    pub fn from_server_description(server: &ServerDescription) -> Self {
        Self {
            server_address: server.address().clone(),
            initial_server_type: server.server_type(),
            max_wire_version: server.max_wire_version(),
            min_wire_version: server.min_wire_version(),
            max_bson_object_size: server.max_bson_object_size,
            max_write_batch_size: server.max_write_batch_size,
            max_message_size_bytes: server.max_message_size_bytes,
        }
    }

    /// The address of the server.
    pub fn server_address(&self) -> &ServerAddress {
        &self.server_address
    }

    /// Whether the server accepts the `insert`, `update` and `delete` write commands.
    pub(crate) fn supports_write_commands(&self) -> bool {
        self.max_wire_version >= WRITE_COMMANDS_WIRE_VERSION
    }

    /// Whether the server accepts OP_MSG.
    pub(crate) fn supports_op_msg(&self) -> bool {
        self.max_wire_version >= OP_MSG_WIRE_VERSION
    }
}
