mod header;
mod legacy_write;
mod message;
mod op_message;
mod query;
mod reply;
mod util;

pub use self::{
    header::OpCode,
    legacy_write::{DeleteFlags, InsertFlags, OpDelete, OpInsert, OpUpdate, UpdateFlags},
    message::{Message, MessageBody},
    op_message::{DocumentSequence, MessageFlags, OpMsg},
    query::{OpQuery, QueryFlags},
    reply::{OpReply, ResponseFlags},
};

pub(crate) use self::util::next_request_id;
