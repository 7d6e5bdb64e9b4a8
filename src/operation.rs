//! Contains the write operations and the requests they carry.

mod delete;
mod insert;
mod protocol;
mod update;

use std::fmt;

use crate::{
    bson::{Bson, Document},
    cmap::{conn::wire::MessageBody, Connection, StreamDescription},
    coll::Namespace,
    concern::WriteConcern,
    error::{Error, Result},
    results::{BatchOutcome, BulkWriteResult},
    trace::command::CommandTracingEventEmitter,
};

pub use self::{
    delete::{Delete, DeleteRequest},
    insert::{Insert, InsertRequest},
    update::{Update, UpdateRequest},
};
pub(crate) use self::protocol::{select_protocol, WriteProtocol};

/// Room reserved in a write command's message for everything but the request documents: the
/// message header, the command body and the section framing.
pub(crate) const COMMAND_OVERHEAD_SIZE: usize = 16_000;

/// The kind of write an operation performs. Every request in an operation has the same kind.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, derive_more::Display)]
#[non_exhaustive]
pub enum WriteKind {
    /// Inserts documents.
    #[display("insert")]
    Insert,

    /// Updates or replaces the documents matching a filter.
    #[display("update")]
    Update,

    /// Deletes the documents matching a filter.
    #[display("delete")]
    Delete,
}

impl WriteKind {
    /// The name of the write command for this kind.
    pub(crate) fn command_name(self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        }
    }

    /// The field of the write command that holds the request documents.
    pub(crate) fn payload_identifier(self) -> &'static str {
        match self {
            WriteKind::Insert => "documents",
            WriteKind::Update => "updates",
            WriteKind::Delete => "deletes",
        }
    }
}

/// One request of a write operation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WriteRequest {
    Insert(InsertRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

impl WriteRequest {
    pub(crate) fn kind(&self) -> WriteKind {
        match self {
            WriteRequest::Insert(_) => WriteKind::Insert,
            WriteRequest::Update(_) => WriteKind::Update,
            WriteRequest::Delete(_) => WriteKind::Delete,
        }
    }

    /// The document representing this request in the payload of a write command.
    pub(crate) fn command_entry(&self) -> Document {
        match self {
            WriteRequest::Insert(request) => request.command_entry(),
            WriteRequest::Update(request) => request.command_entry(),
            WriteRequest::Delete(request) => request.command_entry(),
        }
    }

    /// The legacy opcode message carrying this request alone.
    pub(crate) fn legacy_message(&self, namespace: &Namespace) -> MessageBody {
        match self {
            WriteRequest::Insert(request) => request.legacy_message(namespace),
            WriteRequest::Update(request) => request.legacy_message(namespace),
            WriteRequest::Delete(request) => request.legacy_message(namespace),
        }
    }

    /// Interprets a legacy acknowledgement of this request alone.
    pub(crate) fn legacy_outcome(&self, acknowledgement: &LegacyAcknowledgement) -> BatchOutcome {
        match self {
            WriteRequest::Insert(request) => request.legacy_outcome(acknowledgement),
            WriteRequest::Update(request) => request.legacy_outcome(acknowledgement),
            WriteRequest::Delete(request) => request.legacy_outcome(acknowledgement),
        }
    }
}

/// What a `getlasterror` reply reported about a write that succeeded.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LegacyAcknowledgement {
    pub(crate) n: u64,
    pub(crate) updated_existing: Option<bool>,
    pub(crate) upserted: Option<Bson>,
}

/// A write operation ready to be executed: a non-empty list of requests of a single kind, the
/// namespace they target, whether they must be applied in order, and the write concern.
///
/// Operations are built through [`Insert`], [`Update`] or [`Delete`] and executed with
/// [`Client::execute`](crate::Client::execute).
#[derive(Clone)]
pub struct WriteOperation {
    namespace: Namespace,
    ordered: bool,
    write_concern: WriteConcern,
    kind: WriteKind,
    requests: Vec<WriteRequest>,
}

impl WriteOperation {
    fn new(
        kind: WriteKind,
        namespace: Namespace,
        ordered: bool,
        write_concern: WriteConcern,
        requests: Vec<WriteRequest>,
    ) -> Result<Self> {
        if requests.is_empty() {
            return Err(Error::invalid_argument(format!(
                "{kind} operation must contain at least one request"
            )));
        }
        if let Some(request) = requests.iter().find(|request| request.kind() != kind) {
            return Err(Error::internal(format!(
                "{kind} operation cannot carry a request of kind {}",
                request.kind()
            )));
        }
        namespace.validate()?;
        write_concern.validate()?;

        Ok(Self {
            namespace,
            ordered,
            write_concern,
            kind,
            requests,
        })
    }

    /// The namespace this operation writes to.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Whether the requests are applied in order, stopping at the first one that fails.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// The write concern this operation was built with.
    pub fn write_concern(&self) -> &WriteConcern {
        &self.write_concern
    }

    /// The kind of write this operation performs.
    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    /// The number of requests in this operation.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Always false: an operation cannot be built without requests.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(crate) fn requests(&self) -> &[WriteRequest] {
        &self.requests
    }

    /// Fills in `default` when this operation was built without a write concern.
    pub(crate) fn apply_default_write_concern(&mut self, default: &WriteConcern) {
        if self.write_concern.is_empty() {
            self.write_concern = default.clone();
        }
    }

    /// Executes this operation over `connection`, using the protocol the server described by
    /// `description` supports.
    pub(crate) async fn execute(
        &self,
        connection: &mut dyn Connection,
        description: &StreamDescription,
        emitter: &CommandTracingEventEmitter,
    ) -> Result<BulkWriteResult> {
        let protocol = select_protocol(description);
        protocol
            .execute(self, connection, description, emitter)
            .await
    }
}

impl fmt::Debug for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOperation")
            .field("kind", &self.kind)
            .field("namespace", &self.namespace)
            .field("ordered", &self.ordered)
            .field("write_concern", &self.write_concern)
            .field("requests", &self.requests.len())
            .finish()
    }
}
