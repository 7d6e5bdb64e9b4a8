use crate::{
    bson::{doc, Document},
    cmap::conn::wire::{DeleteFlags, MessageBody, OpDelete},
    coll::Namespace,
    concern::WriteConcern,
    error::Result,
    operation::{LegacyAcknowledgement, WriteKind, WriteOperation, WriteRequest},
    results::BatchOutcome,
};

/// A request to delete the documents matching a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    filter: Document,
    multi: bool,
}

impl DeleteRequest {
    /// Creates a request deleting every document matching `filter`.
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            multi: true,
        }
    }

    /// Whether to delete every matching document rather than only the first one.
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    /// The filter selecting the documents to delete.
    pub fn filter(&self) -> &Document {
        &self.filter
    }

    /// Whether every matching document is deleted.
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub(super) fn command_entry(&self) -> Document {
        doc! {
            "q": self.filter.clone(),
            "limit": if self.multi { 0 } else { 1 },
        }
    }

    pub(super) fn legacy_message(&self, namespace: &Namespace) -> MessageBody {
        let flags = if self.multi {
            DeleteFlags::empty()
        } else {
            DeleteFlags::SINGLE_REMOVE
        };

        MessageBody::Delete(OpDelete {
            full_collection_name: namespace.to_string(),
            flags,
            selector: self.filter.clone(),
        })
    }

    pub(super) fn legacy_outcome(&self, acknowledgement: &LegacyAcknowledgement) -> BatchOutcome {
        BatchOutcome {
            deleted: acknowledgement.n,
            modified: Some(0),
            ..Default::default()
        }
    }
}

/// An operation deleting documents.
#[derive(Debug, Clone)]
pub struct Delete {
    operation: WriteOperation,
}

impl Delete {
    /// Creates a deletion from `namespace` applying `requests`. Fails if `requests` is empty or
    /// either the namespace or the write concern is invalid.
    pub fn new(
        namespace: Namespace,
        ordered: bool,
        write_concern: WriteConcern,
        requests: Vec<DeleteRequest>,
    ) -> Result<Self> {
        let requests = requests.into_iter().map(WriteRequest::Delete).collect();
        Ok(Self {
            operation: WriteOperation::new(
                WriteKind::Delete,
                namespace,
                ordered,
                write_concern,
                requests,
            )?,
        })
    }
}

impl From<Delete> for WriteOperation {
    fn from(delete: Delete) -> Self {
        delete.operation
    }
}
