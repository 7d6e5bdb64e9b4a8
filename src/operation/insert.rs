use crate::{
    bson::{oid::ObjectId, Bson, Document},
    cmap::conn::wire::{InsertFlags, MessageBody, OpInsert},
    coll::Namespace,
    concern::WriteConcern,
    error::Result,
    operation::{LegacyAcknowledgement, WriteKind, WriteOperation, WriteRequest},
    results::BatchOutcome,
};

/// A request to insert one document.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRequest {
    document: Document,
}

impl InsertRequest {
    /// Creates a request to insert `document`. If the document has no `_id` field, a new
    /// [`ObjectId`] is prepended to it so that the inserted document can be identified
    /// afterwards.
    pub fn new(document: Document) -> Self {
        Self {
            document: with_id(document),
        }
    }

    /// The document to insert, including its `_id`.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The `_id` of the document to insert.
    pub fn id(&self) -> Option<&Bson> {
        self.document.get("_id")
    }

    pub(super) fn command_entry(&self) -> Document {
        self.document.clone()
    }

    /// An OP_INSERT of this document alone.
    pub(super) fn legacy_message(&self, namespace: &Namespace) -> MessageBody {
        legacy_batch(namespace, true, vec![self.document.clone()])
    }

    // `getlasterror` always reports n = 0 for inserts, so an acknowledged insert that reported no
    // error counts as one document inserted.
    pub(super) fn legacy_outcome(&self, _acknowledgement: &LegacyAcknowledgement) -> BatchOutcome {
        BatchOutcome {
            inserted: 1,
            modified: Some(0),
            ..Default::default()
        }
    }
}

fn with_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }

    let mut with_id = Document::new();
    with_id.insert("_id", ObjectId::new());
    with_id.extend(document);
    with_id
}

/// An OP_INSERT of `documents`. An unordered batch keeps going after a document fails to insert.
pub(super) fn legacy_batch(
    namespace: &Namespace,
    ordered: bool,
    documents: Vec<Document>,
) -> MessageBody {
    let flags = if ordered {
        InsertFlags::empty()
    } else {
        InsertFlags::CONTINUE_ON_ERROR
    };

    MessageBody::Insert(OpInsert {
        flags,
        full_collection_name: namespace.to_string(),
        documents,
    })
}

/// An operation inserting one or more documents.
#[derive(Debug, Clone)]
pub struct Insert {
    operation: WriteOperation,
}

impl Insert {
    /// Creates an insert of `requests` into `namespace`. Fails if `requests` is empty or either
    /// the namespace or the write concern is invalid.
    pub fn new(
        namespace: Namespace,
        ordered: bool,
        write_concern: WriteConcern,
        requests: Vec<InsertRequest>,
    ) -> Result<Self> {
        let requests = requests.into_iter().map(WriteRequest::Insert).collect();
        Ok(Self {
            operation: WriteOperation::new(
                WriteKind::Insert,
                namespace,
                ordered,
                write_concern,
                requests,
            )?,
        })
    }

    /// The `_id`s of the documents this operation inserts, in request order.
    pub fn ids(&self) -> Vec<&Bson> {
        self.operation
            .requests()
            .iter()
            .filter_map(|request| match request {
                WriteRequest::Insert(insert) => insert.id(),
                _ => None,
            })
            .collect()
    }
}

impl From<Insert> for WriteOperation {
    fn from(insert: Insert) -> Self {
        insert.operation
    }
}
