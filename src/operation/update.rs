use crate::{
    bson::{doc, Bson, Document},
    bson_util,
    cmap::conn::wire::{MessageBody, OpUpdate, UpdateFlags},
    coll::Namespace,
    concern::WriteConcern,
    error::{Error, Result},
    operation::{LegacyAcknowledgement, WriteKind, WriteOperation, WriteRequest},
    results::{BatchOutcome, BulkWriteUpsert},
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modification {
    Update,
    Replacement,
}

/// A request to update, or replace, the documents matching a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    filter: Document,
    update: Document,
    modification: Modification,
    multi: bool,
    upsert: bool,
}

impl UpdateRequest {
    /// Creates a request applying the update operators in `update` to the first document
    /// matching `filter`. Every top-level key of `update` must be an operator such as `$set`.
    pub fn update(filter: Document, update: Document) -> Self {
        Self::new(filter, update, Modification::Update)
    }

    /// Creates a request replacing the first document matching `filter` with `replacement`,
    /// which must not contain update operators.
    pub fn replace(filter: Document, replacement: Document) -> Self {
        Self::new(filter, replacement, Modification::Replacement)
    }

    fn new(filter: Document, update: Document, modification: Modification) -> Self {
        Self {
            filter,
            update,
            modification,
            multi: false,
            upsert: false,
        }
    }

    /// Applies the update to every matching document instead of the first one. A replacement
    /// cannot be applied to more than one document.
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    /// Inserts a new document when nothing matches the filter.
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// The filter selecting the documents to update.
    pub fn filter(&self) -> &Document {
        &self.filter
    }

    /// The update or replacement document.
    pub fn update_document(&self) -> &Document {
        &self.update
    }

    /// Whether every matching document is updated.
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Whether a document is inserted when nothing matches.
    pub fn is_upsert(&self) -> bool {
        self.upsert
    }

    /// Whether this request replaces the matching document.
    pub fn is_replacement(&self) -> bool {
        self.modification == Modification::Replacement
    }

    fn validate(&self) -> Result<()> {
        match self.modification {
            Modification::Update => bson_util::update_document_check(&self.update),
            Modification::Replacement if self.multi => Err(Error::invalid_argument(
                "a replacement cannot be applied to multiple documents",
            )),
            Modification::Replacement => bson_util::replacement_document_check(&self.update),
        }
    }

    pub(super) fn command_entry(&self) -> Document {
        doc! {
            "q": self.filter.clone(),
            "u": self.update.clone(),
            "multi": self.multi,
            "upsert": self.upsert,
        }
    }

    pub(super) fn legacy_message(&self, namespace: &Namespace) -> MessageBody {
        let mut flags = UpdateFlags::empty();
        if self.upsert {
            flags |= UpdateFlags::UPSERT;
        }
        if self.multi {
            flags |= UpdateFlags::MULTI_UPDATE;
        }

        MessageBody::Update(OpUpdate {
            full_collection_name: namespace.to_string(),
            flags,
            selector: self.filter.clone(),
            update: self.update.clone(),
        })
    }

    /// Legacy servers cannot report how many documents were actually modified, so the outcome
    /// leaves that count unknown.
    pub(super) fn legacy_outcome(&self, acknowledgement: &LegacyAcknowledgement) -> BatchOutcome {
        let upserted_id = match acknowledgement.upserted {
            Some(ref id) => Some(id.clone()),
            // Servers before 2.6 omit `upserted` when the upserted document carried its own
            // `_id`, so it has to be recovered from the request.
            None if self.upsert
                && acknowledgement.updated_existing == Some(false)
                && acknowledgement.n == 1 =>
            {
                self.upserted_id().cloned()
            }
            None => None,
        };

        match upserted_id {
            Some(id) => BatchOutcome {
                upserts: vec![BulkWriteUpsert { index: 0, id }],
                modified: None,
                ..Default::default()
            },
            None => BatchOutcome {
                matched: acknowledgement.n,
                modified: None,
                ..Default::default()
            },
        }
    }

    fn upserted_id(&self) -> Option<&Bson> {
        self.update
            .get("_id")
            .or_else(|| self.filter.get("_id"))
    }
}

/// An operation updating or replacing documents.
#[derive(Debug, Clone)]
pub struct Update {
    operation: WriteOperation,
}

impl Update {
    /// Creates an update of `namespace` applying `requests`. Fails if `requests` is empty, if an
    /// update document contains something other than operators, if a replacement contains
    /// operators or is marked `multi`, or if either the namespace or the write concern is
    /// invalid.
    pub fn new(
        namespace: Namespace,
        ordered: bool,
        write_concern: WriteConcern,
        requests: Vec<UpdateRequest>,
    ) -> Result<Self> {
        for request in &requests {
            request.validate()?;
        }

        let requests = requests.into_iter().map(WriteRequest::Update).collect();
        Ok(Self {
            operation: WriteOperation::new(
                WriteKind::Update,
                namespace,
                ordered,
                write_concern,
                requests,
            )?,
        })
    }
}

impl From<Update> for WriteOperation {
    fn from(update: Update) -> Self {
        update.operation
    }
}
