//! Contains the types of results returned by write operations.


use serde::{Deserialize, Serialize};

use crate::{
    bson::Bson,
    error::{BulkWriteError, BulkWriteFailure, Error, ErrorKind, Result, WriteConcernError},
    operation::WriteKind,
};

/// A document inserted by an update with `upsert` set.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[non_exhaustive]
pub struct BulkWriteUpsert {
    /// The index of the update request that inserted the document.
    pub index: usize,

    /// The `_id` of the inserted document.
    #[serde(rename = "_id")]
    pub id: Bson,
}

/// The outcome of a write operation, whichever wire protocol carried it out.
///
/// Counts are only meaningful when the write was acknowledged, so every count accessor returns
/// `None` for an unacknowledged write.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct BulkWriteResult {
    kind: WriteKind,
    acknowledged: bool,
    inserted_count: u64,
    matched_count: u64,
    modified_count: Option<u64>,
    deleted_count: u64,
    upserts: Vec<BulkWriteUpsert>,
    write_errors: Vec<BulkWriteError>,
    write_concern_error: Option<WriteConcernError>,
}

impl BulkWriteResult {
    pub(crate) fn unacknowledged(kind: WriteKind) -> Self {
        Self {
            acknowledged: false,
            ..Self::acknowledged(kind)
        }
    }

    fn acknowledged(kind: WriteKind) -> Self {
        Self {
            kind,
            acknowledged: true,
            inserted_count: 0,
            matched_count: 0,
            modified_count: Some(0),
            deleted_count: 0,
            upserts: Vec::new(),
            write_errors: Vec::new(),
            write_concern_error: None,
        }
    }

    /// The kind of write that produced this result.
    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    /// Whether the server acknowledged the write. When it did not, nothing is known about the
    /// outcome.
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// The number of documents inserted, not counting upserts.
    pub fn inserted_count(&self) -> Option<u64> {
        self.acknowledged.then_some(self.inserted_count)
    }

    /// The number of documents matched by updates.
    pub fn matched_count(&self) -> Option<u64> {
        self.acknowledged.then_some(self.matched_count)
    }

    /// The number of documents modified by updates. Also `None` when any update batch ran over
    /// the legacy protocol, which cannot report it.
    pub fn modified_count(&self) -> Option<u64> {
        self.modified_count.filter(|_| self.acknowledged)
    }

    /// The number of documents deleted.
    pub fn deleted_count(&self) -> Option<u64> {
        self.acknowledged.then_some(self.deleted_count)
    }

    /// The number of documents inserted by upserts.
    pub fn upserted_count(&self) -> Option<u64> {
        self.acknowledged.then_some(self.upserts.len() as u64)
    }

    /// The documents inserted by upserts, in request order.
    pub fn upserts(&self) -> &[BulkWriteUpsert] {
        &self.upserts
    }

    /// The requests the server rejected, in request order. Each error's index refers to the
    /// request list the operation was built with.
    pub fn write_errors(&self) -> &[BulkWriteError] {
        &self.write_errors
    }

    /// The last write concern error the server reported, if any.
    pub fn write_concern_error(&self) -> Option<&WriteConcernError> {
        self.write_concern_error.as_ref()
    }

    /// Whether the server reported a write error or a write concern error.
    pub fn has_errors(&self) -> bool {
        !self.write_errors.is_empty() || self.write_concern_error.is_some()
    }

    /// Converts a result that carries write errors or a write concern error into an
    /// [`ErrorKind::BulkWrite`] error, for callers who would rather handle them as failures.
    pub fn into_result(self) -> Result<Self> {
        if !self.has_errors() {
            return Ok(self);
        }

        Err(Error::new(
            ErrorKind::BulkWrite(BulkWriteFailure {
                write_errors: self.write_errors,
                write_concern_error: self.write_concern_error,
            }),
            None::<Vec<String>>,
        ))
    }
}

/// What the server reported for one batch: a single legacy write, or one write command covering
/// a contiguous slice of the operation's requests. Indexes are relative to the batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct BatchOutcome {
    pub(crate) inserted: u64,
    pub(crate) matched: u64,
    pub(crate) modified: Option<u64>,
    pub(crate) deleted: u64,
    pub(crate) upserts: Vec<BulkWriteUpsert>,
    pub(crate) write_errors: Vec<BulkWriteError>,
    pub(crate) write_concern_error: Option<WriteConcernError>,
}

/// Merges the outcomes of the batches of one operation into a single [`BulkWriteResult`].
#[derive(Debug)]
pub(crate) struct ResultAggregator {
    result: BulkWriteResult,
}

impl ResultAggregator {
    pub(crate) fn new(kind: WriteKind) -> Self {
        Self {
            result: BulkWriteResult::acknowledged(kind),
        }
    }

    /// Adds the outcome of the batch that started at request `offset`.
    pub(crate) fn merge(&mut self, offset: usize, outcome: BatchOutcome) {
        let result = &mut self.result;
        result.inserted_count += outcome.inserted;
        result.matched_count += outcome.matched;
        result.deleted_count += outcome.deleted;
        result.modified_count = match (result.modified_count, outcome.modified) {
            (Some(total), Some(modified)) => Some(total + modified),
            _ => None,
        };

        result
            .upserts
            .extend(outcome.upserts.into_iter().map(|mut upsert| {
                upsert.index += offset;
                upsert
            }));
        result
            .write_errors
            .extend(outcome.write_errors.into_iter().map(|mut error| {
                error.index += offset;
                error
            }));
        if outcome.write_concern_error.is_some() {
            result.write_concern_error = outcome.write_concern_error;
        }
    }

    pub(crate) fn has_write_errors(&self) -> bool {
        !self.result.write_errors.is_empty()
    }

    pub(crate) fn finish(self) -> BulkWriteResult {
        self.result
    }
}
