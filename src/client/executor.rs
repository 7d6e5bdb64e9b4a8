use super::Client;
use crate::{
    cmap::StreamDescription,
    error::Result,
    operation::WriteOperation,
    results::BulkWriteResult,
    selection_criteria::SelectionCriteria,
};

impl Client {
    /// Executes a write operation against a writable server selected from the latest topology
    /// snapshot, using whichever wire protocol that server supports.
    ///
    /// Per-request failures reported by the server, such as duplicate key errors, are returned
    /// in the result rather than as an error; see [`BulkWriteResult::into_result`] to treat them
    /// as errors. Selection, incompatibility and network errors end the operation and are
    /// returned as they are.
    pub async fn execute(&self, operation: impl Into<WriteOperation>) -> Result<BulkWriteResult> {
        let mut operation = operation.into();
        if let Some(ref default_write_concern) = self.inner.options.default_write_concern {
            operation.apply_default_write_concern(default_write_concern);
            operation.write_concern().validate()?;
        }

        let server = self
            .select_server_for(&SelectionCriteria::Writable, operation.kind().command_name())
            .await?;
        let mut description = StreamDescription::from_server_description(&server);
        if let Some(max_write_batch_size) = self.inner.options.max_write_batch_size {
            let max_write_batch_size = i32::try_from(max_write_batch_size).unwrap_or(i32::MAX);
            description.max_write_batch_size =
                description.max_write_batch_size.min(max_write_batch_size);
        }

        let mut connection = self.inner.pool.check_out(server.address()).await?;
        operation
            .execute(connection.as_mut(), &description, &self.inner.command_emitter)
            .await
    }
}
