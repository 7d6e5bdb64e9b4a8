mod executor;
pub mod options;

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    cmap::ConnectionPool,
    error::{Error, ErrorKind, Result},
    options::ClientOptions,
    sdam::{ServerDescription, Topology},
    selection_criteria::SelectionCriteria,
    trace::{command::CommandTracingEventEmitter, server_selection::ServerSelectionEventEmitter},
};

/// The entry point for executing writes against a deployment.
///
/// A `Client` reads the deployment's current shape from a [`Topology`] kept up to date by the
/// monitoring subsystem, and gets connections to the servers it selects from a user-supplied
/// [`ConnectionPool`]. It performs no retries: selection, incompatibility and network errors are
/// returned to the caller as they occur.
///
/// `Client` uses [`std::sync::Arc`](https://doc.rust-lang.org/std/sync/struct.Arc.html)
/// internally, so it can safely be shared across threads or async tasks.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    topology: Topology,
    pool: Arc<dyn ConnectionPool>,
    options: ClientOptions,
    command_emitter: CommandTracingEventEmitter,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("topology", &self.inner.topology)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Client {
    /// Creates a client selecting servers from `topology` and connecting to them through `pool`.
    pub fn new(topology: Topology, pool: Arc<dyn ConnectionPool>, options: ClientOptions) -> Self {
        let command_emitter =
            CommandTracingEventEmitter::new(options.tracing_max_document_length_bytes);
        Self {
            inner: Arc::new(ClientInner {
                topology,
                pool,
                options,
                command_emitter,
            }),
        }
    }

    /// The topology this client selects servers from.
    pub fn topology(&self) -> &Topology {
        &self.inner.topology
    }

    /// The options this client was created with.
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Selects a server satisfying `criteria` from the latest topology snapshot.
    ///
    /// Fails with an `IncompatibleServer` error if any server in the snapshot speaks wire
    /// versions this driver does not. When no server is eligible, waits up to the configured
    /// `server_selection_timeout` for a snapshot in which one is, then fails with a
    /// `ServerSelection` error.
    pub async fn select_server(&self, criteria: &SelectionCriteria) -> Result<ServerDescription> {
        self.select_server_for(criteria, "select server").await
    }

    async fn select_server_for(
        &self,
        criteria: &SelectionCriteria,
        operation_name: &str,
    ) -> Result<ServerDescription> {
        let start_time = Instant::now();
        let timeout = self
            .inner
            .options
            .server_selection_timeout
            .unwrap_or(Duration::ZERO);
        let emitter =
            ServerSelectionEventEmitter::new(criteria, operation_name, start_time, timeout);

        let mut watcher = self.inner.topology.watch();
        emitter.emit_started_event(&watcher.peek_latest());

        // We only want to emit this message once per operation at most.
        let mut emitted_waiting_message = false;

        loop {
            let description = watcher.observe_latest();

            if let Err(error) = description.check_compatibility() {
                emitter.emit_failed_event(&description, &error);
                return Err(error);
            }

            if let Some(server) = criteria.select(&description) {
                emitter.emit_succeeded_event(&description, server);
                return Ok(server.clone());
            }

            if !emitted_waiting_message && start_time.elapsed() < timeout {
                emitter.emit_waiting_event(&description);
                emitted_waiting_message = true;
            }

            let change_occurred = start_time.elapsed() < timeout
                && watcher
                    .wait_for_update(timeout.saturating_sub(start_time.elapsed()))
                    .await;
            if !change_occurred {
                let error: Error = ErrorKind::ServerSelection {
                    message: format!(
                        "Server selection timeout: No available servers matching {criteria}. \
                         Topology: {}",
                        description.short_description()
                    ),
                }
                .into();
                emitter.emit_failed_event(&description, &error);
                return Err(error);
            }
        }
    }
}
