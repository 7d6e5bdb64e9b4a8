
use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::{sdam::ClusterDescription, trace::topology::TopologyTracingEventEmitter};

/// A handle to the current view of the deployment.
///
/// The view is a [`ClusterDescription`] that is replaced wholesale, never edited, each time the
/// monitoring subsystem publishes a new one through the paired [`TopologyUpdater`]. Readers get an
/// `Arc` to whichever snapshot was current when they asked, so a selection in progress never
/// observes a half-applied change and never holds a lock while it filters servers.
#[derive(Debug, Clone)]
pub struct Topology {
    watcher: TopologyWatcher,
}

impl Topology {
    /// Creates a topology whose current view is `initial`, along with the updater used to replace
    /// that view.
    pub fn new(initial: ClusterDescription) -> (Topology, TopologyUpdater) {
        let (watcher, updater) = TopologyWatcher::channel(initial);
        (Topology { watcher }, updater)
    }

    /// The current snapshot.
    pub fn latest(&self) -> Arc<ClusterDescription> {
        self.watcher.peek_latest()
    }

    /// Creates a new watcher that can be used to wait for the next snapshot.
    pub fn watch(&self) -> TopologyWatcher {
        let mut watcher = self.watcher.clone();
        watcher.receiver.mark_unchanged();
        watcher
    }
}

/// Publishes new snapshots of the deployment. Held by the monitoring subsystem.
#[derive(Debug)]
pub struct TopologyUpdater {
    sender: watch::Sender<Arc<ClusterDescription>>,
    emitter: TopologyTracingEventEmitter,
}

impl TopologyUpdater {
    /// Replaces the current snapshot with `description`. Readers that already hold the previous
    /// snapshot keep it; every read from now on observes the new one.
    pub fn publish(&self, description: ClusterDescription) {
        let new = Arc::new(description);
        let previous = self.sender.send_replace(new.clone());
        self.emitter
            .emit_description_changed_event(previous.as_ref(), new.as_ref());
    }

    /// The snapshot most recently published.
    pub fn latest(&self) -> Arc<ClusterDescription> {
        self.sender.borrow().clone()
    }

    /// Whether any [`Topology`] or [`TopologyWatcher`] is still observing this updater.
    pub fn is_observed(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Observes the snapshots published by a [`TopologyUpdater`].
#[derive(Debug, Clone)]
pub struct TopologyWatcher {
    receiver: watch::Receiver<Arc<ClusterDescription>>,
}

impl TopologyWatcher {
    fn channel(initial: ClusterDescription) -> (TopologyWatcher, TopologyUpdater) {
        let (tx, rx) = watch::channel(Arc::new(initial));
        let watcher = TopologyWatcher { receiver: rx };
        let updater = TopologyUpdater {
            sender: tx,
            emitter: TopologyTracingEventEmitter,
        };
        (watcher, updater)
    }

    /// Whether the paired updater still exists. Once it has been dropped no new snapshot will
    /// ever be published.
    pub fn is_alive(&self) -> bool {
        self.receiver.has_changed().is_ok()
    }

    /// The current snapshot, marking it as seen so that [`wait_for_update`] only returns for a
    /// later one.
    ///
    /// [`wait_for_update`]: TopologyWatcher::wait_for_update
    pub fn observe_latest(&mut self) -> Arc<ClusterDescription> {
        self.receiver.borrow_and_update().clone()
    }

    /// The current snapshot, without marking it as seen.
    pub fn peek_latest(&self) -> Arc<ClusterDescription> {
        self.receiver.borrow().clone()
    }

    /// Waits up to `timeout` for a snapshot newer than the last one observed. Returns whether one
    /// arrived.
    pub async fn wait_for_update(&mut self, timeout: Duration) -> bool {
        let changed = tokio::time::timeout(timeout, self.receiver.changed())
            .await
            .map(|result| result.is_ok())
            .unwrap_or(false);
        self.receiver.borrow_and_update();
        changed
    }
}
