use crate::sdam::ClusterDescription;

use super::{TracingRepresentation, TOPOLOGY_TRACING_EVENT_TARGET};

/// Type responsible for emitting tracing events when a new topology snapshot is published.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TopologyTracingEventEmitter;

impl TopologyTracingEventEmitter {
    pub(crate) fn emit_description_changed_event(
        &self,
        previous: &ClusterDescription,
        new: &ClusterDescription,
    ) {
        tracing::debug!(
            target: TOPOLOGY_TRACING_EVENT_TARGET,
            unchanged = previous == new,
            previousDescription = previous.tracing_representation(),
            newDescription = new.tracing_representation(),
            "Topology description changed"
        );
    }
}
