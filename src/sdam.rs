mod description;
mod topology;

pub use self::{
    description::{
        cluster::{ClusterConnectionMode, ClusterDescription, ClusterType},
        server::{ServerDescription, ServerType, DRIVER_MAX_WIRE_VERSION, DRIVER_MIN_WIRE_VERSION},
    },
    topology::{Topology, TopologyUpdater, TopologyWatcher},
};

pub(crate) use self::description::server::{
    DEFAULT_MAX_BSON_OBJECT_SIZE,
    DEFAULT_MAX_MESSAGE_SIZE_BYTES,
    DEFAULT_MAX_WRITE_BATCH_SIZE,
    OP_MSG_WIRE_VERSION,
    WRITE_COMMANDS_WIRE_VERSION,
};
