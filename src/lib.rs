//! This crate contains the core of a MongoDB driver's write path: an immutable model of the
//! cluster topology, the server selection logic that runs against it, and the write operations
//! (`insert`, `update`, `delete`) that execute against a selected server using whichever wire
//! protocol that server supports.
//!
//! # Topology snapshots
//!
//! A [`ClusterDescription`] is an immutable, point-in-time view of every server the driver knows
//! about. The monitoring subsystem (not part of this crate) publishes a brand-new description each
//! time it observes a change via a [`TopologyUpdater`]; operations read the latest snapshot from a
//! [`Topology`] handle without taking any locks.
//!
//! ```
//! use mongodb_driver_core::{
//!     ClusterConnectionMode,
//!     ClusterDescription,
//!     ClusterType,
//!     ServerDescription,
//!     ServerType,
//!     options::ServerAddress,
//! };
//!
//! let primary = ServerDescription::builder()
//!     .address(ServerAddress::parse("a.example.com:27017").unwrap())
//!     .server_type(ServerType::RsPrimary)
//!     .max_wire_version(7)
//!     .build();
//!
//! let description = ClusterDescription::new(
//!     ClusterConnectionMode::Multiple,
//!     ClusterType::ReplicaSet,
//!     vec![primary],
//! );
//! assert_eq!(description.primaries().len(), 1);
//! assert!(description.is_compatible_with_driver());
//! ```
//!
//! # Executing writes
//!
//! Write operations are built from a [`Namespace`], an ordering flag, a [`WriteConcern`] and a
//! non-empty list of requests, and are executed through a [`Client`]. The client selects a writable
//! server from the current topology, checks out a connection from the user-supplied
//! [`ConnectionPool`], and then executes the operation with either the write command protocol or
//! the legacy opcode protocol depending on what the selected server supports. Either way the
//! caller receives a [`results::BulkWriteResult`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use mongodb_driver_core::{
//! #     bson::doc,
//! #     Client,
//! #     ConnectionPool,
//! #     Namespace,
//! #     Topology,
//! #     WriteConcern,
//! #     operation::{Insert, InsertRequest},
//! #     options::ClientOptions,
//! # };
//! # async fn run(topology: Topology, pool: Arc<dyn ConnectionPool>) -> mongodb_driver_core::error::Result<()> {
//! let client = Client::new(topology, pool, ClientOptions::default());
//! let insert = Insert::new(
//!     Namespace::new("shop", "orders"),
//!     true,
//!     WriteConcern::majority(),
//!     vec![InsertRequest::new(doc! { "sku": "abc", "qty": 3 })],
//! )?;
//! let result = client.execute(insert).await?;
//! assert_eq!(result.inserted_count(), Some(1));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod options;

pub use ::bson;

mod bson_util;
mod client;
mod cmap;
mod coll;
mod concern;
pub mod error;
pub mod operation;
pub mod results;
mod sdam;
mod selection_criteria;
mod trace;


pub use crate::{
    client::Client,
    cmap::{
        conn::{
            wire::{Message, OpCode},
            Connection,
            StreamConnection,
        },
        ConnectionPool,
        StreamDescription,
    },
    coll::Namespace,
    concern::{Acknowledgment, WriteConcern},
    sdam::{
        ClusterConnectionMode,
        ClusterDescription,
        ClusterType,
        ServerDescription,
        ServerType,
        Topology,
        TopologyUpdater,
        TopologyWatcher,
        DRIVER_MAX_WIRE_VERSION,
        DRIVER_MIN_WIRE_VERSION,
    },
    selection_criteria::{SelectionCriteria, TagSet},
};
