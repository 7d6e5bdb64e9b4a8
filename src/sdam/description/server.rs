#[cfg(test)]
mod test;

use std::{fmt, time::Duration};

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::{
    bson::Document,
    error::Result,
    options::ServerAddress,
    selection_criteria::{render_tag_set, TagSet},
};

/// The lowest wire protocol version this driver can speak.
pub const DRIVER_MIN_WIRE_VERSION: i32 = 0;

/// The highest wire protocol version this driver can speak.
pub const DRIVER_MAX_WIRE_VERSION: i32 = 7;

/// The first wire version whose servers accept the `insert`, `update` and `delete` commands.
pub(crate) const WRITE_COMMANDS_WIRE_VERSION: i32 = 2;

/// The first wire version whose servers accept OP_MSG.
pub(crate) const OP_MSG_WIRE_VERSION: i32 = 6;

pub(crate) const DEFAULT_MAX_BSON_OBJECT_SIZE: i32 = 16 * 1024 * 1024;
pub(crate) const DEFAULT_MAX_MESSAGE_SIZE_BYTES: i32 = 48_000_000;
pub(crate) const DEFAULT_MAX_WRITE_BATCH_SIZE: i32 = 1000;

/// The role a server plays in its deployment.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, derive_more::Display)]
#[non_exhaustive]
pub enum ServerType {
    /// A single, non-replicated server.
    Standalone,

    /// A router fronting a sharded cluster.
    Mongos,

    /// The primary of a replica set.
    RsPrimary,

    /// A secondary of a replica set.
    RsSecondary,

    /// An arbiter of a replica set; arbiters hold no data.
    RsArbiter,

    /// A hidden, starting up or recovering member of a replica set.
    RsOther,

    /// A member of an uninitialized replica set, or a member that has been removed from its
    /// replica set config.
    RsGhost,

    /// A server that has not been contacted yet or whose last check failed.
    #[default]
    Unknown,
}

/// An immutable snapshot of what the monitoring subsystem last observed about one server: its
/// role, health, tags, wire version range and message size limits.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
#[non_exhaustive]
pub struct ServerDescription {
    pub(crate) address: ServerAddress,

    #[builder(default)]
    pub(crate) server_type: ServerType,

    #[builder(default)]
    pub(crate) tags: TagSet,

    #[builder(default)]
    pub(crate) min_wire_version: i32,

    #[builder(default)]
    pub(crate) max_wire_version: i32,

    #[builder(default = DEFAULT_MAX_BSON_OBJECT_SIZE)]
    pub(crate) max_bson_object_size: i32,

    #[builder(default = DEFAULT_MAX_MESSAGE_SIZE_BYTES)]
    pub(crate) max_message_size_bytes: i32,

    #[builder(default = DEFAULT_MAX_WRITE_BATCH_SIZE)]
    pub(crate) max_write_batch_size: i32,

    #[builder(default, setter(strip_option))]
    pub(crate) round_trip_time: Option<Duration>,

    #[builder(default, setter(strip_option, into))]
    pub(crate) set_name: Option<String>,

    // The error message from the most recent failed check of this server, if any. A server with
    // an error is always of type `Unknown`.
    #[builder(default, setter(strip_option, into))]
    pub(crate) error: Option<String>,
}

/// The subset of a `hello`/legacy `isMaster` reply the write path cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelloCommandResponse {
    #[serde(rename = "isWritablePrimary")]
    is_writable_primary: Option<bool>,

    #[serde(rename = "ismaster")]
    is_master: Option<bool>,

    secondary: Option<bool>,

    arbiter_only: Option<bool>,

    hidden: Option<bool>,

    #[serde(rename = "isreplicaset")]
    is_replica_set: Option<bool>,

    msg: Option<String>,

    set_name: Option<String>,

    tags: Option<TagSet>,

    min_wire_version: Option<i32>,

    max_wire_version: Option<i32>,

    max_bson_object_size: Option<i32>,

    max_message_size_bytes: Option<i32>,

    max_write_batch_size: Option<i32>,
}

impl HelloCommandResponse {
    fn server_type(&self) -> ServerType {
        if self.msg.as_deref() == Some("isdbgrid") {
            ServerType::Mongos
        } else if self.set_name.is_some() {
            if self.hidden == Some(true) {
                ServerType::RsOther
            } else if self.is_writable_primary == Some(true) || self.is_master == Some(true) {
                ServerType::RsPrimary
            } else if self.secondary == Some(true) {
                ServerType::RsSecondary
            } else if self.arbiter_only == Some(true) {
                ServerType::RsArbiter
            } else {
                ServerType::RsOther
            }
        } else if self.is_replica_set == Some(true) {
            ServerType::RsGhost
        } else {
            ServerType::Standalone
        }
    }
}

impl ServerDescription {
    /// Creates the description of a server that has not been checked yet.
    pub fn unknown(address: ServerAddress) -> Self {
        Self::builder().address(address).build()
    }

    /// Creates the description of a server whose most recent check failed with `error`.
    pub fn with_error(address: ServerAddress, error: impl Into<String>) -> Self {
        Self::builder().address(address).error(error).build()
    }

    /// Builds a description from the reply a server sent to a `hello` (or legacy `isMaster`)
    /// command. A reply with `ok` other than 1 produces an `Unknown` description carrying the
    /// server's error message.
    pub fn from_hello_reply(
        address: ServerAddress,
        reply: Document,
        round_trip_time: Option<Duration>,
    ) -> Result<Self> {
        let ok = reply
            .get("ok")
            .and_then(crate::bson_util::get_int)
            .unwrap_or(0);
        if ok != 1 {
            let message = reply
                .get_str("errmsg")
                .unwrap_or("hello command failed")
                .to_string();
            return Ok(Self::with_error(address, message));
        }

        let response: HelloCommandResponse = crate::bson::from_document(reply)?;
        Ok(Self {
            address,
            server_type: response.server_type(),
            tags: response.tags.clone().unwrap_or_default(),
            min_wire_version: response.min_wire_version.unwrap_or(0),
            max_wire_version: response.max_wire_version.unwrap_or(0),
            max_bson_object_size: response
                .max_bson_object_size
                .unwrap_or(DEFAULT_MAX_BSON_OBJECT_SIZE),
            max_message_size_bytes: response
                .max_message_size_bytes
                .unwrap_or(DEFAULT_MAX_MESSAGE_SIZE_BYTES),
            max_write_batch_size: response
                .max_write_batch_size
                .unwrap_or(DEFAULT_MAX_WRITE_BATCH_SIZE),
            round_trip_time,
            set_name: response.set_name,
            error: None,
        })
    }

    /// The address of this server. Addresses identify servers uniquely within a topology.
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// The role this server was last observed playing.
    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    /// The tags configured for this server.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// The lowest wire version this server speaks.
    pub fn min_wire_version(&self) -> i32 {
        self.min_wire_version
    }

    /// The highest wire version this server speaks.
    pub fn max_wire_version(&self) -> i32 {
        self.max_wire_version
    }

    /// The round trip time of the most recent check of this server, if one succeeded.
    pub fn round_trip_time(&self) -> Option<Duration> {
        self.round_trip_time
    }

    /// The error message of the most recent check, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the most recent check of this server succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.server_type != ServerType::Unknown
    }

    /// Whether this server can accept writes: a replica set primary, a router, or a standalone.
    pub fn is_primary(&self) -> bool {
        self.is_ok()
            && matches!(
                self.server_type,
                ServerType::RsPrimary | ServerType::Mongos | ServerType::Standalone
            )
    }

    /// Whether this server can serve secondary reads: a replica set secondary, or a router or
    /// standalone, which serve either role.
    pub fn is_secondary(&self) -> bool {
        self.is_ok()
            && matches!(
                self.server_type,
                ServerType::RsSecondary | ServerType::Mongos | ServerType::Standalone
            )
    }

    /// Whether this server carries every tag in `tag_set` with the same value. Every server
    /// matches an empty tag set.
    pub fn has_tags(&self, tag_set: &TagSet) -> bool {
        tag_set
            .iter()
            .all(|(key, value)| self.tags.get(key) == Some(value))
    }

    /// Whether this server's wire version range overlaps the driver's. Servers that could not be
    /// checked are considered compatible, since nothing is known about them yet.
    pub fn is_compatible_with_driver(&self) -> bool {
        self.compatibility_error_message().is_none()
    }

    /// Describes why this server is incompatible with the driver, if it is.
    pub fn compatibility_error_message(&self) -> Option<String> {
        if !self.is_ok() {
            return None;
        }

        if self.min_wire_version > DRIVER_MAX_WIRE_VERSION {
            return Some(format!(
                "Server at {} requires wire version {}, but this version of the driver only \
                 supports up to {}",
                self.address, self.min_wire_version, DRIVER_MAX_WIRE_VERSION,
            ));
        }

        if self.max_wire_version < DRIVER_MIN_WIRE_VERSION {
            return Some(format!(
                "Server at {} reports wire version {}, but this version of the driver requires \
                 at least {}",
                self.address, self.max_wire_version, DRIVER_MIN_WIRE_VERSION,
            ));
        }

        None
    }

    /// Whether this server accepts the `insert`, `update` and `delete` write commands.
    pub fn supports_write_commands(&self) -> bool {
        self.max_wire_version >= WRITE_COMMANDS_WIRE_VERSION
    }

    /// Whether this server accepts OP_MSG, and with it unacknowledged command writes that need
    /// no reply.
    pub fn supports_op_msg(&self) -> bool {
        self.max_wire_version >= OP_MSG_WIRE_VERSION
    }

    /// A compact rendering used in topology diagnostics.
    pub fn short_description(&self) -> String {
        let mut description = format!("{{address={}, type={}", self.address, self.server_type);
        if !self.tags.is_empty() {
            description.push_str(&format!(", tags={}", render_tag_set(&self.tags)));
        }
        if let Some(rtt) = self.round_trip_time {
            description.push_str(&format!(", roundTripTime={:.1} ms", rtt.as_secs_f64() * 1000.0));
        }
        if let Some(ref error) = self.error {
            description.push_str(&format!(", error={error}"));
        }
        description.push('}');
        description
    }
}

impl fmt::Display for ServerDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{ Address: {}, Type: {:?}", self.address, self.server_type)?;

        if let Some(ref set_name) = self.set_name {
            write!(f, ", Set Name: {set_name}")?;
        }

        if !self.tags.is_empty() {
            write!(f, ", Tags: {}", render_tag_set(&self.tags))?;
        }

        write!(
            f,
            ", Wire Versions: [{}, {}]",
            self.min_wire_version, self.max_wire_version
        )?;

        if let Some(rtt) = self.round_trip_time {
            write!(f, ", Average RTT: {rtt:?}")?;
        }

        if let Some(ref error) = self.error {
            write!(f, ", Error: {error}")?;
        }

        write!(f, " }}")
    }
}
