
use std::{collections::BTreeMap, fmt};

use crate::{
    error::{Error, ErrorKind, Result},
    options::ServerAddress,
    sdam::description::server::ServerDescription,
    selection_criteria::TagSet,
};

/// How the driver was configured to connect to the deployment.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, derive_more::Display)]
#[non_exhaustive]
pub enum ClusterConnectionMode {
    /// Talk to exactly one configured server, whatever its role.
    Single,

    /// Discover the deployment and route each operation according to server roles.
    Multiple,
}

/// The overall shape of the deployment.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, derive_more::Display)]
#[non_exhaustive]
pub enum ClusterType {
    /// A single non-replicated server.
    Standalone,

    /// A replica set.
    ReplicaSet,

    /// One or more routers fronting a sharded cluster.
    Sharded,

    /// A deployment whose shape has not been determined yet.
    #[default]
    Unknown,
}

/// An immutable, point-in-time view of every server the driver knows about.
///
/// Servers are keyed by address, so a description never contains two servers with the same
/// address, and every query iterates them in address order. A change in the deployment is
/// represented by a new `ClusterDescription`, never by editing an existing one.
///
/// Two descriptions are equal when their connection modes are equal and they hold equal server
/// descriptions, compared field by field rather than by address alone. A server that changes
/// type, tags or wire versions therefore makes the descriptions unequal. The cluster type does not
/// take part in equality, although it is part of the rendered form.
#[derive(Debug, Clone)]
pub struct ClusterDescription {
    connection_mode: ClusterConnectionMode,
    cluster_type: ClusterType,
    servers: BTreeMap<String, ServerDescription>,
}

impl ClusterDescription {
    /// Creates a description of the given servers. If `servers` contains more than one
    /// description for the same address, the first one is kept.
    pub fn new(
        connection_mode: ClusterConnectionMode,
        cluster_type: ClusterType,
        servers: impl IntoIterator<Item = ServerDescription>,
    ) -> Self {
        let mut by_address = BTreeMap::new();
        for server in servers {
            by_address
                .entry(server.address().to_string())
                .or_insert(server);
        }

        Self {
            connection_mode,
            cluster_type,
            servers: by_address,
        }
    }

    /// How the driver connects to this deployment.
    pub fn connection_mode(&self) -> ClusterConnectionMode {
        self.connection_mode
    }

    /// The shape of this deployment.
    pub fn cluster_type(&self) -> ClusterType {
        self.cluster_type
    }

    /// Every server in this description, in address order.
    pub fn all(&self) -> impl Iterator<Item = &ServerDescription> {
        self.servers.values()
    }

    /// Whether every server's wire version range overlaps the driver's. An empty description is
    /// compatible.
    pub fn is_compatible_with_driver(&self) -> bool {
        self.all().all(ServerDescription::is_compatible_with_driver)
    }

    /// Returns an `IncompatibleServer` error naming the first incompatible server, if any.
    pub fn compatibility_error(&self) -> Option<Error> {
        self.all()
            .find_map(ServerDescription::compatibility_error_message)
            .map(|message| ErrorKind::IncompatibleServer { message }.into())
    }

    pub(crate) fn check_compatibility(&self) -> Result<()> {
        match self.compatibility_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The server with the given address, if this description contains one.
    pub fn get_by_address(&self, address: &ServerAddress) -> Option<&ServerDescription> {
        self.servers.get(&address.to_string())
    }

    /// The servers able to accept writes. There may be several of them when the deployment is
    /// fronted by more than one router.
    pub fn primaries(&self) -> Vec<&ServerDescription> {
        self.filter(ServerDescription::is_primary)
    }

    /// The servers able to serve secondary reads.
    pub fn secondaries(&self) -> Vec<&ServerDescription> {
        self.filter(ServerDescription::is_secondary)
    }

    /// The secondaries carrying every tag in `tag_set`.
    pub fn secondaries_with_tags(&self, tag_set: &TagSet) -> Vec<&ServerDescription> {
        self.filter(|server| server.is_secondary() && server.has_tags(tag_set))
    }

    /// Every healthy server, whatever its role.
    pub fn any(&self) -> Vec<&ServerDescription> {
        self.filter(ServerDescription::is_ok)
    }

    /// Every server that is a primary or a secondary. Arbiters and members in other states are
    /// excluded.
    pub fn any_primary_or_secondary(&self) -> Vec<&ServerDescription> {
        self.filter(|server| server.is_primary() || server.is_secondary())
    }

    /// Every primary or secondary carrying every tag in `tag_set`.
    pub fn any_primary_or_secondary_with_tags(&self, tag_set: &TagSet) -> Vec<&ServerDescription> {
        self.filter(|server| {
            (server.is_primary() || server.is_secondary()) && server.has_tags(tag_set)
        })
    }

    pub(crate) fn filter(
        &self,
        predicate: impl Fn(&ServerDescription) -> bool,
    ) -> Vec<&ServerDescription> {
        self.all().filter(|server| predicate(server)).collect()
    }

    /// A compact rendering used in log messages and selection errors.
    pub fn short_description(&self) -> String {
        let servers: Vec<String> = self
            .all()
            .map(ServerDescription::short_description)
            .collect();
        format!(
            "{{type={}, servers=[{}]}}",
            self.cluster_type,
            servers.join(", ")
        )
    }
}

impl PartialEq for ClusterDescription {
    fn eq(&self, other: &Self) -> bool {
        self.connection_mode == other.connection_mode && self.servers == other.servers
    }
}

impl fmt::Display for ClusterDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ Type: {}, Connection Mode: {}, Servers: [ ",
            self.cluster_type, self.connection_mode
        )?;
        let mut iter = self.all().peekable();
        while let Some(server) = iter.next() {
            write!(f, "{server}")?;
            if iter.peek().is_some() {
                write!(f, ", ")?;
            }
        }
        write!(f, " ] }}")
    }
}
