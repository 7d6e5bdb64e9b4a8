
use std::{collections::HashMap, fmt, sync::Arc};

use rand::seq::IndexedRandom;

use crate::{
    options::ServerAddress,
    sdam::{ClusterConnectionMode, ClusterDescription, ServerDescription},
};

/// A set of tags that a server must carry, with matching values, to be eligible for an operation.
pub type TagSet = HashMap<String, String>;

/// A predicate used to filter servers that are considered suitable.
pub type Predicate = Arc<dyn Send + Sync + Fn(&ServerDescription) -> bool>;

/// Describes which servers are suitable for a given operation.
#[derive(Clone, derive_more::Display)]
#[non_exhaustive]
pub enum SelectionCriteria {
    /// A server that can accept writes: any healthy server when connected to a single server,
    /// otherwise a primary.
    #[display("Writable")]
    Writable,

    /// A primary. Routers and standalones count as primaries.
    #[display("Primary")]
    Primary,

    /// A secondary carrying every tag in the set.
    #[display("Secondary {{ Tags: {} }}", render_tag_set(_0))]
    Secondary(TagSet),

    /// Any healthy server, whatever its role.
    #[display("Any")]
    Any,

    /// A primary or a secondary carrying every tag in the set.
    #[display("PrimaryOrSecondary {{ Tags: {} }}", render_tag_set(_0))]
    PrimaryOrSecondary(TagSet),

    /// A server for which `predicate(server)` returns true.
    #[display("Custom predicate")]
    Predicate(Predicate),
}

impl fmt::Debug for SelectionCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl PartialEq for SelectionCriteria {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Writable, Self::Writable)
            | (Self::Primary, Self::Primary)
            | (Self::Any, Self::Any) => true,
            (Self::Secondary(t1), Self::Secondary(t2))
            | (Self::PrimaryOrSecondary(t1), Self::PrimaryOrSecondary(t2)) => t1 == t2,
            _ => false,
        }
    }
}

/// Renders a tag set with its keys sorted so that diagnostics are deterministic.
pub(crate) fn render_tag_set(tag_set: &TagSet) -> String {
    let mut pairs: Vec<_> = tag_set.iter().collect();
    pairs.sort();
    let rendered: Vec<String> = pairs
        .into_iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect();
    format!("{{{}}}", rendered.join(", "))
}

impl SelectionCriteria {
    pub(crate) fn from_address(address: ServerAddress) -> Self {
        SelectionCriteria::Predicate(Arc::new(move |server| server.address() == &address))
    }

    /// The servers in `description` that satisfy these criteria, in address order.
    pub(crate) fn suitable_servers<'a>(
        &self,
        description: &'a ClusterDescription,
    ) -> Vec<&'a ServerDescription> {
        match self {
            Self::Writable => match description.connection_mode() {
                ClusterConnectionMode::Single => description.any(),
                ClusterConnectionMode::Multiple => description.primaries(),
            },
            Self::Primary => description.primaries(),
            Self::Secondary(tag_set) => description.secondaries_with_tags(tag_set),
            Self::Any => description.any(),
            Self::PrimaryOrSecondary(tag_set) => {
                description.any_primary_or_secondary_with_tags(tag_set)
            }
            Self::Predicate(predicate) => description.filter(|server| predicate(server)),
        }
    }

    /// Picks one of the servers in `description` that satisfy these criteria, at random when more
    /// than one does.
    pub(crate) fn select<'a>(
        &self,
        description: &'a ClusterDescription,
    ) -> Option<&'a ServerDescription> {
        let suitable = self.suitable_servers(description);
        suitable.choose(&mut rand::rng()).copied()
    }
}
