mod fake_server;

pub(crate) use self::fake_server::{FakeCluster, FakeServer};
use crate::{
    options::ServerAddress,
    sdam::{ServerDescription, ServerType},
    selection_criteria::TagSet,
};

/// The description of a healthy server speaking the newest wire version the driver supports.
pub(crate) fn server(address: &str, server_type: ServerType) -> ServerDescription {
    tagged_server(address, server_type, &[])
}

pub(crate) fn tagged_server(
    address: &str,
    server_type: ServerType,
    tags: &[(&str, &str)],
) -> ServerDescription {
    ServerDescription::builder()
        .address(ServerAddress::parse(address).unwrap())
        .server_type(server_type)
        .tags(tag_set(tags))
        .max_wire_version(7)
        .build()
}

pub(crate) fn tag_set(tags: &[(&str, &str)]) -> TagSet {
    tags.iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
