use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::doc,
    options::ServerAddress,
    sdam::{ServerDescription, ServerType},
    selection_criteria::TagSet,
};

fn address() -> ServerAddress {
    ServerAddress::parse("a:27017").unwrap()
}

fn described(server_type: ServerType) -> ServerDescription {
    ServerDescription::builder()
        .address(address())
        .server_type(server_type)
        .max_wire_version(7)
        .build()
}

fn tags(pairs: &[(&str, &str)]) -> TagSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn role_predicates() {
    let cases = [
        (ServerType::RsPrimary, true, false),
        (ServerType::RsSecondary, false, true),
        (ServerType::Mongos, true, true),
        (ServerType::Standalone, true, true),
        (ServerType::RsArbiter, false, false),
        (ServerType::RsOther, false, false),
        (ServerType::RsGhost, false, false),
        (ServerType::Unknown, false, false),
    ];

    for (server_type, primary, secondary) in cases {
        let server = described(server_type);
        assert_eq!(server.is_primary(), primary, "{server_type:?}");
        assert_eq!(server.is_secondary(), secondary, "{server_type:?}");
        assert_eq!(server.is_ok(), server_type != ServerType::Unknown);
    }
}

#[test]
fn errored_server_is_not_ok() {
    let server = ServerDescription::with_error(address(), "connection refused");
    assert!(!server.is_ok());
    assert!(!server.is_primary());
    assert_eq!(server.error(), Some("connection refused"));
    assert_eq!(server.server_type(), ServerType::Unknown);
}

#[test]
fn tag_matching() {
    let server = ServerDescription::builder()
        .address(address())
        .server_type(ServerType::RsSecondary)
        .tags(tags(&[("dc", "ny"), ("rack", "1")]))
        .build();

    assert!(server.has_tags(&TagSet::new()));
    assert!(server.has_tags(&tags(&[("dc", "ny")])));
    assert!(server.has_tags(&tags(&[("dc", "ny"), ("rack", "1")])));
    assert!(!server.has_tags(&tags(&[("dc", "sf")])));
    assert!(!server.has_tags(&tags(&[("dc", "ny"), ("disk", "ssd")])));
}

#[test]
fn driver_compatibility() {
    let compatible = described(ServerType::RsPrimary);
    assert!(compatible.is_compatible_with_driver());
    assert_eq!(compatible.compatibility_error_message(), None);

    let too_new = ServerDescription::builder()
        .address(address())
        .server_type(ServerType::RsPrimary)
        .min_wire_version(8)
        .max_wire_version(21)
        .build();
    assert!(!too_new.is_compatible_with_driver());
    let message = too_new.compatibility_error_message().unwrap();
    assert!(message.contains("a:27017"), "{message}");
    assert!(message.contains("wire version 8"), "{message}");

    let too_old = ServerDescription::builder()
        .address(address())
        .server_type(ServerType::Standalone)
        .min_wire_version(-2)
        .max_wire_version(-1)
        .build();
    assert!(!too_old.is_compatible_with_driver());

    // Nothing is known about the wire versions of an unchecked server.
    let unknown = ServerDescription::builder()
        .address(address())
        .min_wire_version(30)
        .max_wire_version(30)
        .build();
    assert!(unknown.is_compatible_with_driver());
}

#[test]
fn protocol_support() {
    let legacy = ServerDescription::builder()
        .address(address())
        .server_type(ServerType::Standalone)
        .max_wire_version(1)
        .build();
    assert!(!legacy.supports_write_commands());
    assert!(!legacy.supports_op_msg());

    let commands = ServerDescription::builder()
        .address(address())
        .server_type(ServerType::Standalone)
        .max_wire_version(2)
        .build();
    assert!(commands.supports_write_commands());
    assert!(!commands.supports_op_msg());

    let op_msg = described(ServerType::RsPrimary);
    assert!(op_msg.supports_write_commands());
    assert!(op_msg.supports_op_msg());
}

#[test]
fn from_hello_reply() {
    let primary = ServerDescription::from_hello_reply(
        address(),
        doc! {
            "ok": 1.0,
            "ismaster": true,
            "setName": "rs0",
            "tags": { "dc": "ny" },
            "minWireVersion": 0,
            "maxWireVersion": 7,
            "maxBsonObjectSize": 1024,
            "maxWriteBatchSize": 10,
        },
        Some(Duration::from_millis(3)),
    )
    .unwrap();
    assert_eq!(primary.server_type(), ServerType::RsPrimary);
    assert_eq!(primary.tags(), &tags(&[("dc", "ny")]));
    assert_eq!(primary.max_wire_version(), 7);
    assert_eq!(primary.max_bson_object_size, 1024);
    assert_eq!(primary.max_write_batch_size, 10);
    assert_eq!(primary.max_message_size_bytes, 48_000_000);
    assert_eq!(primary.round_trip_time(), Some(Duration::from_millis(3)));

    let cases = [
        (doc! { "ok": 1, "msg": "isdbgrid" }, ServerType::Mongos),
        (doc! { "ok": 1, "isWritablePrimary": true }, ServerType::Standalone),
        (doc! { "ok": 1, "setName": "rs0", "secondary": true }, ServerType::RsSecondary),
        (doc! { "ok": 1, "setName": "rs0", "arbiterOnly": true }, ServerType::RsArbiter),
        (doc! { "ok": 1, "setName": "rs0", "ismaster": true, "hidden": true }, ServerType::RsOther),
        (doc! { "ok": 1, "isreplicaset": true }, ServerType::RsGhost),
    ];
    for (reply, expected) in cases {
        let server = ServerDescription::from_hello_reply(address(), reply, None).unwrap();
        assert_eq!(server.server_type(), expected);
    }

    let failed = ServerDescription::from_hello_reply(
        address(),
        doc! { "ok": 0, "errmsg": "node is recovering" },
        None,
    )
    .unwrap();
    assert_eq!(failed.server_type(), ServerType::Unknown);
    assert_eq!(failed.error(), Some("node is recovering"));
}

#[test]
fn rendering() {
    let server = ServerDescription::builder()
        .address(address())
        .server_type(ServerType::RsSecondary)
        .tags(tags(&[("rack", "1"), ("dc", "ny")]))
        .round_trip_time(Duration::from_millis(2))
        .build();

    assert_eq!(
        server.short_description(),
        "{address=a:27017, type=RsSecondary, tags={dc: ny, rack: 1}, roundTripTime=2.0 ms}"
    );
    assert_eq!(
        server.to_string(),
        "{ Address: a:27017, Type: RsSecondary, Tags: {dc: ny, rack: 1}, Wire Versions: [0, 0], \
         Average RTT: 2ms }"
    );
}
