use std::{collections::HashSet, time::Duration};

use pretty_assertions::assert_eq;

use crate::{
    bson::doc,
    options::{ClientOptions, ServerAddress, DEFAULT_PORT},
    Acknowledgment,
    WriteConcern,
};

#[test]
fn parse_server_address() {
    let address = ServerAddress::parse("Example.COM:27018").unwrap();
    assert_eq!(address.host(), "example.com");
    assert_eq!(address.port(), Some(27018));
    assert_eq!(address.to_string(), "example.com:27018");

    let defaulted = ServerAddress::parse("localhost").unwrap();
    assert_eq!(defaulted.port(), None);
    assert_eq!(defaulted.to_string(), format!("localhost:{DEFAULT_PORT}"));

    for invalid in ["", ":27017", "localhost:", "localhost:abc", "localhost:0", "a:1:2"] {
        assert!(
            ServerAddress::parse(invalid).is_err(),
            "expected \"{invalid}\" to be rejected"
        );
    }
}

#[test]
fn default_port_equality() {
    let explicit = ServerAddress::new("localhost", Some(DEFAULT_PORT));
    let implicit = ServerAddress::new("LOCALHOST", None);
    assert_eq!(explicit, implicit);

    let set: HashSet<_> = [explicit, implicit].into_iter().collect();
    assert_eq!(set.len(), 1);

    assert_ne!(
        ServerAddress::new("localhost", Some(27018)),
        ServerAddress::new("localhost", None)
    );
}

#[test]
fn client_options_from_document() {
    let options: ClientOptions = crate::bson::from_document(doc! {
        "serverSelectionTimeoutMS": 2500_i64,
        "tracingMaxDocumentLengthBytes": 200_i64,
        "defaultWriteConcern": { "w": "majority", "wtimeout": 100 },
        "maxWriteBatchSize": 2_i64,
    })
    .unwrap();

    assert_eq!(
        options,
        ClientOptions::builder()
            .server_selection_timeout(Duration::from_millis(2500))
            .tracing_max_document_length_bytes(200)
            .default_write_concern(
                WriteConcern::builder()
                    .w(Acknowledgment::Majority)
                    .w_timeout(Duration::from_millis(100))
                    .build()
            )
            .max_write_batch_size(2)
            .build()
    );

    let empty: ClientOptions = crate::bson::from_document(doc! {}).unwrap();
    assert_eq!(empty, ClientOptions::default());
}

#[test]
fn client_options_from_json() {
    let options: ClientOptions = serde_json::from_str(
        r#"{
            "serverSelectionTimeoutMS": 0,
            "defaultWriteConcern": { "w": 1, "j": true }
        }"#,
    )
    .unwrap();

    assert_eq!(options.server_selection_timeout, Some(Duration::ZERO));
    assert_eq!(
        options.default_write_concern,
        Some(
            WriteConcern::builder()
                .w(Acknowledgment::Nodes(1))
                .journal(true)
                .build()
        )
    );
    assert_eq!(options.max_write_batch_size, None);
}
