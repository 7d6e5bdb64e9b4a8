use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Bson, Document},
    error::ErrorKind,
    Acknowledgment,
    WriteConcern,
};

#[test]
fn write_concern_is_acknowledged() {
    let w_1 = WriteConcern::builder()
        .w(Acknowledgment::Nodes(1))
        .journal(false)
        .build();
    assert!(w_1.is_acknowledged());

    let w_majority = WriteConcern::builder()
        .w(Acknowledgment::Majority)
        .journal(false)
        .build();
    assert!(w_majority.is_acknowledged());

    let w_0 = WriteConcern::builder()
        .w(Acknowledgment::Nodes(0))
        .journal(false)
        .build();
    assert!(!w_0.is_acknowledged());

    let w_0 = WriteConcern::builder().w(Acknowledgment::Nodes(0)).build();
    assert!(!w_0.is_acknowledged());

    let empty = WriteConcern::builder().build();
    assert!(empty.is_acknowledged());

    let empty = WriteConcern::builder().journal(true).build();
    assert!(empty.is_acknowledged());

    assert!(!WriteConcern::unacknowledged().is_acknowledged());
}

#[test]
fn write_concern_validation() {
    let invalid = WriteConcern::builder()
        .w(Acknowledgment::Nodes(0))
        .journal(true)
        .build();
    let error = invalid.validate().unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::InvalidArgument { .. }));

    assert!(WriteConcern::majority().validate().is_ok());
    assert!(WriteConcern::default().validate().is_ok());
}

#[test]
fn write_concern_serialization() {
    let write_concern = WriteConcern::builder()
        .w(Acknowledgment::Custom("dc-east".to_string()))
        .w_timeout(Duration::from_millis(250))
        .journal(true)
        .build();
    let document = crate::bson::to_document(&write_concern).unwrap();
    assert_eq!(document, doc! { "w": "dc-east", "wtimeout": 250, "j": true });

    let round_tripped: WriteConcern = crate::bson::from_document(document).unwrap();
    assert_eq!(round_tripped, write_concern);

    let empty = crate::bson::to_document(&WriteConcern::default()).unwrap();
    assert_eq!(empty, Document::new());
}

#[test]
fn acknowledgment_from_bson() {
    let from_int: WriteConcern = crate::bson::from_document(doc! { "w": 2 }).unwrap();
    assert_eq!(from_int.w, Some(Acknowledgment::Nodes(2)));

    let from_majority: WriteConcern =
        crate::bson::from_document(doc! { "w": "majority", "wtimeoutMS": 10_i64 }).unwrap();
    assert_eq!(from_majority.w, Some(Acknowledgment::Majority));
    assert_eq!(from_majority.w_timeout, Some(Duration::from_millis(10)));
}

#[test]
fn get_last_error_command() {
    assert_eq!(
        WriteConcern::default().get_last_error_command(),
        doc! { "getlasterror": 1 }
    );

    let write_concern = WriteConcern::builder()
        .w(Acknowledgment::Nodes(3))
        .w_timeout(Duration::from_secs(1))
        .journal(false)
        .build();
    let command = write_concern.get_last_error_command();
    assert_eq!(command.get("w"), Some(&Bson::Int64(3)));
    assert_eq!(command.get("wtimeout"), Some(&Bson::Int64(1000)));
    assert_eq!(command.get("j"), Some(&Bson::Boolean(false)));
}
