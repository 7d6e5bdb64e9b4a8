use pretty_assertions::assert_eq;

use super::{
    max_batch_count,
    max_command_payload_size,
    select_protocol,
    split_into_batches,
};
use crate::{
    bson::{doc, Document},
    bson_util,
    cmap::{conn::command::Command, StreamDescription},
    options::ServerAddress,
    sdam::{ServerDescription, ServerType},
};

fn stream_description(max_wire_version: i32) -> StreamDescription {
    let server = ServerDescription::builder()
        .address(ServerAddress::parse("a:27017").unwrap())
        .server_type(ServerType::Standalone)
        .max_wire_version(max_wire_version)
        .build();
    StreamDescription::from_server_description(&server)
}

#[test]
fn protocol_follows_wire_version() {
    assert_eq!(select_protocol(&stream_description(0)).name(), "legacy");
    assert_eq!(select_protocol(&stream_description(1)).name(), "legacy");
    assert_eq!(select_protocol(&stream_description(2)).name(), "write command");
    assert_eq!(select_protocol(&stream_description(7)).name(), "write command");
}

#[test]
fn batches_split_by_count() {
    let sizes = vec![10; 7];
    assert_eq!(
        split_into_batches(&sizes, 3, usize::MAX),
        vec![0..3, 3..6, 6..7]
    );
    assert_eq!(split_into_batches(&sizes, 7, usize::MAX), vec![0..7]);
    assert_eq!(split_into_batches(&sizes, 0, usize::MAX).len(), 7);
}

#[test]
fn batches_split_by_size() {
    // Each entry takes 1 type byte, the key digits, a null byte and the document itself.
    let sizes = vec![10, 10, 10, 10];
    assert_eq!(split_into_batches(&sizes, 100, 26), vec![0..2, 2..4]);
    assert_eq!(split_into_batches(&sizes, 100, 25), vec![0..1, 1..2, 2..3, 3..4]);
}

#[test]
fn oversized_entry_gets_its_own_batch() {
    let sizes = vec![5, 100, 5];
    assert_eq!(split_into_batches(&sizes, 100, 50), vec![0..1, 1..2, 2..3]);
}

#[test]
fn no_entries_no_batches() {
    assert!(split_into_batches(&[], 10, 100).is_empty());
}

#[test]
fn op_query_batches_fit_in_one_command_document() {
    let body = doc! { "insert": "coll", "ordered": true };
    let body_size = bson_util::doc_size_bytes(&body).unwrap();
    let entries: Vec<Document> = (0..40)
        .map(|id| doc! { "_id": id, "padding": "x".repeat(500_000) })
        .collect();
    let sizes: Vec<usize> = entries
        .iter()
        .map(|entry| bson_util::doc_size_bytes(entry).unwrap())
        .collect();

    let description = stream_description(3);
    let max_command_size = usize::try_from(description.max_bson_object_size).unwrap() + 16 * 1024;
    let batches = split_into_batches(
        &sizes,
        max_batch_count(&description),
        max_command_payload_size(&description, body_size, "documents"),
    );
    assert!(batches.len() > 1, "{batches:?}");

    for batch in batches {
        let command = Command::new("insert", "db", body.clone())
            .with_documents("documents", entries[batch.clone()].to_vec());
        let size = bson_util::doc_size_bytes(&command.command_document()).unwrap();
        assert!(
            size <= max_command_size,
            "batch {batch:?} is {size} bytes, over {max_command_size}"
        );
    }
}

#[test]
fn op_msg_batches_are_bounded_by_message_size() {
    let sizes = vec![500_000; 40];
    let description = stream_description(7);
    assert_eq!(
        split_into_batches(
            &sizes,
            max_batch_count(&description),
            max_command_payload_size(&description, 100, "documents"),
        ),
        vec![0..40]
    );
}
