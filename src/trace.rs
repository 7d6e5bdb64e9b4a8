use crate::{
    bson::{Bson, Document},
    client::options::{ServerAddress, DEFAULT_PORT},
    sdam::ClusterDescription,
    selection_criteria::SelectionCriteria,
};

pub(crate) mod command;
pub(crate) mod server_selection;
pub(crate) mod topology;

pub(crate) const COMMAND_TRACING_EVENT_TARGET: &str = "mongodb_driver_core::command";
pub(crate) const SERVER_SELECTION_TRACING_EVENT_TARGET: &str =
    "mongodb_driver_core::server_selection";
pub(crate) const TOPOLOGY_TRACING_EVENT_TARGET: &str = "mongodb_driver_core::topology";

pub(crate) const DEFAULT_MAX_DOCUMENT_LENGTH_BYTES: usize = 1000;

pub(crate) trait TracingRepresentation {
    type Representation;

    fn tracing_representation(&self) -> Self::Representation;
}

impl TracingRepresentation for Document {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        Bson::Document(self.clone())
            .into_relaxed_extjson()
            .to_string()
    }
}

impl TracingRepresentation for crate::error::Error {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        self.to_string()
    }
}

impl TracingRepresentation for SelectionCriteria {
    type Representation = String;

    fn tracing_representation(&self) -> Self::Representation {
        self.to_string()
    }
}

impl TracingRepresentation for ClusterDescription {
    type Representation = String;

    fn tracing_representation(&self) -> Self::Representation {
        self.to_string()
    }
}

impl ServerAddress {
    /// The port to log, with the default filled in when the address omits it.
    pub(crate) fn port_tracing_representation(&self) -> u16 {
        self.port().unwrap_or(DEFAULT_PORT)
    }
}

/// Serializes `document` to extended JSON, truncated to at most `max_length_bytes` bytes plus a
/// trailing ellipsis.
pub(crate) fn serialize_command_or_reply(document: &Document, max_length_bytes: usize) -> String {
    let mut serialized = document.tracing_representation();
    truncate_on_char_boundary(&mut serialized, max_length_bytes);
    serialized
}

pub(crate) fn truncate_on_char_boundary(s: &mut String, max_length_bytes: usize) {
    if s.len() <= max_length_bytes {
        return;
    }

    let mut boundary = max_length_bytes;
    while !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    s.truncate(boundary);
    s.push_str("...");
}
