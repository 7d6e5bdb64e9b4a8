#[cfg(test)]
mod test;

use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
    time::Duration,
};

use serde::{de::Error as SerdeError, Deserialize, Deserializer, Serialize, Serializer};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    bson_util,
    concern::WriteConcern,
    error::{Error, Result},
};

/// The default port MongoDB servers listen on.
pub const DEFAULT_PORT: u16 = 27017;

/// A hostname:port address pair identifying a single server.
///
/// Two addresses are equal if their hostnames match case-insensitively and their ports match,
/// with a missing port treated as [`DEFAULT_PORT`].
#[derive(Clone, Debug, Eq)]
pub struct ServerAddress {
    /// The hostname of the address. Always stored in lowercase.
    host: String,

    /// The port of the address.
    ///
    /// The default is 27017.
    port: Option<u16>,
}

impl ServerAddress {
    /// Creates an address from a hostname and an optional port.
    pub fn new(host: impl AsRef<str>, port: Option<u16>) -> Self {
        Self {
            host: host.as_ref().to_lowercase(),
            port,
        }
    }

    /// Parses an address string of the form `host` or `host:port` into a `ServerAddress`.
    pub fn parse(address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref();
        let invalid = || Error::invalid_argument(format!("invalid server address: \"{address}\""));

        let mut parts = address.split(':');
        let host = match parts.next() {
            Some(part) if !part.is_empty() => part,
            _ => return Err(invalid()),
        };

        let port = match parts.next() {
            Some(part) => {
                let port = u16::from_str(part).map_err(|_| invalid())?;
                if port == 0 || parts.next().is_some() {
                    return Err(invalid());
                }
                Some(port)
            }
            None => None,
        };

        Ok(Self::new(host, port))
    }

    /// The hostname of this address.
    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    /// The port of this address, if one was given explicitly.
    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl PartialEq for ServerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port.unwrap_or(DEFAULT_PORT) == other.port.unwrap_or(DEFAULT_PORT)
    }
}

impl Hash for ServerAddress {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.host.hash(state);
        self.port.unwrap_or(DEFAULT_PORT).hash(state);
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}:{}", self.host, self.port.unwrap_or(DEFAULT_PORT))
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for ServerAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Self::parse(s.as_str()).map_err(|e| D::Error::custom(format!("{e}")))
    }
}

impl Serialize for ServerAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Contains the options that can be used to configure a [`Client`](crate::Client).
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, TypedBuilder)]
#[builder(field_defaults(default, setter(strip_option)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ClientOptions {
    /// How long the client should wait for a topology update that makes a server eligible when
    /// none is eligible in the current snapshot.
    ///
    /// The default is zero: when no server is eligible, the operation fails immediately with a
    /// server selection error.
    #[serde(rename = "serverSelectionTimeoutMS")]
    #[serde(serialize_with = "bson_util::serialize_duration_option_as_int_millis")]
    #[serde(deserialize_with = "bson_util::deserialize_duration_option_from_u64_millis")]
    #[serde(default)]
    pub server_selection_timeout: Option<Duration>,

    /// The write concern applied to operations that were built without one.
    ///
    /// The default is to let the server apply its own default.
    pub default_write_concern: Option<WriteConcern>,

    /// Caps the number of requests sent in a single write command, below the limit the selected
    /// server advertises. Mostly useful for exercising batch splitting.
    pub max_write_batch_size: Option<usize>,

    /// The maximum number of bytes of a command or reply document included in tracing events.
    ///
    /// The default is 1000.
    pub tracing_max_document_length_bytes: Option<usize>,
}
