use std::{fmt, str::FromStr};

use serde::{de::Error as SerdeError, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A struct modeling the canonical name for a collection in MongoDB: the database it lives in and
/// the collection's own name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// The name of the database associated with this namespace.
    pub db: String,

    /// The name of the collection this namespace corresponds to.
    pub coll: String,
}

impl Namespace {
    /// Construct a `Namespace` with the given database and collection.
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }

    /// The `<db>.$cmd` pseudo-collection that OP_QUERY commands are addressed to.
    pub(crate) fn command_collection(&self) -> String {
        format!("{}.$cmd", self.db)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.db.is_empty() || self.coll.is_empty() {
            return Err(Error::invalid_argument(format!(
                "namespace \"{self}\" must name both a database and a collection"
            )));
        }
        if self.db.contains(['.', ' ', '/', '\\', '"', '$', '\0']) {
            return Err(Error::invalid_argument(format!(
                "database name \"{}\" contains an illegal character",
                self.db
            )));
        }
        Ok(())
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self::new(db, coll)),
            _ => Err(Error::invalid_argument(format!(
                "\"{s}\" is not a valid namespace; expected \"<db>.<collection>\""
            ))),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.db, self.coll)
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Self::from_str(&s).map_err(|e| D::Error::custom(format!("{e}")))
    }
}

impl Serialize for Namespace {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_namespace() {
        let ns: Namespace = "shop.orders.archive".parse().unwrap();
        assert_eq!(ns, Namespace::new("shop", "orders.archive"));
        assert_eq!(ns.to_string(), "shop.orders.archive");
        assert_eq!(ns.command_collection(), "shop.$cmd");

        assert!("shop".parse::<Namespace>().is_err());
        assert!(".orders".parse::<Namespace>().is_err());
        assert!("shop.".parse::<Namespace>().is_err());
    }

    #[test]
    fn validate_namespace() {
        assert!(Namespace::new("shop", "orders").validate().is_ok());
        assert!(Namespace::new("", "orders").validate().is_err());
        assert!(Namespace::new("shop", "").validate().is_err());
        assert!(Namespace::new("sh op", "orders").validate().is_err());
    }
}
