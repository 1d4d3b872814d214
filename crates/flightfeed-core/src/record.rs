//! Records and their ordering identifiers.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Field name under which a record's identifier is carried.
pub const ID_FIELD: &str = "id";

/// Per-record ordering key, unique within a day and increasing in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(i64);

impl Identifier {
    /// Create an identifier from its numeric value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Numeric value of the identifier.
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Parse a client-supplied token.
    ///
    /// Surrounding whitespace is ignored; anything that is not a base-10
    /// integer is rejected.
    pub fn parse(token: &str) -> Result<Self> {
        token
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| Error::InvalidIdentifier(token.to_string()))
    }

    /// Extract an identifier from a JSON value (integer or numeric string).
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Self)
                .ok_or_else(|| Error::InvalidIdentifier(n.to_string())),
            Value::String(s) => Self::parse(s),
            other => Err(Error::InvalidIdentifier(other.to_string())),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row produced by the record source.
///
/// Apart from the identifier, fields are opaque and passed through untouched.
/// The serialized form is the flat field object, identifier included.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: Identifier,
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record holding only its identifier.
    pub fn new(id: impl Into<Identifier>) -> Self {
        let id = id.into();
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::from(id.value()));
        Self { id, fields }
    }

    /// Add a payload field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if name != ID_FIELD {
            self.fields.insert(name, value.into());
        }
        self
    }

    /// Build a record from a full field map, taking the identifier from `id_key`.
    pub fn from_fields(fields: Map<String, Value>, id_key: &str) -> Result<Self> {
        let raw = fields
            .get(id_key)
            .ok_or_else(|| Error::InvalidIdentifier(format!("missing `{id_key}` field")))?;
        let id = Identifier::from_value(raw)?;
        Ok(Self { id, fields })
    }

    /// The record identifier.
    pub fn id(&self) -> Identifier {
        self.id
    }

    /// All fields, identifier included.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up a single field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl AsRef<Record> for Record {
    fn as_ref(&self) -> &Record {
        self
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fields = Map::deserialize(deserializer)?;
        Record::from_fields(fields, ID_FIELD).map_err(D::Error::custom)
    }
}
