//! Row model - the flat shape every entity takes inside the table store.
//!
//! A row is addressed by its `(PartitionKey, RowKey)` pair, carries a
//! server-assigned `Timestamp` and `ETag`, and holds a flat map of typed
//! properties. Entities never reach the store directly; they are written to
//! and read from `RowProperties` through [`crate::TableEntity`].

mod mapping;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use mapping::{
    read_field, read_json_field, write_field, write_json_field, FromRowProperty, IntoRowProperty,
};

/// System property holding the partition key.
pub const PARTITION_KEY: &str = "PartitionKey";
/// System property holding the row key.
pub const ROW_KEY: &str = "RowKey";
/// System property holding the server-assigned last-modified time.
pub const TIMESTAMP: &str = "Timestamp";
/// System property holding the version tag.
pub const ETAG: &str = "ETag";

/// Property names owned by the store; entities may not use them.
pub const RESERVED_PROPERTIES: [&str; 4] = [PARTITION_KEY, ROW_KEY, TIMESTAMP, ETAG];

pub fn is_reserved_property(name: &str) -> bool {
    RESERVED_PROPERTIES.contains(&name)
}

/// A typed property value as stored in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowProperty {
    String(String),
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    Binary(Vec<u8>),
}

impl RowProperty {
    /// The store's type name for this value (`Edm.String`, `Edm.Int32`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            RowProperty::String(_) => "Edm.String",
            RowProperty::Boolean(_) => "Edm.Boolean",
            RowProperty::Int32(_) => "Edm.Int32",
            RowProperty::Int64(_) => "Edm.Int64",
            RowProperty::Double(_) => "Edm.Double",
            RowProperty::DateTime(_) => "Edm.DateTime",
            RowProperty::Guid(_) => "Edm.Guid",
            RowProperty::Binary(_) => "Edm.Binary",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RowProperty::String(value) => Some(value),
            _ => None,
        }
    }

    /// Orders two values of compatible types. Integers of either width compare
    /// with each other and with doubles; anything else must match exactly.
    pub fn partial_cmp_value(&self, other: &RowProperty) -> Option<Ordering> {
        use RowProperty::*;
        match (self, other) {
            (String(a), String(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (Guid(a), Guid(b)) => Some(a.cmp(b)),
            (Binary(a), Binary(b)) => Some(a.cmp(b)),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (Double(a), b) => b.as_i64().and_then(|b| a.partial_cmp(&(b as f64))),
            (a, Double(b)) => a.as_i64().and_then(|a| (a as f64).partial_cmp(b)),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            RowProperty::Int32(value) => Some(i64::from(*value)),
            RowProperty::Int64(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for RowProperty {
    fn from(value: &str) -> Self {
        RowProperty::String(value.to_string())
    }
}

impl From<String> for RowProperty {
    fn from(value: String) -> Self {
        RowProperty::String(value)
    }
}

impl From<bool> for RowProperty {
    fn from(value: bool) -> Self {
        RowProperty::Boolean(value)
    }
}

impl From<i32> for RowProperty {
    fn from(value: i32) -> Self {
        RowProperty::Int32(value)
    }
}

impl From<i64> for RowProperty {
    fn from(value: i64) -> Self {
        RowProperty::Int64(value)
    }
}

impl From<f64> for RowProperty {
    fn from(value: f64) -> Self {
        RowProperty::Double(value)
    }
}

impl From<DateTime<Utc>> for RowProperty {
    fn from(value: DateTime<Utc>) -> Self {
        RowProperty::DateTime(value)
    }
}

impl From<Uuid> for RowProperty {
    fn from(value: Uuid) -> Self {
        RowProperty::Guid(value)
    }
}

impl From<Vec<u8>> for RowProperty {
    fn from(value: Vec<u8>) -> Self {
        RowProperty::Binary(value)
    }
}

/// Flat property map of a row, excluding system properties.
pub type RowProperties = BTreeMap<String, RowProperty>;

/// Opaque version tag of a stored row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    const WILDCARD: &'static str = "*";

    pub fn new(value: impl Into<String>) -> Self {
        ETag(value.into())
    }

    /// The tag that matches any stored version (last write wins).
    pub fn wildcard() -> Self {
        ETag(Self::WILDCARD.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when a store holding `current` accepts a write conditioned on `self`.
    pub fn matches(&self, current: &ETag) -> bool {
        self.is_wildcard() || self == current
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ETag {
    fn from(value: &str) -> Self {
        ETag::new(value)
    }
}

impl From<String> for ETag {
    fn from(value: String) -> Self {
        ETag(value)
    }
}

/// The unique address of a row within a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKeyPair {
    pub partition_key: String,
    pub row_key: String,
}

impl RowKeyPair {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

impl fmt::Display for RowKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.row_key)
    }
}

/// A row as exchanged with the table store.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub etag: Option<ETag>,
    pub properties: RowProperties,
}

impl TableRow {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp: None,
            etag: None,
            properties: RowProperties::new(),
        }
    }

    pub fn with_properties(mut self, properties: RowProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_etag(mut self, etag: ETag) -> Self {
        self.etag = Some(etag);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<RowProperty>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn keys(&self) -> RowKeyPair {
        RowKeyPair::new(self.partition_key.clone(), self.row_key.clone())
    }

    /// Looks up a property by name, system properties included.
    pub fn property(&self, name: &str) -> Option<RowProperty> {
        match name {
            PARTITION_KEY => Some(RowProperty::String(self.partition_key.clone())),
            ROW_KEY => Some(RowProperty::String(self.row_key.clone())),
            TIMESTAMP => self.timestamp.map(RowProperty::DateTime),
            _ => self.properties.get(name).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_any_tag() {
        let current = ETag::new("W/\"7\"");
        assert!(ETag::wildcard().matches(&current));
        assert!(current.matches(&current));
        assert!(!ETag::new("W/\"6\"").matches(&current));
    }

    #[test]
    fn integers_compare_across_widths() {
        let a = RowProperty::Int32(5);
        let b = RowProperty::Int64(7);
        assert_eq!(a.partial_cmp_value(&b), Some(Ordering::Less));
        assert_eq!(
            RowProperty::Double(5.0).partial_cmp_value(&a),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn mismatched_types_do_not_compare() {
        let a = RowProperty::String("5".into());
        let b = RowProperty::Int32(5);
        assert_eq!(a.partial_cmp_value(&b), None);
    }

    #[test]
    fn system_properties_are_addressable() {
        let row = TableRow::new("pk", "rk").with_property("Name", "Ada");
        assert_eq!(row.property("PartitionKey"), Some("pk".into()));
        assert_eq!(row.property("RowKey"), Some("rk".into()));
        assert_eq!(row.property("Name"), Some("Ada".into()));
        assert_eq!(row.property("Timestamp"), None);
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved_property("ETag"));
        assert!(!is_reserved_property("Name"));
    }
}
