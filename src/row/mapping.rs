//! Field-level conversions between entity fields and row properties.
//!
//! `#[derive(TableEntity)]` expands every mapped field into one `write_field`
//! and one `read_field` call; hand-written impls use the same helpers.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use super::{RowProperties, RowProperty};
use crate::error::{RepositoryError, RepositoryResult};

/// Converts a field value into a row property. `None` omits the property,
/// since the store keeps no nulls.
pub trait IntoRowProperty {
    fn to_row_property(&self) -> Option<RowProperty>;
}

/// Converts a row property back into a field value.
pub trait FromRowProperty: Sized {
    fn from_row_property(property: &RowProperty) -> Result<Self, String>;

    /// Value to use when the property is absent from the row; `None` makes
    /// the property required.
    fn from_missing() -> Option<Self> {
        None
    }
}

fn type_mismatch(expected: &str, found: &RowProperty) -> String {
    format!("expected {}, found {}", expected, found.type_name())
}

macro_rules! property_conversion {
    ($ty:ty, $variant:ident, $edm:literal) => {
        impl IntoRowProperty for $ty {
            fn to_row_property(&self) -> Option<RowProperty> {
                Some(RowProperty::$variant(self.clone()))
            }
        }

        impl FromRowProperty for $ty {
            fn from_row_property(property: &RowProperty) -> Result<Self, String> {
                match property {
                    RowProperty::$variant(value) => Ok(value.clone()),
                    other => Err(type_mismatch($edm, other)),
                }
            }
        }
    };
}

property_conversion!(String, String, "Edm.String");
property_conversion!(bool, Boolean, "Edm.Boolean");
property_conversion!(i32, Int32, "Edm.Int32");
property_conversion!(f64, Double, "Edm.Double");
property_conversion!(DateTime<Utc>, DateTime, "Edm.DateTime");
property_conversion!(Uuid, Guid, "Edm.Guid");
property_conversion!(Vec<u8>, Binary, "Edm.Binary");

impl IntoRowProperty for i64 {
    fn to_row_property(&self) -> Option<RowProperty> {
        Some(RowProperty::Int64(*self))
    }
}

impl FromRowProperty for i64 {
    fn from_row_property(property: &RowProperty) -> Result<Self, String> {
        match property {
            RowProperty::Int64(value) => Ok(*value),
            // rows written by older schemas may hold the narrower type
            RowProperty::Int32(value) => Ok(i64::from(*value)),
            other => Err(type_mismatch("Edm.Int64", other)),
        }
    }
}

impl<T: IntoRowProperty> IntoRowProperty for Option<T> {
    fn to_row_property(&self) -> Option<RowProperty> {
        self.as_ref().and_then(IntoRowProperty::to_row_property)
    }
}

impl<T: FromRowProperty> FromRowProperty for Option<T> {
    fn from_row_property(property: &RowProperty) -> Result<Self, String> {
        T::from_row_property(property).map(Some)
    }

    fn from_missing() -> Option<Self> {
        Some(None)
    }
}

/// Reads one field from a property map.
pub fn read_field<T: FromRowProperty>(properties: &RowProperties, name: &str) -> RepositoryResult<T> {
    match properties.get(name) {
        Some(property) => {
            T::from_row_property(property).map_err(|message| RepositoryError::mapping(name, message))
        }
        None => T::from_missing()
            .ok_or_else(|| RepositoryError::mapping(name, "missing required property")),
    }
}

/// Writes one field into a property map, skipping absent values.
pub fn write_field<T: IntoRowProperty>(properties: &mut RowProperties, name: &str, value: &T) {
    if let Some(property) = value.to_row_property() {
        properties.insert(name.to_string(), property);
    }
}

/// Writes a structured field as a JSON string property.
pub fn write_json_field<T: Serialize>(
    properties: &mut RowProperties,
    name: &str,
    value: &T,
) -> RepositoryResult<()> {
    let json =
        serde_json::to_value(value).map_err(|e| RepositoryError::mapping(name, e.to_string()))?;
    if json.is_null() {
        return Ok(());
    }
    properties.insert(name.to_string(), RowProperty::String(json.to_string()));
    Ok(())
}

/// Reads a structured field from a JSON string property.
pub fn read_json_field<T: DeserializeOwned>(
    properties: &RowProperties,
    name: &str,
) -> RepositoryResult<T> {
    match properties.get(name) {
        Some(RowProperty::String(json)) => {
            serde_json::from_str(json).map_err(|e| RepositoryError::mapping(name, e.to_string()))
        }
        Some(other) => Err(RepositoryError::mapping(
            name,
            type_mismatch("Edm.String", other),
        )),
        None => serde_json::from_value(serde_json::Value::Null)
            .map_err(|_| RepositoryError::mapping(name, "missing required property")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn required_field_missing_is_an_error() {
        let properties = RowProperties::new();
        let err = read_field::<String>(&properties, "Name").unwrap_err();
        assert!(matches!(err, RepositoryError::Mapping { ref property, .. } if property == "Name"));
    }

    #[test]
    fn optional_field_missing_is_none() {
        let properties = RowProperties::new();
        let value: Option<String> = read_field(&properties, "Nickname").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn type_mismatch_is_not_swallowed() {
        let mut properties = RowProperties::new();
        properties.insert("Age".into(), RowProperty::String("forty".into()));
        let err = read_field::<i32>(&properties, "Age").unwrap_err();
        assert_eq!(
            err,
            RepositoryError::Mapping {
                property: "Age".into(),
                message: "expected Edm.Int32, found Edm.String".into(),
            }
        );
    }

    #[test]
    fn int64_accepts_int32() {
        let mut properties = RowProperties::new();
        properties.insert("Count".into(), RowProperty::Int32(12));
        assert_eq!(read_field::<i64>(&properties, "Count").unwrap(), 12);
    }

    #[test]
    fn none_is_not_written() {
        let mut properties = RowProperties::new();
        write_field(&mut properties, "Nickname", &Option::<String>::None);
        assert!(properties.is_empty());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Address {
        city: String,
        zip: String,
    }

    #[test]
    fn json_fields_are_stored_as_strings() {
        let mut properties = RowProperties::new();
        let address = Address {
            city: "Lagos".into(),
            zip: "100001".into(),
        };
        write_json_field(&mut properties, "Address", &address).unwrap();
        assert!(matches!(properties.get("Address"), Some(RowProperty::String(_))));

        let back: Address = read_json_field(&properties, "Address").unwrap();
        assert_eq!(back, address);

        let missing: Option<Address> = read_json_field(&properties, "Other").unwrap();
        assert!(missing.is_none());
    }
}
