//! Schema definition for the in-memory shard.
//!
//! A [`Schema`] declares, for every field, the [`ColumnType`] of its values. The column type
//! decides both how a value is indexed (its term bytes) and how the field can be aggregated.

use std::fmt;
use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

/// The type of the values of a field.
#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Signed 64 bits integer.
    I64,
    /// Unsigned 64 bits integer.
    U64,
    /// 64 bits float.
    F64,
    /// Raw bytes, indexed as is. No term dictionary is kept for the column.
    Bytes,
    /// Strings, dictionary encoded: every distinct value gets a term ordinal.
    Str,
    /// Booleans.
    Bool,
    /// IP addresses.
    IpAddr,
    /// Timestamps, in microseconds.
    DateTime,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short_str = match self {
            ColumnType::I64 => "i64",
            ColumnType::U64 => "u64",
            ColumnType::F64 => "f64",
            ColumnType::Bytes => "bytes",
            ColumnType::Str => "str",
            ColumnType::Bool => "bool",
            ColumnType::IpAddr => "ip",
            ColumnType::DateTime => "datetime",
        };
        write!(f, "{short_str}")
    }
}

impl ColumnType {
    /// Returns true if values are handled in the numerical `u64` space.
    pub fn is_numerical(self) -> bool {
        matches!(
            self,
            ColumnType::I64
                | ColumnType::U64
                | ColumnType::F64
                | ColumnType::Bool
                | ColumnType::DateTime
        )
    }
}

/// A single value of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// A string, indexed as its utf-8 bytes.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Unsigned 64 bits integer.
    U64(u64),
    /// Signed 64 bits integer.
    I64(i64),
    /// 64 bits float.
    F64(f64),
    /// Boolean.
    Bool(bool),
    /// Timestamp in microseconds.
    Date(i64),
    /// IP address.
    IpAddr(Ipv6Addr),
}

impl FieldValue {
    /// The column type a field must have to accept this value.
    pub fn column_type(&self) -> ColumnType {
        match self {
            FieldValue::Str(_) => ColumnType::Str,
            FieldValue::Bytes(_) => ColumnType::Bytes,
            FieldValue::U64(_) => ColumnType::U64,
            FieldValue::I64(_) => ColumnType::I64,
            FieldValue::F64(_) => ColumnType::F64,
            FieldValue::Bool(_) => ColumnType::Bool,
            FieldValue::Date(_) => ColumnType::DateTime,
            FieldValue::IpAddr(_) => ColumnType::IpAddr,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(val: &str) -> Self {
        FieldValue::Str(val.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(val: String) -> Self {
        FieldValue::Str(val)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(val: &[u8]) -> Self {
        FieldValue::Bytes(val.to_vec())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(val: Vec<u8>) -> Self {
        FieldValue::Bytes(val)
    }
}

impl From<u64> for FieldValue {
    fn from(val: u64) -> Self {
        FieldValue::U64(val)
    }
}

impl From<i64> for FieldValue {
    fn from(val: i64) -> Self {
        FieldValue::I64(val)
    }
}

impl From<f64> for FieldValue {
    fn from(val: f64) -> Self {
        FieldValue::F64(val)
    }
}

impl From<bool> for FieldValue {
    fn from(val: bool) -> Self {
        FieldValue::Bool(val)
    }
}

impl From<Ipv6Addr> for FieldValue {
    fn from(val: Ipv6Addr) -> Self {
        FieldValue::IpAddr(val)
    }
}

/// A document is a list of `(field name, value)` pairs.
///
/// A field may appear several times, in which case the field is multivalued for this document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    field_values: Vec<(String, FieldValue)>,
}

impl Document {
    /// Adds a value for the given field.
    pub fn add_field_value(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.field_values.push((field.into(), value.into()));
    }

    /// Number of `(field, value)` pairs in the document.
    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    /// Returns true if the document has no value.
    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }

    /// All `(field, value)` pairs, in insertion order.
    pub fn field_values(&self) -> &[(String, FieldValue)] {
        &self.field_values
    }

    /// Iterates over the values of a given field.
    pub fn get_all<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.field_values
            .iter()
            .filter(move |(field_name, _)| field_name == field)
            .map(|(_, value)| value)
    }

    /// Returns the first value of a given field, if any.
    pub fn get_first(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|(field_name, _)| field_name == field)
            .map(|(_, value)| value)
    }
}

/// A field declared in a [`Schema`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    name: String,
    column_type: ColumnType,
}

impl FieldEntry {
    /// Name of the field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the values of the field.
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
}

/// Schema of a shard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldEntry>,
}

impl Schema {
    /// Creates a new builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Returns the field entry with the given name.
    pub fn get_field_entry(&self, field_name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|entry| entry.name == field_name)
    }

    /// Returns the column type of the given field.
    pub fn column_type(&self, field_name: &str) -> Option<ColumnType> {
        self.get_field_entry(field_name)
            .map(|field_entry| field_entry.column_type)
    }

    /// Iterates over the declared fields.
    pub fn fields(&self) -> impl Iterator<Item = &FieldEntry> {
        self.fields.iter()
    }
}

/// Builder for a [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldEntry>,
}

impl SchemaBuilder {
    /// Declares a new field.
    ///
    /// # Panics
    ///
    /// Panics when a field with the same name was already declared.
    pub fn add_field(&mut self, field_name: &str, column_type: ColumnType) -> &mut Self {
        assert!(
            self.fields.iter().all(|entry| entry.name != field_name),
            "Field already exists in schema {field_name}"
        );
        self.fields.push(FieldEntry {
            name: field_name.to_string(),
            column_type,
        });
        self
    }

    /// Finalize the creation of a `Schema`.
    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() {
        let mut schema_builder = Schema::builder();
        schema_builder
            .add_field("tags", ColumnType::Str)
            .add_field("price", ColumnType::F64);
        let schema = schema_builder.build();
        assert_eq!(schema.column_type("tags"), Some(ColumnType::Str));
        assert_eq!(schema.column_type("price"), Some(ColumnType::F64));
        assert_eq!(schema.column_type("missing"), None);
        assert_eq!(schema.fields().count(), 2);
    }

    #[test]
    #[should_panic(expected = "Field already exists in schema tags")]
    fn test_schema_duplicate_field() {
        let mut schema_builder = Schema::builder();
        schema_builder.add_field("tags", ColumnType::Str);
        schema_builder.add_field("tags", ColumnType::Bytes);
    }

    #[test]
    fn test_field_value_column_type() {
        assert_eq!(FieldValue::from("a").column_type(), ColumnType::Str);
        assert_eq!(FieldValue::from(vec![1u8]).column_type(), ColumnType::Bytes);
        assert_eq!(FieldValue::from(1u64).column_type(), ColumnType::U64);
        assert_eq!(FieldValue::from(-1i64).column_type(), ColumnType::I64);
        assert_eq!(FieldValue::from(1.5f64).column_type(), ColumnType::F64);
        assert_eq!(FieldValue::from(true).column_type(), ColumnType::Bool);
        assert_eq!(FieldValue::Date(0).column_type(), ColumnType::DateTime);
        assert_eq!(
            FieldValue::from(Ipv6Addr::LOCALHOST).column_type(),
            ColumnType::IpAddr
        );
    }

    #[test]
    fn test_document_values_outlive_the_field_name() {
        let mut doc = Document::default();
        doc.add_field_value("tags", "rust");
        doc.add_field_value("tags", "systems");
        let first = {
            let field = String::from("tags");
            doc.get_first(&field)
        };
        assert_eq!(first, Some(&FieldValue::from("rust")));
        assert_eq!(doc.get_all("tags").count(), 2);
        assert_eq!(doc.get_first("missing"), None);
    }

    #[test]
    fn test_column_type_serde() {
        let column_type: ColumnType = serde_json::from_str("\"datetime\"").unwrap();
        assert_eq!(column_type, ColumnType::DateTime);
        assert_eq!(ColumnType::IpAddr.to_string(), "ip");
        assert!(ColumnType::Bool.is_numerical());
        assert!(!ColumnType::Str.is_numerical());
    }
}
