//! Values sources: the per-document values an aggregation reads, and how their type is
//! classified for significant terms.
//!
//! Numerical values are kept in the monotonic `u64` space (see [`to_monotonic_u64`]) like fast
//! fields, strings are dictionary encoded (every distinct term gets a term ordinal, in sorted
//! order) and raw bytes are kept as is.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{f64_to_u64, i64_to_u64, u64_to_i64};

use super::Key;
use crate::schema::{ColumnType, FieldValue};
use crate::{DocId, SigTermsError, TermOrdinal};

/// How the values of a field can be analyzed for significance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueSourceCapability {
    /// Byte terms backed by a term dictionary: every term has a term ordinal.
    BytesWithOrdinals,
    /// Byte terms without term dictionary.
    BytesWithoutOrdinals,
    /// Discrete numerical values.
    NumericIntegral,
    /// Floating point values.
    NumericFloating,
}

impl ValueSourceCapability {
    /// Classifies a column type.
    ///
    /// Returns `None` for column types that are neither byte-like nor numerical.
    pub fn from_column_type(column_type: ColumnType) -> Option<ValueSourceCapability> {
        match column_type {
            ColumnType::Str => Some(ValueSourceCapability::BytesWithOrdinals),
            ColumnType::Bytes => Some(ValueSourceCapability::BytesWithoutOrdinals),
            ColumnType::I64 | ColumnType::U64 | ColumnType::Bool | ColumnType::DateTime => {
                Some(ValueSourceCapability::NumericIntegral)
            }
            ColumnType::F64 => Some(ValueSourceCapability::NumericFloating),
            ColumnType::IpAddr => None,
        }
    }

    /// Returns true for byte terms, with or without ordinals.
    pub fn is_bytes(self) -> bool {
        matches!(
            self,
            ValueSourceCapability::BytesWithOrdinals | ValueSourceCapability::BytesWithoutOrdinals
        )
    }

    /// Returns true for numerical values.
    pub fn is_numeric(self) -> bool {
        !self.is_bytes()
    }
}

/// Maps a numerical value to the monotonic `u64` space.
///
/// Returns `None` for non numerical values.
pub(crate) fn to_monotonic_u64(value: &FieldValue) -> Option<u64> {
    match value {
        FieldValue::U64(val) => Some(*val),
        FieldValue::I64(val) | FieldValue::Date(val) => Some(i64_to_u64(*val)),
        FieldValue::F64(val) => Some(f64_to_u64(*val)),
        FieldValue::Bool(val) => Some(u64::from(*val)),
        FieldValue::Str(_) | FieldValue::Bytes(_) | FieldValue::IpAddr(_) => None,
    }
}

/// A dictionary encoded column of strings.
///
/// The dictionary is sorted: term ordinals follow the byte order of the terms.
#[derive(Clone, Debug)]
pub struct StrColumn {
    dictionary: Arc<[Box<[u8]>]>,
    term_ords: Arc<[Vec<TermOrdinal>]>,
}

impl StrColumn {
    /// Builds the column from the terms of each document, `docs[doc_id]` being the terms of
    /// document `doc_id`.
    pub fn from_docs<T: AsRef<[u8]>>(docs: &[Vec<T>]) -> StrColumn {
        let dictionary: Vec<Box<[u8]>> = docs
            .iter()
            .flatten()
            .map(AsRef::<[u8]>::as_ref)
            .collect::<BTreeSet<&[u8]>>()
            .into_iter()
            .map(Box::from)
            .collect();
        let term_ords: Vec<Vec<TermOrdinal>> = docs
            .iter()
            .map(|terms| {
                let mut ords: Vec<TermOrdinal> = terms
                    .iter()
                    .filter_map(|term| {
                        let term: &[u8] = term.as_ref();
                        dictionary
                            .binary_search_by(|candidate| (**candidate).cmp(term))
                            .ok()
                            .map(|ord| ord as TermOrdinal)
                    })
                    .collect();
                ords.sort_unstable();
                ords.dedup();
                ords
            })
            .collect();
        StrColumn {
            dictionary: dictionary.into(),
            term_ords: term_ords.into(),
        }
    }

    /// Number of distinct terms in the dictionary.
    pub fn num_terms(&self) -> usize {
        self.dictionary.len()
    }

    /// Number of documents covered by the column.
    pub fn num_docs(&self) -> u32 {
        self.term_ords.len() as u32
    }

    /// The distinct, sorted term ordinals of a document.
    pub fn term_ords(&self, doc: DocId) -> &[TermOrdinal] {
        self.term_ords
            .get(doc as usize)
            .map(|ords| ords.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the term associated with a term ordinal.
    pub fn ord_to_term(&self, term_ord: TermOrdinal) -> Option<&[u8]> {
        self.dictionary
            .get(term_ord as usize)
            .map(|term| &term[..])
    }

    /// Returns the term ordinal of a term, if the term is in the dictionary.
    pub fn term_ord(&self, term: &[u8]) -> Option<TermOrdinal> {
        self.dictionary
            .binary_search_by(|candidate| (**candidate).cmp(term))
            .ok()
            .map(|ord| ord as TermOrdinal)
    }

    /// Iterates over the dictionary, in term ordinal order.
    pub fn dictionary(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.dictionary.iter().map(|term| &term[..])
    }
}

/// A column of raw byte terms. There is no dictionary: the distinct terms are not known
/// upfront.
#[derive(Clone, Debug)]
pub struct BytesColumn {
    values: Arc<[Vec<Box<[u8]>>]>,
}

impl BytesColumn {
    /// Builds the column from the values of each document.
    pub fn from_docs<T: AsRef<[u8]>>(docs: &[Vec<T>]) -> BytesColumn {
        let values: Vec<Vec<Box<[u8]>>> = docs
            .iter()
            .map(|doc_values| {
                let mut doc_values: Vec<Box<[u8]>> = doc_values
                    .iter()
                    .map(|value| {
                        let value: &[u8] = value.as_ref();
                        Box::from(value)
                    })
                    .collect();
                doc_values.sort_unstable();
                doc_values.dedup();
                doc_values
            })
            .collect();
        BytesColumn {
            values: values.into(),
        }
    }

    /// Number of documents covered by the column.
    pub fn num_docs(&self) -> u32 {
        self.values.len() as u32
    }

    /// The distinct values of a document.
    pub fn values(&self, doc: DocId) -> &[Box<[u8]>] {
        self.values
            .get(doc as usize)
            .map(|values| values.as_slice())
            .unwrap_or(&[])
    }
}

/// A column of numerical values, stored in the monotonic `u64` space.
#[derive(Clone, Debug)]
pub struct NumericColumn {
    column_type: ColumnType,
    values: Arc<[Vec<u64>]>,
}

impl NumericColumn {
    /// Builds the column from the values of each document, already mapped to the monotonic
    /// `u64` space of `column_type`.
    pub fn from_docs(column_type: ColumnType, docs: Vec<Vec<u64>>) -> NumericColumn {
        debug_assert!(column_type.is_numerical());
        let values: Vec<Vec<u64>> = docs
            .into_iter()
            .map(|mut doc_values| {
                doc_values.sort_unstable();
                doc_values.dedup();
                doc_values
            })
            .collect();
        NumericColumn {
            column_type,
            values: values.into(),
        }
    }

    /// The type of the column.
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Number of documents covered by the column.
    pub fn num_docs(&self) -> u32 {
        self.values.len() as u32
    }

    /// The distinct values of a document, in the monotonic `u64` space.
    pub fn values(&self, doc: DocId) -> &[u64] {
        self.values
            .get(doc as usize)
            .map(|values| values.as_slice())
            .unwrap_or(&[])
    }

    /// Converts a value of the monotonic `u64` space to the `i64` term value used by the
    /// [`FieldValueCodec`].
    ///
    /// `u64` and bool values travel as their bit pattern.
    pub fn to_term_value(&self, val: u64) -> i64 {
        match self.column_type {
            ColumnType::I64 | ColumnType::DateTime => u64_to_i64(val),
            _ => val as i64,
        }
    }
}

/// The values of the aggregated field on the current shard.
#[derive(Clone, Debug)]
pub enum ValuesSource {
    /// Strings with term ordinals.
    Str(StrColumn),
    /// Raw bytes, without ordinals.
    Bytes(BytesColumn),
    /// Numerical values.
    Numeric(NumericColumn),
    /// A column whose values cannot be analyzed as terms, e.g. ip addresses.
    Opaque {
        /// Type of the column.
        column_type: ColumnType,
    },
}

impl ValuesSource {
    /// The type of the underlying column.
    pub fn column_type(&self) -> ColumnType {
        match self {
            ValuesSource::Str(_) => ColumnType::Str,
            ValuesSource::Bytes(_) => ColumnType::Bytes,
            ValuesSource::Numeric(column) => column.column_type(),
            ValuesSource::Opaque { column_type } => *column_type,
        }
    }

    /// Classifies the values source.
    pub fn capability(&self) -> Option<ValueSourceCapability> {
        ValueSourceCapability::from_column_type(self.column_type())
    }

    /// Upper bound of the number of distinct values, when it is known.
    pub fn max_unique_values(&self) -> Option<u64> {
        match self {
            ValuesSource::Str(column) => Some(column.num_terms() as u64),
            ValuesSource::Numeric(column) if column.column_type() == ColumnType::Bool => Some(2),
            _ => None,
        }
    }
}

/// Where the values of an aggregation come from.
///
/// A config is unmapped when the field does not exist on the current shard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValuesSourceConfig {
    field: String,
    column_type: Option<ColumnType>,
}

impl ValuesSourceConfig {
    /// Config for a field that exists on the shard.
    pub fn mapped(field: impl Into<String>, column_type: ColumnType) -> ValuesSourceConfig {
        ValuesSourceConfig {
            field: field.into(),
            column_type: Some(column_type),
        }
    }

    /// Config for a field that does not exist on the shard.
    pub fn unmapped(field: impl Into<String>) -> ValuesSourceConfig {
        ValuesSourceConfig {
            field: field.into(),
            column_type: None,
        }
    }

    /// Name of the field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Type of the field, `None` if unmapped.
    pub fn column_type(&self) -> Option<ColumnType> {
        self.column_type
    }

    /// Returns true if the field does not exist on the shard.
    pub fn is_unmapped(&self) -> bool {
        self.column_type.is_none()
    }
}

/// Translates an aggregation value to the bytes of the term indexed for it, and back.
pub trait FieldValueCodec {
    /// Returns the indexed term bytes of `value`.
    fn to_indexed_bytes(&self, value: i64) -> Vec<u8>;
    /// Decodes indexed term bytes.
    fn from_indexed_bytes(&self, bytes: &[u8]) -> crate::Result<i64>;
}

/// Codec of the discrete numerical column types.
///
/// Numerical terms are indexed as the big endian bytes of their monotonic `u64` mapping, so
/// that the byte order of terms matches the order of values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NumericFieldCodec {
    column_type: ColumnType,
}

impl NumericFieldCodec {
    /// Returns the codec of `column_type`, if `column_type` holds discrete numerical values.
    pub fn for_column_type(column_type: ColumnType) -> Option<NumericFieldCodec> {
        match column_type {
            ColumnType::I64 | ColumnType::U64 | ColumnType::Bool | ColumnType::DateTime => {
                Some(NumericFieldCodec { column_type })
            }
            _ => None,
        }
    }

    /// The column type handled by the codec.
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// The bucket key of a term value.
    pub fn key(&self, value: i64) -> Key {
        match self.column_type {
            ColumnType::I64 | ColumnType::DateTime => Key::I64(value),
            _ => Key::U64(value as u64),
        }
    }

    fn to_monotonic(&self, value: i64) -> u64 {
        match self.column_type {
            ColumnType::I64 | ColumnType::DateTime => i64_to_u64(value),
            _ => value as u64,
        }
    }

    fn from_monotonic(&self, val: u64) -> i64 {
        match self.column_type {
            ColumnType::I64 | ColumnType::DateTime => u64_to_i64(val),
            _ => val as i64,
        }
    }
}

impl FieldValueCodec for NumericFieldCodec {
    fn to_indexed_bytes(&self, value: i64) -> Vec<u8> {
        self.to_monotonic(value).to_be_bytes().to_vec()
    }

    fn from_indexed_bytes(&self, bytes: &[u8]) -> crate::Result<i64> {
        let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
            SigTermsError::InvalidArgument(format!(
                "indexed {} term must be 8 bytes long, got {} bytes",
                self.column_type,
                bytes.len()
            ))
        })?;
        Ok(self.from_monotonic(u64::from_be_bytes(bytes)))
    }
}
