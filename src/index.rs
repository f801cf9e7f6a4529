//! In-memory shard.
//!
//! The [`MemoryIndex`] keeps the documents of a shard along with an inverted index of document
//! frequencies, which is all a significant terms aggregation needs from a shard: the
//! [`DocFreqReader`] primitive for background frequencies, and columns of per document values.

use std::io;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::aggregation::values_source::{
    to_monotonic_u64, BytesColumn, NumericColumn, StrColumn, ValuesSource, ValuesSourceConfig,
};
use crate::schema::{ColumnType, Document, FieldValue, Schema};
use crate::{DocId, SigTermsError};

/// Reads document frequencies from the inverted index of a shard.
///
/// Reads are synchronous and local, but may fail.
pub trait DocFreqReader: Send + Sync {
    /// Total number of documents in the shard.
    fn num_docs(&self) -> u64;

    /// Number of documents of the shard containing the indexed term `term` in `field`.
    ///
    /// Returns 0 if the field or the term does not exist.
    fn doc_freq(&self, field: &str, term: &[u8]) -> io::Result<u64>;
}

/// The bytes of the term indexed for a value.
fn indexed_term(value: &FieldValue) -> Vec<u8> {
    match value {
        FieldValue::Str(text) => text.as_bytes().to_vec(),
        FieldValue::Bytes(bytes) => bytes.clone(),
        FieldValue::IpAddr(ip_addr) => ip_addr.octets().to_vec(),
        numerical => to_monotonic_u64(numerical)
            .map(|val| val.to_be_bytes().to_vec())
            .unwrap_or_default(),
    }
}

/// Collects the documents of a shard.
pub struct MemoryIndexBuilder {
    schema: Schema,
    docs: Vec<Document>,
}

impl MemoryIndexBuilder {
    /// Creates a builder for a shard with the given schema.
    pub fn new(schema: Schema) -> MemoryIndexBuilder {
        MemoryIndexBuilder {
            schema,
            docs: Vec::new(),
        }
    }

    /// Adds a document and returns its `DocId`.
    ///
    /// Fails if the document contains a field missing from the schema, or a value whose type
    /// does not match the type of its field.
    pub fn add_document(&mut self, doc: Document) -> crate::Result<DocId> {
        for (field, value) in doc.field_values() {
            let column_type = self.schema.column_type(field).ok_or_else(|| {
                SigTermsError::InvalidArgument(format!("Field {field:?} is not in the schema"))
            })?;
            if column_type != value.column_type() {
                return Err(SigTermsError::InvalidArgument(format!(
                    "Field {field:?} expects {column_type} values, got {value:?}"
                )));
            }
        }
        let doc_id = self.docs.len() as DocId;
        self.docs.push(doc);
        Ok(doc_id)
    }

    /// Builds the inverted index and freezes the shard.
    pub fn build(self) -> MemoryIndex {
        let mut doc_freqs: FxHashMap<String, FxHashMap<Box<[u8]>, u64>> = FxHashMap::default();
        for doc in &self.docs {
            let mut doc_terms: FxHashSet<(&str, Vec<u8>)> = FxHashSet::default();
            for (field, value) in doc.field_values() {
                doc_terms.insert((field.as_str(), indexed_term(value)));
            }
            for (field, term) in doc_terms {
                *doc_freqs
                    .entry(field.to_string())
                    .or_default()
                    .entry(term.into_boxed_slice())
                    .or_insert(0) += 1;
            }
        }
        debug!(
            "built memory index with {} docs and {} indexed fields",
            self.docs.len(),
            doc_freqs.len()
        );
        MemoryIndex {
            schema: self.schema,
            docs: self.docs,
            doc_freqs,
        }
    }
}

/// A frozen in-memory shard.
pub struct MemoryIndex {
    schema: Schema,
    docs: Vec<Document>,
    doc_freqs: FxHashMap<String, FxHashMap<Box<[u8]>, u64>>,
}

impl MemoryIndex {
    /// The schema of the shard.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns a stored document.
    pub fn doc(&self, doc_id: DocId) -> Option<&Document> {
        self.docs.get(doc_id as usize)
    }

    /// Returns the ids of the documents matching `predicate`.
    pub fn search(&self, predicate: impl Fn(&Document) -> bool) -> Vec<DocId> {
        self.docs
            .iter()
            .enumerate()
            .filter(|(_, doc)| predicate(doc))
            .map(|(doc_id, _)| doc_id as DocId)
            .collect()
    }

    /// Returns the documents containing the given term, analogous to a term query.
    pub fn search_term(&self, field: &str, value: &FieldValue) -> Vec<DocId> {
        self.search(|doc| doc.get_all(field).any(|doc_value| doc_value == value))
    }

    /// Describes where the values of `field` come from on this shard.
    pub fn values_source_config(&self, field: &str) -> ValuesSourceConfig {
        match self.schema.column_type(field) {
            Some(column_type) => ValuesSourceConfig::mapped(field, column_type),
            None => ValuesSourceConfig::unmapped(field),
        }
    }

    /// Builds the column of values of `field`.
    ///
    /// Returns `None` if the field is not in the schema.
    pub fn values_source(&self, field: &str) -> Option<ValuesSource> {
        let column_type = self.schema.column_type(field)?;
        let values_source = match column_type {
            ColumnType::Str => {
                let docs: Vec<Vec<&[u8]>> = self
                    .docs
                    .iter()
                    .map(|doc| {
                        doc.get_all(field)
                            .filter_map(|value| match value {
                                FieldValue::Str(text) => Some(text.as_bytes()),
                                _ => None,
                            })
                            .collect()
                    })
                    .collect();
                ValuesSource::Str(StrColumn::from_docs(&docs))
            }
            ColumnType::Bytes => {
                let docs: Vec<Vec<&[u8]>> = self
                    .docs
                    .iter()
                    .map(|doc| {
                        doc.get_all(field)
                            .filter_map(|value| match value {
                                FieldValue::Bytes(bytes) => Some(bytes.as_slice()),
                                _ => None,
                            })
                            .collect()
                    })
                    .collect();
                ValuesSource::Bytes(BytesColumn::from_docs(&docs))
            }
            ColumnType::IpAddr => ValuesSource::Opaque { column_type },
            numerical_type => {
                let docs: Vec<Vec<u64>> = self
                    .docs
                    .iter()
                    .map(|doc| doc.get_all(field).filter_map(to_monotonic_u64).collect())
                    .collect();
                ValuesSource::Numeric(NumericColumn::from_docs(numerical_type, docs))
            }
        };
        Some(values_source)
    }
}

impl DocFreqReader for MemoryIndex {
    fn num_docs(&self) -> u64 {
        self.docs.len() as u64
    }

    fn doc_freq(&self, field: &str, term: &[u8]) -> io::Result<u64> {
        Ok(self
            .doc_freqs
            .get(field)
            .and_then(|terms| terms.get(term))
            .copied()
            .unwrap_or(0))
    }
}
