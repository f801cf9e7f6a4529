#![warn(missing_docs)]
#![allow(clippy::len_without_is_empty)]

//! # `sigterms`
//!
//! Significant terms aggregation over a shard.
//!
//! A significant terms aggregation ranks the values of a field by how disproportionately
//! frequent they are in a foreground document set (the documents matched by a query) compared
//! to the background (all the documents of the shard).
//!
//! The heart of the crate is the
//! [`SignificantTermsAggregatorFactory`](aggregation::bucket::SignificantTermsAggregatorFactory):
//! - it picks, once per query execution, which collector variant computes the aggregation
//!   (hash-map based or term-ordinal based),
//! - it owns a per-shard cache of background document frequencies, so that the inverted index is
//!   read at most once per distinct term.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use sigterms::aggregation::bucket::{
//!     SignificantTermsAggregation, SignificantTermsAggregatorFactory,
//! };
//! use sigterms::aggregation::AggregationContext;
//! use sigterms::schema::{ColumnType, Schema};
//! use sigterms::{doc, MemoryIndexBuilder};
//!
//! # fn main() -> sigterms::Result<()> {
//! let mut schema_builder = Schema::builder();
//! schema_builder.add_field("tags", ColumnType::Str);
//! let mut index_builder = MemoryIndexBuilder::new(schema_builder.build());
//! index_builder.add_document(doc!("tags" => "rust"))?;
//! index_builder.add_document(doc!("tags" => "rust"))?;
//! index_builder.add_document(doc!("tags" => "java"))?;
//! let index = Arc::new(index_builder.build());
//!
//! let req: SignificantTermsAggregation =
//!     serde_json::from_value(json!({ "field": "tags", "min_doc_count": 1 }))?;
//! let mut factory = SignificantTermsAggregatorFactory::new(
//!     "significant_tags",
//!     &req,
//!     index.values_source_config("tags"),
//!     AggregationContext::new(index.clone()),
//! )?;
//! let values_source = index.values_source("tags").expect("tags is mapped");
//! let mut collector = factory.create(&values_source, 1, None)?;
//! // Only the first document matches the foreground query.
//! collector.collect_block(&[0])?;
//! let result = factory.build_result(collector.as_ref())?;
//! assert_eq!(result.buckets[0].key.to_string(), "rust");
//! factory.release();
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

#[macro_use]
mod macros;

pub mod aggregation;
mod error;
mod index;
pub mod schema;

pub use crate::error::SigTermsError;
pub use crate::index::{DocFreqReader, MemoryIndex, MemoryIndexBuilder};
pub use crate::schema::Document;

/// sigterms result.
///
/// Within sigterms, please avoid importing `Result` using `use crate::Result`
/// and instead, refer to this as `crate::Result<T>`.
pub type Result<T> = std::result::Result<T, SigTermsError>;

/// A `u32` identifying a document within a shard.
///
/// Documents are identified by their insertion order in the shard.
pub type DocId = u32;

/// A `u64` assigned to every distinct term observed by a frequency cache, or to every term of a
/// column dictionary.
pub type TermOrdinal = u64;
