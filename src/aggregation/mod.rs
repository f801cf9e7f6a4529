//! # Aggregations
//!
//! An aggregation summarizes the documents matched by a query.
//!
//! This crate implements the significant terms [bucket](bucket) aggregation: it returns the
//! terms of a field which are unusually frequent in the matched documents (the foreground set),
//! compared to all the documents of the shard (the background set).
//!
//! ## Usage
//! - Build a request, usually by deserializing elasticsearch compatible JSON into an
//!   [`Aggregation`](agg_req::Aggregation).
//! - Create one [`SignificantTermsAggregatorFactory`](bucket::SignificantTermsAggregatorFactory)
//!   per aggregation and per query execution, with an explicit [`AggregationContext`].
//! - Ask the factory for a collector, feed it the matching documents, and build the
//!   [`SignificantTermsResult`](agg_result::SignificantTermsResult).
//! - Release the factory. Dropping it releases it as well.
//!
//! ## Code Organization
//! - [`agg_req`]: the request.
//! - [`agg_result`]: the result.
//! - [`values_source`]: the per document values, their classification and codec.
//! - [`bucket`]: the factory, the execution mode selection, the background frequency cache and
//!   the collectors.
//!
//! ## Memory
//! Every cache and collector accounts the memory it allocates against the
//! [`AggregationLimits`] of the context. The aggregation fails when the limit is exceeded.

mod agg_limits;
pub mod agg_req;
pub mod agg_result;
pub mod bucket;
mod error;
pub mod values_source;

use std::fmt::Display;
use std::sync::Arc;

pub use agg_limits::{
    AggregationLimits, MemoryConsumption, ResourceLimitGuard, DEFAULT_BUCKET_LIMIT,
    DEFAULT_MEMORY_LIMIT,
};
pub use error::AggregationError;
use serde::{Deserialize, Serialize};

use crate::DocFreqReader;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// The key to identify a bucket.
#[serde(untagged)]
pub enum Key {
    /// String key
    Str(String),
    /// `i64` key
    I64(i64),
    /// `u64` key
    U64(u64),
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Str(val) => f.write_str(val),
            Key::I64(val) => f.write_str(&val.to_string()),
            Key::U64(val) => f.write_str(&val.to_string()),
        }
    }
}

/// Tuning constants of the significant terms aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificantTermsSettings {
    /// Number of frequency slots allocated upfront by the background frequency cache.
    pub initial_num_term_freqs_cached: usize,
    /// Estimated number of buckets when the values source cannot tell its number of distinct
    /// values.
    pub default_estimated_bucket_count: u64,
    /// Upper bound of the estimated number of buckets. Values sources may largely overestimate
    /// their number of distinct values, and not all values are visited by the matching
    /// documents anyway.
    pub max_estimated_bucket_count: u64,
}

impl Default for SignificantTermsSettings {
    fn default() -> Self {
        SignificantTermsSettings {
            initial_num_term_freqs_cached: 512,
            default_estimated_bucket_count: 50,
            max_estimated_bucket_count: 512,
        }
    }
}

/// Everything a significant terms factory borrows from the query execution it belongs to.
///
/// The context is handed over explicitly when the factory is created.
#[derive(Clone)]
pub struct AggregationContext {
    /// Reads background document frequencies from the shard.
    pub doc_freqs: Arc<dyn DocFreqReader>,
    /// Memory and bucket limits shared by the whole request.
    pub limits: AggregationLimits,
    /// Tuning constants.
    pub settings: SignificantTermsSettings,
}

impl AggregationContext {
    /// Creates a context with default limits and settings.
    pub fn new(doc_freqs: Arc<dyn DocFreqReader>) -> AggregationContext {
        AggregationContext {
            doc_freqs,
            limits: AggregationLimits::default(),
            settings: SignificantTermsSettings::default(),
        }
    }

    /// Replaces the limits.
    pub fn with_limits(mut self, limits: AggregationLimits) -> AggregationContext {
        self.limits = limits;
        self
    }

    /// Replaces the settings.
    pub fn with_settings(mut self, settings: SignificantTermsSettings) -> AggregationContext {
        self.settings = settings;
        self
    }
}
