//! Module for all bucket aggregations.
//!
//! Bucket aggregations put documents into buckets. The significant terms aggregation creates a
//! bucket per term that is unusually frequent in the collected documents, see
//! [`SignificantTermsAggregatorFactory`].
//!
//! Results of buckets are [`SignificantTermsResult`](super::agg_result::SignificantTermsResult).

mod significant_terms;

pub use super::agg_req::SignificantTermsAggregation;
pub use significant_terms::*;
