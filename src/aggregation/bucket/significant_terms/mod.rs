//! Significant terms aggregation.
//!
//! The [`SignificantTermsAggregatorFactory`] is created once per aggregation and per query
//! execution. It selects the [`ExecutionMode`] of the collectors it creates, and serves them the
//! background frequencies of terms through its [`FrequencyCache`].

mod collector;
mod execution;
mod factory;
mod frequency_cache;
mod heuristic;
mod include_exclude;
mod long_terms;
mod string_terms;
mod unmapped;

pub use collector::{BackgroundFrequencyProvider, CollectorVariant, SignificantTermsCollector};
pub use execution::{
    has_parent_bucket_aggregator, select_mode, AggregatorLink, BucketAggregationMode,
    ExecutionMode, EXECUTION_HINT_VALUE_MAP, EXECUTION_HINT_VALUE_ORDINALS,
};
pub use factory::SignificantTermsAggregatorFactory;
pub use frequency_cache::FrequencyCache;
pub use heuristic::jlh_score;
pub use include_exclude::IncludeExclude;
