use common::ByteCount;
use thiserror::Error;

/// Error that may occur when enforcing the aggregation limits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    /// Memory limit exceeded.
    #[error(
        "Aborting aggregation because memory limit was exceeded. Limit: {limit:?}, Current: \
         {current:?}"
    )]
    MemoryExceeded {
        /// Memory consumption limit
        limit: ByteCount,
        /// Current memory consumption
        current: ByteCount,
    },
    /// Bucket limit exceeded.
    #[error(
        "Aborting aggregation because bucket limit was exceeded. Limit: {limit:?}, Current: \
         {current:?}"
    )]
    BucketLimitExceeded {
        /// Bucket limit
        limit: u32,
        /// Current num buckets
        current: u32,
    },
}
