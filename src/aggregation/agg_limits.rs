use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::ByteCount;

use super::AggregationError;

/// Number of buckets a single aggregation may return by default.
pub const DEFAULT_BUCKET_LIMIT: u32 = 65000;

/// Bytes a request may account by default (500MB).
pub const DEFAULT_MEMORY_LIMIT: u64 = 500_000_000;

/// Heap footprint of a container, estimated from its capacity. Owned values such as boxed
/// keys are not followed.
pub trait MemoryConsumption {
    /// Estimated heap bytes, from the capacity of the container.
    fn memory_consumption(&self) -> usize;
}

impl<K, V, S> MemoryConsumption for HashMap<K, V, S> {
    fn memory_consumption(&self) -> usize {
        // one control byte per bucket
        let bucket_size = std::mem::size_of::<K>() + std::mem::size_of::<V>() + 1;
        bucket_size * self.capacity()
    }
}

impl<T> MemoryConsumption for Vec<T> {
    fn memory_consumption(&self) -> usize {
        std::mem::size_of::<T>() * self.capacity()
    }
}

/// Memory and bucket budget of one request.
///
/// Clones share the same byte counter: every factory cache and every collector of the request
/// charges it through its own [`ResourceLimitGuard`]. The limits reach a factory through the
/// [`AggregationContext`](super::AggregationContext).
#[derive(Clone, Debug)]
pub struct AggregationLimits {
    consumed_bytes: Arc<AtomicU64>,
    memory_limit: ByteCount,
    /// Counts returned buckets only.
    bucket_limit: u32,
}

impl Default for AggregationLimits {
    fn default() -> Self {
        AggregationLimits::new(None, None)
    }
}

impl AggregationLimits {
    /// Creates a budget with a fresh byte counter.
    ///
    /// `memory_limit` is in bytes and defaults to [`DEFAULT_MEMORY_LIMIT`]. `bucket_limit`
    /// bounds the number of buckets of one result and defaults to [`DEFAULT_BUCKET_LIMIT`].
    pub fn new(memory_limit: Option<u64>, bucket_limit: Option<u32>) -> Self {
        AggregationLimits {
            consumed_bytes: Arc::default(),
            memory_limit: memory_limit.unwrap_or(DEFAULT_MEMORY_LIMIT).into(),
            bucket_limit: bucket_limit.unwrap_or(DEFAULT_BUCKET_LIMIT),
        }
    }

    /// Returns a guard for a new owner of memory. Its bytes are given back when it is dropped.
    pub fn new_guard(&self) -> ResourceLimitGuard {
        ResourceLimitGuard {
            consumed_bytes: Arc::clone(&self.consumed_bytes),
            memory_limit: self.memory_limit,
            owned_bytes: 0,
        }
    }

    /// Memory currently accounted by all live guards.
    pub fn memory_consumed(&self) -> ByteCount {
        self.consumed_bytes.load(Ordering::Relaxed).into()
    }

    /// The maximum number of buckets an aggregation may return.
    pub fn get_bucket_limit(&self) -> u32 {
        self.bucket_limit
    }

    pub(crate) fn validate_bucket_count(&self, num_buckets: usize) -> crate::Result<()> {
        if num_buckets <= self.bucket_limit as usize {
            return Ok(());
        }
        Err(AggregationError::BucketLimitExceeded {
            limit: self.bucket_limit,
            current: num_buckets.min(u32::MAX as usize) as u32,
        }
        .into())
    }
}

/// The bytes charged by one owner (a frequency cache, a collector) to the request budget.
#[derive(Debug)]
pub struct ResourceLimitGuard {
    consumed_bytes: Arc<AtomicU64>,
    memory_limit: ByteCount,
    owned_bytes: u64,
}

impl ResourceLimitGuard {
    /// Accounts `num_bytes`. The bytes stay accounted even if the limit is exceeded, they are
    /// released together with the guard.
    pub(crate) fn add_memory_consumed(&mut self, num_bytes: u64) -> crate::Result<()> {
        let consumed = self.consumed_bytes.fetch_add(num_bytes, Ordering::Relaxed) + num_bytes;
        self.owned_bytes += num_bytes;
        let consumed: ByteCount = consumed.into();
        if consumed > self.memory_limit {
            return Err(AggregationError::MemoryExceeded {
                limit: self.memory_limit,
                current: consumed,
            }
            .into());
        }
        Ok(())
    }

    /// Bytes accounted through this guard.
    pub fn allocated(&self) -> ByteCount {
        self.owned_bytes.into()
    }
}

impl Drop for ResourceLimitGuard {
    fn drop(&mut self) {
        self.consumed_bytes
            .fetch_sub(self.owned_bytes, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SigTermsError;

    #[test]
    fn test_guard_releases_memory_on_drop() -> crate::Result<()> {
        let limits = AggregationLimits::default();
        {
            let mut guard = limits.new_guard();
            guard.add_memory_consumed(1_000)?;
            let mut other_guard = limits.new_guard();
            other_guard.add_memory_consumed(24)?;
            assert_eq!(limits.memory_consumed().get_bytes(), 1_024);
            drop(other_guard);
            assert_eq!(limits.memory_consumed().get_bytes(), 1_000);
            assert_eq!(guard.allocated().get_bytes(), 1_000);
        }
        assert_eq!(limits.memory_consumed().get_bytes(), 0);
        Ok(())
    }

    #[test]
    fn test_memory_limit_exceeded() {
        let limits = AggregationLimits::new(Some(100), None);
        let mut guard = limits.new_guard();
        assert!(guard.add_memory_consumed(60).is_ok());
        let err = guard.add_memory_consumed(60).unwrap_err();
        assert!(matches!(
            err,
            SigTermsError::AggregationError(AggregationError::MemoryExceeded { .. })
        ));
        drop(guard);
        assert_eq!(limits.memory_consumed().get_bytes(), 0);
    }

    #[test]
    fn test_bucket_limit() {
        let limits = AggregationLimits::new(None, Some(2));
        assert_eq!(limits.get_bucket_limit(), 2);
        assert!(limits.validate_bucket_count(2).is_ok());
        assert!(matches!(
            limits.validate_bucket_count(3),
            Err(SigTermsError::AggregationError(
                AggregationError::BucketLimitExceeded {
                    limit: 2,
                    current: 3
                }
            ))
        ));
    }
}
