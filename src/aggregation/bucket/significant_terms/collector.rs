use std::fmt::Debug;
use std::sync::Arc;

use itertools::Itertools;

use super::execution::AggregatorLink;
use super::heuristic::jlh_score;
use crate::aggregation::agg_req::SignificantTermsAggregationInternal;
use crate::aggregation::agg_result::{SignificantTermBucket, SignificantTermsResult};
use crate::aggregation::{AggregationLimits, Key, ResourceLimitGuard};
use crate::DocId;

/// The concrete collector a factory created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectorVariant {
    /// Byte terms counted in a hash map.
    StringMap,
    /// Byte terms counted by term ordinal.
    StringOrdinals,
    /// Discrete numerical values counted in a hash map.
    Long,
    /// The field does not exist on the shard.
    Unmapped,
}

/// Gives access to the background set: the number of documents of the shard containing a
/// term, and the number of documents of the shard.
pub trait BackgroundFrequencyProvider {
    /// Background frequency of an indexed term.
    fn background_frequency(&mut self, term: &[u8]) -> crate::Result<u64>;
    /// Background frequency of a numerical term value.
    fn background_frequency_for_value(&mut self, value: i64) -> crate::Result<u64>;
    /// Number of documents of the background set.
    fn superset_size(&self) -> u64;
}

/// Collects the foreground documents of a significant terms aggregation.
///
/// Every document contributes at most once to the count of each of its distinct terms.
pub trait SignificantTermsCollector: Debug + Send {
    /// Which collector this is.
    fn variant(&self) -> CollectorVariant;

    /// The position of the collector in the aggregation tree.
    fn link(&self) -> &Arc<AggregatorLink>;

    /// Number of documents collected so far.
    fn subset_size(&self) -> u64;

    /// Collects a block of documents.
    fn collect_block(&mut self, docs: &[DocId]) -> crate::Result<()>;

    /// Collects a single document.
    fn collect(&mut self, doc: DocId) -> crate::Result<()> {
        self.collect_block(&[doc])
    }

    /// Scores the collected terms against the background set, and returns the most significant
    /// ones.
    fn build_result(
        &self,
        background: &mut dyn BackgroundFrequencyProvider,
    ) -> crate::Result<SignificantTermsResult>;
}

/// State shared by all collectors.
#[derive(Debug)]
pub(crate) struct CollectorParams {
    pub req: SignificantTermsAggregationInternal,
    pub link: Arc<AggregatorLink>,
    pub limits: AggregationLimits,
    pub guard: ResourceLimitGuard,
}

impl CollectorParams {
    pub(crate) fn new(
        req: SignificantTermsAggregationInternal,
        link: Arc<AggregatorLink>,
        limits: AggregationLimits,
    ) -> CollectorParams {
        let guard = limits.new_guard();
        CollectorParams {
            req,
            link,
            limits,
            guard,
        }
    }

    /// Charges memory allocated by the collector to the aggregation limits.
    pub(crate) fn add_memory_consumed(&mut self, mem_delta: usize) -> crate::Result<()> {
        if mem_delta == 0 {
            return Ok(());
        }
        self.guard
            .add_memory_consumed(mem_delta as u64)
            .map_err(|err| {
                warn!("significant terms aggregation {}: {err}", self.link.name());
                err
            })
    }

    /// Turns the foreground counts of terms into the most significant buckets.
    ///
    /// Terms below `min_doc_count` are skipped before their background frequency is looked
    /// up. Buckets are ranked by score, ties broken by key.
    pub(crate) fn build_buckets<T>(
        &self,
        term_counts: impl Iterator<Item = (T, u64)>,
        subset_size: u64,
        superset_size: u64,
        mut background_frequency: impl FnMut(&T) -> crate::Result<u64>,
        to_key: impl Fn(&T) -> Key,
    ) -> crate::Result<Vec<SignificantTermBucket>> {
        let mut buckets = Vec::new();
        for (term, doc_count) in term_counts {
            if doc_count < self.req.min_doc_count {
                continue;
            }
            let bg_count = background_frequency(&term)?;
            buckets.push(SignificantTermBucket {
                key: to_key(&term),
                doc_count,
                bg_count,
                score: jlh_score(doc_count, subset_size, bg_count, superset_size),
            });
        }
        let buckets: Vec<SignificantTermBucket> = buckets
            .into_iter()
            .sorted_by(|left, right| {
                right
                    .score
                    .total_cmp(&left.score)
                    .then_with(|| left.key.cmp(&right.key))
            })
            .take(self.req.shard_size as usize)
            .filter(|bucket| bucket.score > 0.0)
            .take(self.req.size as usize)
            .collect();
        self.limits
            .validate_bucket_count(buckets.len())
            .map_err(|err| {
                warn!("significant terms aggregation {}: {err}", self.link.name());
                err
            })?;
        Ok(buckets)
    }

    /// Builds the result of a collector.
    pub(crate) fn build_result<T>(
        &self,
        term_counts: impl Iterator<Item = (T, u64)>,
        subset_size: u64,
        background: &mut dyn BackgroundFrequencyProvider,
        mut background_frequency: impl FnMut(
            &mut dyn BackgroundFrequencyProvider,
            &T,
        ) -> crate::Result<u64>,
        to_key: impl Fn(&T) -> Key,
    ) -> crate::Result<SignificantTermsResult> {
        let superset_size = background.superset_size();
        let buckets = self.build_buckets(
            term_counts,
            subset_size,
            superset_size,
            |term| background_frequency(&mut *background, term),
            to_key,
        )?;
        debug!(
            "significant terms aggregation {} kept {} buckets out of {subset_size} docs",
            self.link.name(),
            buckets.len()
        );
        Ok(SignificantTermsResult {
            doc_count: subset_size,
            bg_count: superset_size,
            buckets,
        })
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;

    use super::*;
    use crate::aggregation::agg_req::SignificantTermsAggregation;
    use crate::aggregation::bucket::BucketAggregationMode;
    use crate::aggregation::AggregationError;
    use crate::SigTermsError;

    fn params(
        size: u32,
        shard_size: u32,
        min_doc_count: u64,
        limits: AggregationLimits,
    ) -> CollectorParams {
        let req = SignificantTermsAggregation {
            field: "tags".to_string(),
            size: Some(size),
            shard_size: Some(shard_size),
            min_doc_count: Some(min_doc_count),
            ..Default::default()
        };
        CollectorParams::new(
            SignificantTermsAggregationInternal::from_req(&req),
            AggregatorLink::new("sig", BucketAggregationMode::PerBucket, None),
            limits,
        )
    }

    fn key(term: &&str) -> Key {
        Key::Str(term.to_string())
    }

    #[test]
    fn test_buckets_ranked_by_score_then_key() -> crate::Result<()> {
        let params = params(10, 10, 1, AggregationLimits::default());
        let bg: FxHashMap<&str, u64> = [("a", 10), ("b", 2), ("c", 2), ("d", 50)]
            .into_iter()
            .collect();
        let buckets = params.build_buckets(
            [("a", 5), ("c", 2), ("b", 2), ("d", 5)].into_iter(),
            10,
            100,
            |term| Ok(bg[term]),
            key,
        )?;
        let keys: Vec<String> = buckets.iter().map(|bucket| bucket.key.to_string()).collect();
        // "d" is not more frequent in the foreground than in the background
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(buckets[0].score > buckets[1].score);
        assert_eq!(buckets[1].score, buckets[2].score);
        Ok(())
    }

    #[test]
    fn test_min_doc_count_skips_background_lookup() -> crate::Result<()> {
        let params = params(10, 10, 3, AggregationLimits::default());
        let mut looked_up = Vec::new();
        let buckets = params.build_buckets(
            [("a", 3), ("b", 2)].into_iter(),
            10,
            100,
            |term| {
                looked_up.push(term.to_string());
                Ok(1)
            },
            key,
        )?;
        assert_eq!(looked_up, vec!["a".to_string()]);
        assert_eq!(buckets.len(), 1);
        Ok(())
    }

    #[test]
    fn test_shard_size_then_size() -> crate::Result<()> {
        let params = params(2, 3, 1, AggregationLimits::default());
        let buckets = params.build_buckets(
            [("a", 4), ("b", 3), ("c", 2), ("d", 1)].into_iter(),
            10,
            100,
            |_| Ok(1),
            key,
        )?;
        let keys: Vec<String> = buckets.iter().map(|bucket| bucket.key.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn test_bucket_limit() {
        let params = params(10, 10, 1, AggregationLimits::new(None, Some(1)));
        let err = params
            .build_buckets(
                [("a", 4), ("b", 3)].into_iter(),
                10,
                100,
                |_| Ok(1),
                key,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SigTermsError::AggregationError(AggregationError::BucketLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_memory_is_released_with_params() -> crate::Result<()> {
        let limits = AggregationLimits::default();
        let mut collector_params = params(10, 10, 1, limits.clone());
        collector_params.add_memory_consumed(100)?;
        collector_params.add_memory_consumed(0)?;
        assert_eq!(limits.memory_consumed().get_bytes(), 100);
        drop(collector_params);
        assert_eq!(limits.memory_consumed().get_bytes(), 0);
        Ok(())
    }
}
