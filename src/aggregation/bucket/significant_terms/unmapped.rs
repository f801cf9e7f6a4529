use std::sync::Arc;

use super::collector::{BackgroundFrequencyProvider, CollectorVariant, SignificantTermsCollector};
use super::execution::AggregatorLink;
use crate::aggregation::agg_result::SignificantTermsResult;
use crate::DocId;

/// Collector of a field which does not exist on the shard.
///
/// Only counts the collected documents. It never reads the index nor the background frequency
/// cache, and always returns zero buckets.
#[derive(Debug)]
pub(crate) struct UnmappedCollector {
    link: Arc<AggregatorLink>,
    subset_size: u64,
}

impl UnmappedCollector {
    pub(crate) fn new(link: Arc<AggregatorLink>) -> Self {
        UnmappedCollector {
            link,
            subset_size: 0,
        }
    }
}

impl SignificantTermsCollector for UnmappedCollector {
    fn variant(&self) -> CollectorVariant {
        CollectorVariant::Unmapped
    }

    fn link(&self) -> &Arc<AggregatorLink> {
        &self.link
    }

    fn subset_size(&self) -> u64 {
        self.subset_size
    }

    fn collect_block(&mut self, docs: &[DocId]) -> crate::Result<()> {
        self.subset_size += docs.len() as u64;
        Ok(())
    }

    fn build_result(
        &self,
        _background: &mut dyn BackgroundFrequencyProvider,
    ) -> crate::Result<SignificantTermsResult> {
        Ok(SignificantTermsResult::empty(self.subset_size, 0))
    }
}
