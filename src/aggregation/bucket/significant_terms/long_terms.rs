use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::collector::{
    BackgroundFrequencyProvider, CollectorParams, CollectorVariant, SignificantTermsCollector,
};
use super::execution::AggregatorLink;
use crate::aggregation::agg_result::SignificantTermsResult;
use crate::aggregation::values_source::{NumericColumn, NumericFieldCodec};
use crate::aggregation::MemoryConsumption;
use crate::DocId;

/// Counts discrete numerical values in a hash map keyed by term value.
///
/// Background frequencies are looked up by value, through the codec of the field.
#[derive(Debug)]
pub(crate) struct LongTermsCollector {
    params: CollectorParams,
    column: NumericColumn,
    codec: NumericFieldCodec,
    term_counts: FxHashMap<i64, u64>,
    subset_size: u64,
}

impl LongTermsCollector {
    pub(crate) fn new(
        mut params: CollectorParams,
        column: NumericColumn,
        codec: NumericFieldCodec,
        estimated_bucket_count: u64,
    ) -> crate::Result<Self> {
        let mut term_counts = FxHashMap::default();
        term_counts.reserve(estimated_bucket_count as usize);
        params.add_memory_consumed(term_counts.memory_consumption())?;
        Ok(LongTermsCollector {
            params,
            column,
            codec,
            term_counts,
            subset_size: 0,
        })
    }
}

impl SignificantTermsCollector for LongTermsCollector {
    fn variant(&self) -> CollectorVariant {
        CollectorVariant::Long
    }

    fn link(&self) -> &Arc<AggregatorLink> {
        &self.params.link
    }

    fn subset_size(&self) -> u64 {
        self.subset_size
    }

    fn collect_block(&mut self, docs: &[DocId]) -> crate::Result<()> {
        let mem_pre = self.term_counts.memory_consumption();
        for &doc in docs {
            for &val in self.column.values(doc) {
                let term_value = self.column.to_term_value(val);
                *self.term_counts.entry(term_value).or_insert(0) += 1;
            }
        }
        self.subset_size += docs.len() as u64;
        let mem_delta = self
            .term_counts
            .memory_consumption()
            .saturating_sub(mem_pre);
        self.params.add_memory_consumed(mem_delta)
    }

    fn build_result(
        &self,
        background: &mut dyn BackgroundFrequencyProvider,
    ) -> crate::Result<SignificantTermsResult> {
        self.params.build_result(
            self.term_counts
                .iter()
                .map(|(&term_value, &count)| (term_value, count)),
            self.subset_size,
            background,
            |background, &term_value| background.background_frequency_for_value(term_value),
            |&term_value| self.codec.key(term_value),
        )
    }
}

#[cfg(test)]
mod tests {
    use common::i64_to_u64;

    use super::*;
    use crate::aggregation::agg_req::{
        SignificantTermsAggregation, SignificantTermsAggregationInternal,
    };
    use crate::aggregation::bucket::BucketAggregationMode;
    use crate::aggregation::{AggregationLimits, Key};
    use crate::schema::ColumnType;

    struct ValueBackground {
        num_docs: u64,
        looked_up_values: Vec<i64>,
    }

    impl BackgroundFrequencyProvider for ValueBackground {
        fn background_frequency(&mut self, _term: &[u8]) -> crate::Result<u64> {
            unreachable!("numerical terms are looked up by value")
        }

        fn background_frequency_for_value(&mut self, value: i64) -> crate::Result<u64> {
            self.looked_up_values.push(value);
            Ok(if value < 0 { 2 } else { 5 })
        }

        fn superset_size(&self) -> u64 {
            self.num_docs
        }
    }

    fn collector(
        column_type: ColumnType,
        docs: Vec<Vec<u64>>,
    ) -> crate::Result<LongTermsCollector> {
        let req = SignificantTermsAggregation {
            field: "num".to_string(),
            min_doc_count: Some(1),
            ..Default::default()
        };
        LongTermsCollector::new(
            CollectorParams::new(
                SignificantTermsAggregationInternal::from_req(&req),
                AggregatorLink::new("sig", BucketAggregationMode::PerBucket, None),
                AggregationLimits::default(),
            ),
            NumericColumn::from_docs(column_type, docs),
            NumericFieldCodec::for_column_type(column_type).unwrap(),
            8,
        )
    }

    #[test]
    fn test_long_terms() -> crate::Result<()> {
        let mut collector = collector(
            ColumnType::I64,
            vec![
                vec![i64_to_u64(-3), i64_to_u64(7)],
                vec![i64_to_u64(-3)],
                vec![i64_to_u64(7)],
            ],
        )?;
        assert_eq!(collector.variant(), CollectorVariant::Long);
        collector.collect_block(&[0, 1])?;
        let mut background = ValueBackground {
            num_docs: 100,
            looked_up_values: Vec::new(),
        };
        let result = collector.build_result(&mut background)?;
        assert_eq!(result.doc_count, 2);
        background.looked_up_values.sort_unstable();
        assert_eq!(background.looked_up_values, vec![-3, 7]);
        let keys: Vec<Key> = result.buckets.iter().map(|bucket| bucket.key.clone()).collect();
        assert_eq!(keys, vec![Key::I64(-3), Key::I64(7)]);
        assert_eq!(result.buckets[0].bg_count, 2);
        Ok(())
    }

    #[test]
    fn test_bool_keys() -> crate::Result<()> {
        let mut collector = collector(ColumnType::Bool, vec![vec![1], vec![1], vec![0]])?;
        collector.collect_block(&[0, 1])?;
        let result = collector.build_result(&mut ValueBackground {
            num_docs: 1_000,
            looked_up_values: Vec::new(),
        })?;
        assert_eq!(result.buckets.len(), 1);
        assert_eq!(result.buckets[0].key, Key::U64(1));
        assert_eq!(result.buckets[0].doc_count, 2);
        Ok(())
    }
}
