//! Collectors of byte terms.

use std::fmt;
use std::sync::Arc;

use common::BitSet;
use rustc_hash::FxHashMap;

use super::collector::{
    BackgroundFrequencyProvider, CollectorParams, CollectorVariant, SignificantTermsCollector,
};
use super::execution::AggregatorLink;
use super::include_exclude::IncludeExclude;
use crate::aggregation::agg_result::SignificantTermsResult;
use crate::aggregation::values_source::{BytesColumn, StrColumn};
use crate::aggregation::{Key, MemoryConsumption};
use crate::{DocId, SigTermsError, TermOrdinal};

/// Where the MAP collector reads its terms from.
pub(crate) enum TermsSource {
    /// A dictionary encoded column. The filter is resolved against the dictionary upfront.
    Str {
        column: StrColumn,
        allowed_term_ords: Option<BitSet>,
    },
    /// Raw bytes. The filter is applied to every value.
    Bytes {
        column: BytesColumn,
        include_exclude: Option<Arc<IncludeExclude>>,
    },
}

impl TermsSource {
    pub(crate) fn str(column: StrColumn, include_exclude: Option<&IncludeExclude>) -> TermsSource {
        let allowed_term_ords =
            include_exclude.map(|include_exclude| include_exclude.allowed_term_ords(&column));
        TermsSource::Str {
            column,
            allowed_term_ords,
        }
    }

    pub(crate) fn bytes(
        column: BytesColumn,
        include_exclude: Option<Arc<IncludeExclude>>,
    ) -> TermsSource {
        TermsSource::Bytes {
            column,
            include_exclude,
        }
    }

    /// Calls `cb` for every accepted distinct term of `doc`.
    fn for_each_term(&self, doc: DocId, mut cb: impl FnMut(&[u8])) {
        match self {
            TermsSource::Str {
                column,
                allowed_term_ords,
            } => {
                for &term_ord in column.term_ords(doc) {
                    if let Some(allowed) = allowed_term_ords {
                        if !allowed.contains(term_ord as u32) {
                            continue;
                        }
                    }
                    if let Some(term) = column.ord_to_term(term_ord) {
                        cb(term);
                    }
                }
            }
            TermsSource::Bytes {
                column,
                include_exclude,
            } => {
                for term in column.values(doc) {
                    if include_exclude
                        .as_ref()
                        .map_or(true, |include_exclude| include_exclude.accept(term))
                    {
                        cb(term);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for TermsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermsSource::Str {
                column,
                allowed_term_ords,
            } => f
                .debug_struct("Str")
                .field("num_terms", &column.num_terms())
                .field(
                    "num_allowed_terms",
                    &allowed_term_ords.as_ref().map(BitSet::len),
                )
                .finish(),
            TermsSource::Bytes {
                column,
                include_exclude,
            } => f
                .debug_struct("Bytes")
                .field("num_docs", &column.num_docs())
                .field("include_exclude", include_exclude)
                .finish(),
        }
    }
}

/// The key of a byte term. Terms which are not valid UTF-8 are converted lossily.
fn term_key(term: &[u8]) -> Key {
    Key::Str(String::from_utf8_lossy(term).into_owned())
}

/// Counts byte terms in a hash map keyed by the term bytes.
#[derive(Debug)]
pub(crate) struct MapStringTermsCollector {
    params: CollectorParams,
    source: TermsSource,
    term_counts: FxHashMap<Box<[u8]>, u64>,
    term_bytes: usize,
    subset_size: u64,
}

impl MapStringTermsCollector {
    pub(crate) fn new(
        mut params: CollectorParams,
        source: TermsSource,
        estimated_bucket_count: u64,
    ) -> crate::Result<Self> {
        let mut term_counts = FxHashMap::default();
        term_counts.reserve(estimated_bucket_count as usize);
        params.add_memory_consumed(term_counts.memory_consumption())?;
        Ok(MapStringTermsCollector {
            params,
            source,
            term_counts,
            term_bytes: 0,
            subset_size: 0,
        })
    }

    fn get_memory_consumption(&self) -> usize {
        self.term_counts.memory_consumption() + self.term_bytes
    }
}

impl SignificantTermsCollector for MapStringTermsCollector {
    fn variant(&self) -> CollectorVariant {
        CollectorVariant::StringMap
    }

    fn link(&self) -> &Arc<AggregatorLink> {
        &self.params.link
    }

    fn subset_size(&self) -> u64 {
        self.subset_size
    }

    fn collect_block(&mut self, docs: &[DocId]) -> crate::Result<()> {
        let mem_pre = self.get_memory_consumption();
        let term_counts = &mut self.term_counts;
        let term_bytes = &mut self.term_bytes;
        for &doc in docs {
            self.source.for_each_term(doc, |term| {
                if let Some(count) = term_counts.get_mut(term) {
                    *count += 1;
                } else {
                    term_counts.insert(Box::from(term), 1);
                    *term_bytes += term.len();
                }
            });
        }
        self.subset_size += docs.len() as u64;
        let mem_delta = self.get_memory_consumption().saturating_sub(mem_pre);
        self.params.add_memory_consumed(mem_delta)
    }

    fn build_result(
        &self,
        background: &mut dyn BackgroundFrequencyProvider,
    ) -> crate::Result<SignificantTermsResult> {
        self.params.build_result(
            self.term_counts
                .iter()
                .map(|(term, count)| (&term[..], *count)),
            self.subset_size,
            background,
            |background, term| background.background_frequency(term),
            |term| term_key(term),
        )
    }
}

/// Counts the terms of a dictionary encoded column in a vector indexed by term ordinal.
///
/// The column must not be shared by several parent buckets, and no filter can apply.
#[derive(Debug)]
pub(crate) struct OrdinalsStringTermsCollector {
    params: CollectorParams,
    column: StrColumn,
    term_counts: Vec<u64>,
    subset_size: u64,
}

impl OrdinalsStringTermsCollector {
    pub(crate) fn new(mut params: CollectorParams, column: StrColumn) -> crate::Result<Self> {
        let term_counts = vec![0u64; column.num_terms()];
        params.add_memory_consumed(term_counts.memory_consumption())?;
        Ok(OrdinalsStringTermsCollector {
            params,
            column,
            term_counts,
            subset_size: 0,
        })
    }
}

impl SignificantTermsCollector for OrdinalsStringTermsCollector {
    fn variant(&self) -> CollectorVariant {
        CollectorVariant::StringOrdinals
    }

    fn link(&self) -> &Arc<AggregatorLink> {
        &self.params.link
    }

    fn subset_size(&self) -> u64 {
        self.subset_size
    }

    fn collect_block(&mut self, docs: &[DocId]) -> crate::Result<()> {
        for &doc in docs {
            for &term_ord in self.column.term_ords(doc) {
                self.term_counts[term_ord as usize] += 1;
            }
        }
        self.subset_size += docs.len() as u64;
        Ok(())
    }

    fn build_result(
        &self,
        background: &mut dyn BackgroundFrequencyProvider,
    ) -> crate::Result<SignificantTermsResult> {
        let column = &self.column;
        let term_for_ord = |term_ord: TermOrdinal| {
            column.ord_to_term(term_ord).ok_or_else(|| {
                SigTermsError::AggregationExecution(format!(
                    "term ordinal {term_ord} is out of the dictionary"
                ))
            })
        };
        self.params.build_result(
            self.term_counts
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .map(|(term_ord, &count)| (term_ord as TermOrdinal, count)),
            self.subset_size,
            background,
            |background, &term_ord| background.background_frequency(term_for_ord(term_ord)?),
            |&term_ord| term_key(column.ord_to_term(term_ord).unwrap_or_default()),
        )
    }
}
