use std::sync::Arc;

use super::collector::{BackgroundFrequencyProvider, CollectorParams, SignificantTermsCollector};
use super::execution::{select_execution_mode, AggregatorLink, BucketAggregationMode, ExecutionMode};
use super::frequency_cache::FrequencyCache;
use super::include_exclude::IncludeExclude;
use super::long_terms::LongTermsCollector;
use super::string_terms::{MapStringTermsCollector, OrdinalsStringTermsCollector, TermsSource};
use super::unmapped::UnmappedCollector;
use crate::aggregation::agg_req::{
    SignificantTermsAggregation, SignificantTermsAggregationInternal,
};
use crate::aggregation::agg_result::SignificantTermsResult;
use crate::aggregation::values_source::{
    NumericFieldCodec, ValueSourceCapability, ValuesSource, ValuesSourceConfig,
};
use crate::aggregation::AggregationContext;
use crate::SigTermsError;

/// Creates the collectors of one significant terms aggregation, for one query execution on one
/// shard, and serves them background frequencies.
///
/// Many collectors of the same aggregation ask for the frequency of the same terms, so the
/// factory caches the document frequencies it reads from the index in a [`FrequencyCache`].
/// Lookups go through `&mut self`: collectors sharing a factory use it one after the other.
///
/// The cache is freed by [`release`](SignificantTermsAggregatorFactory::release), or when the
/// factory is dropped, whichever comes first.
pub struct SignificantTermsAggregatorFactory {
    name: String,
    req: SignificantTermsAggregationInternal,
    config: ValuesSourceConfig,
    include_exclude: Option<Arc<IncludeExclude>>,
    execution_hint: Option<ExecutionMode>,
    execution_mode: Option<ExecutionMode>,
    codec: Option<NumericFieldCodec>,
    context: AggregationContext,
    cache: Option<FrequencyCache>,
}

impl SignificantTermsAggregatorFactory {
    /// Creates the factory of the aggregation `name`.
    ///
    /// Fails if the execution hint is neither `"map"` nor `"ordinals"`, if the include or
    /// exclude regex is invalid, or if the memory limit does not leave room for the cache.
    pub fn new(
        name: impl Into<String>,
        req: &SignificantTermsAggregation,
        config: ValuesSourceConfig,
        context: AggregationContext,
    ) -> crate::Result<SignificantTermsAggregatorFactory> {
        let name = name.into();
        let execution_hint = ExecutionMode::from_hint(req.execution_hint.as_deref())?;
        let include_exclude =
            IncludeExclude::new(req.include.as_ref(), req.exclude.as_ref())?.map(Arc::new);
        let codec = config
            .column_type()
            .and_then(NumericFieldCodec::for_column_type);
        let cache = FrequencyCache::new(
            context.settings.initial_num_term_freqs_cached,
            &context.limits,
        )?;
        debug!(
            "created significant terms factory {name} on field {:?} (unmapped: {})",
            config.field(),
            config.is_unmapped()
        );
        Ok(SignificantTermsAggregatorFactory {
            name,
            req: SignificantTermsAggregationInternal::from_req(req),
            config,
            include_exclude,
            execution_hint,
            execution_mode: None,
            codec,
            context,
            cache: Some(cache),
        })
    }

    /// Name of the aggregation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The values source config the factory was created with.
    pub fn values_source_config(&self) -> &ValuesSourceConfig {
        &self.config
    }

    /// The execution mode picked by the first successful [`create`](Self::create), if any.
    pub fn execution_mode(&self) -> Option<ExecutionMode> {
        self.execution_mode
    }

    fn link(&self, parent: Option<&Arc<AggregatorLink>>) -> Arc<AggregatorLink> {
        AggregatorLink::new(
            self.name.clone(),
            BucketAggregationMode::PerBucket,
            parent.cloned(),
        )
    }

    /// Returns the collector of a field which does not exist on the shard.
    ///
    /// The collector yields zero buckets, and touches neither the cache nor the index.
    pub fn create_unmapped(
        &self,
        parent: Option<&Arc<AggregatorLink>>,
    ) -> Box<dyn SignificantTermsCollector> {
        debug!("significant terms aggregation {}: field is not mapped", self.name);
        Box::new(UnmappedCollector::new(self.link(parent)))
    }

    /// Returns the collector of the values source of the shard, or the unmapped collector if
    /// there is none.
    pub fn create_collector(
        &mut self,
        values_source: Option<&ValuesSource>,
        parent: Option<&Arc<AggregatorLink>>,
    ) -> crate::Result<Box<dyn SignificantTermsCollector>> {
        match values_source {
            Some(values_source) if !self.config.is_unmapped() => {
                self.create(values_source, 1, parent)
            }
            _ => Ok(self.create_unmapped(parent)),
        }
    }

    /// Upper bound of the number of buckets, used to pre-size the collectors.
    pub fn estimated_bucket_count(&self, values_source: &ValuesSource) -> u64 {
        let settings = &self.context.settings;
        values_source
            .max_unique_values()
            .unwrap_or(settings.default_estimated_bucket_count)
            .min(settings.max_estimated_bucket_count)
    }

    /// Returns the collector matching the values source, bound to this factory for background
    /// frequencies.
    ///
    /// `expected_buckets_count` is the number of buckets the parent aggregation expects to
    /// create. The execution mode is picked by the first call and reused by the next ones.
    ///
    /// Fails with
    /// - `UnsupportedCapability` for floating point values,
    /// - `AggregationExecution` if include/exclude is set on a field which does not hold byte
    ///   terms,
    /// - `InvalidAggregationTarget` if the values can be analyzed neither as terms nor as
    ///   numbers,
    /// - `InvalidArgument` if the execution hint asks for ordinals the field does not have.
    pub fn create(
        &mut self,
        values_source: &ValuesSource,
        expected_buckets_count: u64,
        parent: Option<&Arc<AggregatorLink>>,
    ) -> crate::Result<Box<dyn SignificantTermsCollector>> {
        let capability = values_source.capability();
        if capability == Some(ValueSourceCapability::NumericFloating) {
            return Err(SigTermsError::UnsupportedCapability(
                "No support for examining floating point numerics".to_string(),
            ));
        }
        let is_bytes = capability.is_some_and(ValueSourceCapability::is_bytes);
        if self.include_exclude.is_some() && !is_bytes {
            return Err(SigTermsError::AggregationExecution(format!(
                "Aggregation [{}] cannot support the include/exclude settings as it can only be \
                 applied to string values",
                self.name
            )));
        }
        let Some(capability) = capability else {
            return Err(self.invalid_target());
        };
        let mode = match self.execution_mode {
            Some(mode) => mode,
            None => select_execution_mode(
                capability,
                self.include_exclude.is_some(),
                parent.map(|parent| &**parent),
                self.execution_hint,
            )?,
        };
        let estimated_bucket_count = self.estimated_bucket_count(values_source);
        debug!(
            "significant terms aggregation {}: {mode} collector, {estimated_bucket_count} \
             estimated buckets, {expected_buckets_count} expected parent buckets",
            self.name
        );
        let params = CollectorParams::new(
            self.req.clone(),
            self.link(parent),
            self.context.limits.clone(),
        );
        let collector: Box<dyn SignificantTermsCollector> = match (values_source, mode) {
            (ValuesSource::Str(column), ExecutionMode::Ordinals) => {
                Box::new(OrdinalsStringTermsCollector::new(params, column.clone())?)
            }
            (ValuesSource::Str(column), ExecutionMode::Map) => {
                let source = TermsSource::str(column.clone(), self.include_exclude.as_deref());
                Box::new(MapStringTermsCollector::new(
                    params,
                    source,
                    estimated_bucket_count,
                )?)
            }
            (ValuesSource::Bytes(column), _) => {
                let source = TermsSource::bytes(column.clone(), self.include_exclude.clone());
                Box::new(MapStringTermsCollector::new(
                    params,
                    source,
                    estimated_bucket_count,
                )?)
            }
            (ValuesSource::Numeric(column), _) => {
                let codec = NumericFieldCodec::for_column_type(column.column_type())
                    .ok_or_else(|| self.invalid_target())?;
                Box::new(LongTermsCollector::new(
                    params,
                    column.clone(),
                    codec,
                    estimated_bucket_count,
                )?)
            }
            (ValuesSource::Opaque { .. }, _) => return Err(self.invalid_target()),
        };
        self.execution_mode = Some(mode);
        Ok(collector)
    }

    fn invalid_target(&self) -> SigTermsError {
        SigTermsError::InvalidAggregationTarget(format!(
            "significant_terms aggregation cannot be applied to field [{}]. It can only be \
             applied to numeric or string fields.",
            self.config.field()
        ))
    }

    /// Number of documents of the shard containing `term`, read from the cache or the index.
    pub fn get_background_frequency(&mut self, term: &[u8]) -> crate::Result<u64> {
        let doc_freqs = &self.context.doc_freqs;
        let field = self.config.field();
        let cache = self
            .cache
            .as_mut()
            .ok_or_else(|| released_error(&self.name))?;
        cache.get_or_compute(term, |term| doc_freqs.doc_freq(field, term))
    }

    /// Number of documents of the shard containing the numerical term `value`.
    ///
    /// The value is translated to its indexed term by the codec of the field.
    pub fn get_background_frequency_for_value(&mut self, value: i64) -> crate::Result<u64> {
        let Some(codec) = self.codec else {
            return Err(SigTermsError::AggregationExecution(format!(
                "field [{}] does not hold discrete numerical values",
                self.config.field()
            )));
        };
        let doc_freqs = &self.context.doc_freqs;
        let field = self.config.field();
        let cache = self
            .cache
            .as_mut()
            .ok_or_else(|| released_error(&self.name))?;
        cache.get_or_compute_value(value, &codec, |term| doc_freqs.doc_freq(field, term))
    }

    /// Builds the result of a collector created by this factory.
    pub fn build_result(
        &mut self,
        collector: &dyn SignificantTermsCollector,
    ) -> crate::Result<SignificantTermsResult> {
        collector.build_result(self)
    }

    /// The background frequency cache, `None` once released.
    pub fn cache(&self) -> Option<&FrequencyCache> {
        self.cache.as_ref()
    }

    /// Returns true once the cache has been freed.
    pub fn is_released(&self) -> bool {
        self.cache.is_none()
    }

    /// Frees the background frequency cache, and gives its memory back to the aggregation
    /// limits. Releasing twice is a no-op.
    pub fn release(&mut self) {
        if let Some(cache) = self.cache.take() {
            debug!(
                "releasing significant terms aggregation {}: {} cached terms, {} bytes",
                self.name,
                cache.num_ordinals(),
                cache.memory_consumption()
            );
        }
    }
}

fn released_error(name: &str) -> SigTermsError {
    SigTermsError::AggregationExecution(format!(
        "significant terms aggregation {name} was released"
    ))
}

impl BackgroundFrequencyProvider for SignificantTermsAggregatorFactory {
    fn background_frequency(&mut self, term: &[u8]) -> crate::Result<u64> {
        self.get_background_frequency(term)
    }

    fn background_frequency_for_value(&mut self, value: i64) -> crate::Result<u64> {
        self.get_background_frequency_for_value(value)
    }

    fn superset_size(&self) -> u64 {
        self.context.doc_freqs.num_docs()
    }
}

impl Drop for SignificantTermsAggregatorFactory {
    fn drop(&mut self) {
        self.release();
    }
}
