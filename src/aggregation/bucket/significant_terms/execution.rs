//! Selection of the collection strategy of a significant terms aggregation.
//!
//! Term ordinals of a dictionary encoded column can be used directly as bucket indexes, which
//! avoids hashing every term. This is only correct when
//! - the values source has ordinals,
//! - no include/exclude filter narrows the term set,
//! - no ancestor aggregation reuses the collector across several of its own buckets.
//!
//! Otherwise terms are collected in a hash map.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregation::values_source::ValueSourceCapability;
use crate::SigTermsError;

/// Execution hint value forcing hash map based collection.
pub const EXECUTION_HINT_VALUE_MAP: &str = "map";
/// Execution hint value forcing term ordinal based collection.
pub const EXECUTION_HINT_VALUE_ORDINALS: &str = "ordinals";

/// How byte terms are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Terms are keys of a hash map.
    Map,
    /// Term ordinals index a vector of counts.
    Ordinals,
}

impl ExecutionMode {
    /// Parses an optional execution hint.
    pub fn from_hint(execution_hint: Option<&str>) -> crate::Result<Option<ExecutionMode>> {
        execution_hint.map(ExecutionMode::from_str).transpose()
    }

    /// The hint value of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Map => EXECUTION_HINT_VALUE_MAP,
            ExecutionMode::Ordinals => EXECUTION_HINT_VALUE_ORDINALS,
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = SigTermsError;

    fn from_str(execution_hint: &str) -> crate::Result<ExecutionMode> {
        match execution_hint {
            EXECUTION_HINT_VALUE_MAP => Ok(ExecutionMode::Map),
            EXECUTION_HINT_VALUE_ORDINALS => Ok(ExecutionMode::Ordinals),
            _ => Err(SigTermsError::InvalidArgument(format!(
                "execution_hint can only be '{EXECUTION_HINT_VALUE_MAP}' or \
                 '{EXECUTION_HINT_VALUE_ORDINALS}', not {execution_hint}"
            ))),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an aggregator deals with the buckets of its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketAggregationMode {
    /// A separate aggregator instance collects every parent bucket.
    PerBucket,
    /// A single aggregator instance collects all parent buckets.
    MultiBuckets,
}

/// A node of the chain of aggregators enclosing a collector.
///
/// Links only point upward, to the parent.
#[derive(Debug)]
pub struct AggregatorLink {
    name: String,
    bucket_mode: BucketAggregationMode,
    parent: Option<Arc<AggregatorLink>>,
}

impl AggregatorLink {
    /// Creates a link below `parent`, or a root link if `parent` is `None`.
    pub fn new(
        name: impl Into<String>,
        bucket_mode: BucketAggregationMode,
        parent: Option<Arc<AggregatorLink>>,
    ) -> Arc<AggregatorLink> {
        Arc::new(AggregatorLink {
            name: name.into(),
            bucket_mode,
            parent,
        })
    }

    /// Name of the aggregation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket aggregation mode of the aggregator.
    pub fn bucket_aggregation_mode(&self) -> BucketAggregationMode {
        self.bucket_mode
    }

    /// The enclosing aggregator, if any.
    pub fn parent(&self) -> Option<&AggregatorLink> {
        self.parent.as_deref()
    }

    /// Iterates over `self` and its ancestors, up to the root.
    pub fn ancestors_and_self(&self) -> impl Iterator<Item = &AggregatorLink> {
        std::iter::successors(Some(self), |link| link.parent())
    }

    /// Number of links from `self` to the root, `self` included.
    pub fn depth(&self) -> usize {
        self.ancestors_and_self().count()
    }
}

/// Returns true if any aggregator of the chain starting at `parent` collects per bucket.
pub fn has_parent_bucket_aggregator(parent: Option<&AggregatorLink>) -> bool {
    parent.is_some_and(|parent| {
        parent
            .ancestors_and_self()
            .any(|link| link.bucket_aggregation_mode() == BucketAggregationMode::PerBucket)
    })
}

/// Picks the execution mode of a significant terms aggregation.
///
/// `execution_hint` must be `None`, `"map"` or `"ordinals"`.
///
/// Numerical values are always collected in a hash map keyed by value: the mode returned for
/// them is [`ExecutionMode::Map`]. Floating point values cannot be analyzed.
pub fn select_mode(
    capability: ValueSourceCapability,
    has_include_exclude: bool,
    parent: Option<&AggregatorLink>,
    execution_hint: Option<&str>,
) -> crate::Result<ExecutionMode> {
    let execution_hint = ExecutionMode::from_hint(execution_hint)?;
    select_execution_mode(capability, has_include_exclude, parent, execution_hint)
}

/// Same as [`select_mode`], with an already parsed hint.
pub(crate) fn select_execution_mode(
    capability: ValueSourceCapability,
    has_include_exclude: bool,
    parent: Option<&AggregatorLink>,
    execution_hint: Option<ExecutionMode>,
) -> crate::Result<ExecutionMode> {
    let mode = match capability {
        ValueSourceCapability::NumericFloating => {
            return Err(SigTermsError::UnsupportedCapability(
                "No support for examining floating point numerics".to_string(),
            ));
        }
        ValueSourceCapability::NumericIntegral => ExecutionMode::Map,
        ValueSourceCapability::BytesWithoutOrdinals => {
            if execution_hint == Some(ExecutionMode::Ordinals) {
                return Err(SigTermsError::InvalidArgument(format!(
                    "execution_hint '{EXECUTION_HINT_VALUE_ORDINALS}' requires a field with \
                     ordinals"
                )));
            }
            ExecutionMode::Map
        }
        ValueSourceCapability::BytesWithOrdinals => {
            if has_include_exclude {
                if execution_hint == Some(ExecutionMode::Ordinals) {
                    debug!("include/exclude is set, ignoring execution_hint 'ordinals'");
                }
                ExecutionMode::Map
            } else if let Some(mode) = execution_hint {
                mode
            } else if has_parent_bucket_aggregator(parent) {
                ExecutionMode::Map
            } else {
                ExecutionMode::Ordinals
            }
        }
    };
    assert!(
        !(mode == ExecutionMode::Ordinals && has_include_exclude),
        "include/exclude cannot be applied in ordinals mode"
    );
    debug!("selected execution mode {mode} for {capability:?}");
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const CAPABILITIES: [ValueSourceCapability; 4] = [
        ValueSourceCapability::BytesWithOrdinals,
        ValueSourceCapability::BytesWithoutOrdinals,
        ValueSourceCapability::NumericIntegral,
        ValueSourceCapability::NumericFloating,
    ];

    fn chain(modes: &[BucketAggregationMode]) -> Option<Arc<AggregatorLink>> {
        modes.iter().enumerate().fold(None, |parent, (depth, mode)| {
            Some(AggregatorLink::new(format!("agg_{depth}"), *mode, parent))
        })
    }

    #[test]
    fn test_ordinals_by_default() -> crate::Result<()> {
        let mode = select_mode(ValueSourceCapability::BytesWithOrdinals, false, None, None)?;
        assert_eq!(mode, ExecutionMode::Ordinals);
        Ok(())
    }

    #[test]
    fn test_include_exclude_forces_map() -> crate::Result<()> {
        let mode = select_mode(ValueSourceCapability::BytesWithOrdinals, true, None, None)?;
        assert_eq!(mode, ExecutionMode::Map);
        let mode = select_mode(
            ValueSourceCapability::BytesWithOrdinals,
            true,
            None,
            Some("ordinals"),
        )?;
        assert_eq!(mode, ExecutionMode::Map);
        Ok(())
    }

    #[test]
    fn test_per_bucket_ancestor_forces_map() -> crate::Result<()> {
        let parent = chain(&[BucketAggregationMode::PerBucket]);
        let mode = select_mode(
            ValueSourceCapability::BytesWithOrdinals,
            false,
            parent.as_deref(),
            None,
        )?;
        assert_eq!(mode, ExecutionMode::Map);
        Ok(())
    }

    #[test]
    fn test_per_bucket_ancestor_deep_in_chain() -> crate::Result<()> {
        let mut modes = vec![BucketAggregationMode::PerBucket];
        modes.extend(std::iter::repeat(BucketAggregationMode::MultiBuckets).take(10_000));
        let parent = chain(&modes).unwrap();
        assert_eq!(parent.depth(), 10_001);
        assert!(has_parent_bucket_aggregator(Some(&parent)));
        let mode = select_mode(
            ValueSourceCapability::BytesWithOrdinals,
            false,
            Some(&parent),
            None,
        )?;
        assert_eq!(mode, ExecutionMode::Map);
        // dropping a long chain must not blow the stack either
        let mut link = Some(parent);
        while let Some(current) = link {
            link = Arc::try_unwrap(current)
                .ok()
                .and_then(|current| current.parent);
        }
        Ok(())
    }

    #[test]
    fn test_multi_buckets_ancestors_keep_ordinals() -> crate::Result<()> {
        let parent = chain(&[
            BucketAggregationMode::MultiBuckets,
            BucketAggregationMode::MultiBuckets,
        ]);
        assert!(!has_parent_bucket_aggregator(parent.as_deref()));
        let mode = select_mode(
            ValueSourceCapability::BytesWithOrdinals,
            false,
            parent.as_deref(),
            None,
        )?;
        assert_eq!(mode, ExecutionMode::Ordinals);
        Ok(())
    }

    #[test]
    fn test_hint_is_honored() -> crate::Result<()> {
        let parent = chain(&[BucketAggregationMode::PerBucket]);
        assert_eq!(
            select_mode(
                ValueSourceCapability::BytesWithOrdinals,
                false,
                None,
                Some("map")
            )?,
            ExecutionMode::Map
        );
        assert_eq!(
            select_mode(
                ValueSourceCapability::BytesWithOrdinals,
                false,
                parent.as_deref(),
                Some("ordinals")
            )?,
            ExecutionMode::Ordinals
        );
        Ok(())
    }

    #[test]
    fn test_bytes_without_ordinals() -> crate::Result<()> {
        assert_eq!(
            select_mode(ValueSourceCapability::BytesWithoutOrdinals, false, None, None)?,
            ExecutionMode::Map
        );
        for has_include_exclude in [false, true] {
            let err = select_mode(
                ValueSourceCapability::BytesWithoutOrdinals,
                has_include_exclude,
                None,
                Some("ordinals"),
            )
            .unwrap_err();
            assert!(matches!(err, SigTermsError::InvalidArgument(_)));
        }
        Ok(())
    }

    #[test]
    fn test_floating_point_unsupported() {
        for hint in [None, Some("map"), Some("ordinals")] {
            let err =
                select_mode(ValueSourceCapability::NumericFloating, false, None, hint).unwrap_err();
            assert!(matches!(err, SigTermsError::UnsupportedCapability(_)));
        }
    }

    #[test]
    fn test_invalid_hint_names_the_value() {
        let err = select_mode(
            ValueSourceCapability::BytesWithOrdinals,
            false,
            None,
            Some("global_ordinals"),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "An invalid argument was passed: 'execution_hint can only be 'map' or 'ordinals', \
             not global_ordinals'"
        );
    }

    #[test]
    fn test_execution_mode_serde() {
        let mode: ExecutionMode = serde_json::from_str("\"ordinals\"").unwrap();
        assert_eq!(mode, ExecutionMode::Ordinals);
        assert_eq!(ExecutionMode::Map.to_string(), "map");
        assert_eq!(ExecutionMode::from_hint(None).unwrap(), None);
    }

    fn capability_strategy() -> impl Strategy<Value = ValueSourceCapability> {
        (0..CAPABILITIES.len()).prop_map(|idx| CAPABILITIES[idx])
    }

    fn modes_strategy() -> impl Strategy<Value = Vec<BucketAggregationMode>> {
        proptest::collection::vec(
            prop_oneof![
                Just(BucketAggregationMode::PerBucket),
                Just(BucketAggregationMode::MultiBuckets)
            ],
            0..8,
        )
    }

    proptest! {
        #[test]
        fn test_invalid_hint_always_fails(
            capability in capability_strategy(),
            has_include_exclude in any::<bool>(),
            modes in modes_strategy(),
            hint in "[a-z_]{0,12}",
        ) {
            prop_assume!(hint != "map" && hint != "ordinals");
            let parent = chain(&modes);
            let res = select_mode(
                capability,
                has_include_exclude,
                parent.as_deref(),
                Some(hint.as_str()),
            );
            prop_assert!(matches!(res, Err(SigTermsError::InvalidArgument(_))));
        }

        #[test]
        fn test_selection_is_deterministic(
            capability in capability_strategy(),
            has_include_exclude in any::<bool>(),
            modes in modes_strategy(),
            hint in prop_oneof![Just(None), Just(Some("map")), Just(Some("ordinals"))],
        ) {
            let parent = chain(&modes);
            let first = select_mode(capability, has_include_exclude, parent.as_deref(), hint);
            let second = select_mode(capability, has_include_exclude, parent.as_deref(), hint);
            match (first, second) {
                (Ok(first), Ok(second)) => {
                    prop_assert_eq!(first, second);
                    prop_assert!(!(first == ExecutionMode::Ordinals && has_include_exclude));
                }
                (Err(first), Err(second)) => {
                    prop_assert_eq!(first.to_string(), second.to_string());
                }
                _ => prop_assert!(false, "selection is not deterministic"),
            }
        }
    }
}
