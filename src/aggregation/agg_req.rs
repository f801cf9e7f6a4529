//! Contains the aggregation request.
//!
//! Requests are compatible with the elasticsearch JSON request format.
//!
//! ```
//! use sigterms::aggregation::agg_req::Aggregation;
//!
//! let elasticsearch_compatible_json_req = r#"
//! {
//!   "significant_terms": {
//!     "field": "tags",
//!     "size": 5,
//!     "exclude": ["common"],
//!     "execution_hint": "map"
//!   }
//! }
//! "#;
//! let agg_req: Aggregation = serde_json::from_str(elasticsearch_compatible_json_req).unwrap();
//! ```

use serde::{Deserialize, Serialize};

/// The default number of returned buckets.
pub const DEFAULT_SIZE: u32 = 10;

/// The default `min_doc_count` of significant terms.
pub const DEFAULT_MIN_DOC_COUNT: u64 = 3;

/// An aggregation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Aggregation {
    /// Significant terms, see [`SignificantTermsAggregation`].
    #[serde(rename = "significant_terms")]
    SignificantTerms(SignificantTermsAggregation),
}

impl Aggregation {
    /// The field the aggregation runs on.
    pub fn field(&self) -> &str {
        match self {
            Aggregation::SignificantTerms(req) => &req.field,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Restricts the terms considered by a terms-like aggregation.
pub enum IncludeExcludeParam {
    /// A single string pattern is treated as regex.
    Regex(String),
    /// An array of strings is treated as exact values.
    Values(Vec<String>),
}

impl Serialize for IncludeExcludeParam {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: serde::Serializer {
        match self {
            IncludeExcludeParam::Regex(s) => serializer.serialize_str(s),
            IncludeExcludeParam::Values(v) => v.serialize(serializer),
        }
    }
}

// Custom deserializer to accept either a single string (regex) or an array of strings (values).
impl<'de> Deserialize<'de> for IncludeExcludeParam {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: serde::Deserializer<'de> {
        use serde::de::{self, SeqAccess, Visitor};
        struct IncludeExcludeVisitor;

        impl<'de> Visitor<'de> for IncludeExcludeVisitor {
            type Value = IncludeExcludeParam;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string (regex) or an array of strings")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where E: de::Error {
                Ok(IncludeExcludeParam::Regex(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where E: de::Error {
                Ok(IncludeExcludeParam::Regex(v))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where A: SeqAccess<'de> {
                let mut values: Vec<String> = Vec::new();
                while let Some(elem) = seq.next_element::<String>()? {
                    values.push(elem);
                }
                Ok(IncludeExcludeParam::Values(values))
            }
        }

        deserializer.deserialize_any(IncludeExcludeVisitor)
    }
}

/// The significant terms aggregation returns the terms of a field that are unusually frequent
/// in the documents matching the query, compared to all the documents of the shard.
///
/// # Request JSON Format
/// ```json
/// {
///     "significant_crime_types": {
///         "significant_terms": { "field": "crime_type" }
///     }
/// }
/// ```
///
/// # Response JSON Format
/// ```json
/// {
///     "significant_crime_types": {
///         "doc_count": 47347,
///         "bg_count": 5064554,
///         "buckets": [
///             { "key": "Bicycle theft", "doc_count": 3640, "score": 0.371, "bg_count": 66799 }
///         ]
///     }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignificantTermsAggregation {
    /// The field to aggregate on.
    pub field: String,

    /// By default, the top 10 most significant terms are returned.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u32>,

    /// Number of candidate terms kept on the shard before the final cut to `size`.
    ///
    /// Defaults to `size * 1.5 + 10`. Never lower than `size`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[serde(alias = "segment_size")]
    pub shard_size: Option<u32>,

    /// Filter all terms that appear in less than `min_doc_count` foreground documents.
    /// Defaults to 3.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min_doc_count: Option<u64>,

    /// Include terms by either regex (single string) or exact values (array).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub include: Option<IncludeExcludeParam>,

    /// Exclude terms by either regex (single string) or exact values (array).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exclude: Option<IncludeExcludeParam>,

    /// Forces the collection strategy, either `"map"` or `"ordinals"`.
    ///
    /// When unset, the strategy is picked depending on the field and the aggregation tree.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub execution_hint: Option<String>,
}

/// Same as SignificantTermsAggregation, but with populated defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SignificantTermsAggregationInternal {
    /// The field to aggregate on.
    pub field: String,
    /// Number of returned buckets.
    pub size: u32,
    /// Number of candidates kept on the shard.
    pub shard_size: u32,
    /// Minimum number of foreground documents of a term.
    pub min_doc_count: u64,
}

impl SignificantTermsAggregationInternal {
    pub(crate) fn from_req(req: &SignificantTermsAggregation) -> Self {
        let size = req.size.unwrap_or(DEFAULT_SIZE);
        let shard_size = req
            .shard_size
            .unwrap_or_else(|| suggest_shard_size(size))
            .max(size);
        SignificantTermsAggregationInternal {
            field: req.field.to_string(),
            size,
            shard_size,
            min_doc_count: req.min_doc_count.unwrap_or(DEFAULT_MIN_DOC_COUNT),
        }
    }
}

fn suggest_shard_size(size: u32) -> u32 {
    (size as f64 * 1.5 + 10.0).min(u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_significant_terms_request() {
        let agg: Aggregation = serde_json::from_value(json!({
            "significant_terms": {
                "field": "tags",
                "size": 3,
                "shard_size": 20,
                "min_doc_count": 1,
                "include": "r.*",
                "exclude": ["ruby", "rails"],
                "execution_hint": "ordinals"
            }
        }))
        .unwrap();
        let expected = Aggregation::SignificantTerms(SignificantTermsAggregation {
            field: "tags".to_string(),
            size: Some(3),
            shard_size: Some(20),
            min_doc_count: Some(1),
            include: Some(IncludeExcludeParam::Regex("r.*".to_string())),
            exclude: Some(IncludeExcludeParam::Values(vec![
                "ruby".to_string(),
                "rails".to_string(),
            ])),
            execution_hint: Some("ordinals".to_string()),
        });
        assert_eq!(agg, expected);
        assert_eq!(agg.field(), "tags");
    }

    #[test]
    fn test_serialize_skips_unset_options() {
        let req = SignificantTermsAggregation {
            field: "tags".to_string(),
            include: Some(IncludeExcludeParam::Values(vec!["a".to_string()])),
            ..Default::default()
        };
        let value = serde_json::to_value(Aggregation::SignificantTerms(req)).unwrap();
        assert_eq!(
            value,
            json!({"significant_terms": {"field": "tags", "include": ["a"]}})
        );
    }

    #[test]
    fn test_defaults() {
        let req: SignificantTermsAggregation =
            serde_json::from_value(json!({"field": "tags"})).unwrap();
        let internal = SignificantTermsAggregationInternal::from_req(&req);
        assert_eq!(internal.size, 10);
        assert_eq!(internal.shard_size, 25);
        assert_eq!(internal.min_doc_count, 3);
    }

    #[test]
    fn test_shard_size_never_below_size() {
        let req: SignificantTermsAggregation =
            serde_json::from_value(json!({"field": "tags", "size": 50, "shard_size": 5}))
                .unwrap();
        let internal = SignificantTermsAggregationInternal::from_req(&req);
        assert_eq!(internal.size, 50);
        assert_eq!(internal.shard_size, 50);
    }

    #[test]
    fn test_field_is_required() {
        let req: Result<SignificantTermsAggregation, _> =
            serde_json::from_value(json!({"size": 50}));
        assert!(req.is_err());
    }
}
