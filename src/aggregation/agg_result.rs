//! Contains the final aggregation results.
//!
//! The results serialize into elasticsearch compatible JSON.

use serde::{Deserialize, Serialize};

use super::Key;

/// The result of a significant terms aggregation on a shard.
///
/// # JSON Format
/// ```json
/// {
///   "doc_count": 4,
///   "bg_count": 100,
///   "buckets": [
///     { "key": "rust", "doc_count": 3, "bg_count": 5, "score": 10.9 }
///   ]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignificantTermsResult {
    /// Number of foreground documents, i.e. the documents collected by the aggregation.
    pub doc_count: u64,
    /// Number of background documents, i.e. all the documents of the shard.
    pub bg_count: u64,
    /// The significant terms, most significant first.
    pub buckets: Vec<SignificantTermBucket>,
}

impl SignificantTermsResult {
    /// A result without any bucket.
    pub fn empty(doc_count: u64, bg_count: u64) -> SignificantTermsResult {
        SignificantTermsResult {
            doc_count,
            bg_count,
            buckets: Vec::new(),
        }
    }

    /// Returns the bucket with the given key.
    pub fn get_bucket(&self, key: &Key) -> Option<&SignificantTermBucket> {
        self.buckets.iter().find(|bucket| &bucket.key == key)
    }
}

/// A significant term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignificantTermBucket {
    /// The term.
    pub key: Key,
    /// Number of foreground documents containing the term.
    pub doc_count: u64,
    /// Number of background documents containing the term.
    pub bg_count: u64,
    /// Significance of the term.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_result_json_format() {
        let result = SignificantTermsResult {
            doc_count: 4,
            bg_count: 100,
            buckets: vec![
                SignificantTermBucket {
                    key: Key::Str("rust".to_string()),
                    doc_count: 3,
                    bg_count: 5,
                    score: 0.5,
                },
                SignificantTermBucket {
                    key: Key::I64(-3),
                    doc_count: 1,
                    bg_count: 1,
                    score: 0.25,
                },
            ],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "doc_count": 4,
                "bg_count": 100,
                "buckets": [
                    { "key": "rust", "doc_count": 3, "bg_count": 5, "score": 0.5 },
                    { "key": -3, "doc_count": 1, "bg_count": 1, "score": 0.25 }
                ]
            })
        );
        let deserialized: SignificantTermsResult = serde_json::from_value(value).unwrap();
        assert_eq!(deserialized, result);
        assert_eq!(
            result.get_bucket(&Key::I64(-3)).map(|bucket| bucket.doc_count),
            Some(1)
        );
        assert!(result.get_bucket(&Key::Str("java".to_string())).is_none());
    }
}
