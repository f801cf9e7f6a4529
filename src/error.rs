//! Definition of the crate's error and result.

use std::io;

use thiserror::Error;

use crate::aggregation::AggregationError;

/// The library's failure based error enum
#[derive(Debug, Error)]
pub enum SigTermsError {
    /// An IO error occurred while reading from the index.
    #[error("An IO error occurred: '{0}'")]
    IoError(#[from] io::Error),
    /// Invalid argument was passed by the user.
    #[error("An invalid argument was passed: '{0}'")]
    InvalidArgument(String),
    /// The values source can be aggregated in general, but not by significant terms.
    #[error("Unsupported capability: '{0}'")]
    UnsupportedCapability(String),
    /// The field cannot be analyzed for significance at all.
    #[error("Invalid aggregation target: '{0}'")]
    InvalidAggregationTarget(String),
    /// The aggregation failed while being set up or executed.
    #[error("Aggregation execution failed: '{0}'")]
    AggregationExecution(String),
    /// An error from the aggregation limits.
    #[error("Aggregation error: {0}")]
    AggregationError(#[from] AggregationError),
}

impl From<serde_json::Error> for SigTermsError {
    fn from(error: serde_json::Error) -> SigTermsError {
        SigTermsError::InvalidArgument(format!("Failed to parse request: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::SigTermsError;
    use crate::aggregation::AggregationError;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "truncated postings");
        let err: SigTermsError = io_err.into();
        assert!(matches!(err, SigTermsError::IoError(_)));
        assert_eq!(
            err.to_string(),
            "An IO error occurred: 'truncated postings'"
        );
    }

    #[test]
    fn test_memory_exceeded_display() {
        let err: SigTermsError = AggregationError::MemoryExceeded {
            limit: 1_000u64.into(),
            current: 2_000u64.into(),
        }
        .into();
        assert!(err.to_string().contains("Aborting aggregation"));
    }
}
