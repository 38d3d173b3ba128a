use thiserror::Error;

/// Failure reported by a data source for a single symbol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Symbol not found: {0}")]
    NotFound(String),

    #[error("Network failure for {symbol}: {reason}")]
    NetworkFailure { symbol: String, reason: String },

    #[error("Empty series for {0}")]
    Empty(String),

    #[error("Invalid response for {symbol}: {reason}")]
    InvalidResponse { symbol: String, reason: String },
}

impl FetchError {
    pub fn network(symbol: &str, reason: impl Into<String>) -> Self {
        FetchError::NetworkFailure {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(symbol: &str, reason: impl Into<String>) -> Self {
        FetchError::InvalidResponse {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether another attempt at the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::NetworkFailure { .. })
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Data unavailable for {symbol}: {source}")]
    DataUnavailable {
        symbol: String,
        #[source]
        source: FetchError,
    },

    #[error("Insufficient data for {symbol}: need {required} bars, got {actual}")]
    InsufficientData {
        symbol: String,
        required: usize,
        actual: usize,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("No metrics computed: all {attempted} symbols were dropped")]
    NoMetricsComputed { attempted: usize },
}
