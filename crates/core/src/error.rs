//! Error taxonomy shared by every analysis component.

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur while analyzing a measurement history.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Fewer points than the component needs
    #[error("Insufficient data: need at least {required} measurements, got {actual}")]
    InsufficientData {
        /// Minimum number of points
        required: usize,
        /// Points actually available
        actual: usize,
    },

    /// History is not sorted ascending by timestamp
    #[error("History is not sorted by timestamp (first out-of-order entry at index {index})")]
    UnsortedHistory {
        /// Index of the first measurement older than its predecessor
        index: usize,
    },

    /// Confidence score outside [0, 1]
    #[error("Confidence score {value} at index {index} is outside [0, 1]")]
    ConfidenceOutOfRange {
        /// Index of the offending measurement
        index: usize,
        /// Reported confidence
        value: f64,
    },

    /// NaN or infinite metric value
    #[error("Non-finite {field} at index {index}")]
    NonFiniteValue {
        /// Index of the offending measurement
        index: usize,
        /// Field name
        field: &'static str,
    },

    /// Behavior signal outside its valid domain
    #[error("Invalid behavior signal: {0}")]
    InvalidSignal(String),

    /// Other invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Thresholds or constants are misconfigured
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AnalysisError {
    /// Whether this error belongs to the invalid-input family.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            AnalysisError::UnsortedHistory { .. }
                | AnalysisError::ConfidenceOutOfRange { .. }
                | AnalysisError::NonFiniteValue { .. }
                | AnalysisError::InvalidSignal(_)
                | AnalysisError::InvalidInput(_)
        )
    }
}
