//! Progress Prediction (Layer 3)
//!
//! Trend fitting, forecasts at fixed horizons, and responder classification.

#![warn(missing_docs)]

pub mod trend;
pub mod predictor;
pub mod responder;

pub use trend::{LinearFit, QuadraticFit, weighted_linear_fit, quadratic_fit};
pub use predictor::{
    PredictionEngine, PredictionConfig, Prediction, PredictionBasis, ConfidenceInterval,
    MAX_HORIZON_DAYS,
};
pub use responder::{
    ResponderClassifier, ResponderConfig, ResponderClassification, ResponderType,
    TrajectorySummary, Expectations,
};
