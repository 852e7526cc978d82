//! Data Quality (Layer 2)
//!
//! Missing-data analysis and capture acceptance checks.

#![warn(missing_docs)]

pub mod missing;
pub mod acceptance;

pub use missing::{
    MissingDataAnalyzer, MissingDataConfig, MissingDataAnalysis, MissingDataImpact,
    MeasurementGap, NonRandomPattern,
};
pub use acceptance::{AcceptanceCriteria, AcceptanceReport, QualityIssue};
