//! Chinup core data models.
//!
//! This crate defines the measurement record, the error taxonomy and the
//! per-user session context shared by the analysis crates.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Capture data
mod measurement;
mod behavior;
mod session;

// Re-exports
pub use id::*;
pub use error::{AnalysisError, Result};

pub use measurement::{
    Measurement, SecondaryMetrics, QualityFlags, AngleBand,
    validate_history, days_between,
};
pub use behavior::{BehaviorEvent, BehaviorEventKind};
pub use session::UserSession;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
