//! Behavior events - usage signals the safeguard layer aggregates.

use serde::{Deserialize, Serialize};
use crate::Time;

/// Something the user did that matters for wellbeing screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    /// When it happened
    pub at: Time,

    /// What happened
    pub kind: BehaviorEventKind,
}

/// Behavior event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BehaviorEventKind {
    /// A measurement was captured
    MeasurementTaken,
    /// The user rated their satisfaction (1 to 5)
    SatisfactionRated {
        /// Rating given, 1 (unhappy) to 5 (happy)
        rating: u8,
    },
    /// The user changed their goal
    GoalChanged,
}

impl BehaviorEvent {
    /// Create a new event.
    pub fn new(at: Time, kind: BehaviorEventKind) -> Self {
        Self { at, kind }
    }
}

impl BehaviorEventKind {
    /// Highest rating still counted as negative feedback.
    pub const NEGATIVE_RATING_MAX: u8 = 2;

    /// Whether this is a negative satisfaction rating.
    pub fn is_negative_feedback(&self) -> bool {
        matches!(self, BehaviorEventKind::SatisfactionRated { rating } if *rating <= Self::NEGATIVE_RATING_MAX)
    }
}
