//! Per-user session context.
//!
//! One `UserSession` is built per signed-in user and handed by reference to
//! whichever component needs the history. Nothing looks it up globally.

use serde::{Deserialize, Serialize};
use crate::behavior::BehaviorEvent;
use crate::error::{AnalysisError, Result};
use crate::id::SessionId;
use crate::measurement::{validate_history, Measurement};
use crate::Time;

/// A user's measurement history and behavior log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    /// Unique identifier
    pub id: SessionId,

    /// When the session was opened
    pub started_at: Time,

    /// Measurements, ascending by timestamp
    measurements: Vec<Measurement>,

    /// Behavior events, in arrival order
    events: Vec<BehaviorEvent>,
}

impl UserSession {
    /// Open an empty session.
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            started_at: chrono::Utc::now(),
            measurements: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Open a session over an existing history.
    pub fn from_history(measurements: Vec<Measurement>) -> Result<Self> {
        validate_history(&measurements)?;
        Ok(Self {
            measurements,
            ..Self::new()
        })
    }

    /// Append a measurement. It must not be older than the last one.
    pub fn record_measurement(&mut self, measurement: Measurement) -> Result<()> {
        let index = self.measurements.len();
        measurement.validate(index)?;
        if let Some(last) = self.measurements.last() {
            if measurement.timestamp < last.timestamp {
                return Err(AnalysisError::UnsortedHistory { index });
            }
        }
        self.measurements.push(measurement);
        Ok(())
    }

    /// Append a behavior event.
    pub fn record_event(&mut self, event: BehaviorEvent) {
        self.events.push(event);
    }

    /// Measurement history, ascending by timestamp.
    pub fn history(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Behavior events.
    pub fn events(&self) -> &[BehaviorEvent] {
        &self.events
    }

    /// Most recent measurement.
    pub fn latest(&self) -> Option<&Measurement> {
        self.measurements.last()
    }
}

impl Default for UserSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorEventKind;
    use chrono::{Duration, Utc};

    #[test]
    fn test_record_measurement_appends_in_order() {
        let mut session = UserSession::new();
        let t0 = Utc::now();
        session.record_measurement(Measurement::new(t0, Some(130.0), 0.9)).unwrap();
        session
            .record_measurement(Measurement::new(t0 + Duration::days(3), Some(128.0), 0.9))
            .unwrap();

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.latest().unwrap().primary_angle, Some(128.0));
    }

    #[test]
    fn test_record_measurement_rejects_older_timestamp() {
        let mut session = UserSession::new();
        let t0 = Utc::now();
        session.record_measurement(Measurement::new(t0, Some(130.0), 0.9)).unwrap();

        let err = session
            .record_measurement(Measurement::new(t0 - Duration::days(1), Some(128.0), 0.9))
            .unwrap_err();
        assert_eq!(err, AnalysisError::UnsortedHistory { index: 1 });
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_from_history_validates() {
        let t0 = Utc::now();
        let history = vec![
            Measurement::new(t0, Some(130.0), 0.9),
            Measurement::new(t0 - Duration::days(2), Some(131.0), 0.9),
        ];
        assert!(UserSession::from_history(history).is_err());
    }

    #[test]
    fn test_record_event() {
        let mut session = UserSession::default();
        session.record_event(BehaviorEvent::new(Utc::now(), BehaviorEventKind::GoalChanged));
        assert_eq!(session.events().len(), 1);
    }
}
