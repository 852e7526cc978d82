//! Behavior signal counters.

use chinup_core::{AnalysisError, BehaviorEvent, BehaviorEventKind, Result, Time};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Usage counters the risk assessor scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorSignals {
    /// Measurements taken today
    pub measurements_today: u32,

    /// Measurements taken in the rolling window
    pub measurements_in_window: u32,

    /// Length of the rolling window, days
    pub window_days: u32,

    /// Share of satisfaction ratings in the window that were negative
    pub negative_feedback_fraction: f64,

    /// Satisfaction ratings in the window
    pub feedback_count: u32,

    /// Goal changes in the window
    pub goal_changes_in_window: u32,
}

impl Default for BehaviorSignals {
    fn default() -> Self {
        Self {
            measurements_today: 0,
            measurements_in_window: 0,
            window_days: 7,
            negative_feedback_fraction: 0.0,
            feedback_count: 0,
            goal_changes_in_window: 0,
        }
    }
}

impl BehaviorSignals {
    /// Aggregate an event stream as of `now`.
    ///
    /// Events after `now` are ignored. "Today" is the UTC calendar day of `now`.
    /// A window reaching past the earliest representable time covers everything.
    pub fn from_events(events: &[BehaviorEvent], now: Time, window_days: u32) -> Self {
        let window_start = now
            .checked_sub_signed(Duration::days(window_days as i64))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let today = now.date_naive();

        let mut signals = Self {
            window_days,
            ..Self::default()
        };
        let mut negative = 0u32;

        for event in events.iter().filter(|e| e.at <= now) {
            let in_window = event.at >= window_start;
            match event.kind {
                BehaviorEventKind::MeasurementTaken => {
                    if event.at.date_naive() == today {
                        signals.measurements_today += 1;
                    }
                    if in_window {
                        signals.measurements_in_window += 1;
                    }
                }
                BehaviorEventKind::SatisfactionRated { .. } if in_window => {
                    signals.feedback_count += 1;
                    if event.kind.is_negative_feedback() {
                        negative += 1;
                    }
                }
                BehaviorEventKind::GoalChanged if in_window => {
                    signals.goal_changes_in_window += 1;
                }
                _ => {}
            }
        }

        if signals.feedback_count > 0 {
            signals.negative_feedback_fraction = negative as f64 / signals.feedback_count as f64;
        }
        signals
    }

    /// Check the counters are internally consistent.
    pub fn validate(&self) -> Result<()> {
        let fraction = self.negative_feedback_fraction;
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(AnalysisError::InvalidSignal(format!(
                "negative feedback fraction {} is outside [0, 1]",
                fraction
            )));
        }
        if self.feedback_count == 0 && fraction > 0.0 {
            return Err(AnalysisError::InvalidSignal(
                "negative feedback fraction reported without any feedback".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> Time {
        Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap()
    }

    fn event(hours_ago: i64, kind: BehaviorEventKind) -> BehaviorEvent {
        BehaviorEvent::new(now() - Duration::hours(hours_ago), kind)
    }

    #[test]
    fn test_from_events_counts_by_window() {
        let events = vec![
            event(1, BehaviorEventKind::MeasurementTaken),
            event(2, BehaviorEventKind::MeasurementTaken),
            event(30, BehaviorEventKind::MeasurementTaken),
            event(24 * 10, BehaviorEventKind::MeasurementTaken),
            event(3, BehaviorEventKind::SatisfactionRated { rating: 1 }),
            event(50, BehaviorEventKind::SatisfactionRated { rating: 4 }),
            event(24 * 9, BehaviorEventKind::SatisfactionRated { rating: 1 }),
            event(5, BehaviorEventKind::GoalChanged),
            event(24 * 8, BehaviorEventKind::GoalChanged),
        ];

        let signals = BehaviorSignals::from_events(&events, now(), 7);
        assert_eq!(signals.measurements_today, 2);
        assert_eq!(signals.measurements_in_window, 3);
        assert_eq!(signals.feedback_count, 2);
        assert!((signals.negative_feedback_fraction - 0.5).abs() < 1e-9);
        assert_eq!(signals.goal_changes_in_window, 1);
        assert!(signals.validate().is_ok());
    }

    #[test]
    fn test_future_events_are_ignored() {
        let events = vec![BehaviorEvent::new(
            now() + Duration::hours(1),
            BehaviorEventKind::MeasurementTaken,
        )];
        let signals = BehaviorSignals::from_events(&events, now(), 7);
        assert_eq!(signals.measurements_today, 0);
        assert_eq!(signals.measurements_in_window, 0);
    }

    #[test]
    fn test_huge_window_covers_all_history() {
        let events = vec![
            event(24 * 365 * 30, BehaviorEventKind::GoalChanged),
            event(1, BehaviorEventKind::MeasurementTaken),
        ];
        let signals = BehaviorSignals::from_events(&events, now(), u32::MAX);
        assert_eq!(signals.window_days, u32::MAX);
        assert_eq!(signals.goal_changes_in_window, 1);
        assert_eq!(signals.measurements_in_window, 1);
    }

    #[test]
    fn test_no_feedback_means_zero_fraction() {
        let signals = BehaviorSignals::from_events(&[], now(), 7);
        assert_eq!(signals.feedback_count, 0);
        assert_eq!(signals.negative_feedback_fraction, 0.0);
        assert_eq!(signals.window_days, 7);
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let signals = BehaviorSignals {
            negative_feedback_fraction: 1.5,
            feedback_count: 4,
            ..Default::default()
        };
        assert!(matches!(signals.validate(), Err(AnalysisError::InvalidSignal(_))));

        let orphan = BehaviorSignals {
            negative_feedback_fraction: 0.5,
            feedback_count: 0,
            ..Default::default()
        };
        assert!(orphan.validate().is_err());
    }
}
