//! Rule-based risk screening.
//!
//! Each rule compares one signal against a fixed threshold. A breach adds the
//! rule's weight to the score and records a concern with its evidence. Rules
//! never interact, and the level is a step function of the total score, so
//! the same signals always give the same result.

use chinup_core::{AnalysisError, Result, Time};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::signals::BehaviorSignals;

/// Behavioral-health risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Nothing to act on
    Low,
    /// Worth a gentle nudge
    Medium,
    /// Surface support resources
    High,
}

impl RiskLevel {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// What triggered a concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcernKind {
    /// Too many measurements in one day
    ExcessiveDailyMeasurement,
    /// Too many measurements in the rolling window
    ExcessiveWindowMeasurement,
    /// Mostly negative satisfaction ratings
    FrequentNegativeFeedback,
    /// Goal changed repeatedly
    FrequentGoalChanges,
}

impl ConcernKind {
    /// Tie-break order between concerns of equal weight (lower first).
    pub fn priority(&self) -> u32 {
        match self {
            ConcernKind::FrequentNegativeFeedback => 1,
            ConcernKind::ExcessiveDailyMeasurement => 2,
            ConcernKind::FrequentGoalChanges => 3,
            ConcernKind::ExcessiveWindowMeasurement => 4,
        }
    }

    /// Recommendation shown when this concern fires.
    pub fn recommendation(&self) -> &'static str {
        match self {
            ConcernKind::FrequentNegativeFeedback => {
                "Recent check-ins suggest you are not feeling good about your progress. \
                 Support is available if you would like to talk to someone."
            }
            ConcernKind::ExcessiveDailyMeasurement => {
                "Measuring several times a day rarely shows real change. Once every few days is plenty."
            }
            ConcernKind::FrequentGoalChanges => {
                "Changing goals often makes progress hard to see. Consider keeping one goal for a few weeks."
            }
            ConcernKind::ExcessiveWindowMeasurement => {
                "Frequent checking can feed worry. Try picking one fixed measurement day each week."
            }
        }
    }
}

/// Shown first whenever the level is high.
const PROFESSIONAL_SUPPORT: &str =
    "If thoughts about your appearance are causing distress, please consider reaching out \
     to a mental health professional.";

/// Shown when no concern fired.
const BALANCED_USAGE: &str = "Your usage looks balanced. Keep going at your own pace.";

/// One rule breach with its evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConcern {
    /// Rule that fired
    pub kind: ConcernKind,
    /// Observed value
    pub observed: f64,
    /// Threshold it exceeded
    pub threshold: f64,
    /// Score contribution
    pub weight: f64,
    /// Human-readable evidence
    pub evidence: String,
}

/// Thresholds, weights and tier boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Daily measurements above this are a concern
    pub max_daily_measurements: u32,
    /// Window measurements above this are a concern
    pub max_window_measurements: u32,
    /// Negative feedback share above this is a concern
    pub max_negative_feedback_fraction: f64,
    /// Ratings needed before the feedback rule applies
    pub min_feedback_count: u32,
    /// Goal changes above this are a concern
    pub max_goal_changes: u32,

    /// Weight of the daily measurement rule
    pub daily_measurement_weight: f64,
    /// Weight of the window measurement rule
    pub window_measurement_weight: f64,
    /// Weight of the negative feedback rule
    pub negative_feedback_weight: f64,
    /// Weight of the goal change rule
    pub goal_change_weight: f64,

    /// Scores at or above this are medium (T1)
    pub medium_threshold: f64,
    /// Scores at or above this are high (T2)
    pub high_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_measurements: 3,
            max_window_measurements: 14,
            max_negative_feedback_fraction: 0.5,
            min_feedback_count: 3,
            max_goal_changes: 2,
            daily_measurement_weight: 2.0,
            window_measurement_weight: 1.0,
            negative_feedback_weight: 2.0,
            goal_change_weight: 1.0,
            medium_threshold: 2.0,
            high_threshold: 4.0,
        }
    }
}

impl RiskConfig {
    /// Check that the constants keep the level monotonic in the score.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(AnalysisError::Configuration(msg));

        let weights = [
            ("daily_measurement_weight", self.daily_measurement_weight),
            ("window_measurement_weight", self.window_measurement_weight),
            ("negative_feedback_weight", self.negative_feedback_weight),
            ("goal_change_weight", self.goal_change_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return bad(format!("{} must be a non-negative number, got {}", name, weight));
            }
        }

        let fraction = self.max_negative_feedback_fraction;
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return bad(format!("max_negative_feedback_fraction {} is outside [0, 1]", fraction));
        }

        if !self.medium_threshold.is_finite() || !self.high_threshold.is_finite() {
            return bad("tier thresholds must be finite".to_string());
        }
        if self.medium_threshold <= 0.0 {
            return bad(format!("medium_threshold must be positive, got {}", self.medium_threshold));
        }
        if self.medium_threshold >= self.high_threshold {
            return bad(format!(
                "medium_threshold ({}) must be below high_threshold ({})",
                self.medium_threshold, self.high_threshold
            ));
        }
        Ok(())
    }
}

/// Result of a risk screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Risk tier
    pub level: RiskLevel,
    /// Sum of fired rule weights
    pub score: f64,
    /// Fired rules, most severe first
    pub concerns: Vec<RiskConcern>,
    /// When the screening ran
    pub assessed_at: Time,
    /// Advice, most severe first
    pub recommendations: Vec<String>,
    /// Whether wellbeing resources should be offered
    pub surface_resources: bool,
}

/// Scores behavior signals against fixed rules.
#[derive(Debug, Clone)]
pub struct RiskAssessor {
    config: RiskConfig,
}

impl RiskAssessor {
    /// Create an assessor with default rules.
    pub fn new() -> Self {
        Self {
            config: RiskConfig::default(),
        }
    }

    /// Create an assessor with custom rules.
    pub fn with_config(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Screen signals now.
    pub fn assess_risk(&self, signals: &BehaviorSignals) -> Result<RiskAssessment> {
        self.assess_risk_at(signals, chrono::Utc::now())
    }

    /// Screen signals with an explicit timestamp.
    pub fn assess_risk_at(&self, signals: &BehaviorSignals, now: Time) -> Result<RiskAssessment> {
        signals.validate()?;

        let mut concerns = self.evaluate_rules(signals);
        concerns.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.kind.priority().cmp(&b.kind.priority()))
        });

        let score: f64 = concerns.iter().map(|c| c.weight).sum();
        let level = self.level_for(score);

        let mut recommendations: Vec<String> = concerns
            .iter()
            .map(|c| c.kind.recommendation().to_string())
            .collect();
        if level == RiskLevel::High {
            recommendations.insert(0, PROFESSIONAL_SUPPORT.to_string());
        }
        if recommendations.is_empty() {
            recommendations.push(BALANCED_USAGE.to_string());
        }

        if level == RiskLevel::High {
            warn!("High risk screening result (score {:.1}, {} concerns)", score, concerns.len());
        } else {
            debug!("Risk screening: {} (score {:.1})", level.as_str(), score);
        }

        Ok(RiskAssessment {
            level,
            score,
            concerns,
            assessed_at: now,
            recommendations,
            surface_resources: level >= RiskLevel::Medium,
        })
    }

    /// Map a score to a tier. T1 and T2 are inclusive lower bounds.
    pub fn level_for(&self, score: f64) -> RiskLevel {
        if score >= self.config.high_threshold {
            RiskLevel::High
        } else if score >= self.config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn evaluate_rules(&self, signals: &BehaviorSignals) -> Vec<RiskConcern> {
        let cfg = &self.config;
        let mut concerns = Vec::new();

        if signals.measurements_today > cfg.max_daily_measurements {
            concerns.push(RiskConcern {
                kind: ConcernKind::ExcessiveDailyMeasurement,
                observed: signals.measurements_today as f64,
                threshold: cfg.max_daily_measurements as f64,
                weight: cfg.daily_measurement_weight,
                evidence: format!(
                    "excessive daily measurements: observed {} vs threshold {}",
                    signals.measurements_today, cfg.max_daily_measurements
                ),
            });
        }

        if signals.measurements_in_window > cfg.max_window_measurements {
            concerns.push(RiskConcern {
                kind: ConcernKind::ExcessiveWindowMeasurement,
                observed: signals.measurements_in_window as f64,
                threshold: cfg.max_window_measurements as f64,
                weight: cfg.window_measurement_weight,
                evidence: format!(
                    "excessive measurements over {} days: observed {} vs threshold {}",
                    signals.window_days, signals.measurements_in_window, cfg.max_window_measurements
                ),
            });
        }

        if signals.feedback_count >= cfg.min_feedback_count
            && signals.negative_feedback_fraction > cfg.max_negative_feedback_fraction
        {
            concerns.push(RiskConcern {
                kind: ConcernKind::FrequentNegativeFeedback,
                observed: signals.negative_feedback_fraction,
                threshold: cfg.max_negative_feedback_fraction,
                weight: cfg.negative_feedback_weight,
                evidence: format!(
                    "frequent negative satisfaction: fraction {:.2} of {} ratings vs threshold {:.2}",
                    signals.negative_feedback_fraction,
                    signals.feedback_count,
                    cfg.max_negative_feedback_fraction
                ),
            });
        }

        if signals.goal_changes_in_window > cfg.max_goal_changes {
            concerns.push(RiskConcern {
                kind: ConcernKind::FrequentGoalChanges,
                observed: signals.goal_changes_in_window as f64,
                threshold: cfg.max_goal_changes as f64,
                weight: cfg.goal_change_weight,
                evidence: format!(
                    "frequent goal changes: observed {} vs threshold {}",
                    signals.goal_changes_in_window, cfg.max_goal_changes
                ),
            });
        }

        concerns
    }
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn now() -> Time {
        Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap()
    }

    fn quiet() -> BehaviorSignals {
        BehaviorSignals {
            measurements_today: 1,
            measurements_in_window: 4,
            window_days: 7,
            negative_feedback_fraction: 0.0,
            feedback_count: 2,
            goal_changes_in_window: 0,
        }
    }

    #[test]
    fn test_quiet_usage_is_low() {
        let assessment = RiskAssessor::new().assess_risk_at(&quiet(), now()).unwrap();
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.score, 0.0);
        assert!(assessment.concerns.is_empty());
        assert!(!assessment.surface_resources);
        assert_eq!(assessment.recommendations, vec![BALANCED_USAGE.to_string()]);
    }

    #[test]
    fn test_score_just_below_t1_is_low() {
        let signals = BehaviorSignals {
            goal_changes_in_window: 3,
            ..quiet()
        };
        let assessment = RiskAssessor::new().assess_risk_at(&signals, now()).unwrap();
        assert_eq!(assessment.score, 1.0);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.concerns.len(), 1);
    }

    #[test]
    fn test_score_exactly_t1_is_medium() {
        let assessor = RiskAssessor::new();

        let daily = BehaviorSignals {
            measurements_today: 4,
            ..quiet()
        };
        let assessment = assessor.assess_risk_at(&daily, now()).unwrap();
        assert_eq!(assessment.score, 2.0);
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert!(assessment.surface_resources);
        assert_eq!(
            assessment.concerns[0].evidence,
            "excessive daily measurements: observed 4 vs threshold 3"
        );

        let combined = BehaviorSignals {
            measurements_in_window: 15,
            goal_changes_in_window: 3,
            ..quiet()
        };
        let assessment = assessor.assess_risk_at(&combined, now()).unwrap();
        assert_eq!(assessment.score, 2.0);
        assert_eq!(assessment.level, RiskLevel::Medium);
    }

    #[test]
    fn test_level_boundaries() {
        let assessor = RiskAssessor::new();
        assert_eq!(assessor.level_for(1.999), RiskLevel::Low);
        assert_eq!(assessor.level_for(2.0), RiskLevel::Medium);
        assert_eq!(assessor.level_for(3.999), RiskLevel::Medium);
        assert_eq!(assessor.level_for(4.0), RiskLevel::High);
    }

    #[test]
    fn test_high_risk_leads_with_professional_support() {
        let signals = BehaviorSignals {
            measurements_today: 6,
            measurements_in_window: 20,
            negative_feedback_fraction: 0.8,
            feedback_count: 5,
            ..quiet()
        };
        let assessment = RiskAssessor::new().assess_risk_at(&signals, now()).unwrap();

        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.score, 5.0);
        assert_eq!(assessment.recommendations[0], PROFESSIONAL_SUPPORT);
        // Equal weights fall back to the fixed order: feedback before daily.
        let kinds: Vec<ConcernKind> = assessment.concerns.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConcernKind::FrequentNegativeFeedback,
                ConcernKind::ExcessiveDailyMeasurement,
                ConcernKind::ExcessiveWindowMeasurement,
            ]
        );
        assert_eq!(
            assessment.recommendations[1],
            ConcernKind::FrequentNegativeFeedback.recommendation()
        );
    }

    #[test]
    fn test_feedback_rule_needs_enough_ratings() {
        let signals = BehaviorSignals {
            negative_feedback_fraction: 1.0,
            feedback_count: 2,
            ..quiet()
        };
        let assessment = RiskAssessor::new().assess_risk_at(&signals, now()).unwrap();
        assert!(assessment.concerns.is_empty());
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let assessor = RiskAssessor::new();
        let signals = BehaviorSignals {
            measurements_today: 5,
            negative_feedback_fraction: 0.6,
            feedback_count: 5,
            goal_changes_in_window: 4,
            ..quiet()
        };

        let a = assessor.assess_risk(&signals).unwrap();
        let b = assessor.assess_risk(&signals).unwrap();
        assert_eq!(a.level, b.level);
        assert_eq!(a.score, b.score);
        assert_eq!(a.concerns, b.concerns);
        assert_eq!(a.recommendations, b.recommendations);
    }

    #[test]
    fn test_score_is_monotonic_in_each_signal() {
        let assessor = RiskAssessor::new();
        let base = BehaviorSignals {
            negative_feedback_fraction: 0.3,
            feedback_count: 3,
            ..quiet()
        };
        let score = |s: &BehaviorSignals| assessor.assess_risk_at(s, now()).unwrap().score;

        let bumps: Vec<Box<dyn Fn(&mut BehaviorSignals, u32)>> = vec![
            Box::new(|s: &mut BehaviorSignals, v: u32| s.measurements_today = v),
            Box::new(|s: &mut BehaviorSignals, v: u32| s.measurements_in_window = v * 2),
            Box::new(|s: &mut BehaviorSignals, v: u32| s.feedback_count = 3 + v),
            Box::new(|s: &mut BehaviorSignals, v: u32| s.negative_feedback_fraction = (v as f64 / 10.0).min(1.0)),
            Box::new(|s: &mut BehaviorSignals, v: u32| s.goal_changes_in_window = v),
        ];

        for bump in &bumps {
            let mut previous = f64::NEG_INFINITY;
            for v in 0..12 {
                let mut signals = base.clone();
                bump(&mut signals, v);
                let current = score(&signals);
                assert!(current >= previous, "score dropped from {} to {}", previous, current);
                previous = current;
            }
        }
    }

    #[test]
    fn test_invalid_signals_are_rejected() {
        let signals = BehaviorSignals {
            negative_feedback_fraction: f64::NAN,
            feedback_count: 3,
            ..quiet()
        };
        assert!(matches!(
            RiskAssessor::new().assess_risk(&signals),
            Err(AnalysisError::InvalidSignal(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        let inverted = RiskConfig {
            medium_threshold: 4.0,
            high_threshold: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            RiskAssessor::with_config(inverted),
            Err(AnalysisError::Configuration(_))
        ));

        let negative_weight = RiskConfig {
            goal_change_weight: -1.0,
            ..Default::default()
        };
        assert!(RiskAssessor::with_config(negative_weight).is_err());

        assert!(RiskAssessor::with_config(RiskConfig::default()).is_ok());
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::High.as_str(), "high");
    }
}
