//! Responder classification.
//!
//! Buckets a user's trajectory into a coarse archetype. Thresholds are fixed
//! and a poor fit always lands in the conservative bucket: the app should
//! never promise fast results it cannot support.

use chinup_core::{days_between, validate_history, AnalysisError, Measurement, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::trend::{quadratic_fit, weighted_linear_fit};

/// Response archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderType {
    /// Clear, steady improvement
    Fast,
    /// Gradual improvement
    Moderate,
    /// Little measurable change, or too noisy to tell
    Minimal,
}

impl ResponderType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponderType::Fast => "fast",
            ResponderType::Moderate => "moderate",
            ResponderType::Minimal => "minimal",
        }
    }
}

/// Configuration for the responder classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Resolved measurements needed before classifying
    pub min_points: usize,

    /// Resolved measurements from which curvature is fitted
    pub quadratic_min_points: usize,

    /// Improvement (degrees per week) at or above which a good fit is fast
    pub fast_rate_per_week: f64,

    /// Improvement (degrees per week) below which the user is minimal
    pub minimal_rate_per_week: f64,

    /// R² below which the fit is treated as unreliable
    pub min_fit_quality: f64,

    /// Sample count scale for classification confidence
    pub confidence_sample_scale: f64,

    /// Cap on classification confidence
    pub max_confidence: f64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            min_points: 3,
            quadratic_min_points: 5,
            fast_rate_per_week: 1.0,
            minimal_rate_per_week: 0.3,
            min_fit_quality: 0.5,
            confidence_sample_scale: 5.0,
            max_confidence: 0.95,
        }
    }
}

impl ResponderConfig {
    /// Check that the constants are usable.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(AnalysisError::Configuration(msg.to_string()));

        if self.min_points < 3 {
            return bad("min_points must be at least 3");
        }
        if self.quadratic_min_points < self.min_points.max(4) {
            return bad("quadratic_min_points must be at least max(min_points, 4)");
        }
        if !self.minimal_rate_per_week.is_finite()
            || !self.fast_rate_per_week.is_finite()
            || self.minimal_rate_per_week < 0.0
            || self.minimal_rate_per_week >= self.fast_rate_per_week
        {
            return bad("rate thresholds must satisfy 0 <= minimal < fast");
        }
        if !(0.0..=1.0).contains(&self.min_fit_quality) {
            return bad("min_fit_quality must be in [0, 1]");
        }
        if !(self.confidence_sample_scale.is_finite() && self.confidence_sample_scale > 0.0) {
            return bad("confidence_sample_scale must be positive");
        }
        if !(self.max_confidence > 0.0 && self.max_confidence <= 1.0) {
            return bad("max_confidence must be in (0, 1]");
        }
        Ok(())
    }
}

/// Summary of the fitted trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    /// Improvement at the first measurement, degrees per week (positive is better)
    pub initial_rate_per_week: f64,

    /// Second derivative of the angle, degrees per week²; positive means
    /// improvement is slowing
    pub acceleration: f64,

    /// Angle where the fitted curve levels off, when it does
    pub plateau_estimate: Option<f64>,

    /// Goodness of fit (0.0 to 1.0)
    pub r_squared: f64,

    /// Resolved measurements used
    pub sample_count: usize,
}

/// Canned expectations shown with a classification. Ranges only, never
/// exact numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectations {
    /// Expected change after one month
    pub one_month: String,
    /// Expected change after three months
    pub three_months: String,
    /// Expected change after six months
    pub six_months: String,
    /// What the archetype means
    pub description: String,
    /// Encouragement copy
    pub encouragement: String,
}

struct ExpectationTemplate {
    one_month: &'static str,
    three_months: &'static str,
    six_months: &'static str,
    description: &'static str,
    encouragement: &'static str,
}

const FAST: ExpectationTemplate = ExpectationTemplate {
    one_month: "1-3° change is typical",
    three_months: "3-6° change is typical",
    six_months: "4-8° change is typical, often levelling off",
    description: "Your measurements show a clear, consistent trend.",
    encouragement: "Early trends often slow down over time. Steady practice keeps what you have gained.",
};

const MODERATE: ExpectationTemplate = ExpectationTemplate {
    one_month: "0-2° change is typical",
    three_months: "1-4° change is typical",
    six_months: "2-5° change is typical",
    description: "Your measurements show gradual change.",
    encouragement: "Gradual change is the most common pattern. Consistency matters more than speed.",
};

const MINIMAL: ExpectationTemplate = ExpectationTemplate {
    one_month: "Little measurable change is typical",
    three_months: "0-2° change is typical",
    six_months: "0-3° change is typical",
    description: "No clear trend yet. Day-to-day variation can hide small changes.",
    encouragement: "Many factors beyond exercise shape this angle. How you feel matters more than any number.",
};

impl Expectations {
    /// Expectations for an archetype.
    pub fn for_type(responder_type: ResponderType) -> Self {
        let template = match responder_type {
            ResponderType::Fast => &FAST,
            ResponderType::Moderate => &MODERATE,
            ResponderType::Minimal => &MINIMAL,
        };
        Self {
            one_month: template.one_month.to_string(),
            three_months: template.three_months.to_string(),
            six_months: template.six_months.to_string(),
            description: template.description.to_string(),
            encouragement: template.encouragement.to_string(),
        }
    }
}

/// Result of classifying a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderClassification {
    /// Archetype
    pub responder_type: ResponderType,
    /// Confidence in the classification (0.0 to 0.95)
    pub confidence: f64,
    /// Fitted trajectory
    pub trajectory: TrajectorySummary,
    /// Canned expectations
    pub expectations: Expectations,
}

/// Classifies measurement trajectories.
#[derive(Debug, Clone)]
pub struct ResponderClassifier {
    config: ResponderConfig,
}

impl ResponderClassifier {
    /// Create a classifier with default thresholds.
    pub fn new() -> Self {
        Self {
            config: ResponderConfig::default(),
        }
    }

    /// Create a classifier with custom thresholds.
    pub fn with_config(config: ResponderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Classify a history sorted by timestamp. Returns `Ok(None)` when there
    /// are too few resolved measurements to say anything.
    pub fn classify(&self, history: &[Measurement]) -> Result<Option<ResponderClassification>> {
        validate_history(history)?;

        let Some(origin) = history.first().map(|m| m.timestamp) else {
            return Ok(None);
        };
        let (weeks, angles): (Vec<f64>, Vec<f64>) = history
            .iter()
            .filter_map(|m| {
                m.primary_angle
                    .map(|angle| (days_between(origin, m.timestamp) / 7.0, angle))
            })
            .unzip();

        let n = angles.len();
        if n < self.config.min_points {
            debug!("{} resolved measurement(s), need {} to classify", n, self.config.min_points);
            return Ok(None);
        }

        let Some(trajectory) = self.fit(&weeks, &angles) else {
            debug!("Trajectory fit is degenerate, not classifying");
            return Ok(None);
        };

        let responder_type = self.decide(&trajectory);
        let sample_factor = 1.0 - (-(n as f64) / self.config.confidence_sample_scale).exp();
        let confidence = (trajectory.r_squared * sample_factor).min(self.config.max_confidence);

        debug!(
            "Classified as {} (rate {:.2}°/week, R² {:.2}, confidence {:.2})",
            responder_type.as_str(),
            trajectory.initial_rate_per_week,
            trajectory.r_squared,
            confidence
        );

        Ok(Some(ResponderClassification {
            responder_type,
            confidence,
            trajectory,
            expectations: Expectations::for_type(responder_type),
        }))
    }

    fn fit(&self, weeks: &[f64], angles: &[f64]) -> Option<TrajectorySummary> {
        let n = angles.len();

        // Fewer than three distinct times make the parabola singular; the
        // line still fits.
        let quadratic = (n >= self.config.quadratic_min_points)
            .then(|| quadratic_fit(weeks, angles))
            .flatten();
        if let Some(fit) = quadratic {
            // A parabola opening upward while still falling at the start
            // levels off at its vertex.
            let plateau_estimate = (fit.c > 0.0 && fit.b < 0.0).then(|| {
                let vertex = -fit.b / (2.0 * fit.c);
                fit.at(vertex)
            });
            return Some(TrajectorySummary {
                initial_rate_per_week: -fit.b,
                acceleration: 2.0 * fit.c,
                plateau_estimate,
                r_squared: fit.r_squared,
                sample_count: n,
            });
        }

        let fit = weighted_linear_fit(weeks, angles, &vec![1.0; n])?;
        Some(TrajectorySummary {
            initial_rate_per_week: -fit.slope,
            acceleration: 0.0,
            plateau_estimate: None,
            r_squared: fit.r_squared,
            sample_count: n,
        })
    }

    fn decide(&self, trajectory: &TrajectorySummary) -> ResponderType {
        let cfg = &self.config;
        let rate = trajectory.initial_rate_per_week;

        if trajectory.r_squared < cfg.min_fit_quality || rate < cfg.minimal_rate_per_week {
            ResponderType::Minimal
        } else if rate >= cfg.fast_rate_per_week {
            ResponderType::Fast
        } else {
            ResponderType::Moderate
        }
    }
}

impl Default for ResponderClassifier {
    fn default() -> Self {
        Self::new()
    }
}
