//! Missing-data analysis.
//!
//! Finds breaks in the measurement cadence and checks whether they look like
//! random dropout or like users stepping away after a less favorable reading.
//! The second case biases any forecast built from the remaining points, so
//! the analysis also estimates how much wider forecasts should be.

use chinup_core::{days_between, validate_history, AnalysisError, Measurement, Result, Time};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for the missing-data analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingDataConfig {
    /// Elapsed time above cadence × this factor counts as a gap
    pub tolerance_factor: f64,

    /// Earlier resolved angles averaged to form the prior trend
    pub trend_window: usize,

    /// Rise above the prior trend (degrees) that counts as a regression
    pub regression_margin_degrees: f64,

    /// Share of regressing gaps above which avoidance is suspected
    pub avoidance_fraction_threshold: f64,

    /// Regressing gaps needed before the pattern is flagged
    pub min_regressing_gaps: usize,

    /// A single regressing gap this many cadences long is enough on its own
    pub severe_gap_factor: f64,

    /// Pattern probability reported when every gap follows a regression
    pub max_pattern_probability: f64,

    /// Uncertainty increase per unit of missed-time fraction
    pub gap_uncertainty_weight: f64,

    /// Multiplier applied when the avoidance pattern is detected
    pub avoidance_penalty: f64,

    /// Upper clamp for the uncertainty increase
    pub max_uncertainty_increase: f64,

    /// Gap count from which a reminder recommendation is emitted
    pub frequent_gap_count: usize,
}

impl Default for MissingDataConfig {
    fn default() -> Self {
        Self {
            tolerance_factor: 1.5,
            trend_window: 3,
            regression_margin_degrees: 0.5,
            avoidance_fraction_threshold: 0.4,
            min_regressing_gaps: 2,
            severe_gap_factor: 4.0,
            max_pattern_probability: 0.9,
            gap_uncertainty_weight: 0.6,
            avoidance_penalty: 1.5,
            max_uncertainty_increase: 0.9,
            frequent_gap_count: 3,
        }
    }
}

impl MissingDataConfig {
    /// Check that the constants are usable.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(AnalysisError::Configuration(msg.to_string()));

        if !self.tolerance_factor.is_finite() || self.tolerance_factor < 1.0 {
            return bad("tolerance_factor must be a finite value >= 1.0");
        }
        if self.trend_window == 0 {
            return bad("trend_window must be at least 1");
        }
        if !self.regression_margin_degrees.is_finite() || self.regression_margin_degrees < 0.0 {
            return bad("regression_margin_degrees must be non-negative");
        }
        if !(0.0..1.0).contains(&self.avoidance_fraction_threshold) {
            return bad("avoidance_fraction_threshold must be in [0, 1)");
        }
        if self.min_regressing_gaps == 0 {
            return bad("min_regressing_gaps must be at least 1");
        }
        if !self.severe_gap_factor.is_finite() || self.severe_gap_factor < self.tolerance_factor {
            return bad("severe_gap_factor must be >= tolerance_factor");
        }
        if !(self.max_pattern_probability > 0.0 && self.max_pattern_probability <= 1.0) {
            return bad("max_pattern_probability must be in (0, 1]");
        }
        if !self.gap_uncertainty_weight.is_finite() || self.gap_uncertainty_weight < 0.0 {
            return bad("gap_uncertainty_weight must be non-negative");
        }
        if !self.avoidance_penalty.is_finite() || self.avoidance_penalty < 1.0 {
            return bad("avoidance_penalty must be >= 1.0");
        }
        if !(0.0..1.0).contains(&self.max_uncertainty_increase) {
            return bad("max_uncertainty_increase must be in [0, 1)");
        }
        Ok(())
    }
}

/// A break between two adjacent measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementGap {
    /// Index of the measurement before the gap
    pub start_index: usize,

    /// Index of the measurement after the gap
    pub end_index: usize,

    /// Timestamp before the gap
    pub start: Time,

    /// Timestamp after the gap
    pub end: Time,

    /// Elapsed days
    pub days: f64,

    /// Cadence the user was expected to keep
    pub expected_days: u32,

    /// Whether the reading before the gap was worse than the prior trend
    pub preceded_by_regression: bool,
}

impl MeasurementGap {
    /// Days beyond the expected cadence.
    pub fn missed_days(&self) -> f64 {
        (self.days - self.expected_days as f64).max(0.0)
    }
}

/// Whether gaps line up with unfavorable readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonRandomPattern {
    /// Whether the avoidance pattern is flagged
    pub detected: bool,

    /// Estimated probability that the gaps are not random
    pub probability: f64,

    /// Gaps preceded by a regression
    pub regressing_gaps: usize,

    /// All gaps
    pub total_gaps: usize,
}

/// How much the gaps should weaken downstream forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingDataImpact {
    /// Fractional widening to apply to forecast uncertainty (0.0 to 0.9)
    pub prediction_uncertainty_increase: f64,

    /// Confidence to place in history-based recommendations (0.0 to 1.0)
    pub recommendation_confidence: f64,

    /// Whether filling the gaps by interpolation is reasonable
    pub interpolation_warranted: bool,
}

impl Default for MissingDataImpact {
    fn default() -> Self {
        Self {
            prediction_uncertainty_increase: 0.0,
            recommendation_confidence: 1.0,
            interpolation_warranted: false,
        }
    }
}

/// Result of a missing-data analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingDataAnalysis {
    /// Gaps, ordered by time
    pub gaps: Vec<MeasurementGap>,

    /// Gap pattern, present whenever at least one gap exists
    pub pattern: Option<NonRandomPattern>,

    /// Forecast impact
    pub impact: MissingDataImpact,

    /// User-facing advice
    pub recommendations: Vec<String>,
}

impl MissingDataAnalysis {
    /// Analysis of a history with no gaps.
    pub fn empty() -> Self {
        Self {
            gaps: Vec::new(),
            pattern: None,
            impact: MissingDataImpact::default(),
            recommendations: Vec::new(),
        }
    }

    /// Whether the avoidance pattern was flagged.
    pub fn pattern_detected(&self) -> bool {
        self.pattern.as_ref().map_or(false, |p| p.detected)
    }
}

/// Scans a history for cadence gaps.
#[derive(Debug, Clone)]
pub struct MissingDataAnalyzer {
    config: MissingDataConfig,
}

impl MissingDataAnalyzer {
    /// Create an analyzer with default thresholds.
    pub fn new() -> Self {
        Self {
            config: MissingDataConfig::default(),
        }
    }

    /// Create an analyzer with custom thresholds.
    pub fn with_config(config: MissingDataConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    pub fn config(&self) -> &MissingDataConfig {
        &self.config
    }

    /// Analyze a history sorted ascending by timestamp.
    pub fn analyze(
        &self,
        history: &[Measurement],
        expected_cadence_days: u32,
    ) -> Result<MissingDataAnalysis> {
        if expected_cadence_days == 0 {
            return Err(AnalysisError::InvalidInput(
                "expected cadence must be at least one day".to_string(),
            ));
        }
        validate_history(history)?;

        if history.len() < 2 {
            debug!("History has {} measurement(s), nothing to scan", history.len());
            return Ok(MissingDataAnalysis::empty());
        }

        let cadence = expected_cadence_days as f64;
        let threshold = cadence * self.config.tolerance_factor;

        let gaps: Vec<MeasurementGap> = history
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let days = days_between(pair[0].timestamp, pair[1].timestamp);
                (days > threshold).then(|| MeasurementGap {
                    start_index: i,
                    end_index: i + 1,
                    start: pair[0].timestamp,
                    end: pair[1].timestamp,
                    days,
                    expected_days: expected_cadence_days,
                    preceded_by_regression: self.is_regression_before(history, i),
                })
            })
            .collect();

        let span_days = days_between(history[0].timestamp, history[history.len() - 1].timestamp);
        debug!(
            "Found {} gap(s) over {:.1} days (threshold {:.1} days)",
            gaps.len(),
            span_days,
            threshold
        );

        let pattern = self.detect_pattern(&gaps, cadence);
        let impact = self.estimate_impact(&gaps, pattern.as_ref(), span_days, cadence);
        let recommendations =
            self.recommend(&gaps, pattern.as_ref(), &impact, expected_cadence_days);

        Ok(MissingDataAnalysis {
            gaps,
            pattern,
            impact,
            recommendations,
        })
    }

    /// Whether the reading at `index` rose above the mean of the readings before it.
    fn is_regression_before(&self, history: &[Measurement], index: usize) -> bool {
        let Some(angle) = history[index].primary_angle else {
            return false;
        };

        let prior: Vec<f64> = history[..index]
            .iter()
            .rev()
            .filter_map(|m| m.primary_angle)
            .take(self.config.trend_window)
            .collect();
        if prior.is_empty() {
            return false;
        }

        let prior_mean = prior.iter().sum::<f64>() / prior.len() as f64;
        angle - prior_mean > self.config.regression_margin_degrees
    }

    fn detect_pattern(&self, gaps: &[MeasurementGap], cadence: f64) -> Option<NonRandomPattern> {
        if gaps.is_empty() {
            return None;
        }

        let total_gaps = gaps.len();
        let regressing: Vec<&MeasurementGap> =
            gaps.iter().filter(|g| g.preceded_by_regression).collect();
        let regressing_gaps = regressing.len();
        let fraction = regressing_gaps as f64 / total_gaps as f64;

        let severe_single = regressing
            .iter()
            .any(|g| g.days >= cadence * self.config.severe_gap_factor);
        let detected = fraction > self.config.avoidance_fraction_threshold
            && (regressing_gaps >= self.config.min_regressing_gaps || severe_single);

        if detected {
            warn!(
                "Non-random missingness suspected: {}/{} gaps follow a regression",
                regressing_gaps, total_gaps
            );
        }

        Some(NonRandomPattern {
            detected,
            probability: fraction * self.config.max_pattern_probability,
            regressing_gaps,
            total_gaps,
        })
    }

    fn estimate_impact(
        &self,
        gaps: &[MeasurementGap],
        pattern: Option<&NonRandomPattern>,
        span_days: f64,
        cadence: f64,
    ) -> MissingDataImpact {
        if gaps.is_empty() {
            return MissingDataImpact::default();
        }

        let missed: f64 = gaps.iter().map(MeasurementGap::missed_days).sum();
        let missed_fraction = if span_days > 0.0 {
            (missed / span_days).min(1.0)
        } else {
            0.0
        };

        let detected = pattern.map_or(false, |p| p.detected);
        let mut increase = missed_fraction * self.config.gap_uncertainty_weight;
        if detected {
            increase *= self.config.avoidance_penalty;
        }
        let increase = increase.min(self.config.max_uncertainty_increase);

        let severe_limit = cadence * self.config.severe_gap_factor;
        MissingDataImpact {
            prediction_uncertainty_increase: increase,
            recommendation_confidence: (1.0 - increase).clamp(0.0, 1.0),
            interpolation_warranted: !detected && gaps.iter().all(|g| g.days < severe_limit),
        }
    }

    fn recommend(
        &self,
        gaps: &[MeasurementGap],
        pattern: Option<&NonRandomPattern>,
        impact: &MissingDataImpact,
        cadence_days: u32,
    ) -> Vec<String> {
        if gaps.is_empty() {
            return vec![
                "Your measurement rhythm is on track, so forecasts use your full history."
                    .to_string(),
            ];
        }

        let mut recommendations = Vec::new();

        if pattern.map_or(false, |p| p.detected) {
            recommendations.push(
                "Breaks tend to follow less favorable readings. Day-to-day fluctuation is normal, \
                 and measuring through it keeps your progress picture honest."
                    .to_string(),
            );
        }

        let longest = gaps.iter().map(|g| g.days).fold(0.0, f64::max);
        if longest >= cadence_days as f64 * self.config.severe_gap_factor {
            recommendations.push(format!(
                "A break of {:.0} days widens forecast ranges; a few regular measurements will narrow them again.",
                longest
            ));
        }

        if gaps.len() >= self.config.frequent_gap_count {
            recommendations.push(format!(
                "{} gaps found. A reminder every {} days can help keep measurements regular.",
                gaps.len(),
                cadence_days
            ));
        }

        if impact.interpolation_warranted {
            recommendations.push(
                "Short gaps look random, so values between measurements are interpolated."
                    .to_string(),
            );
        }

        recommendations
    }
}

impl Default for MissingDataAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn start() -> Time {
        Utc.with_ymd_and_hms(2024, 2, 1, 7, 30, 0).unwrap()
    }

    fn series(points: &[(i64, f64)]) -> Vec<Measurement> {
        points
            .iter()
            .map(|&(day, angle)| Measurement::new(start() + Duration::days(day), Some(angle), 0.9))
            .collect()
    }

    #[test]
    fn test_empty_and_single_history() {
        let analyzer = MissingDataAnalyzer::new();

        let empty = analyzer.analyze(&[], 7).unwrap();
        assert!(empty.gaps.is_empty());
        assert!(empty.pattern.is_none());
        assert_eq!(empty.impact.prediction_uncertainty_increase, 0.0);

        let single = analyzer.analyze(&series(&[(0, 130.0)]), 7).unwrap();
        assert!(single.gaps.is_empty());
        assert!(!single.pattern_detected());
    }

    #[test]
    fn test_gap_detection_is_exact() {
        let analyzer = MissingDataAnalyzer::new();
        // Deltas: 7, 10, 11, 2, 15 against a 10.5 day threshold.
        let history = series(&[
            (0, 130.0),
            (7, 129.5),
            (17, 129.0),
            (28, 128.5),
            (30, 128.0),
            (45, 127.5),
        ]);

        let analysis = analyzer.analyze(&history, 7).unwrap();
        let pairs: Vec<(usize, usize)> = analysis
            .gaps
            .iter()
            .map(|g| (g.start_index, g.end_index))
            .collect();
        assert_eq!(pairs, vec![(2, 3), (4, 5)]);
        assert!((analysis.gaps[0].days - 11.0).abs() < 1e-9);
        assert_eq!(analysis.gaps[1].expected_days, 7);
    }

    #[test]
    fn test_elapsed_equal_to_threshold_is_not_a_gap() {
        let analyzer = MissingDataAnalyzer::new();
        let history = vec![
            Measurement::new(start(), Some(130.0), 0.9),
            Measurement::new(start() + Duration::hours(252), Some(129.0), 0.9),
            Measurement::new(start() + Duration::hours(253 + 252), Some(128.0), 0.9),
        ];

        let analysis = analyzer.analyze(&history, 7).unwrap();
        assert_eq!(analysis.gaps.len(), 1);
        assert_eq!(analysis.gaps[0].start_index, 1);
    }

    #[test]
    fn test_long_gap_after_regression_flags_pattern() {
        let analyzer = MissingDataAnalyzer::new();
        let with_gap = series(&[
            (0, 130.0),
            (7, 129.0),
            (14, 128.0),
            (21, 131.0),
            (81, 129.0),
            (88, 128.0),
        ]);

        let analysis = analyzer.analyze(&with_gap, 7).unwrap();
        assert_eq!(analysis.gaps.len(), 1);
        assert!((analysis.gaps[0].days - 60.0).abs() < 1e-9);
        assert!(analysis.gaps[0].preceded_by_regression);
        assert!(analysis.pattern_detected());

        let pattern = analysis.pattern.as_ref().unwrap();
        assert_eq!(pattern.regressing_gaps, 1);
        assert_eq!(pattern.total_gaps, 1);
        assert!(pattern.probability > 0.0);

        let regular: Vec<(i64, f64)> = (0..13).map(|w| (w * 7, 130.0 - w as f64 * 0.2)).collect();
        let baseline = analyzer.analyze(&series(&regular), 7).unwrap();
        assert!(baseline.gaps.is_empty());
        assert!(
            analysis.impact.prediction_uncertainty_increase
                > baseline.impact.prediction_uncertainty_increase
        );
        assert!(!analysis.impact.interpolation_warranted);
        assert!(analysis.recommendations[0].contains("less favorable"));
    }

    #[test]
    fn test_short_gap_after_regression_needs_company() {
        let analyzer = MissingDataAnalyzer::new();
        // One regressing 14-day gap: under the severe length and below the count.
        let history = series(&[(0, 130.0), (7, 129.0), (14, 131.0), (28, 129.0), (35, 128.5)]);

        let analysis = analyzer.analyze(&history, 7).unwrap();
        assert_eq!(analysis.gaps.len(), 1);
        assert!(analysis.gaps[0].preceded_by_regression);
        assert!(!analysis.pattern_detected());
        assert!(analysis.impact.interpolation_warranted);
    }

    #[test]
    fn test_repeated_regressing_gaps_flag_pattern() {
        let analyzer = MissingDataAnalyzer::new();
        let history = series(&[
            (0, 130.0),
            (7, 129.0),
            (14, 131.0),
            (28, 129.0),
            (35, 128.0),
            (42, 130.5),
            (56, 128.0),
        ]);

        let analysis = analyzer.analyze(&history, 7).unwrap();
        assert_eq!(analysis.gaps.len(), 2);
        assert!(analysis.pattern_detected());
    }

    #[test]
    fn test_penalty_is_clamped() {
        let analyzer = MissingDataAnalyzer::new();
        let history = series(&[(0, 130.0), (1, 129.0), (2, 132.0), (300, 131.0)]);

        let analysis = analyzer.analyze(&history, 1).unwrap();
        assert!(analysis.impact.prediction_uncertainty_increase <= 0.9);
        assert!(analysis.impact.recommendation_confidence >= 0.0);
    }

    #[test]
    fn test_unresolved_angle_is_not_a_regression() {
        let analyzer = MissingDataAnalyzer::new();
        let mut history = series(&[(0, 130.0), (7, 129.0)]);
        history.push(Measurement::new(start() + Duration::days(14), None, 0.3));
        history.push(Measurement::new(start() + Duration::days(80), Some(128.0), 0.9));

        let analysis = analyzer.analyze(&history, 7).unwrap();
        assert_eq!(analysis.gaps.len(), 1);
        assert!(!analysis.gaps[0].preceded_by_regression);
        assert!(!analysis.pattern_detected());
    }

    #[test]
    fn test_invalid_input_is_reported() {
        let analyzer = MissingDataAnalyzer::new();
        let unsorted = series(&[(7, 130.0), (0, 129.0)]);
        assert!(matches!(
            analyzer.analyze(&unsorted, 7),
            Err(AnalysisError::UnsortedHistory { index: 1 })
        ));
        assert!(matches!(
            analyzer.analyze(&series(&[(0, 130.0)]), 0),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        let config = MissingDataConfig {
            tolerance_factor: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            MissingDataAnalyzer::with_config(config),
            Err(AnalysisError::Configuration(_))
        ));
        assert!(MissingDataAnalyzer::with_config(MissingDataConfig::default()).is_ok());
    }
}
