//! Progress prediction.
//!
//! Forecasts the cervico-mental angle at fixed horizons. The trend is a
//! bounded-growth model: the current rate of change decays with a fixed
//! half-life, so the total change any forecast can promise is capped.
//! Short histories lean on a population prior; the empirical trend takes
//! over as measurements accumulate.

use std::collections::VecDeque;
use std::f64::consts::LN_2;

use chinup_core::{days_between, validate_history, AnalysisError, Measurement, Result, Time};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::trend::weighted_linear_fit;

/// Longest forecast horizon accepted by `PredictionConfig::validate`.
pub const MAX_HORIZON_DAYS: u32 = 3650;

/// Configuration for the prediction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Forecast horizons in days after the latest measurement, ascending
    pub horizons_days: Vec<u32>,

    /// Population starting angle used when nothing is known
    pub population_baseline_angle: f64,

    /// Total improvement (degrees) a typical user sees over the program
    pub population_total_improvement: f64,

    /// Half-life of the rate of change, in days
    pub half_life_days: f64,

    /// Resolved measurements at which the empirical trend gets full weight
    pub saturation_count: usize,

    /// Most recent measurements kept for fitting
    pub window_size: usize,

    /// Clamp for the empirical rate, degrees per day
    pub max_rate_per_day: f64,

    /// Spread assumed when residuals are not available, degrees
    pub prior_sigma: f64,

    /// Floor for the base spread, degrees
    pub min_sigma: f64,

    /// Horizon length over which the spread grows by a factor of sqrt(2)
    pub horizon_scale_days: f64,

    /// Interval half-width in multiples of the spread
    pub interval_z: f64,

    /// Lowest confidence level ever reported
    pub min_confidence_level: f64,

    /// Highest confidence level ever reported
    pub max_confidence_level: f64,

    /// e-folding horizon for confidence decay, in days
    pub confidence_decay_days: f64,

    /// Capture confidence assumed for an empty history
    pub assumed_confidence_without_data: f64,

    /// Forecasts never go below this angle
    pub min_plausible_angle: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            horizons_days: vec![30, 90, 180],
            population_baseline_angle: 128.0,
            population_total_improvement: 4.0,
            half_life_days: 60.0,
            saturation_count: 8,
            window_size: 12,
            max_rate_per_day: 0.5,
            prior_sigma: 3.0,
            min_sigma: 0.5,
            horizon_scale_days: 30.0,
            interval_z: 1.645,
            min_confidence_level: 0.4,
            max_confidence_level: 0.95,
            confidence_decay_days: 365.0,
            assumed_confidence_without_data: 0.5,
            min_plausible_angle: 90.0,
        }
    }
}

impl PredictionConfig {
    /// Check that the constants are usable.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(AnalysisError::Configuration(msg.to_string()));
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if self.horizons_days.is_empty() {
            return bad("horizons_days must not be empty");
        }
        if self.horizons_days[0] == 0 || self.horizons_days.windows(2).any(|w| w[0] >= w[1]) {
            return bad("horizons_days must be positive and strictly ascending");
        }
        if self.horizons_days.iter().any(|&h| h > MAX_HORIZON_DAYS) {
            return bad("horizons_days must not exceed ten years");
        }
        if !self.population_baseline_angle.is_finite() {
            return bad("population_baseline_angle must be finite");
        }
        if !self.population_total_improvement.is_finite() || self.population_total_improvement < 0.0 {
            return bad("population_total_improvement must be non-negative");
        }
        if !positive(self.half_life_days) {
            return bad("half_life_days must be positive");
        }
        if self.saturation_count < 2 {
            return bad("saturation_count must be at least 2");
        }
        if self.window_size < 2 {
            return bad("window_size must be at least 2");
        }
        if !positive(self.max_rate_per_day) {
            return bad("max_rate_per_day must be positive");
        }
        if !positive(self.prior_sigma) || !positive(self.min_sigma) {
            return bad("prior_sigma and min_sigma must be positive");
        }
        if !positive(self.horizon_scale_days) || !positive(self.confidence_decay_days) {
            return bad("horizon_scale_days and confidence_decay_days must be positive");
        }
        if !positive(self.interval_z) {
            return bad("interval_z must be positive");
        }
        if !(0.0 < self.min_confidence_level
            && self.min_confidence_level < self.max_confidence_level
            && self.max_confidence_level <= 1.0)
        {
            return bad("confidence levels must satisfy 0 < min < max <= 1");
        }
        if !(0.0..=1.0).contains(&self.assumed_confidence_without_data) {
            return bad("assumed_confidence_without_data must be in [0, 1]");
        }
        if !self.min_plausible_angle.is_finite() {
            return bad("min_plausible_angle must be finite");
        }
        Ok(())
    }
}

/// Lower and upper forecast bound, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

impl ConfidenceInterval {
    /// Interval width.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Whether `value` lies inside the interval.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Where a forecast's trend came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictionBasis {
    /// Not enough history; the population curve was used
    PopulationPrior,
    /// Empirical trend blended with the population curve
    Blended {
        /// Weight of the empirical trend (0.0 to 1.0)
        empirical_weight: f64,
    },
    /// Empirical trend only
    Empirical,
}

/// A forecast at one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Days after the latest measurement
    pub horizon_days: u32,

    /// Days after the first measurement
    pub days_from_baseline: f64,

    /// Calendar date of the forecast, when there is an anchor measurement
    pub target_date: Option<Time>,

    /// Forecast angle, degrees
    pub predicted_angle: f64,

    /// Interval around the forecast
    pub confidence_interval: ConfidenceInterval,

    /// Probability attached to the interval (0.4 to 0.95)
    pub confidence_level: f64,

    /// One-sigma spread, degrees
    pub uncertainty: f64,

    /// Trend source
    pub basis: PredictionBasis,
}

/// Running state fed by `update_with_measurement`.
#[derive(Debug, Clone, Default)]
struct RunningAccumulator {
    count: usize,
    resolved: usize,
    angle_sum: f64,
    confidence_sum: f64,
    first_timestamp: Option<Time>,
    window: VecDeque<Measurement>,
}

/// The evidence a forecast is built from.
struct Evidence<'a> {
    origin: Option<Time>,
    recent: Vec<&'a Measurement>,
    mean_confidence: Option<f64>,
}

/// Trend parameters shared by every horizon of one forecast run.
struct Trend {
    anchor_angle: f64,
    anchor_time: Option<Time>,
    anchor_offset_days: f64,
    rate_per_day: f64,
    empirical_weight: f64,
    base_sigma: f64,
    basis: PredictionBasis,
}

/// Forecasts progress from a measurement history.
///
/// One engine instance belongs to one user; the running accumulator behind
/// `update_with_measurement` is not shared.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    config: PredictionConfig,
    running: RunningAccumulator,
}

impl PredictionEngine {
    /// Create an engine with default constants.
    pub fn new() -> Self {
        Self {
            config: PredictionConfig::default(),
            running: RunningAccumulator::default(),
        }
    }

    /// Create an engine with custom constants.
    pub fn with_config(config: PredictionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            running: RunningAccumulator::default(),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Feed one measurement into the running accumulator.
    pub fn update_with_measurement(&mut self, measurement: &Measurement) -> Result<()> {
        let index = self.running.count;
        measurement.validate(index)?;
        if let Some(last) = self.running.window.back() {
            if measurement.timestamp < last.timestamp {
                return Err(AnalysisError::UnsortedHistory { index });
            }
        }

        let running = &mut self.running;
        running.count += 1;
        running.confidence_sum += measurement.confidence_score;
        if let Some(angle) = measurement.primary_angle {
            running.resolved += 1;
            running.angle_sum += angle;
        }
        running.first_timestamp.get_or_insert(measurement.timestamp);
        running.window.push_back(measurement.clone());
        if running.window.len() > self.config.window_size {
            running.window.pop_front();
        }
        Ok(())
    }

    /// Measurements fed so far.
    pub fn measurement_count(&self) -> usize {
        self.running.count
    }

    /// Mean resolved angle over everything fed so far.
    pub fn running_mean_angle(&self) -> Option<f64> {
        (self.running.resolved > 0).then(|| self.running.angle_sum / self.running.resolved as f64)
    }

    /// Forecast from the running accumulator.
    pub fn forecast(&self) -> Vec<Prediction> {
        self.project(&self.running_evidence(), 0.0)
    }

    /// Forecast from the running accumulator, widened by a missing-data
    /// penalty (0.0 to 1.0).
    pub fn forecast_with_penalty(&self, missing_data_penalty: f64) -> Result<Vec<Prediction>> {
        check_penalty(missing_data_penalty)?;
        Ok(self.project(&self.running_evidence(), missing_data_penalty))
    }

    fn running_evidence(&self) -> Evidence<'_> {
        let running = &self.running;
        Evidence {
            origin: running.first_timestamp,
            recent: running.window.iter().collect(),
            mean_confidence: (running.count > 0)
                .then(|| running.confidence_sum / running.count as f64),
        }
    }

    /// Forecast at the standard horizons from a history sorted by timestamp.
    pub fn predict_standard_intervals(&self, history: &[Measurement]) -> Result<Vec<Prediction>> {
        self.predict_with_penalty(history, 0.0)
    }

    /// Like `predict_standard_intervals`, widened by a missing-data penalty
    /// (the uncertainty increase from a missing-data analysis, 0.0 to 1.0).
    pub fn predict_with_penalty(
        &self,
        history: &[Measurement],
        missing_data_penalty: f64,
    ) -> Result<Vec<Prediction>> {
        validate_history(history)?;
        check_penalty(missing_data_penalty)?;

        let tail_start = history.len().saturating_sub(self.config.window_size);
        let evidence = Evidence {
            origin: history.first().map(|m| m.timestamp),
            recent: history[tail_start..].iter().collect(),
            mean_confidence: (!history.is_empty()).then(|| {
                history.iter().map(|m| m.confidence_score).sum::<f64>() / history.len() as f64
            }),
        };
        Ok(self.project(&evidence, missing_data_penalty))
    }

    fn decay_constant(&self) -> f64 {
        LN_2 / self.config.half_life_days
    }

    /// Population rate of change `days` after the program started.
    fn prior_rate(&self, days: f64) -> f64 {
        let k = self.decay_constant();
        -self.config.population_total_improvement * k * (-k * days.max(0.0)).exp()
    }

    fn fit_trend(&self, evidence: &Evidence<'_>) -> Trend {
        let cfg = &self.config;
        let origin = evidence.origin;
        let offset = |t: Time| origin.map_or(0.0, |o| days_between(o, t));

        let resolved: Vec<(f64, f64, f64)> = evidence
            .recent
            .iter()
            .filter_map(|m| {
                m.primary_angle
                    .map(|angle| (offset(m.timestamp), angle, m.confidence_score.max(0.05)))
            })
            .collect();

        let last_time = evidence.recent.last().map(|m| m.timestamp);
        let last_resolved_time = evidence
            .recent
            .iter()
            .rev()
            .find(|m| m.primary_angle.is_some())
            .map(|m| m.timestamp);
        let anchor_time = last_resolved_time.or(last_time);
        let anchor_offset_days = anchor_time.map_or(0.0, offset);

        let prior = |anchor_angle: f64| Trend {
            anchor_angle,
            anchor_time,
            anchor_offset_days,
            rate_per_day: self.prior_rate(anchor_offset_days),
            empirical_weight: 0.0,
            base_sigma: cfg.prior_sigma,
            basis: PredictionBasis::PopulationPrior,
        };

        if resolved.len() < 2 {
            let anchor = resolved
                .first()
                .map_or(cfg.population_baseline_angle, |&(_, angle, _)| angle);
            warn!(
                "{} resolved measurement(s); falling back to the population prior",
                resolved.len()
            );
            return prior(anchor);
        }

        let xs: Vec<f64> = resolved.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = resolved.iter().map(|p| p.1).collect();
        let ws: Vec<f64> = resolved.iter().map(|p| p.2).collect();

        let Some(fit) = weighted_linear_fit(&xs, &ys, &ws) else {
            let weighted_mean =
                ys.iter().zip(&ws).map(|(y, w)| y * w).sum::<f64>() / ws.iter().sum::<f64>();
            warn!("Measurements share one timestamp; falling back to the population prior");
            return prior(weighted_mean);
        };

        let n = resolved.len();
        let weight = ((n - 1) as f64 / (cfg.saturation_count - 1) as f64).clamp(0.0, 1.0);
        let empirical_rate = fit.slope.clamp(-cfg.max_rate_per_day, cfg.max_rate_per_day);
        let rate = weight * empirical_rate + (1.0 - weight) * self.prior_rate(anchor_offset_days);

        let residual_sigma = fit.residual_sd.unwrap_or(cfg.prior_sigma);
        let base_sigma =
            (weight * residual_sigma + (1.0 - weight) * cfg.prior_sigma).max(cfg.min_sigma);

        let basis = if weight >= 1.0 {
            PredictionBasis::Empirical
        } else {
            PredictionBasis::Blended {
                empirical_weight: weight,
            }
        };

        debug!(
            "Trend fit over {} points: slope {:.4}°/day, weight {:.2}, sigma {:.2}",
            n, fit.slope, weight, base_sigma
        );

        Trend {
            anchor_angle: fit.at(anchor_offset_days),
            anchor_time,
            anchor_offset_days,
            rate_per_day: rate,
            empirical_weight: weight,
            base_sigma,
            basis,
        }
    }

    fn project(&self, evidence: &Evidence<'_>, penalty: f64) -> Vec<Prediction> {
        let cfg = &self.config;
        let trend = self.fit_trend(evidence);
        let k = self.decay_constant();

        let mean_confidence = evidence
            .mean_confidence
            .unwrap_or(cfg.assumed_confidence_without_data)
            .clamp(0.0, 1.0);
        let confidence_factor = 1.0 + 2.0 * (1.0 - mean_confidence);
        let data_factor = 0.4 + 0.6 * trend.empirical_weight;

        cfg.horizons_days
            .iter()
            .map(|&horizon| {
                let h = horizon as f64;
                let change = trend.rate_per_day / k * (1.0 - (-k * h).exp());
                let predicted = (trend.anchor_angle + change).max(cfg.min_plausible_angle);

                let sigma = trend.base_sigma
                    * confidence_factor
                    * (1.0 + penalty)
                    * (1.0 + h / cfg.horizon_scale_days).sqrt();
                let half_width = cfg.interval_z * sigma;

                let level = (cfg.max_confidence_level
                    * data_factor
                    * mean_confidence
                    * (-h / cfg.confidence_decay_days).exp()
                    * (1.0 - penalty))
                    .clamp(cfg.min_confidence_level, cfg.max_confidence_level);

                Prediction {
                    horizon_days: horizon,
                    days_from_baseline: trend.anchor_offset_days + h,
                    target_date: trend
                        .anchor_time
                        .and_then(|t| t.checked_add_signed(Duration::days(horizon as i64))),
                    predicted_angle: predicted,
                    confidence_interval: ConfidenceInterval {
                        lower: predicted - half_width,
                        upper: predicted + half_width,
                    },
                    confidence_level: level,
                    uncertainty: sigma,
                    basis: trend.basis,
                }
            })
            .collect()
    }
}

/// NaN fails the range check too.
fn check_penalty(missing_data_penalty: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&missing_data_penalty) {
        return Err(AnalysisError::InvalidInput(format!(
            "missing-data penalty {} is outside [0, 1]",
            missing_data_penalty
        )));
    }
    Ok(())
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}
