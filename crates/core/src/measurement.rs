//! Measurement model - one face-geometry capture.

use serde::{Deserialize, Serialize};
use crate::error::{AnalysisError, Result};
use crate::id::MeasurementId;
use crate::Time;

/// A single capture event produced by the sensing pipeline.
///
/// Measurements are immutable once created. Fields the capture could not
/// resolve are `None`; zero is a real value, never a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unique identifier
    #[serde(default)]
    pub id: MeasurementId,

    /// When the capture happened
    pub timestamp: Time,

    /// Cervico-mental angle in degrees
    #[serde(default)]
    pub primary_angle: Option<f64>,

    /// Secondary face-geometry metrics
    #[serde(default)]
    pub secondary: SecondaryMetrics,

    /// Capture confidence reported by the sensing pipeline (0.0 to 1.0)
    pub confidence_score: f64,

    /// Capture conditions
    #[serde(default)]
    pub quality: QualityFlags,
}

/// Optional secondary metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondaryMetrics {
    /// Chin-to-neck length in millimetres
    pub neck_chin_length_mm: Option<f64>,

    /// Jawline definition index
    pub jawline_definition_index: Option<f64>,

    /// Submental adiposity score
    pub submental_fat_score: Option<f64>,
}

/// Capture-condition flags. All scores are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFlags {
    /// How well the head pose matched the reference pose
    pub pose_alignment: f64,

    /// How neutral the facial expression was
    pub expression_neutrality: f64,

    /// Lighting evenness across the face
    pub lighting_uniformity: f64,

    /// Whether chin and neck were fully visible
    pub fully_visible: bool,
}

impl Default for QualityFlags {
    fn default() -> Self {
        Self {
            pose_alignment: 1.0,
            expression_neutrality: 1.0,
            lighting_uniformity: 1.0,
            fully_visible: true,
        }
    }
}

impl Measurement {
    /// Create a measurement with default quality flags and no secondary metrics.
    pub fn new(timestamp: Time, primary_angle: Option<f64>, confidence_score: f64) -> Self {
        Self {
            id: MeasurementId::new(),
            timestamp,
            primary_angle,
            secondary: SecondaryMetrics::default(),
            confidence_score,
            quality: QualityFlags::default(),
        }
    }

    /// Set secondary metrics.
    pub fn with_secondary(mut self, secondary: SecondaryMetrics) -> Self {
        self.secondary = secondary;
        self
    }

    /// Set quality flags.
    pub fn with_quality(mut self, quality: QualityFlags) -> Self {
        self.quality = quality;
        self
    }

    /// Angle band of this capture, if the angle was resolved.
    pub fn band(&self) -> Option<AngleBand> {
        self.primary_angle.map(AngleBand::from_angle)
    }

    /// Check a single measurement's numeric fields.
    pub fn validate(&self, index: usize) -> Result<()> {
        if !self.confidence_score.is_finite() {
            return Err(AnalysisError::NonFiniteValue { index, field: "confidence_score" });
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(AnalysisError::ConfidenceOutOfRange {
                index,
                value: self.confidence_score,
            });
        }
        if let Some(angle) = self.primary_angle {
            if !angle.is_finite() {
                return Err(AnalysisError::NonFiniteValue { index, field: "primary_angle" });
            }
        }
        Ok(())
    }
}

/// Validate a history: every entry well-formed and timestamps non-decreasing.
///
/// Unsorted input is reported, never re-sorted.
pub fn validate_history(history: &[Measurement]) -> Result<()> {
    for (index, m) in history.iter().enumerate() {
        m.validate(index)?;
        if index > 0 && m.timestamp < history[index - 1].timestamp {
            return Err(AnalysisError::UnsortedHistory { index });
        }
    }
    Ok(())
}

/// Fractional days elapsed from `from` to `to`.
pub fn days_between(from: Time, to: Time) -> f64 {
    to.signed_duration_since(from).num_seconds() as f64 / 86_400.0
}

/// Coarse band for a cervico-mental angle. Lower is more favorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleBand {
    /// Within the favorable range (120° or below)
    Optimal,
    /// Above 120° up to 135°
    Moderate,
    /// Above 135°
    Elevated,
}

impl AngleBand {
    /// Upper bound of the optimal band, in degrees.
    pub const OPTIMAL_MAX: f64 = 120.0;

    /// Upper bound of the moderate band, in degrees.
    pub const MODERATE_MAX: f64 = 135.0;

    /// Band for an angle in degrees.
    pub fn from_angle(angle: f64) -> Self {
        if angle <= Self::OPTIMAL_MAX {
            AngleBand::Optimal
        } else if angle <= Self::MODERATE_MAX {
            AngleBand::Moderate
        } else {
            AngleBand::Elevated
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AngleBand::Optimal => "optimal",
            AngleBand::Moderate => "moderate",
            AngleBand::Elevated => "elevated",
        }
    }
}
