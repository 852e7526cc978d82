//! Capture acceptance checks.
//!
//! Evaluates the quality flags of a capture against minimums. The result is
//! advisory: callers decide what to show, and analysis crates never drop a
//! measurement because of it.

use chinup_core::Measurement;
use serde::{Deserialize, Serialize};

/// Minimum capture conditions for an acceptable measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceCriteria {
    /// Minimum pipeline confidence
    pub min_confidence: f64,
    /// Minimum pose alignment
    pub min_pose_alignment: f64,
    /// Minimum expression neutrality
    pub min_expression_neutrality: f64,
    /// Minimum lighting uniformity
    pub min_lighting_uniformity: f64,
    /// Whether chin and neck must be fully visible
    pub require_full_visibility: bool,
}

impl Default for AcceptanceCriteria {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            min_pose_alignment: 0.8,
            min_expression_neutrality: 0.7,
            min_lighting_uniformity: 0.6,
            require_full_visibility: true,
        }
    }
}

/// A reason a capture falls short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum QualityIssue {
    /// Pipeline confidence too low
    LowConfidence {
        /// Measured score
        observed: f64,
        /// Required minimum
        minimum: f64,
    },
    /// Head pose too far from reference
    PoseMisaligned {
        /// Measured score
        observed: f64,
        /// Required minimum
        minimum: f64,
    },
    /// Expression not neutral enough
    ExpressionNotNeutral {
        /// Measured score
        observed: f64,
        /// Required minimum
        minimum: f64,
    },
    /// Lighting too uneven
    UnevenLighting {
        /// Measured score
        observed: f64,
        /// Required minimum
        minimum: f64,
    },
    /// Chin or neck partly hidden
    NotFullyVisible,
    /// The primary angle could not be resolved
    AngleUnresolved,
}

impl QualityIssue {
    /// Short user-facing hint.
    pub fn hint(&self) -> &'static str {
        match self {
            QualityIssue::LowConfidence { .. } => "Hold still for a moment during capture",
            QualityIssue::PoseMisaligned { .. } => "Face the camera straight on, chin level",
            QualityIssue::ExpressionNotNeutral { .. } => "Relax your face and keep a neutral expression",
            QualityIssue::UnevenLighting { .. } => "Find even lighting without strong shadows",
            QualityIssue::NotFullyVisible => "Keep your chin and neck in frame",
            QualityIssue::AngleUnresolved => "The angle could not be measured; try again",
        }
    }
}

/// Outcome of checking one capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceReport {
    /// Whether every criterion was met
    pub acceptable: bool,
    /// Criteria that were not met
    pub issues: Vec<QualityIssue>,
}

impl AcceptanceCriteria {
    /// Check a capture.
    pub fn evaluate(&self, measurement: &Measurement) -> AcceptanceReport {
        let q = &measurement.quality;
        let mut issues = Vec::new();

        if measurement.primary_angle.is_none() {
            issues.push(QualityIssue::AngleUnresolved);
        }
        if measurement.confidence_score < self.min_confidence {
            issues.push(QualityIssue::LowConfidence {
                observed: measurement.confidence_score,
                minimum: self.min_confidence,
            });
        }
        if q.pose_alignment < self.min_pose_alignment {
            issues.push(QualityIssue::PoseMisaligned {
                observed: q.pose_alignment,
                minimum: self.min_pose_alignment,
            });
        }
        if q.expression_neutrality < self.min_expression_neutrality {
            issues.push(QualityIssue::ExpressionNotNeutral {
                observed: q.expression_neutrality,
                minimum: self.min_expression_neutrality,
            });
        }
        if q.lighting_uniformity < self.min_lighting_uniformity {
            issues.push(QualityIssue::UnevenLighting {
                observed: q.lighting_uniformity,
                minimum: self.min_lighting_uniformity,
            });
        }
        if self.require_full_visibility && !q.fully_visible {
            issues.push(QualityIssue::NotFullyVisible);
        }

        AcceptanceReport {
            acceptable: issues.is_empty(),
            issues,
        }
    }

    /// Indices of captures in `history` that fall short.
    pub fn flagged_indices(&self, history: &[Measurement]) -> Vec<usize> {
        history
            .iter()
            .enumerate()
            .filter(|(_, m)| !self.evaluate(m).acceptable)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chinup_core::QualityFlags;
    use chrono::Utc;

    #[test]
    fn test_clean_capture_is_acceptable() {
        let m = Measurement::new(Utc::now(), Some(125.0), 0.92);
        let report = AcceptanceCriteria::default().evaluate(&m);
        assert!(report.acceptable);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_every_failed_flag_is_reported() {
        let m = Measurement::new(Utc::now(), None, 0.4).with_quality(QualityFlags {
            pose_alignment: 0.5,
            expression_neutrality: 0.9,
            lighting_uniformity: 0.3,
            fully_visible: false,
        });

        let report = AcceptanceCriteria::default().evaluate(&m);
        assert!(!report.acceptable);
        assert_eq!(report.issues.len(), 5);
        assert_eq!(report.issues[0], QualityIssue::AngleUnresolved);
        assert!(report.issues.contains(&QualityIssue::NotFullyVisible));
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, QualityIssue::UnevenLighting { observed, .. } if *observed == 0.3)));
    }

    #[test]
    fn test_visibility_requirement_can_be_relaxed() {
        let criteria = AcceptanceCriteria {
            require_full_visibility: false,
            ..Default::default()
        };
        let m = Measurement::new(Utc::now(), Some(125.0), 0.9).with_quality(QualityFlags {
            fully_visible: false,
            ..Default::default()
        });
        assert!(criteria.evaluate(&m).acceptable);
    }

    #[test]
    fn test_flagged_indices_keep_history_intact() {
        let now = Utc::now();
        let history = vec![
            Measurement::new(now, Some(125.0), 0.9),
            Measurement::new(now, Some(124.0), 0.2),
            Measurement::new(now, Some(123.0), 0.95),
        ];
        assert_eq!(AcceptanceCriteria::default().flagged_indices(&history), vec![1]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_issue_hints_are_not_empty() {
        assert!(!QualityIssue::NotFullyVisible.hint().is_empty());
        assert!(!QualityIssue::AngleUnresolved.hint().is_empty());
    }
}
