//! JSON inputs for the CLI: settings, history and behavior events.

use std::path::Path;

use anyhow::{Context, Result};
use chinup_core::{BehaviorEvent, Measurement, UserSession};
use chinup_progress::{PredictionConfig, ResponderConfig};
use chinup_quality::{AcceptanceCriteria, MissingDataConfig};
use chinup_safeguard::RiskConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Every component's configuration in one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChinupSettings {
    /// Cadence the user committed to, days
    pub expected_cadence_days: u32,

    /// Rolling window for behavior signals, days
    pub signal_window_days: u32,

    /// Gap detection
    pub missing_data: MissingDataConfig,

    /// Capture acceptance
    pub acceptance: AcceptanceCriteria,

    /// Forecasting
    pub prediction: PredictionConfig,

    /// Responder classification
    pub responder: ResponderConfig,

    /// Risk screening
    pub risk: RiskConfig,
}

impl Default for ChinupSettings {
    fn default() -> Self {
        Self {
            expected_cadence_days: 7,
            signal_window_days: 7,
            missing_data: MissingDataConfig::default(),
            acceptance: AcceptanceCriteria::default(),
            prediction: PredictionConfig::default(),
            responder: ResponderConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

/// Load settings, falling back to defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> Result<ChinupSettings> {
    let Some(path) = path else {
        return Ok(ChinupSettings::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    let settings = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Build a session from a history file and an optional events file.
pub fn load_session(history: &Path, events: Option<&Path>) -> Result<UserSession> {
    let measurements: Vec<Measurement> = read_json(history, "history")?;
    let count = measurements.len();
    let mut session = UserSession::from_history(measurements)
        .with_context(|| format!("Rejected history in {}", history.display()))?;

    if let Some(events) = events {
        for event in load_events(events)? {
            session.record_event(event);
        }
    }

    debug!(
        "Session {} with {} measurements and {} events",
        session.id,
        count,
        session.events().len()
    );
    Ok(session)
}

/// Read a behavior event log.
pub fn load_events(path: &Path) -> Result<Vec<BehaviorEvent>> {
    read_json(path, "events")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} {}", what, path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid {} in {}", what, path.display()))
}
