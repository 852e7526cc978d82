//! Chinup CLI - progress forecasts and wellbeing screening over JSON histories.

mod input;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chinup_core::{Time, UserSession};
use chinup_progress::{
    Prediction, PredictionBasis, PredictionEngine, ResponderClassification, ResponderClassifier,
};
use chinup_quality::{MissingDataAnalysis, MissingDataAnalyzer};
use chinup_safeguard::{BehaviorSignals, RiskAssessment, RiskAssessor};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::input::{load_events, load_session, load_settings, ChinupSettings};

#[derive(Parser)]
#[command(name = "chinup")]
#[command(about = "Progress forecasts and wellbeing screening", long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find gaps in the measurement cadence
    Gaps {
        /// Measurement history (JSON array)
        history: PathBuf,
        /// Expected days between measurements
        #[arg(long)]
        cadence: Option<u32>,
    },
    /// Forecast the angle at 30, 90 and 180 days
    Predict {
        /// Measurement history (JSON array)
        history: PathBuf,
    },
    /// Classify the response trajectory
    Classify {
        /// Measurement history (JSON array)
        history: PathBuf,
    },
    /// Screen behavior events for wellbeing risk
    Risk {
        /// Behavior events (JSON array)
        events: PathBuf,
        /// Assess as of this time (RFC 3339), default now
        #[arg(long)]
        at: Option<Time>,
    },
    /// Run every analysis for one user
    Report {
        /// Measurement history (JSON array)
        history: PathBuf,
        /// Behavior events (JSON array)
        #[arg(long)]
        events: Option<PathBuf>,
        /// Assess risk as of this time (RFC 3339), default now
        #[arg(long)]
        at: Option<Time>,
    },
}

/// Everything `report` produces.
#[derive(Serialize)]
struct Report {
    missing_data: MissingDataAnalysis,
    flagged_captures: Vec<usize>,
    predictions: Vec<Prediction>,
    classification: Option<ResponderClassification>,
    risk: RiskAssessment,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Gaps { history, cadence } => {
            let session = load_session(&history, None)?;
            let cadence = cadence.unwrap_or(settings.expected_cadence_days);
            let analysis = analyze_gaps(&settings, &session, cadence)?;
            if cli.json {
                print_json(&analysis)?;
            } else {
                print_gaps(&analysis);
            }
        }
        Commands::Predict { history } => {
            let session = load_session(&history, None)?;
            let predictions = PredictionEngine::with_config(settings.prediction.clone())
                .context("Invalid prediction settings")?
                .predict_standard_intervals(session.history())?;
            if cli.json {
                print_json(&predictions)?;
            } else {
                print_predictions(&predictions);
            }
        }
        Commands::Classify { history } => {
            let session = load_session(&history, None)?;
            let classification = classify(&settings, &session)?;
            if cli.json {
                print_json(&classification)?;
            } else {
                print_classification(classification.as_ref());
            }
        }
        Commands::Risk { events, at } => {
            let session = events_session(&events)?;
            let assessment = assess(&settings, &session, at)?;
            if cli.json {
                print_json(&assessment)?;
            } else {
                print_risk(&assessment);
            }
        }
        Commands::Report { history, events, at } => {
            let session = load_session(&history, events.as_deref())?;
            let report = build_report(&settings, &session, at)?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_gaps(&report.missing_data);
                println!();
                if !report.flagged_captures.is_empty() {
                    println!("Captures below quality bar: {:?}", report.flagged_captures);
                    println!();
                }
                print_predictions(&report.predictions);
                println!();
                print_classification(report.classification.as_ref());
                println!();
                print_risk(&report.risk);
            }
        }
    }

    Ok(())
}

fn events_session(events: &Path) -> Result<UserSession> {
    let mut session = UserSession::new();
    for event in load_events(events)? {
        session.record_event(event);
    }
    Ok(session)
}

fn analyze_gaps(
    settings: &ChinupSettings,
    session: &UserSession,
    cadence: u32,
) -> Result<MissingDataAnalysis> {
    let analyzer = MissingDataAnalyzer::with_config(settings.missing_data.clone())
        .context("Invalid missing-data settings")?;
    Ok(analyzer.analyze(session.history(), cadence)?)
}

fn classify(
    settings: &ChinupSettings,
    session: &UserSession,
) -> Result<Option<ResponderClassification>> {
    let classifier = ResponderClassifier::with_config(settings.responder.clone())
        .context("Invalid responder settings")?;
    Ok(classifier.classify(session.history())?)
}

fn assess(settings: &ChinupSettings, session: &UserSession, at: Option<Time>) -> Result<RiskAssessment> {
    let assessor =
        RiskAssessor::with_config(settings.risk.clone()).context("Invalid risk settings")?;
    let now = at.unwrap_or_else(chrono::Utc::now);
    let signals = BehaviorSignals::from_events(session.events(), now, settings.signal_window_days);
    Ok(assessor.assess_risk_at(&signals, now)?)
}

fn build_report(settings: &ChinupSettings, session: &UserSession, at: Option<Time>) -> Result<Report> {
    let missing_data = analyze_gaps(settings, session, settings.expected_cadence_days)?;

    // Gaps widen the forecast.
    let penalty = missing_data.impact.prediction_uncertainty_increase;
    let predictions = PredictionEngine::with_config(settings.prediction.clone())
        .context("Invalid prediction settings")?
        .predict_with_penalty(session.history(), penalty)?;

    let report = Report {
        flagged_captures: settings.acceptance.flagged_indices(session.history()),
        classification: classify(settings, session)?,
        risk: assess(settings, session, at)?,
        missing_data,
        predictions,
    };
    info!(
        "Report for session {}: {} gaps, risk {}",
        session.id,
        report.missing_data.gaps.len(),
        report.risk.level.as_str()
    );
    Ok(report)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_gaps(analysis: &MissingDataAnalysis) {
    println!("Gaps ({})", analysis.gaps.len());
    for gap in &analysis.gaps {
        println!(
            "  #{} -> #{} | {:.1} days (expected {}){}",
            gap.start_index,
            gap.end_index,
            gap.days,
            gap.expected_days,
            if gap.preceded_by_regression { " | after regression" } else { "" },
        );
    }
    if let Some(pattern) = &analysis.pattern {
        println!(
            "  Avoidance pattern: {} (p={:.2})",
            if pattern.detected { "DETECTED" } else { "no" },
            pattern.probability
        );
    }
    println!(
        "  Uncertainty increase: {:.0}%",
        analysis.impact.prediction_uncertainty_increase * 100.0
    );
    for rec in &analysis.recommendations {
        println!("  - {}", rec);
    }
}

fn print_predictions(predictions: &[Prediction]) {
    println!("Forecast");
    for p in predictions {
        println!(
            "  {:>3} days | {:.1}° [{:.1}, {:.1}] | confidence {:.0}% | {}",
            p.horizon_days,
            p.predicted_angle,
            p.confidence_interval.lower,
            p.confidence_interval.upper,
            p.confidence_level * 100.0,
            format_basis(&p.basis),
        );
    }
}

fn print_classification(classification: Option<&ResponderClassification>) {
    let Some(c) = classification else {
        println!("Responder: not enough measurements yet");
        return;
    };
    println!("Responder: {} (confidence {:.2})", c.responder_type.as_str(), c.confidence);
    println!(
        "  Rate: {:+.2}°/week | R² {:.2} | {} points",
        c.trajectory.initial_rate_per_week, c.trajectory.r_squared, c.trajectory.sample_count
    );
    if let Some(plateau) = c.trajectory.plateau_estimate {
        println!("  Plateau near {:.1}°", plateau);
    }
    println!("  {}", c.expectations.description);
    println!("  1 month: {}", c.expectations.one_month);
    println!("  3 months: {}", c.expectations.three_months);
    println!("  6 months: {}", c.expectations.six_months);
    println!("  {}", c.expectations.encouragement);
}

fn print_risk(assessment: &RiskAssessment) {
    println!(
        "Risk: {} (score {:.1})",
        assessment.level.as_str().to_uppercase(),
        assessment.score
    );
    for concern in &assessment.concerns {
        println!("  ! {}", concern.evidence);
    }
    for rec in &assessment.recommendations {
        println!("  - {}", rec);
    }
}

fn format_basis(basis: &PredictionBasis) -> String {
    match basis {
        PredictionBasis::PopulationPrior => "population".to_string(),
        PredictionBasis::Blended { empirical_weight } => {
            format!("blended {:.0}% personal", empirical_weight * 100.0)
        }
        PredictionBasis::Empirical => "personal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chinup_core::{BehaviorEvent, BehaviorEventKind, Measurement};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_build_report_widens_forecast_after_gap() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let days = [0, 7, 14, 74, 81];
        let angles = [132.0, 131.0, 131.5, 130.0, 129.5];
        let history: Vec<Measurement> = days
            .iter()
            .zip(angles)
            .map(|(d, a)| Measurement::new(start + Duration::days(*d), Some(a), 0.9))
            .collect();
        let mut session = UserSession::from_history(history.clone()).unwrap();
        let at = start + Duration::days(81);
        for _ in 0..5 {
            session.record_event(BehaviorEvent::new(at, BehaviorEventKind::MeasurementTaken));
        }

        let settings = ChinupSettings::default();
        let report = build_report(&settings, &session, Some(at)).unwrap();

        assert_eq!(report.missing_data.gaps.len(), 1);
        assert_eq!(report.predictions.len(), 3);
        assert!(report.classification.is_some());
        assert!(report.flagged_captures.is_empty());
        assert!(report.risk.level >= chinup_safeguard::RiskLevel::Medium);

        let plain = PredictionEngine::new()
            .predict_standard_intervals(&history)
            .unwrap();
        assert!(
            report.predictions[0].confidence_interval.width()
                > plain[0].confidence_interval.width()
        );
    }
}
