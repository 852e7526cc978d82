//! Wellbeing safeguards - usage signals and risk screening.

#![warn(missing_docs, unused_crate_dependencies)]

mod signals;
mod assessor;

pub use signals::BehaviorSignals;
pub use assessor::{
    RiskAssessor, RiskConfig, RiskAssessment, RiskConcern, ConcernKind, RiskLevel,
};
