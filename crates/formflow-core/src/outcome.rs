//! Outcome classification of the page shown after submit.
use serde::{Deserialize, Serialize};

use crate::target::{MarkerPrecedence, TargetConfig};

/// Message recorded when the site itself reports a failure.
pub const SITE_ERROR_MESSAGE: &str = "site reported an error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    SiteReportedError,
    /// Neither marker found
    Uncertain,
}

pub fn classify(content: &str, target: &TargetConfig) -> Outcome {
    let success = content.contains(&target.success_marker);
    let error = target
        .error_marker
        .as_deref()
        .filter(|m| !m.is_empty())
        .map(|m| content.contains(m))
        .unwrap_or(false);

    match (success, error, target.precedence) {
        (true, true, MarkerPrecedence::ErrorFirst) => Outcome::SiteReportedError,
        (true, true, MarkerPrecedence::SuccessFirst) => Outcome::Succeeded,
        (true, false, _) => Outcome::Succeeded,
        (false, true, _) => Outcome::SiteReportedError,
        (false, false, _) => Outcome::Uncertain,
    }
}
