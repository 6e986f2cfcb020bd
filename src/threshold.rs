//! Health thresholds and the verdict computed from a rolled-up tree.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::element::ElementKind;
use crate::error::{CovgateError, Result};
use crate::model::{CoverageTree, NodeId, Ratio};

/// Classification of a coverage ratio, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Unstable,
    Unhealthy,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Unstable => "unstable",
            Health::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum percentages for one element kind.
///
/// Below `unhealthy_min` is unhealthy, from `unhealthy_min` up to (but not
/// including) `unstable_min` is unstable, anything else is healthy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Threshold {
    pub applies_to: ElementKind,
    pub unhealthy_min: f64,
    pub unstable_min: f64,
}

impl Threshold {
    pub fn new(applies_to: ElementKind, unhealthy_min: f64, unstable_min: f64) -> Result<Self> {
        for (label, value) in [("unhealthy", unhealthy_min), ("unstable", unstable_min)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(CovgateError::InvalidThreshold(format!(
                    "{} minimum for {} must be between 0 and 100, got {}",
                    label, applies_to, value
                )));
            }
        }
        if unhealthy_min > unstable_min {
            return Err(CovgateError::InvalidThreshold(format!(
                "unhealthy minimum ({}) for {} is above the unstable minimum ({})",
                unhealthy_min, applies_to, unstable_min
            )));
        }
        Ok(Self {
            applies_to,
            unhealthy_min,
            unstable_min,
        })
    }

    #[must_use]
    pub fn classify(&self, percent: f64) -> Health {
        if percent < self.unhealthy_min {
            Health::Unhealthy
        } else if percent < self.unstable_min {
            Health::Unstable
        } else {
            Health::Healthy
        }
    }
}

/// Thresholds with at most one entry per element kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ThresholdSet {
    entries: Vec<Threshold>,
}

impl ThresholdSet {
    pub fn new(entries: Vec<Threshold>) -> Result<Self> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.applies_to == entry.applies_to) {
                return Err(CovgateError::DuplicateThreshold(
                    entry.applies_to.to_string(),
                ));
            }
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which outcomes should fail the build rather than only be reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatePolicy {
    pub fail_unhealthy: bool,
    pub fail_unstable: bool,
    pub fail_no_reports: bool,
}

/// Why a verdict asks for a failing build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
    /// No coverage data, or no data for a configured kind.
    NoReports,
    /// A threshold classified the build at this health.
    BelowThreshold(Health),
}

/// Outcome of a single threshold.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdResult {
    pub applies_to: ElementKind,
    pub ratio: Ratio,
    /// `None` when there is no data for the kind; classified as 100%.
    pub percent: Option<f64>,
    pub unhealthy_min: f64,
    pub unstable_min: f64,
    pub health: Health,
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub results: Vec<ThresholdResult>,
    /// Worst health across all thresholds.
    pub health: Health,
    /// The evaluated node has no instrumented lines.
    pub no_reports: bool,
    pub failure: Option<Failure>,
}

impl Verdict {
    #[must_use]
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Turn a failing verdict into an error.
    pub fn into_result(self) -> Result<Verdict> {
        match self.failure {
            Some(Failure::NoReports) => Err(CovgateError::NoReports),
            Some(Failure::BelowThreshold(health)) => Err(CovgateError::GateFailed { health }),
            None => Ok(self),
        }
    }
}

/// Evaluate thresholds against the root of a rolled-up tree.
pub fn evaluate(tree: &CoverageTree, thresholds: &ThresholdSet, policy: &GatePolicy) -> Verdict {
    evaluate_at(tree, tree.root(), thresholds, policy)
}

/// Evaluate thresholds against any node of a rolled-up tree.
pub fn evaluate_at(
    tree: &CoverageTree,
    id: NodeId,
    thresholds: &ThresholdSet,
    policy: &GatePolicy,
) -> Verdict {
    let node = tree.node(id);

    let results: Vec<ThresholdResult> = thresholds
        .iter()
        .map(|threshold| {
            let ratio = node.ratio(&threshold.applies_to);
            let percent = ratio.percent();
            let health = threshold.classify(percent.unwrap_or(100.0));
            debug!(
                kind = %threshold.applies_to,
                covered = ratio.covered,
                total = ratio.total,
                %health,
                "evaluated threshold"
            );
            ThresholdResult {
                applies_to: threshold.applies_to.clone(),
                ratio,
                percent,
                unhealthy_min: threshold.unhealthy_min,
                unstable_min: threshold.unstable_min,
                health,
            }
        })
        .collect();

    let health = results
        .iter()
        .map(|r| r.health)
        .max()
        .unwrap_or(Health::Healthy);
    let no_reports = node.ratio(&ElementKind::LINE).is_empty();
    let missing_data = no_reports || results.iter().any(|r| r.ratio.is_empty());

    let failure = if policy.fail_no_reports && missing_data {
        Some(Failure::NoReports)
    } else if (health == Health::Unhealthy && policy.fail_unhealthy)
        || (health >= Health::Unstable && policy.fail_unstable)
    {
        Some(Failure::BelowThreshold(health))
    } else {
        None
    };

    Verdict {
        results,
        health,
        no_reports,
        failure,
    }
}
