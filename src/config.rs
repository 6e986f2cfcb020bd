//! Gate configuration.
//!
//! Loaded from JSON and/or command-line flags, then validated once into the
//! runtime types the engine works with (`ThresholdSet`, `GatePolicy`).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::ElementRegistry;
use crate::error::{CovgateError, Result};
use crate::parsers::Format;
use crate::threshold::{GatePolicy, Threshold, ThresholdSet};

/// Root gate configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Report documents to parse, one tree each.
    pub adapters: Vec<AdapterConfig>,

    pub thresholds: Vec<ThresholdConfig>,

    /// Fail the build when a threshold classifies it as unhealthy.
    pub fail_unhealthy: bool,

    /// Fail the build when a threshold classifies it as unstable or worse.
    pub fail_unstable: bool,

    /// Fail the build when there is no coverage data to evaluate.
    pub fail_no_reports: bool,

    /// Log and skip adapters whose document fails to parse instead of
    /// aborting.
    pub skip_malformed: bool,
}

impl GateConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Resolve and validate the threshold table.
    pub fn thresholds(&self, registry: &ElementRegistry) -> Result<ThresholdSet> {
        let entries = self
            .thresholds
            .iter()
            .map(|t| Threshold::new(registry.get(&t.applies_to)?, t.unhealthy, t.unstable))
            .collect::<Result<Vec<_>>>()?;
        ThresholdSet::new(entries)
    }

    pub fn policy(&self) -> GatePolicy {
        GatePolicy {
            fail_unhealthy: self.fail_unhealthy,
            fail_unstable: self.fail_unstable,
            fail_no_reports: self.fail_no_reports,
        }
    }
}

/// One report document and the dialect to read it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterConfig {
    /// Detected from the content when absent.
    #[serde(default)]
    pub format: Option<Format>,

    pub path: PathBuf,

    /// Report name (default: file name).
    #[serde(default)]
    pub name: Option<String>,
}

impl AdapterConfig {
    pub fn report_name(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => self
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unnamed")
                .to_string(),
        }
    }
}

/// Parses `PATH` or `FORMAT=PATH`, where FORMAT may be `auto`.
impl FromStr for AdapterConfig {
    type Err = CovgateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (format, path) = match s.split_once('=') {
            Some(("auto", path)) => (None, path),
            Some((format, path)) => (Some(format.parse::<Format>()?), path),
            None => (None, s),
        };
        if path.is_empty() {
            return Err(CovgateError::Config(format!(
                "report '{}' has an empty path",
                s
            )));
        }
        Ok(Self {
            format,
            path: PathBuf::from(path),
            name: None,
        })
    }
}

/// Threshold as written in configuration, before the kind is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Element kind name, e.g. "Line" or "Class".
    pub applies_to: String,
    /// Below this percentage the build is unhealthy.
    pub unhealthy: f64,
    /// Below this percentage the build is unstable.
    pub unstable: f64,
}

/// Parses `KIND:UNHEALTHY:UNSTABLE`, e.g. `line:40:60`.
impl FromStr for ThresholdConfig {
    type Err = CovgateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [kind, unhealthy, unstable] = parts.as_slice() else {
            return Err(CovgateError::Config(format!(
                "threshold '{}' must look like KIND:UNHEALTHY:UNSTABLE",
                s
            )));
        };
        let percent = |v: &str| {
            v.trim().parse::<f64>().map_err(|_| {
                CovgateError::Config(format!("threshold '{}' has a non-numeric value '{}'", s, v))
            })
        };
        Ok(Self {
            applies_to: kind.trim().to_string(),
            unhealthy: percent(unhealthy)?,
            unstable: percent(unstable)?,
        })
    }
}
