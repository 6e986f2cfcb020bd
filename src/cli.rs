//! Command handler functions for the covgate CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::config::{AdapterConfig, GateConfig};
use crate::element::ElementRegistry;
use crate::processor::{process, ReportSource};
use crate::report::{render_tree, GateReport, JsonFormatter, MarkdownFormatter, TextFormatter};
use crate::signature::decode_method_name;
use crate::threshold::{GatePolicy, ThresholdSet};

/// Output style for the `check` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Style {
    #[default]
    Text,
    Markdown,
    Json,
}

/// Rendered result of `check`.
pub struct CheckOutput {
    pub text: String,
    /// The verdict asks for a failing build.
    pub failed: bool,
}

fn open_sources(adapters: &[AdapterConfig]) -> Result<Vec<ReportSource>> {
    adapters
        .iter()
        .map(|adapter| {
            ReportSource::open(adapter)
                .with_context(|| format!("Failed to read report {}", adapter.path.display()))
        })
        .collect()
}

/// Parse, merge and evaluate every configured report.
pub fn cmd_check(config: &GateConfig, style: Style, depth: usize) -> Result<CheckOutput> {
    let registry = ElementRegistry::builtin();
    let thresholds = config
        .thresholds(&registry)
        .context("Invalid threshold configuration")?;
    let sources = open_sources(&config.adapters)?;

    let outcome = process(
        &sources,
        &registry,
        &thresholds,
        &config.policy(),
        config.skip_malformed,
    )?;

    let report = GateReport::new(&outcome, depth);
    let text = match style {
        Style::Text => report.format(&TextFormatter),
        Style::Markdown => report.format(&MarkdownFormatter),
        Style::Json => report.format(&JsonFormatter),
    };
    Ok(CheckOutput {
        text,
        failed: outcome.verdict.failed(),
    })
}

/// Merged, rolled-up tree of the given reports.
pub fn cmd_tree(adapters: &[AdapterConfig], depth: usize, skip_malformed: bool) -> Result<String> {
    let registry = ElementRegistry::builtin();
    let sources = open_sources(adapters)?;
    let outcome = process(
        &sources,
        &registry,
        &ThresholdSet::default(),
        &GatePolicy::default(),
        skip_malformed,
    )?;

    if outcome.tree.is_empty() {
        return Ok("No coverage data found.\n".to_string());
    }
    Ok(render_tree(&outcome.tree, outcome.tree.root(), depth))
}

pub fn cmd_decode(name: &str, signature: &str) -> String {
    format!("{}\n", decode_method_name(name, signature))
}
