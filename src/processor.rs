//! Parse a batch of report documents, merge them and evaluate the gate.

use std::path::Path;
use std::thread::ScopedJoinHandle;

use tracing::{debug, info, warn};

use crate::aggregate::merge;
use crate::config::AdapterConfig;
use crate::element::ElementRegistry;
use crate::error::{CovgateError, Result};
use crate::model::CoverageTree;
use crate::parsers::Format;
use crate::threshold::{evaluate, GatePolicy, ThresholdSet, Verdict};

/// One report document waiting to be parsed.
#[derive(Debug, Clone)]
pub struct ReportSource {
    /// Detected from the content when `None`.
    pub format: Option<Format>,
    pub name: String,
    content: Vec<u8>,
}

impl ReportSource {
    pub fn from_bytes(format: Option<Format>, name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            format,
            name: name.into(),
            content,
        }
    }

    /// Read the document an adapter points at.
    pub fn open(adapter: &AdapterConfig) -> Result<Self> {
        let content = read_report(&adapter.path)?;
        Ok(Self::from_bytes(adapter.format, adapter.report_name(), content))
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// The explicit format, or the one sniffed from the content.
    pub fn resolve_format(&self) -> Result<Format> {
        match self.format {
            Some(format) => Ok(format),
            None => Format::detect(&self.content)
                .ok_or_else(|| CovgateError::UnknownFormat(self.name.clone())),
        }
    }

    fn parse(&self, registry: &ElementRegistry) -> Result<CoverageTree> {
        let format = self.resolve_format()?;
        let tree = format.parser(registry)?.parse_bytes(&self.content, &self.name)?;
        debug!(
            report = %self.name,
            %format,
            nodes = tree.node_count(),
            "parsed report"
        );
        Ok(tree)
    }
}

fn read_report(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        CovgateError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

/// Result of one gate run.
#[derive(Debug)]
pub struct Outcome {
    /// Merged and rolled-up tree of every report that parsed.
    pub tree: CoverageTree,
    pub verdict: Verdict,
    /// Names of reports skipped as malformed.
    pub skipped: Vec<String>,
}

/// Parse every source, merge the trees and evaluate the thresholds at the
/// merged root.
///
/// A malformed document aborts the run unless `skip_malformed` is set, in
/// which case it is logged and left out. Other errors always abort.
pub fn process(
    sources: &[ReportSource],
    registry: &ElementRegistry,
    thresholds: &ThresholdSet,
    policy: &GatePolicy,
    skip_malformed: bool,
) -> Result<Outcome> {
    let parsed = parse_all(sources, registry);

    let mut trees = Vec::with_capacity(parsed.len());
    let mut skipped = Vec::new();
    for (source, result) in sources.iter().zip(parsed) {
        match result {
            Ok(tree) => trees.push(tree),
            Err(e) if skip_malformed && e.is_malformed_report() => {
                warn!(report = %source.name, error = %e, "skipping malformed report");
                skipped.push(source.name.clone());
            }
            Err(e) => return Err(e),
        }
    }

    let tree = merge(&trees);
    let verdict = evaluate(&tree, thresholds, policy);
    info!(
        reports = trees.len(),
        skipped = skipped.len(),
        health = %verdict.health,
        failed = verdict.failed(),
        "coverage gate evaluated"
    );

    Ok(Outcome {
        tree,
        verdict,
        skipped,
    })
}

/// Parse each source on its own scoped thread. Results keep source order.
fn parse_all(sources: &[ReportSource], registry: &ElementRegistry) -> Vec<Result<CoverageTree>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| scope.spawn(move || source.parse(registry)))
            .collect();
        handles.into_iter().map(join).collect()
    })
}

/// Wait for a parser thread, re-raising its panic on the calling thread.
fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}
