//! Rendering of gate outcomes and coverage trees.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::element::ElementKind;
use crate::model::{CoverageTree, LineRecord, NodeId, Ratio};
use crate::processor::Outcome;
use crate::threshold::{Failure, Health, ThresholdResult, Verdict};

/// Everything a formatter needs to describe one gate run.
pub struct GateReport<'a> {
    pub verdict: &'a Verdict,
    pub tree: &'a CoverageTree,
    pub skipped: &'a [String],
    /// How many levels below the root to include in tree listings.
    pub depth: usize,
}

impl<'a> GateReport<'a> {
    pub fn new(outcome: &'a Outcome, depth: usize) -> Self {
        Self {
            verdict: &outcome.verdict,
            tree: &outcome.tree,
            skipped: &outcome.skipped,
            depth,
        }
    }

    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }
}

pub trait ReportFormatter {
    fn format(&self, report: &GateReport<'_>) -> String;
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &GateReport<'_>) -> String {
        let verdict = report.verdict;
        let mut out = String::new();

        writeln!(out, "Coverage gate: {}", verdict.health.as_str().to_uppercase()).unwrap();
        if verdict.no_reports {
            out.push_str("No coverage data found.\n");
        }

        if !verdict.results.is_empty() {
            out.push('\n');
            writeln!(
                out,
                "{:<12} {:>15} {:>8} {:>10} {:>10}  HEALTH",
                "KIND", "COVERED", "RATE", "UNHEALTHY", "UNSTABLE"
            )
            .unwrap();
            writeln!(out, "{}", "-".repeat(75)).unwrap();
            for r in &verdict.results {
                writeln!(
                    out,
                    "{:<12} {:>15} {:>8} {:>9.1}% {:>9.1}%  {}",
                    r.applies_to.name(),
                    fraction(&r.ratio),
                    percent(r.percent),
                    r.unhealthy_min,
                    r.unstable_min,
                    r.health
                )
                .unwrap();
            }
        }

        if !report.skipped.is_empty() {
            writeln!(out, "\nSkipped malformed reports: {}", report.skipped.join(", ")).unwrap();
        }

        if report.depth > 0 {
            out.push('\n');
            out.push_str(&render_tree(report.tree, report.tree.root(), report.depth));
        }

        writeln!(out, "\nResult: {}", outcome_label(verdict)).unwrap();
        out
    }
}

/// Markdown formatter, for pull request comments and CI summaries.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &GateReport<'_>) -> String {
        let verdict = report.verdict;
        let mut md = String::new();

        writeln!(md, "### Coverage gate: {}\n", health_badge(verdict.health)).unwrap();

        if verdict.no_reports {
            md.push_str("No coverage data found.\n");
        } else if !verdict.results.is_empty() {
            md.push_str("| Kind | Covered | Rate | Unhealthy below | Unstable below | Health |\n");
            md.push_str("|:-----|--------:|-----:|----------------:|---------------:|:-------|\n");
            for r in &verdict.results {
                writeln!(
                    md,
                    "| {} | {} | {} | {:.1}% | {:.1}% | {} |",
                    r.applies_to.name(),
                    fraction(&r.ratio),
                    percent(r.percent),
                    r.unhealthy_min,
                    r.unstable_min,
                    r.health
                )
                .unwrap();
            }
        }

        if !report.skipped.is_empty() {
            md.push_str("\n**Skipped malformed reports:** ");
            let names: Vec<String> = report.skipped.iter().map(|s| format!("`{s}`")).collect();
            md.push_str(&names.join(", "));
            md.push('\n');
        }

        if report.depth > 0 && !report.tree.is_empty() {
            md.push_str("\n<details>\n<summary>Coverage tree</summary>\n\n```\n");
            md.push_str(&render_tree(report.tree, report.tree.root(), report.depth));
            md.push_str("```\n</details>\n");
        }

        writeln!(md, "\n**Result:** {}", outcome_label(verdict)).unwrap();
        md
    }
}

/// JSON formatter with the full verdict and a summary of the tree.
pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonReport<'a> {
    health: Health,
    failed: bool,
    failure: Option<Failure>,
    no_reports: bool,
    results: &'a [ThresholdResult],
    skipped: &'a [String],
    tree: NodeSummary,
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &GateReport<'_>) -> String {
        let verdict = report.verdict;
        let doc = JsonReport {
            health: verdict.health,
            failed: verdict.failed(),
            failure: verdict.failure,
            no_reports: verdict.no_reports,
            results: &verdict.results,
            skipped: report.skipped,
            tree: summarize(report.tree, report.tree.root(), report.depth),
        };
        let mut json = serde_json::to_string_pretty(&doc).expect("gate report serializes to JSON");
        json.push('\n');
        json
    }
}

/// Serializable view of a node and, down to a depth limit, its descendants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub counts: Vec<CountSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountSummary {
    pub kind: String,
    pub covered: u64,
    pub total: u64,
    pub percent: Option<f64>,
}

/// Summarize `id` and its descendants up to `depth` levels below it.
#[must_use]
pub fn summarize(tree: &CoverageTree, id: NodeId, depth: usize) -> NodeSummary {
    let node = tree.node(id);
    let counts = node
        .counts()
        .iter()
        .map(|(kind, ratio)| CountSummary {
            kind: kind.name().to_string(),
            covered: ratio.covered,
            total: ratio.total,
            percent: ratio.percent(),
        })
        .collect();
    let children = if depth == 0 {
        Vec::new()
    } else {
        node.children()
            .map(|child| summarize(tree, child, depth - 1))
            .collect()
    };

    NodeSummary {
        kind: node.kind().name().to_string(),
        name: node.name().to_string(),
        path: node.relative_source_path().map(str::to_string),
        counts,
        children,
    }
}

/// Indented listing of `id` and its descendants up to `depth` levels below
/// it, with Line and Branch rates and the uncovered lines of each node.
#[must_use]
pub fn render_tree(tree: &CoverageTree, id: NodeId, depth: usize) -> String {
    let mut out = String::new();
    render_node(tree, id, depth, 0, &mut out);
    out
}

fn render_node(tree: &CoverageTree, id: NodeId, depth: usize, indent: usize, out: &mut String) {
    let node = tree.node(id);
    write!(out, "{}{} {}", "  ".repeat(indent), node.kind(), node.name()).unwrap();

    for kind in [ElementKind::LINE, ElementKind::BRANCH] {
        let ratio = node.ratio(&kind);
        if !ratio.is_empty() {
            write!(out, "  {} {} ({})", kind, fraction(&ratio), percent(ratio.percent())).unwrap();
        }
    }

    let missed = format_line_ranges(&missed_line_ranges(node.lines()));
    if !missed.is_empty() {
        write!(out, "  missed: {missed}").unwrap();
    }
    out.push('\n');

    if indent < depth {
        for child in node.children() {
            render_node(tree, child, depth, indent + 1, out);
        }
    }
}

fn fraction(ratio: &Ratio) -> String {
    format!("{}/{}", ratio.covered, ratio.total)
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(p) => format!("{p:.1}%"),
        None => "n/a".to_string(),
    }
}

fn health_badge(health: Health) -> &'static str {
    match health {
        Health::Healthy => "✅ healthy",
        Health::Unstable => "⚠️ unstable",
        Health::Unhealthy => "❌ unhealthy",
    }
}

fn outcome_label(verdict: &Verdict) -> String {
    match verdict.failure {
        None => "passed".to_string(),
        Some(Failure::NoReports) => "failed (no coverage reports)".to_string(),
        Some(Failure::BelowThreshold(health)) => format!("failed (build is {health})"),
    }
}

/// Gaps of up to this many non-instrumented lines between two missed lines
/// are folded into one range.
const MAX_BRIDGE_GAP: u32 = 2;

/// Uncovered lines as `(start, end)` ranges. Two missed lines share a range
/// when every line between them is absent from the report and the gap is at
/// most [`MAX_BRIDGE_GAP`] lines.
#[must_use]
pub fn missed_line_ranges(lines: &BTreeMap<u32, LineRecord>) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut missed = lines.iter().filter(|(_, r)| !r.is_covered()).map(|(&n, _)| n);

    let Some(first) = missed.next() else {
        return ranges;
    };
    let (mut start, mut end) = (first, first);

    for line in missed {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP && lines.range(end + 1..line).next().is_none() {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }

    ranges.push((start, end));
    ranges
}

/// Compact range notation, e.g. "1, 3-5, 8".
#[must_use]
pub fn format_line_ranges(ranges: &[(u32, u32)]) -> String {
    ranges
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
