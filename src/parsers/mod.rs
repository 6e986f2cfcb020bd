pub mod cobertura;
pub mod java;
pub mod lcov;

use std::io::BufRead;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::element::{ElementKind, ElementRegistry};
use crate::error::{CovgateError, Result};
use crate::model::{CoverageTree, LineRecord, NodeId};

/// Pre-compiled regex for condition-coverage attributes like "75% (3/4)".
static BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").unwrap());

/// Every format parser implements this trait.
pub trait CoverageParser: Send + Sync {
    fn format(&self) -> Format;

    /// Parse one report document into a tree rooted at a Report node.
    /// Fails without returning a partial tree if the document is malformed.
    fn parse(&self, reader: &mut dyn BufRead, report_name: &str) -> Result<CoverageTree>;

    fn parse_bytes(&self, input: &[u8], report_name: &str) -> Result<CoverageTree> {
        self.parse(&mut &*input, report_name)
    }
}

/// Supported report dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `<report>/<group>/<package>/<file>/<class>/<method>/<line>`
    Java,
    Cobertura,
    Lcov,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Java, Format::Cobertura, Format::Lcov];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Java => "java",
            Format::Cobertura => "cobertura",
            Format::Lcov => "lcov",
        }
    }

    /// Build the parser for this dialect. Fails if the registry lacks a kind
    /// the dialect maps to.
    pub fn parser(self, registry: &ElementRegistry) -> Result<Box<dyn CoverageParser>> {
        Ok(match self {
            Format::Java => Box::new(java::JavaParser::new(registry)?),
            Format::Cobertura => Box::new(cobertura::CoberturaParser::new(registry)?),
            Format::Lcov => Box::new(lcov::LcovParser::new(registry)?),
        })
    }

    /// Guess the dialect from the first few KB of a document.
    pub fn detect(content: &[u8]) -> Option<Format> {
        let head_len = content.len().min(4096);
        let head = String::from_utf8_lossy(&content[..head_len]);

        // LCOV: check that lines actually start with these tags to avoid
        // false positives on files that merely contain these strings.
        let has_sf = head.lines().any(|l| l.starts_with("SF:"));
        let has_da_or_fn = head
            .lines()
            .any(|l| l.starts_with("DA:") || l.starts_with("FN:"));
        if has_sf && has_da_or_fn {
            return Some(Format::Lcov);
        }

        if head.contains("<?xml") || head.trim_start().starts_with('<') {
            if head.contains("<report") {
                return Some(Format::Java);
            }
            if head.contains("<coverage") {
                return Some(Format::Cobertura);
            }
        }

        None
    }
}

impl std::str::FromStr for Format {
    type Err = CovgateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "java" => Ok(Format::Java),
            "cobertura" => Ok(Format::Cobertura),
            "lcov" => Ok(Format::Lcov),
            _ => Err(CovgateError::UnknownFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The taxonomy kinds dialects map their elements to, resolved once when a
/// parser is built.
#[derive(Debug, Clone)]
pub struct ElementKinds {
    pub report: ElementKind,
    pub group: ElementKind,
    pub package: ElementKind,
    pub file: ElementKind,
    pub class: ElementKind,
    pub method: ElementKind,
}

impl ElementKinds {
    pub fn resolve(registry: &ElementRegistry) -> Result<Self> {
        Ok(Self {
            report: registry.get("Report")?,
            group: registry.get("Group")?,
            package: registry.get("Package")?,
            file: registry.get("File")?,
            class: registry.get("Class")?,
            method: registry.get("Method")?,
        })
    }
}

impl Default for ElementKinds {
    fn default() -> Self {
        Self {
            report: ElementKind::REPORT,
            group: ElementKind::GROUP,
            package: ElementKind::PACKAGE,
            file: ElementKind::FILE,
            class: ElementKind::CLASS,
            method: ElementKind::METHOD,
        }
    }
}

pub(crate) fn xml_reader<R: BufRead>(reader: R) -> Reader<R> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);
    xml
}

pub(crate) fn xml_err<R>(e: quick_xml::Error, xml: &Reader<R>) -> CovgateError {
    CovgateError::Xml {
        source: e,
        position: xml.buffer_position(),
    }
}

/// Walk an XML document depth-first, calling `visit` for every element.
///
/// `visit` receives the innermost node opened by an enclosing element and
/// returns the node the element opens, if any. Elements that open no node
/// leave the active parent unchanged for their children.
pub(crate) fn walk_xml<F>(reader: &mut dyn BufRead, mut visit: F) -> Result<CoverageTree>
where
    F: FnMut(&BytesStart<'_>, Option<NodeId>, &mut Option<CoverageTree>) -> Result<Option<NodeId>>,
{
    let mut xml = xml_reader(reader);
    let mut buf = Vec::new();
    let mut tree: Option<CoverageTree> = None;
    // One entry per open element: the node it produced, if any.
    let mut open: Vec<Option<NodeId>> = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Err(e) => return Err(xml_err(e, &xml)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) => {
                let node = visit(e, active_parent(&open), &mut tree)?;
                open.push(node);
            }
            Ok(Event::Empty(ref e)) => {
                visit(e, active_parent(&open), &mut tree)?;
            }
            Ok(Event::End(_)) => {
                open.pop();
            }
            _ => {}
        }
        buf.clear();
    }

    if !open.is_empty() {
        return Err(CovgateError::MalformedReport(format!(
            "document ended with {} unclosed element(s)",
            open.len()
        )));
    }
    tree.ok_or_else(|| CovgateError::MalformedReport("no report root element found".to_string()))
}

fn active_parent(open: &[Option<NodeId>]) -> Option<NodeId> {
    open.iter().rev().find_map(|node| *node)
}

/// Create the root of the tree. A second root is a hierarchy violation.
pub(crate) fn open_root(
    tree: &mut Option<CoverageTree>,
    kind: ElementKind,
    name: String,
) -> Result<NodeId> {
    if let Some(existing) = tree.as_ref() {
        return Err(CovgateError::InvalidHierarchy {
            parent: existing.node(existing.root()).kind().to_string(),
            child: kind.to_string(),
        });
    }
    let created = CoverageTree::new(kind, name);
    let root = created.root();
    *tree = Some(created);
    Ok(root)
}

/// Attach a node under the active parent.
pub(crate) fn attach(
    tree: &mut Option<CoverageTree>,
    parent: Option<NodeId>,
    kind: ElementKind,
    name: String,
) -> Result<NodeId> {
    match (tree.as_mut(), parent) {
        (Some(tree), Some(parent)) => tree.add_child(parent, kind, name),
        _ => Err(outside_root(kind.name())),
    }
}

/// Count a `<line>` element against the active parent.
pub(crate) fn record_line(
    tree: &mut Option<CoverageTree>,
    parent: Option<NodeId>,
    e: &BytesStart<'_>,
) -> Result<()> {
    let (Some(tree), Some(parent)) = (tree.as_mut(), parent) else {
        return Err(outside_root("line"));
    };
    match line_record(e) {
        Some((number, record)) => tree.record_line(parent, number, record),
        None => debug!("skipping <line> without a usable number attribute"),
    }
    Ok(())
}

fn outside_root(what: &str) -> CovgateError {
    CovgateError::MalformedReport(format!("{} element found outside of the report root", what))
}

/// Read `number`, `hits`, `branch` and `condition-coverage` from a `<line>`.
///
/// A branch line without a readable condition-coverage counts as a single
/// branch, covered when the line was hit.
pub(crate) fn line_record(e: &BytesStart<'_>) -> Option<(u32, LineRecord)> {
    let number = get_attr(e, b"number")?.trim().parse::<u32>().ok()?;
    let hits = get_attr(e, b"hits")
        .and_then(|h| h.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let mut record = LineRecord::new(hits);
    let is_branch = get_attr(e, b"branch").is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    if is_branch {
        let (covered, total) = get_attr(e, b"condition-coverage")
            .as_deref()
            .and_then(condition_coverage)
            .unwrap_or((u32::from(hits > 0), 1));
        record = record.with_branches(covered, total);
    }
    Some((number, record))
}

fn condition_coverage(value: &str) -> Option<(u32, u32)> {
    let caps = BRANCH_RE.captures(value)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Attribute value by local name, or `None` when absent or unreadable.
pub(crate) fn get_attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Attribute value, or `default` when absent. Never fails.
pub(crate) fn attr_or(e: &BytesStart<'_>, name: &[u8], default: &str) -> String {
    get_attr(e, name).unwrap_or_else(|| default.to_string())
}
