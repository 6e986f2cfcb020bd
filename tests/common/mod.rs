#![allow(dead_code)]

use std::path::Path;

use covgate::aggregate::rollup;
use covgate::config::AdapterConfig;
use covgate::element::ElementKind;
use covgate::model::{CoverageTree, NodeId, Ratio};
use covgate::parsers::{CoverageParser, Format};
use tempfile::TempDir;

pub const JAVA_XML: &[u8] = include_bytes!("../fixtures/java.xml");
pub const COBERTURA_XML: &[u8] = include_bytes!("../fixtures/cobertura.xml");
pub const LCOV_INFO: &[u8] = include_bytes!("../fixtures/lcov.info");

/// Parse a document with the built-in kinds and roll it up.
pub fn parse(format: Format, input: &[u8], name: &str) -> CoverageTree {
    let parser = format.parser(&Default::default()).unwrap();
    let mut tree = parser.parse_bytes(input, name).unwrap();
    rollup(&mut tree);
    tree
}

pub fn ratio(tree: &CoverageTree, id: NodeId, kind: ElementKind) -> Ratio {
    tree.node(id).ratio(&kind)
}

pub fn root_ratio(tree: &CoverageTree, kind: ElementKind) -> Ratio {
    ratio(tree, tree.root(), kind)
}

/// Write `content` into a fresh temporary directory and return an adapter
/// pointing at it. The caller must hold onto `TempDir` to keep the file alive.
pub fn write_report(name: &str, content: &[u8]) -> (AdapterConfig, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let adapter = write_report_in(dir.path(), name, content);
    (adapter, dir)
}

pub fn write_report_in(dir: &Path, name: &str, content: &[u8]) -> AdapterConfig {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    AdapterConfig {
        format: None,
        path,
        name: None,
    }
}
