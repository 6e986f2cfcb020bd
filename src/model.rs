//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Parsers produce one `CoverageTree` per report document;
//! the aggregator merges trees and fills in the rolled-up counts.
//!
//! Nodes live in a flat arena and refer to each other by `NodeId`. A node is
//! always appended after its parent, so every child has a larger index than
//! its parent.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use serde::Serialize;

use crate::element::ElementKind;
use crate::error::{CovgateError, Result};

/// Covered/total counts for one element kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ratio {
    pub covered: u64,
    pub total: u64,
}

impl Ratio {
    /// Build a ratio, clamping `covered` to `total`.
    pub fn new(covered: u64, total: u64) -> Self {
        Self {
            covered: covered.min(total),
            total,
        }
    }

    /// Percentage in `0.0..=100.0`, or `None` when there is no data.
    ///
    /// Scaled before dividing so whole percentages come out exact.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        (self.total > 0).then(|| self.covered as f64 * 100.0 / self.total as f64)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl AddAssign for Ratio {
    fn add_assign(&mut self, rhs: Ratio) {
        self.covered += rhs.covered;
        self.total += rhs.total;
    }
}

impl Add for Ratio {
    type Output = Ratio;

    fn add(mut self, rhs: Ratio) -> Ratio {
        self += rhs;
        self
    }
}

/// Coverage observed for a single instrumentable source line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineRecord {
    pub hits: u64,
    pub branches_covered: u32,
    pub branches_total: u32,
}

impl LineRecord {
    pub fn new(hits: u64) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    /// Attach branch counts, clamping covered arms to the total.
    #[must_use]
    pub fn with_branches(mut self, covered: u32, total: u32) -> Self {
        self.branches_covered = covered.min(total);
        self.branches_total = total;
        self
    }

    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.hits > 0
    }

    /// Fold in another observation of the same line from the same run.
    /// Lines repeated under a method and its class keep the larger values.
    pub fn union(&mut self, other: &LineRecord) {
        self.hits = self.hits.max(other.hits);
        self.branches_covered = self.branches_covered.max(other.branches_covered);
        self.branches_total = self.branches_total.max(other.branches_total);
    }

    /// Fold in the same line from a different run: hit counts add up.
    pub fn accumulate(&mut self, other: &LineRecord) {
        self.hits = self.hits.saturating_add(other.hits);
        self.branches_covered = self.branches_covered.max(other.branches_covered);
        self.branches_total = self.branches_total.max(other.branches_total);
    }
}

/// Handle to a node inside one `CoverageTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One element of the coverage hierarchy.
#[derive(Debug, Clone)]
pub struct Node {
    kind: ElementKind,
    name: String,
    parent: Option<NodeId>,
    children: BTreeMap<(ElementKind, String), NodeId>,
    relative_source_path: Option<String>,
    lines: BTreeMap<u32, LineRecord>,
    counts: BTreeMap<ElementKind, Ratio>,
}

impl Node {
    fn new(kind: ElementKind, name: String, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            name,
            parent,
            children: BTreeMap::new(),
            relative_source_path: None,
            lines: BTreeMap::new(),
            counts: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Only set on File nodes.
    pub fn relative_source_path(&self) -> Option<&str> {
        self.relative_source_path.as_deref()
    }

    /// Lines observed directly on this node, keyed by line number.
    pub fn lines(&self) -> &BTreeMap<u32, LineRecord> {
        &self.lines
    }

    /// Rolled-up counts. Empty until the tree has been rolled up.
    pub fn counts(&self) -> &BTreeMap<ElementKind, Ratio> {
        &self.counts
    }

    /// Rolled-up counts for one kind; `0/0` when the node has none.
    pub fn ratio(&self, kind: &ElementKind) -> Ratio {
        self.counts.get(kind).copied().unwrap_or_default()
    }

    /// Child ids, ordered by kind then name.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// A coverage result tree stored as an arena.
#[derive(Debug, Clone)]
pub struct CoverageTree {
    nodes: Vec<Node>,
}

impl CoverageTree {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::new(kind, name.into(), None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when the root holds neither children nor lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let root = &self.nodes[0];
        root.children.is_empty() && root.lines.is_empty()
    }

    /// All node ids; every parent comes before its children.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Attach a child node, or return the existing child with the same kind
    /// and name. Fails if the hierarchy would be violated.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: ElementKind,
        name: impl Into<String>,
    ) -> Result<NodeId> {
        let parent_kind = &self.nodes[parent.0].kind;
        if !parent_kind.can_contain(&kind) {
            return Err(CovgateError::InvalidHierarchy {
                parent: parent_kind.to_string(),
                child: kind.to_string(),
            });
        }
        Ok(self.child_or_insert(parent, kind, name.into()))
    }

    /// Unchecked variant of `add_child` for copying nodes between trees that
    /// are already valid.
    pub(crate) fn child_or_insert(
        &mut self,
        parent: NodeId,
        kind: ElementKind,
        name: String,
    ) -> NodeId {
        let key = (kind, name);
        if let Some(&id) = self.nodes[parent.0].children.get(&key) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        let (kind, name) = key.clone();
        self.nodes.push(Node::new(kind, name, Some(parent)));
        self.nodes[parent.0].children.insert(key, id);
        id
    }

    pub fn find_child(&self, parent: NodeId, kind: &ElementKind, name: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .get(&(kind.clone(), name.to_string()))
            .copied()
    }

    /// Follow a chain of (kind, name) steps down from the root.
    pub fn find_path(&self, path: &[(ElementKind, &str)]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |id, (kind, name)| self.find_child(id, kind, name))
    }

    pub fn set_relative_source_path(&mut self, id: NodeId, path: Option<String>) {
        self.nodes[id.0].relative_source_path = path;
    }

    /// Record an observation of a line on `id`, merging with any earlier
    /// observation of the same line number on that node.
    pub fn record_line(&mut self, id: NodeId, number: u32, record: LineRecord) {
        self.nodes[id.0]
            .lines
            .entry(number)
            .and_modify(|existing| existing.union(&record))
            .or_insert(record);
    }

    /// Mutable access to a line record, created empty if missing.
    pub fn line_mut(&mut self, id: NodeId, number: u32) -> &mut LineRecord {
        self.nodes[id.0].lines.entry(number).or_default()
    }

    pub(crate) fn set_counts(&mut self, id: NodeId, counts: BTreeMap<ElementKind, Ratio>) {
        self.nodes[id.0].counts = counts;
    }

    /// Ids from `id`'s parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id.0].parent, move |p| self.nodes[p.0].parent)
    }

    /// Names from the root down to `id`, joined with " > ".
    pub fn qualified_name(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .map(|a| self.nodes[a.0].name.as_str())
            .collect();
        names.reverse();
        names.push(&self.nodes[id.0].name);
        names.join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (CoverageTree, NodeId, NodeId) {
        let mut tree = CoverageTree::new(ElementKind::REPORT, "r");
        let root = tree.root();
        let pkg = tree.add_child(root, ElementKind::PACKAGE, "com.acme").unwrap();
        let class = tree.add_child(pkg, ElementKind::CLASS, "com.acme.App").unwrap();
        (tree, pkg, class)
    }

    #[test]
    fn test_ratio_percent() {
        assert_eq!(Ratio::new(1, 2).percent(), Some(50.0));
        assert_eq!(Ratio::new(0, 0).percent(), None);
        assert_eq!(Ratio::new(29, 100).percent(), Some(29.0));
        assert_eq!(Ratio::new(57, 100).percent(), Some(57.0));
        assert_eq!(Ratio::new(7, 700).percent(), Some(1.0));
        assert_eq!(Ratio::new(5, 3), Ratio { covered: 3, total: 3 });
        assert_eq!(Ratio::new(1, 2) + Ratio::new(2, 3), Ratio::new(3, 5));
    }

    #[test]
    fn test_add_child_reuses_existing() {
        let (mut tree, pkg, class) = sample();
        let again = tree.add_child(pkg, ElementKind::CLASS, "com.acme.App").unwrap();
        assert_eq!(again, class);
        assert_eq!(tree.node_count(), 3);

        // Same name, different kind is a different child.
        let file = tree.add_child(pkg, ElementKind::FILE, "com.acme.App").unwrap();
        assert_ne!(file, class);
    }

    #[test]
    fn test_add_child_rejects_hierarchy_violation() {
        let (mut tree, _, class) = sample();
        let err = tree.add_child(class, ElementKind::PACKAGE, "x").unwrap_err();
        assert!(matches!(err, CovgateError::InvalidHierarchy { .. }));
        assert!(tree.add_child(class, ElementKind::LINE, "1").is_err());
        assert!(tree.add_child(class, ElementKind::CLASS, "Inner").is_err());
    }

    #[test]
    fn test_record_line_keeps_max() {
        let (mut tree, _, class) = sample();
        tree.record_line(class, 3, LineRecord::new(0));
        tree.record_line(class, 3, LineRecord::new(4).with_branches(1, 2));
        tree.record_line(class, 3, LineRecord::new(2));

        let line = tree.node(class).lines()[&3];
        assert_eq!(line.hits, 4);
        assert_eq!(line.branches_covered, 1);
        assert_eq!(line.branches_total, 2);
    }

    #[test]
    fn test_accumulate_sums_hits() {
        let mut a = LineRecord::new(2).with_branches(1, 2);
        a.accumulate(&LineRecord::new(3).with_branches(2, 2));
        assert_eq!(a.hits, 5);
        assert_eq!(a.branches_covered, 2);
        assert_eq!(a.branches_total, 2);
    }

    #[test]
    fn test_paths() {
        let (tree, pkg, class) = sample();
        assert_eq!(tree.qualified_name(class), "r > com.acme > com.acme.App");
        assert_eq!(tree.ancestors(class).collect::<Vec<_>>(), vec![pkg, tree.root()]);
        assert_eq!(
            tree.find_path(&[
                (ElementKind::PACKAGE, "com.acme"),
                (ElementKind::CLASS, "com.acme.App")
            ]),
            Some(class)
        );
        assert_eq!(tree.find_path(&[(ElementKind::PACKAGE, "nope")]), None);
    }

    #[test]
    fn test_is_empty() {
        let tree = CoverageTree::new(ElementKind::REPORT, "r");
        assert!(tree.is_empty());
        let (tree, _, _) = sample();
        assert!(!tree.is_empty());
    }
}
