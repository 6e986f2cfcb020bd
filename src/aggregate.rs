//! Bottom-up aggregation of coverage counts, and merging of trees produced
//! by different adapters.
//!
//! Every node reports:
//! - Line and Branch counts. At File level and below these come from the
//!   union of all line records in the subtree keyed by line number, since
//!   reports list a method's lines again under its class. Above File level
//!   they are the sum of the children plus the node's own lines.
//! - One entry for its own kind: `1/1` when any of its lines is hit, `0/1`
//!   otherwise.
//! - The sum of its children's entries for every structural kind below it.

use std::collections::BTreeMap;

use crate::element::ElementKind;
use crate::model::{CoverageTree, LineRecord, NodeId, Ratio};

/// Name of the root node of a merged tree.
pub const AGGREGATED_ROOT_NAME: &str = "All reports";

/// Recompute the counts of every node from the line records and the tree
/// structure. Previous counts are discarded, so running it twice is a no-op.
pub fn rollup(tree: &mut CoverageTree) {
    let mut scoped_lines: Vec<Option<BTreeMap<u32, LineRecord>>> = vec![None; tree.node_count()];

    // Children always have larger ids than their parent, so walking the arena
    // backwards visits every child before its parent.
    for id in tree.ids().rev() {
        let node = tree.node(id);
        let mut counts: BTreeMap<ElementKind, Ratio> = BTreeMap::new();

        for child in node.children() {
            for (kind, ratio) in tree.node(child).counts() {
                if !kind.is_counter() {
                    *counts.entry(kind.clone()).or_default() += *ratio;
                }
            }
        }

        let (lines, branches) = if node.kind().is_source_scoped() {
            let mut union = node.lines().clone();
            for child in node.children() {
                for (number, record) in scoped_lines[child.index()].take().unwrap_or_default() {
                    union
                        .entry(number)
                        .and_modify(|existing| existing.union(&record))
                        .or_insert(record);
                }
            }
            let ratios = line_ratios(union.values());
            scoped_lines[id.index()] = Some(union);
            ratios
        } else {
            let (mut lines, mut branches) = line_ratios(node.lines().values());
            for child in node.children() {
                scoped_lines[child.index()] = None;
                let child = tree.node(child);
                lines += child.ratio(&ElementKind::LINE);
                branches += child.ratio(&ElementKind::BRANCH);
            }
            (lines, branches)
        };

        counts.insert(
            node.kind().clone(),
            Ratio::new(u64::from(lines.covered > 0), 1),
        );
        counts.insert(ElementKind::LINE, lines);
        counts.insert(ElementKind::BRANCH, branches);
        tree.set_counts(id, counts);
    }
}

fn line_ratios<'a>(records: impl Iterator<Item = &'a LineRecord>) -> (Ratio, Ratio) {
    let mut lines = Ratio::default();
    let mut branches = Ratio::default();
    for record in records {
        lines += Ratio::new(u64::from(record.is_covered()), 1);
        branches += Ratio::new(
            u64::from(record.branches_covered),
            u64::from(record.branches_total),
        );
    }
    (lines, branches)
}

/// Merge trees into one rolled-up tree rooted at an aggregated report node.
///
/// Nodes with the same kind and path are unified and the hit counts of their
/// lines added. Aggregated roots in the input are unwrapped, so merging
/// already-merged trees gives the same result as merging their parts.
pub fn merge<'a>(trees: impl IntoIterator<Item = &'a CoverageTree>) -> CoverageTree {
    let mut combined = CoverageTree::new(ElementKind::AGGREGATED_REPORT, AGGREGATED_ROOT_NAME);
    let target = combined.root();

    for tree in trees {
        let root = tree.root();
        if *tree.node(root).kind() == ElementKind::AGGREGATED_REPORT {
            copy_lines(tree, root, &mut combined, target);
            for child in tree.node(root).children() {
                graft(tree, child, &mut combined, target);
            }
        } else {
            graft(tree, root, &mut combined, target);
        }
    }

    rollup(&mut combined);
    combined
}

fn graft(src: &CoverageTree, id: NodeId, dst: &mut CoverageTree, parent: NodeId) {
    let node = src.node(id);
    let copy = dst.child_or_insert(parent, node.kind().clone(), node.name().to_string());

    // Keep the smallest path so the result does not depend on merge order.
    if let Some(path) = node.relative_source_path() {
        let keep = match dst.node(copy).relative_source_path() {
            Some(existing) => path < existing,
            None => true,
        };
        if keep {
            dst.set_relative_source_path(copy, Some(path.to_string()));
        }
    }

    copy_lines(src, id, dst, copy);
    for child in node.children() {
        graft(src, child, dst, copy);
    }
}

fn copy_lines(src: &CoverageTree, id: NodeId, dst: &mut CoverageTree, copy: NodeId) {
    for (&number, record) in src.node(id).lines() {
        dst.line_mut(copy, number).accumulate(record);
    }
}
