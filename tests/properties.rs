//! Property-based tests for rollup, merge, evaluation and descriptor decoding.

mod common;

use std::collections::BTreeMap;

use covgate::aggregate::{merge, rollup};
use covgate::element::ElementKind;
use covgate::model::{CoverageTree, Ratio};
use covgate::parsers::Format;
use covgate::signature::decode_method_name;
use covgate::threshold::{Health, Threshold};
use proptest::prelude::*;

/// (package, class, line, hits)
type Entry = (u8, u8, u32, u64);

fn entries() -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec((0u8..2, 0u8..3, 1u32..20, 0u64..3), 0..40)
}

/// One element chain per entry; repeated packages and classes unify.
fn java_document(entries: &[Entry]) -> String {
    let mut xml = String::from(r#"<report name="gen">"#);
    for (pkg, class, line, hits) in entries {
        xml.push_str(&format!(
            r#"<package name="p{pkg}"><file name="p{pkg}/C{class}.java"><class name="C{class}"><line number="{line}" hits="{hits}"/></class></file></package>"#
        ));
    }
    xml.push_str("</report>");
    xml
}

fn lcov_document(entries: &[Entry]) -> String {
    let mut out = String::new();
    for (pkg, class, line, hits) in entries {
        out.push_str(&format!(
            "SF:p{pkg}/C{class}.rs\nDA:{line},{hits}\nend_of_record\n"
        ));
    }
    out
}

fn java(entries: &[Entry]) -> CoverageTree {
    common::parse(Format::Java, java_document(entries).as_bytes(), "gen")
}

fn counts(tree: &CoverageTree) -> Vec<(String, String, Ratio)> {
    let mut out: Vec<_> = tree
        .ids()
        .flat_map(|id| {
            tree.node(id)
                .counts()
                .iter()
                .map(move |(kind, ratio)| (tree.qualified_name(id), kind.to_string(), *ratio))
        })
        .collect();
    out.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    out
}

proptest! {
    // ========================
    // Rollup
    // ========================

    #[test]
    fn rollup_is_idempotent(entries in entries()) {
        let mut tree = java(&entries);
        let first = counts(&tree);
        rollup(&mut tree);
        prop_assert_eq!(counts(&tree), first);
    }

    #[test]
    fn covered_never_exceeds_total(entries in entries()) {
        let tree = java(&entries);
        for id in tree.ids() {
            for (kind, ratio) in tree.node(id).counts() {
                prop_assert!(ratio.covered <= ratio.total, "{} at {}", kind, tree.qualified_name(id));
            }
        }
    }

    #[test]
    fn structural_counts_sum_over_children(entries in entries()) {
        let tree = java(&entries);
        for id in tree.ids() {
            let node = tree.node(id);
            if !node.has_children() {
                continue;
            }
            for kind in [ElementKind::PACKAGE, ElementKind::FILE, ElementKind::CLASS] {
                if node.kind() >= &kind {
                    continue;
                }
                let mut sum = Ratio::default();
                for child in node.children() {
                    sum += tree.node(child).ratio(&kind);
                }
                prop_assert_eq!(node.ratio(&kind), sum);
            }
        }
    }

    #[test]
    fn line_counts_are_distinct_lines(entries in entries()) {
        let tree = java(&entries);

        let mut expected: BTreeMap<(u8, u8, u32), bool> = BTreeMap::new();
        for &(pkg, class, line, hits) in &entries {
            *expected.entry((pkg, class, line)).or_default() |= hits > 0;
        }
        let covered = expected.values().filter(|&&hit| hit).count() as u64;
        let total = expected.len() as u64;

        prop_assert_eq!(common::root_ratio(&tree, ElementKind::LINE), Ratio::new(covered, total));
    }

    // ========================
    // Merge
    // ========================

    #[test]
    fn merge_is_commutative(a in entries(), b in entries()) {
        let a = java(&a);
        let b = common::parse(Format::Lcov, lcov_document(&b).as_bytes(), "gen");
        prop_assert_eq!(counts(&merge([&a, &b])), counts(&merge([&b, &a])));
    }

    #[test]
    fn merge_is_associative(a in entries(), b in entries(), c in entries()) {
        let (a, b, c) = (java(&a), java(&b), java(&c));
        let left = merge([&merge([&a, &b]), &c]);
        let right = merge([&a, &merge([&b, &c])]);
        prop_assert_eq!(counts(&left), counts(&right));
    }

    #[test]
    fn merging_a_report_with_itself_keeps_line_totals(entries in entries()) {
        let tree = java(&entries);
        let merged = merge([&tree, &tree]);
        prop_assert_eq!(
            common::root_ratio(&merged, ElementKind::LINE),
            common::root_ratio(&tree, ElementKind::LINE)
        );
    }

    // ========================
    // Threshold classification
    // ========================

    #[test]
    fn classification_follows_intervals(
        unhealthy in 0.0f64..=100.0,
        gap in 0.0f64..=100.0,
        percent in 0.0f64..=100.0,
    ) {
        let unstable = (unhealthy + gap).min(100.0);
        let threshold = Threshold::new(ElementKind::LINE, unhealthy, unstable).unwrap();
        let expected = if percent < unhealthy {
            Health::Unhealthy
        } else if percent < unstable {
            Health::Unstable
        } else {
            Health::Healthy
        };
        prop_assert_eq!(threshold.classify(percent), expected);
    }

    // ========================
    // Descriptor decoding
    // ========================

    #[test]
    fn decode_never_panics(name in "[a-z]{1,8}", signature in "\\PC*") {
        let _ = decode_method_name(&name, &signature);
    }

    #[test]
    fn decode_without_parentheses_returns_name(name in "[a-z]{1,8}", signature in "[^(]\\PC*") {
        prop_assert_eq!(decode_method_name(&name, &signature), name);
    }

    #[test]
    fn decode_keeps_the_name(name in "[a-z]{1,8}", signature in "\\([ZCBSIFDV\\[]{0,6}\\)[ZCBSIFDV]") {
        let decoded = decode_method_name(&name, &signature);
        let expected = format!("{}(", name);
        prop_assert!(decoded.contains(&expected), "{}", decoded);
    }
}
