mod common;

use covgate::element::ElementKind;
use covgate::model::Ratio;
use covgate::parsers::Format;
use covgate::threshold::{evaluate, evaluate_at, GatePolicy, Health, Threshold, ThresholdSet};

const APP: [(ElementKind, &str); 4] = [
    (ElementKind::GROUP, "core"),
    (ElementKind::PACKAGE, "com.acme.app"),
    (ElementKind::FILE, "com/acme/app/App.java"),
    (ElementKind::CLASS, "com.acme.app.App"),
];

fn line_thresholds(unhealthy: f64, unstable: f64) -> ThresholdSet {
    ThresholdSet::new(vec![
        Threshold::new(ElementKind::LINE, unhealthy, unstable).unwrap(),
    ])
    .unwrap()
}

#[test]
fn parse_fixture_structure() {
    let tree = common::parse(Format::Java, common::JAVA_XML, "java.xml");
    assert_eq!(tree.node(tree.root()).name(), "cobertura: java.xml");

    let strings = tree
        .find_path(&[
            (ElementKind::GROUP, "core"),
            (ElementKind::PACKAGE, "com.acme.util"),
            (ElementKind::FILE, "com/acme/util/Strings.java"),
            (ElementKind::CLASS, "com.acme.util.Strings"),
        ])
        .unwrap();
    let methods: Vec<&str> = tree
        .node(strings)
        .children()
        .map(|id| tree.node(id).name())
        .collect();
    assert_eq!(
        methods,
        vec![
            "boolean isBlank(java.lang.String)",
            "java.lang.String repeat(java.lang.String,int)",
        ]
    );

    let app = tree.find_path(&APP).unwrap();
    assert!(tree
        .find_child(app, &ElementKind::METHOD, "void main(java.lang.String[])")
        .is_some());
    assert_eq!(
        tree.qualified_name(app),
        "cobertura: java.xml > core > com.acme.app > com/acme/app/App.java > com.acme.app.App"
    );
}

#[test]
fn rollup_fixture_counts() {
    let tree = common::parse(Format::Java, common::JAVA_XML, "java.xml");

    assert_eq!(common::root_ratio(&tree, ElementKind::LINE), Ratio::new(3, 6));
    assert_eq!(common::root_ratio(&tree, ElementKind::BRANCH), Ratio::new(1, 2));
    assert_eq!(common::root_ratio(&tree, ElementKind::METHOD), Ratio::new(2, 3));
    assert_eq!(common::root_ratio(&tree, ElementKind::CLASS), Ratio::new(2, 2));
    assert_eq!(common::root_ratio(&tree, ElementKind::FILE), Ratio::new(2, 2));
    assert_eq!(common::root_ratio(&tree, ElementKind::PACKAGE), Ratio::new(2, 2));
    assert_eq!(common::root_ratio(&tree, ElementKind::GROUP), Ratio::new(1, 1));
}

#[test]
fn class_with_one_hit_and_one_miss_is_unstable() {
    let tree = common::parse(Format::Java, common::JAVA_XML, "java.xml");
    let app = tree.find_path(&APP).unwrap();

    assert_eq!(common::ratio(&tree, app, ElementKind::LINE), Ratio::new(1, 2));

    let verdict = evaluate_at(&tree, app, &line_thresholds(40.0, 60.0), &GatePolicy::default());
    assert_eq!(verdict.results[0].percent, Some(50.0));
    assert_eq!(verdict.health, Health::Unstable);
    assert!(!verdict.failed());
}

#[test]
fn minimal_document_is_unstable_at_root() {
    let xml = br#"<report name="r"><package name="p"><file name="A.java"><class name="A">
        <line number="1" hits="1"/>
        <line number="2" hits="0"/>
    </class></file></package></report>"#;
    let tree = common::parse(Format::Java, xml, "minimal");

    let verdict = evaluate(&tree, &line_thresholds(40.0, 60.0), &GatePolicy::default());
    assert_eq!(verdict.health, Health::Unstable);

    let strict = GatePolicy {
        fail_unstable: true,
        ..Default::default()
    };
    assert!(evaluate(&tree, &line_thresholds(40.0, 60.0), &strict).failed());
}

#[test]
fn every_node_has_consistent_counts() {
    let tree = common::parse(Format::Java, common::JAVA_XML, "java.xml");
    for id in tree.ids() {
        let node = tree.node(id);
        for ratio in node.counts().values() {
            assert!(ratio.covered <= ratio.total);
        }
        // Structural kinds below a node are the sum over its children.
        for kind in [ElementKind::CLASS, ElementKind::METHOD] {
            if node.kind() < &kind {
                let sum: u64 = node
                    .children()
                    .map(|c| tree.node(c).ratio(&kind).total)
                    .sum();
                assert_eq!(node.ratio(&kind).total, sum);
            }
        }
    }
}
