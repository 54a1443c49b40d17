//! Topology tests over the engine alone.
//!
//! Run with: `cargo test -p weave-tests --test topology_tests`

use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use weave_core::Error;
use weave_core::graph::{Handle, NodeKind, WorkflowGraph};
use weave_core::workflow::WorkflowDocument;
use weave_engine::{CanonicalExporter, ExportOptions, ParsedWorkflow, Parser, TopologyBuilder};
use weave_tests::DocumentFixture;

fn catalog() -> BTreeSet<String> {
    BTreeSet::from(["pip1".to_string()])
}

fn compile(input: &str) -> weave_core::Result<(ParsedWorkflow, WorkflowGraph)> {
    let document = WorkflowDocument::from_yaml(input)?;
    weave_engine::compile(&document, &catalog())
}

fn parent_names(graph: &WorkflowGraph, join: &str) -> Vec<String> {
    graph
        .join_by_name(join)
        .unwrap()
        .parents
        .iter()
        .map(|&p| graph.name_of(p).unwrap().to_string())
        .collect()
}

#[test]
fn test_scenario_a_single_predecessor_is_never_a_join() {
    let (_, graph) = compile(&DocumentFixture::scenario_a()).unwrap();

    assert_eq!(graph.joins.len(), 1);
    assert_eq!(
        parent_names(&graph, "join"),
        vec![
            "build_admin-panel-api",
            "build_admin-panel-ui",
            "build_cache-manager",
            "build_health-checker",
        ]
    );
    let join = graph.join_by_name("join").unwrap();
    assert!(join.condition.as_ref().unwrap().script.as_deref().unwrap().contains("cds_manual"));

    let fork = graph.node_by_name("fork").unwrap();
    assert_eq!(fork.kind, NodeKind::Linear);
    assert!(fork.pipeline.is_none());
    assert!(fork.condition.is_some());
    assert_eq!(fork.triggers.len(), 4);

    let dev = graph.node_by_name("deploy_admin-panel-api_dev").unwrap();
    assert_eq!(dev.kind, NodeKind::JoinMember);

    let roots: Vec<&str> = graph.roots().map(|n| n.name.as_str()).collect();
    assert_eq!(roots, vec!["root"]);
}

#[test]
fn test_scenario_b_joins_stay_distinct() {
    let (_, graph) = compile(&DocumentFixture::scenario_b()).unwrap();

    assert_eq!(graph.joins.len(), 2);
    assert_eq!(
        parent_names(&graph, "join_2"),
        vec![
            "deploy_admin-panel-api_dev",
            "deploy_admin-panel-ui_dev",
            "deploy_cache-manager_dev",
            "deploy_health-checker_dev",
        ]
    );

    let first = graph.join_by_name("join").unwrap().condition.clone();
    let second = graph.join_by_name("join_2").unwrap().condition.clone();
    assert!(first.is_some());
    assert!(second.is_some());
    assert_ne!(first, second);

    for name in [
        "deploy_admin-panel-api_prod",
        "deploy_admin-panel-ui_prod",
        "deploy_cache-manager_prod",
        "deploy_health-checker_prod",
    ] {
        assert_eq!(graph.node_by_name(name).unwrap().kind, NodeKind::JoinMember);
        let handle = graph.lookup(name).unwrap();
        assert_eq!(graph.predecessors(handle), vec![graph.lookup("join_2").unwrap()]);
    }
}

#[test]
fn test_scenario_c_unknown_predecessor() {
    let err = compile(&DocumentFixture::unknown_predecessor()).unwrap_err();
    match err {
        Error::MalformedInput { node, reason } => {
            assert_eq!(node, "deploy");
            assert!(reason.contains("ghost"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unknown_pipeline_rejected() {
    let input = DocumentFixture::single("test_1").replace("pipeline: pip1", "pipeline: pip9");
    assert!(matches!(
        compile(&input),
        Err(Error::MalformedInput { .. })
    ));
}

#[test]
fn test_round_trip_preserves_structure() {
    for input in [DocumentFixture::scenario_a(), DocumentFixture::scenario_b()] {
        let (_, graph) = compile(&input).unwrap();
        let exported = CanonicalExporter::default().export(&graph).unwrap();

        let reparsed = Parser::new(&catalog()).parse(&exported).unwrap();
        let rebuilt = TopologyBuilder::new().build(&reparsed).unwrap();
        assert_eq!(rebuilt, graph);

        // The canonical form is a fixed point
        let again = CanonicalExporter::default().export(&rebuilt).unwrap();
        assert_eq!(again, exported);
    }
}

#[test]
fn test_round_trip_through_yaml_text() {
    let (_, graph) = compile(&DocumentFixture::scenario_b()).unwrap();
    let yaml = CanonicalExporter::new(ExportOptions::default())
        .export(&graph)
        .unwrap()
        .to_yaml()
        .unwrap();
    let (_, rebuilt) = compile(&yaml).unwrap();
    assert_eq!(rebuilt, graph);
}

#[test]
fn test_rebuild_is_deterministic() {
    let parsed = Parser::new(&catalog())
        .parse_yaml(&DocumentFixture::scenario_a())
        .unwrap();
    let first = TopologyBuilder::new().build(&parsed).unwrap();
    let second = TopologyBuilder::new().build(&parsed).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_every_declaration_reachable_from_root() {
    let (_, graph) = compile(&DocumentFixture::scenario_b()).unwrap();

    let mut seen = BTreeSet::new();
    let mut stack: Vec<Handle> = graph.roots.iter().map(|&r| Handle::Node(r)).collect();
    while let Some(handle) = stack.pop() {
        if seen.insert(handle) {
            stack.extend(graph.successors(handle));
        }
    }
    assert_eq!(seen.len(), graph.len());
}

#[test]
fn test_cycle_reported_by_name() {
    let input = r#"
name: loop
workflow:
  root:
    pipeline: pip1
  a:
    pipeline: pip1
    depends_on: [c]
  b:
    pipeline: pip1
    depends_on: [a]
  c:
    pipeline: pip1
    depends_on: [b]
"#;
    match compile(input).unwrap_err() {
        Error::CyclicOrUnreachableGraph { cyclic, .. } => {
            assert_eq!(cyclic, vec!["a", "b", "c"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
