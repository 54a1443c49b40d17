//! Topology builder.
//!
//! Classification is a pure function of each declaration's predecessor
//! count: none makes a root, one makes a trigger edge, two or more make a
//! [`Join`]. Node names are never inspected.

use crate::parser::{NodeSpec, ParsedWorkflow};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};
use weave_core::graph::{GraphNode, Handle, Join, JoinId, NodeId, NodeKind, WorkflowGraph};
use weave_core::{Error, Result};

/// Builder for canonical workflow graphs.
pub struct TopologyBuilder;

impl TopologyBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the canonical graph from parsed node specs.
    #[instrument(skip_all, fields(workflow = %parsed.name))]
    pub fn build(&self, parsed: &ParsedWorkflow) -> Result<WorkflowGraph> {
        if parsed.nodes.is_empty() {
            return Err(Error::malformed(&parsed.name, "workflow declares no node"));
        }

        let mut nodes = Vec::new();
        let mut joins = Vec::new();
        let mut order = Vec::with_capacity(parsed.nodes.len());
        let mut index = HashMap::with_capacity(parsed.nodes.len());

        // Classify every declaration and register its handle
        for spec in &parsed.nodes {
            let handle = if spec.is_join() {
                joins.push(Join {
                    name: spec.name.clone(),
                    parents: Vec::with_capacity(spec.predecessors.len()),
                    condition: spec.condition.clone(),
                    triggers: vec![],
                });
                Handle::Join(JoinId(joins.len() - 1))
            } else {
                nodes.push(graph_node(spec));
                Handle::Node(NodeId(nodes.len() - 1))
            };
            if index.insert(spec.name.clone(), handle).is_some() {
                return Err(Error::malformed(&spec.name, "node is declared more than once"));
            }
            order.push(handle);
        }

        // Wire trigger edges and join parents
        let mut roots = Vec::new();
        for (spec, &handle) in parsed.nodes.iter().zip(&order) {
            let predecessors = spec
                .predecessors
                .iter()
                .map(|p| {
                    index.get(p).copied().ok_or_else(|| {
                        Error::malformed(&spec.name, format!("unknown predecessor '{p}'"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            match (handle, predecessors.as_slice()) {
                (Handle::Join(id), parents) => joins[id.0].parents = parents.to_vec(),
                (Handle::Node(id), []) => {
                    nodes[id.0].kind = NodeKind::Root;
                    roots.push(id);
                }
                (Handle::Node(id), [Handle::Node(parent)]) => {
                    nodes[id.0].kind = NodeKind::Linear;
                    nodes[parent.0].triggers.push(id);
                }
                (Handle::Node(id), [Handle::Join(parent)]) => {
                    nodes[id.0].kind = NodeKind::JoinMember;
                    joins[parent.0].triggers.push(id);
                }
                (Handle::Node(_), _) => {
                    return Err(Error::Internal(format!(
                        "declaration '{}' classified as a node with {} predecessors",
                        spec.name,
                        predecessors.len()
                    )));
                }
            }
        }

        let graph = WorkflowGraph {
            name: parsed.name.clone(),
            version: parsed.version.clone(),
            description: parsed.description.clone(),
            metadata: parsed.metadata.clone(),
            nodes,
            joins,
            roots,
            order,
            index,
            acl: vec![],
        };

        check_topology(&graph)?;

        debug!(
            nodes = graph.nodes.len(),
            joins = graph.joins.len(),
            roots = graph.roots.len(),
            "Built workflow graph"
        );

        Ok(graph)
    }
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn graph_node(spec: &NodeSpec) -> GraphNode {
    GraphNode {
        name: spec.name.clone(),
        // Fixed while wiring
        kind: NodeKind::Root,
        pipeline: spec.pipeline.clone(),
        parameters: spec.parameters.clone(),
        payload: spec.payload.clone(),
        condition: spec.condition.clone(),
        triggers: vec![],
    }
}

/// Reject cycles (Tarjan SCC) and anything a DFS from the roots misses.
/// Names are reported in declaration order.
fn check_topology(graph: &WorkflowGraph) -> Result<()> {
    let mut dag: DiGraph<Handle, ()> = DiGraph::with_capacity(graph.len(), graph.len());
    let indices: HashMap<Handle, NodeIndex> =
        graph.order.iter().map(|&h| (h, dag.add_node(h))).collect();

    for &handle in &graph.order {
        let from = indices[&handle];
        for successor in graph.successors(handle) {
            dag.add_edge(from, indices[&successor], ());
        }
    }

    let mut cyclic = HashSet::new();
    for component in tarjan_scc(&dag) {
        let self_loop = component.len() == 1 && dag.contains_edge(component[0], component[0]);
        if component.len() > 1 || self_loop {
            cyclic.extend(component.into_iter().map(|idx| dag[idx]));
        }
    }

    let mut reachable = HashSet::new();
    for &root in &graph.roots {
        let mut dfs = Dfs::new(&dag, indices[&Handle::Node(root)]);
        while let Some(idx) = dfs.next(&dag) {
            reachable.insert(dag[idx]);
        }
    }

    let cyclic_names = names_in_order(graph, |h| cyclic.contains(&h));
    let unreachable_names =
        names_in_order(graph, |h| !cyclic.contains(&h) && !reachable.contains(&h));

    if cyclic_names.is_empty() && unreachable_names.is_empty() {
        return Ok(());
    }

    warn!(
        workflow = %graph.name,
        cyclic = ?cyclic_names,
        unreachable = ?unreachable_names,
        "Rejected workflow topology"
    );
    Err(Error::CyclicOrUnreachableGraph {
        cyclic: cyclic_names,
        unreachable: unreachable_names,
    })
}

fn names_in_order(graph: &WorkflowGraph, keep: impl Fn(Handle) -> bool) -> Vec<String> {
    graph
        .order
        .iter()
        .copied()
        .filter(|&h| keep(h))
        .filter_map(|h| graph.name_of(h).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{AnyPipeline, Parser};
    use pretty_assertions::assert_eq;
    use weave_core::workflow::Condition;

    fn build(input: &str) -> Result<WorkflowGraph> {
        let parsed = Parser::new(&AnyPipeline).parse_yaml(input)?;
        TopologyBuilder::new().build(&parsed)
    }

    const DIAMOND: &str = r#"name: diamond
workflow:
  root:
    pipeline: build
  a:
    depends_on: [root]
    pipeline: test
  b:
    depends_on: [root]
    pipeline: lint
  join:
    depends_on: [a, b]
    conditions:
      script: return cds_status == "Success"
  deploy:
    depends_on: [join]
    pipeline: deploy
"#;

    #[test]
    fn test_diamond() {
        let graph = build(DIAMOND).unwrap();

        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.joins.len(), 1);
        assert_eq!(graph.roots().map(|n| n.name.as_str()).collect::<Vec<_>>(), vec!["root"]);

        let root = graph.node_by_name("root").unwrap();
        assert_eq!(root.kind, NodeKind::Root);
        let triggered: Vec<_> = root
            .triggers
            .iter()
            .map(|&id| graph.node(id).unwrap().name.as_str())
            .collect();
        assert_eq!(triggered, vec!["a", "b"]);

        let join = graph.join_by_name("join").unwrap();
        let parents: Vec<_> = join
            .parents
            .iter()
            .map(|&h| graph.name_of(h).unwrap())
            .collect();
        assert_eq!(parents, vec!["a", "b"]);
        assert_eq!(
            join.condition,
            Some(Condition::script(r#"return cds_status == "Success""#))
        );

        let deploy = graph.node_by_name("deploy").unwrap();
        assert_eq!(deploy.kind, NodeKind::JoinMember);
        assert_eq!(graph.node_by_name("a").unwrap().kind, NodeKind::Linear);
    }

    #[test]
    fn test_single_predecessor_is_never_a_join() {
        let graph = build(
            r#"name: w
workflow:
  root:
    pipeline: p
  join:
    depends_on: [root]
    pipeline: p
  fork:
    depends_on: [join]
"#,
        )
        .unwrap();
        assert!(graph.joins.is_empty());
        assert_eq!(graph.node_by_name("join").unwrap().kind, NodeKind::Linear);
        assert_eq!(graph.node_by_name("fork").unwrap().kind, NodeKind::Linear);
    }

    #[test]
    fn test_join_feeding_join() {
        let graph = build(
            r#"name: w
workflow:
  root:
    pipeline: p
  a:
    depends_on: [root]
    pipeline: p
  b:
    depends_on: [root]
    pipeline: p
  j1:
    depends_on: [a, b]
  c:
    depends_on: [root]
    pipeline: p
  j2:
    depends_on: [j1, c]
  end:
    depends_on: [j2]
    pipeline: p
"#,
        )
        .unwrap();
        let j1 = graph.lookup("j1").unwrap();
        let j2 = graph.join_by_name("j2").unwrap();
        assert_eq!(j2.parents[0], j1);
        assert!(graph.successors(j1).contains(&graph.lookup("j2").unwrap()));
        assert_eq!(graph.node_by_name("end").unwrap().kind, NodeKind::JoinMember);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = build(
            r#"name: w
workflow:
  root:
    pipeline: p
  a:
    depends_on: [c]
    pipeline: p
  b:
    depends_on: [a]
    pipeline: p
  c:
    depends_on: [b]
    pipeline: p
"#,
        )
        .unwrap_err();
        match err {
            Error::CyclicOrUnreachableGraph { cyclic, unreachable } => {
                assert_eq!(cyclic, vec!["a", "b", "c"]);
                assert!(unreachable.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cyclic() {
        let err = build(
            r#"name: w
workflow:
  root:
    pipeline: p
  loop:
    depends_on: [loop]
    pipeline: p
"#,
        )
        .unwrap_err();
        match err {
            Error::CyclicOrUnreachableGraph { cyclic, .. } => assert_eq!(cyclic, vec!["loop"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_join_downstream_of_cycle_is_unreachable() {
        let err = build(
            r#"name: w
workflow:
  root:
    pipeline: p
  a:
    depends_on: [b]
    pipeline: p
  b:
    depends_on: [a]
    pipeline: p
  tail:
    depends_on: [b]
    pipeline: p
"#,
        )
        .unwrap_err();
        match err {
            Error::CyclicOrUnreachableGraph { cyclic, unreachable } => {
                assert_eq!(cyclic, vec!["a", "b"]);
                assert_eq!(unreachable, vec!["tail"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_multiple_roots() {
        let graph = build(
            r#"name: w
workflow:
  r1:
    pipeline: p
  r2:
    pipeline: p
  join:
    depends_on: [r1, r2]
"#,
        )
        .unwrap();
        assert_eq!(graph.roots.len(), 2);
        assert_eq!(graph.joins.len(), 1);
    }

    #[test]
    fn test_build_is_deterministic() {
        let parsed = Parser::new(&AnyPipeline).parse_yaml(DIAMOND).unwrap();
        let first = TopologyBuilder::new().build(&parsed).unwrap();
        let second = TopologyBuilder::new().build(&parsed).unwrap();
        assert_eq!(first, second);
    }
}
