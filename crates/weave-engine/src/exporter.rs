//! Canonical exporter.
//!
//! Walks the graph in declaration order and re-emits the flat document:
//! every node names its single predecessor (or none for a root), every
//! join names its parents in their original order. Structural
//! inconsistencies are builder defects and surface as internal errors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};
use weave_core::graph::{GraphNode, Handle, Join, JoinId, NodeId, NodeKind, WorkflowGraph};
use weave_core::workflow::{NodeDeclaration, WorkflowDocument};
use weave_core::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Emit the graph's ACL as a `permissions` block.
    #[serde(default)]
    pub with_permissions: bool,
}

impl ExportOptions {
    pub fn with_permissions() -> Self {
        Self {
            with_permissions: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalExporter {
    options: ExportOptions,
}

impl CanonicalExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    #[instrument(skip_all, fields(workflow = %graph.name))]
    pub fn export(&self, graph: &WorkflowGraph) -> Result<WorkflowDocument> {
        if graph.order.len() != graph.len() {
            return Err(Error::Internal(format!(
                "declaration order lists {} entries for {} nodes and joins",
                graph.order.len(),
                graph.len()
            )));
        }

        let parents = single_parents(graph)?;
        let workflow = graph
            .order
            .iter()
            .map(|&handle| match handle {
                Handle::Node(id) => {
                    let node = graph
                        .node(id)
                        .ok_or_else(|| Error::Internal(format!("dangling node handle {}", id.0)))?;
                    export_node(graph, id, node, parents.get(&id).copied())
                }
                Handle::Join(id) => {
                    let join = graph
                        .join(id)
                        .ok_or_else(|| Error::Internal(format!("dangling join handle {}", id.0)))?;
                    export_join(graph, join)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let permissions = (self.options.with_permissions && !graph.acl.is_empty()).then(|| {
            graph
                .acl
                .iter()
                .map(|e| (e.group.to_string(), i64::from(e.level.as_u8())))
                .collect()
        });

        debug!(declarations = workflow.len(), "Exported workflow");

        Ok(WorkflowDocument {
            name: graph.name.clone(),
            version: graph.version.clone(),
            description: graph.description.clone(),
            workflow,
            metadata: graph.metadata.clone(),
            permissions,
        })
    }
}

/// Map every triggered node to the node or join that triggers it.
fn single_parents(graph: &WorkflowGraph) -> Result<HashMap<NodeId, Handle>> {
    let edges = graph
        .nodes
        .iter()
        .enumerate()
        .flat_map(|(i, n)| n.triggers.iter().map(move |&c| (c, Handle::Node(NodeId(i)))))
        .chain(graph.joins.iter().enumerate().flat_map(|(i, j)| {
            j.triggers.iter().map(move |&c| (c, Handle::Join(JoinId(i))))
        }));

    let mut parents = HashMap::new();
    for (child, parent) in edges {
        if parents.insert(child, parent).is_some() {
            let name = graph.node(child).map(|n| n.name.as_str()).unwrap_or("?");
            return Err(Error::Internal(format!(
                "node '{name}' is triggered more than once"
            )));
        }
    }
    Ok(parents)
}

fn export_node(
    graph: &WorkflowGraph,
    id: NodeId,
    node: &GraphNode,
    parent: Option<Handle>,
) -> Result<(String, NodeDeclaration)> {
    let consistent = matches!(
        (node.kind, parent),
        (NodeKind::Root, None)
            | (NodeKind::Linear, Some(Handle::Node(_)))
            | (NodeKind::JoinMember, Some(Handle::Join(_)))
    );
    if !consistent || (node.kind == NodeKind::Root) != graph.roots.contains(&id) {
        return Err(Error::Internal(format!(
            "node '{}' is {} but its predecessor is {:?}",
            node.name, node.kind, parent
        )));
    }

    let depends_on = parent
        .map(|p| handle_name(graph, p))
        .transpose()?
        .into_iter()
        .collect();

    Ok((
        node.name.clone(),
        NodeDeclaration {
            pipeline: node.pipeline.clone(),
            depends_on,
            parameters: node.parameters.clone(),
            payload: node.payload.clone(),
            conditions: node.condition.clone(),
        },
    ))
}

fn export_join(graph: &WorkflowGraph, join: &Join) -> Result<(String, NodeDeclaration)> {
    if join.parents.len() < 2 {
        return Err(Error::Internal(format!(
            "join '{}' has {} parents",
            join.name,
            join.parents.len()
        )));
    }
    let depends_on = join
        .parents
        .iter()
        .map(|&p| handle_name(graph, p))
        .collect::<Result<Vec<_>>>()?;

    Ok((
        join.name.clone(),
        NodeDeclaration {
            depends_on,
            conditions: join.condition.clone(),
            ..Default::default()
        },
    ))
}

fn handle_name(graph: &WorkflowGraph, handle: Handle) -> Result<String> {
    graph
        .name_of(handle)
        .map(str::to_string)
        .ok_or_else(|| Error::Internal(format!("dangling handle {handle:?}")))
}
