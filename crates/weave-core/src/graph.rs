//! Canonical workflow graph.
//!
//! The graph is an arena: nodes and joins live in two vectors and refer to
//! each other through [`NodeId`] / [`JoinId`] handles, never through live
//! references, so joins feeding joins cannot form ownership cycles.
//!
//! The arena is produced by the topology builder in `weave-engine`;
//! fields are public for adapters and tests, but only the builder
//! upholds the invariants:
//!
//! - a [`Join`] exists for a declaration iff it named two or more
//!   predecessors, and its `parents` keep declaration order;
//! - a [`GraphNode`] is `Root` with no predecessor, `Linear` when its
//!   single predecessor is a node and `JoinMember` when it is a join;
//! - every node and join is reachable from some root and the whole
//!   structure is acyclic.

use crate::permission::PermissionEntry;
use crate::workflow::Condition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JoinId(pub usize);

/// Stable handle to either arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Handle {
    Node(NodeId),
    Join(JoinId),
}

impl From<NodeId> for Handle {
    fn from(id: NodeId) -> Self {
        Handle::Node(id)
    }
}

impl From<JoinId> for Handle {
    fn from(id: JoinId) -> Self {
        Handle::Join(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Linear,
    JoinMember,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::Linear => write!(f, "linear"),
            NodeKind::JoinMember => write!(f, "join member"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub kind: NodeKind,
    /// Pipeline to run. `None` for a pass-through gate that only carries a
    /// condition.
    pub pipeline: Option<String>,
    pub parameters: Vec<(String, String)>,
    pub payload: Vec<(String, String)>,
    pub condition: Option<Condition>,
    /// Nodes triggered once this node completes.
    pub triggers: Vec<NodeId>,
}

/// Fan-in point: waits for every parent, then evaluates its condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Identity of the declaration that introduced the convergence.
    pub name: String,
    pub parents: Vec<Handle>,
    pub condition: Option<Condition>,
    pub triggers: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub metadata: IndexMap<String, String>,
    pub nodes: Vec<GraphNode>,
    pub joins: Vec<Join>,
    pub roots: Vec<NodeId>,
    /// Declaration order of every node and join; only used for re-export.
    pub order: Vec<Handle>,
    pub index: HashMap<String, Handle>,
    /// Resolved access-control list. Empty until the permission resolver runs.
    pub acl: Vec<PermissionEntry>,
}

impl WorkflowGraph {
    /// Total number of declarations (nodes plus joins).
    pub fn len(&self) -> usize {
        self.nodes.len() + self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, name: &str) -> Option<Handle> {
        self.index.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0)
    }

    pub fn join(&self, id: JoinId) -> Option<&Join> {
        self.joins.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&GraphNode> {
        match self.lookup(name)? {
            Handle::Node(id) => self.node(id),
            Handle::Join(_) => None,
        }
    }

    pub fn join_by_name(&self, name: &str) -> Option<&Join> {
        match self.lookup(name)? {
            Handle::Join(id) => self.join(id),
            Handle::Node(_) => None,
        }
    }

    pub fn name_of(&self, handle: Handle) -> Option<&str> {
        match handle {
            Handle::Node(id) => self.node(id).map(|n| n.name.as_str()),
            Handle::Join(id) => self.join(id).map(|j| j.name.as_str()),
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = &GraphNode> {
        self.roots.iter().filter_map(|&id| self.node(id))
    }

    /// Handles this declaration waits on: the join parents, or the single
    /// node or join that triggers a node.
    pub fn predecessors(&self, handle: Handle) -> Vec<Handle> {
        match handle {
            Handle::Join(id) => self.join(id).map(|j| j.parents.clone()).unwrap_or_default(),
            Handle::Node(id) => {
                let from_nodes = self
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| n.triggers.contains(&id))
                    .map(|(i, _)| Handle::Node(NodeId(i)));
                let from_joins = self
                    .joins
                    .iter()
                    .enumerate()
                    .filter(|(_, j)| j.triggers.contains(&id))
                    .map(|(i, _)| Handle::Join(JoinId(i)));
                from_nodes.chain(from_joins).collect()
            }
        }
    }

    /// Handles that wait on this declaration: triggered nodes first, then
    /// joins listing it as a parent, both in arena order.
    pub fn successors(&self, handle: Handle) -> Vec<Handle> {
        let triggered: Vec<Handle> = match handle {
            Handle::Node(id) => self
                .node(id)
                .map(|n| n.triggers.iter().map(|&c| Handle::Node(c)).collect())
                .unwrap_or_default(),
            Handle::Join(id) => self
                .join(id)
                .map(|j| j.triggers.iter().map(|&c| Handle::Node(c)).collect())
                .unwrap_or_default(),
        };
        let joins = self
            .joins
            .iter()
            .enumerate()
            .filter(|(_, j)| j.parents.contains(&handle))
            .map(|(i, _)| Handle::Join(JoinId(i)));
        triggered.into_iter().chain(joins).collect()
    }
}
