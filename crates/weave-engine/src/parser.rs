//! Flat graph parser.
//!
//! Turns a decoded [`WorkflowDocument`] into one [`NodeSpec`] per
//! declaration, in declaration order. Only well-formedness is checked
//! here; graph semantics belong to the topology builder.

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument};
use weave_core::permission::{PermissionEntry, PermissionLevel};
use weave_core::workflow::{Condition, NodeDeclaration, WorkflowDocument};
use weave_core::{Error, Result};

/// Pipelines a declaration is allowed to reference.
pub trait PipelineCatalog: Send + Sync {
    fn contains_pipeline(&self, name: &str) -> bool;
}

impl PipelineCatalog for BTreeSet<String> {
    fn contains_pipeline(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl PipelineCatalog for HashSet<String> {
    fn contains_pipeline(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Catalog accepting every pipeline reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyPipeline;

impl PipelineCatalog for AnyPipeline {
    fn contains_pipeline(&self, _name: &str) -> bool {
        true
    }
}

/// A declaration after validation, before graph semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    /// Predecessor names as written.
    pub predecessors: Vec<String>,
    pub pipeline: Option<String>,
    pub parameters: Vec<(String, String)>,
    pub payload: Vec<(String, String)>,
    pub condition: Option<Condition>,
    /// Index in the document's `workflow` map.
    pub position: usize,
}

impl NodeSpec {
    /// Whether this declaration converges several predecessors.
    pub fn is_join(&self) -> bool {
        self.predecessors.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedWorkflow {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub metadata: IndexMap<String, String>,
    pub nodes: Vec<NodeSpec>,
    /// Explicit ACL; `None` when the document has no `permissions` block.
    pub permissions: Option<Vec<PermissionEntry>>,
}

pub struct Parser<'a> {
    catalog: &'a dyn PipelineCatalog,
}

impl<'a> Parser<'a> {
    pub fn new(catalog: &'a dyn PipelineCatalog) -> Self {
        Self { catalog }
    }

    /// Decode YAML (or JSON) and parse it.
    pub fn parse_yaml(&self, input: &str) -> Result<ParsedWorkflow> {
        let document = WorkflowDocument::from_yaml(input)
            .map_err(|e| Error::malformed("<document>", e.to_string()))?;
        self.parse(&document)
    }

    #[instrument(skip_all, fields(workflow = %document.name))]
    pub fn parse(&self, document: &WorkflowDocument) -> Result<ParsedWorkflow> {
        let workflow = document.name.trim();
        if workflow.is_empty() {
            return Err(Error::malformed("<document>", "workflow name is empty"));
        }
        if document.workflow.is_empty() {
            return Err(Error::malformed(workflow, "workflow declares no node"));
        }

        let mut declared = HashSet::with_capacity(document.workflow.len());
        for (name, _) in &document.workflow {
            if name.trim().is_empty() {
                return Err(Error::malformed(workflow, "node name is empty"));
            }
            if !declared.insert(name.as_str()) {
                return Err(Error::malformed(name, "node is declared more than once"));
            }
        }

        let nodes = document
            .workflow
            .iter()
            .enumerate()
            .map(|(position, (name, decl))| self.parse_node(name, decl, position, &declared))
            .collect::<Result<Vec<_>>>()?;

        let permissions = document
            .permissions
            .as_deref()
            .map(|pairs| parse_permissions(workflow, pairs))
            .transpose()?;

        debug!(nodes = nodes.len(), explicit_acl = permissions.is_some(), "Parsed workflow");

        Ok(ParsedWorkflow {
            name: document.name.clone(),
            version: document.version.clone(),
            description: document.description.clone(),
            metadata: document.metadata.clone(),
            nodes,
            permissions,
        })
    }

    fn parse_node(
        &self,
        name: &str,
        decl: &NodeDeclaration,
        position: usize,
        declared: &HashSet<&str>,
    ) -> Result<NodeSpec> {
        let mut seen = HashSet::with_capacity(decl.depends_on.len());
        for predecessor in &decl.depends_on {
            if !seen.insert(predecessor.as_str()) {
                return Err(Error::malformed(
                    name,
                    format!("predecessor '{predecessor}' is listed more than once"),
                ));
            }
            if !declared.contains(predecessor.as_str()) {
                return Err(Error::malformed(
                    name,
                    format!("unknown predecessor '{predecessor}'"),
                ));
            }
        }

        ensure_unique_keys(name, "parameter", &decl.parameters)?;
        ensure_unique_keys(name, "payload key", &decl.payload)?;

        let carries_context = !decl.parameters.is_empty() || !decl.payload.is_empty();
        match decl.depends_on.len() {
            0 if decl.pipeline.is_none() => {
                return Err(Error::malformed(name, "a root declaration must name a pipeline"));
            }
            1 if decl.pipeline.is_none() && carries_context => {
                return Err(Error::malformed(
                    name,
                    "parameters and payload require a pipeline",
                ));
            }
            n if n > 1 && (decl.pipeline.is_some() || carries_context) => {
                return Err(Error::malformed(
                    name,
                    "a join declaration only carries depends_on and conditions",
                ));
            }
            _ => {}
        }

        if let Some(pipeline) = &decl.pipeline {
            if pipeline.trim().is_empty() {
                return Err(Error::malformed(name, "pipeline reference is empty"));
            }
            if !self.catalog.contains_pipeline(pipeline) {
                return Err(Error::malformed(name, format!("unknown pipeline '{pipeline}'")));
            }
        }

        Ok(NodeSpec {
            name: name.to_string(),
            predecessors: decl.depends_on.clone(),
            pipeline: decl.pipeline.clone(),
            parameters: decl.parameters.clone(),
            payload: decl.payload.clone(),
            condition: decl.conditions.clone().filter(|c| !c.is_empty()),
            position,
        })
    }
}

fn ensure_unique_keys(node: &str, what: &str, pairs: &[(String, String)]) -> Result<()> {
    let mut seen = HashSet::with_capacity(pairs.len());
    for (key, _) in pairs {
        if !seen.insert(key.as_str()) {
            return Err(Error::malformed(node, format!("duplicate {what} '{key}'")));
        }
    }
    Ok(())
}

fn parse_permissions(workflow: &str, pairs: &[(String, i64)]) -> Result<Vec<PermissionEntry>> {
    let mut seen = HashSet::with_capacity(pairs.len());
    pairs
        .iter()
        .map(|(group, level)| {
            if !seen.insert(group.as_str()) {
                return Err(Error::malformed(
                    workflow,
                    format!("group '{group}' appears twice in permissions"),
                ));
            }
            let level = u8::try_from(*level)
                .map_err(|_| format!("unknown permission level {level} (expected 4, 5 or 7)"))
                .and_then(PermissionLevel::try_from)
                .map_err(|reason| Error::malformed(workflow, format!("group '{group}': {reason}")))?;
            Ok(PermissionEntry::new(group.as_str(), level))
        })
        .collect()
}
