//! Weave Engine
//!
//! The workflow-topology pipeline: a flat document is parsed into node
//! specs, the topology builder turns them into the canonical graph with
//! explicit joins, the permission resolver computes its access-control
//! list, and the canonical exporter re-emits the flat form.

pub mod builder;
pub mod exporter;
pub mod parser;
pub mod permissions;

pub use builder::TopologyBuilder;
pub use exporter::{CanonicalExporter, ExportOptions};
pub use parser::{AnyPipeline, NodeSpec, ParsedWorkflow, Parser, PipelineCatalog};
pub use permissions::{PermissionResolver, ResolvedAcl};

use weave_core::Result;
use weave_core::graph::WorkflowGraph;
use weave_core::workflow::WorkflowDocument;

/// Parse and build a document in one step.
///
/// The returned graph has an empty ACL; run the [`PermissionResolver`]
/// to attach one.
pub fn compile(
    document: &WorkflowDocument,
    catalog: &dyn PipelineCatalog,
) -> Result<(ParsedWorkflow, WorkflowGraph)> {
    let parsed = Parser::new(catalog).parse(document)?;
    let graph = TopologyBuilder::new().build(&parsed)?;
    Ok((parsed, graph))
}
