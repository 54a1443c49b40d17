//! Command handlers.

use crate::config::{CliConfig, OutputFormat};
use anyhow::Context;
use console::style;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;
use weave_core::graph::{Handle, WorkflowGraph};
use weave_core::workflow::WorkflowDocument;
use weave_engine::{CanonicalExporter, ExportOptions, ParsedWorkflow, PermissionResolver};

fn compile(config: &CliConfig, path: &Path) -> anyhow::Result<(ParsedWorkflow, WorkflowGraph)> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let document = WorkflowDocument::from_yaml(&content)
        .with_context(|| format!("decoding {}", path.display()))?;
    debug!(path = %path.display(), workflow = %document.name, "Compiling workflow");
    Ok(weave_engine::compile(&document, config.catalog())?)
}

/// Validate a workflow document.
pub fn validate(config: &CliConfig, path: &Path) -> anyhow::Result<()> {
    let (_, graph) = compile(config, path)?;

    println!(
        "{} Workflow \"{}\" is valid",
        style("✓").green(),
        graph.name
    );
    println!("  Nodes: {}", graph.nodes.len());
    println!("  Joins: {}", graph.joins.len());
    let roots: Vec<&str> = graph.roots().map(|n| n.name.as_str()).collect();
    println!("  Roots: {}", roots.join(", "));

    Ok(())
}

/// Re-emit a workflow in canonical form.
pub fn export(
    config: &CliConfig,
    path: &Path,
    output: Option<&Path>,
    format: Option<OutputFormat>,
    with_permissions: bool,
) -> anyhow::Result<()> {
    let (parsed, graph) = compile(config, path)?;
    let with_permissions = with_permissions || config.with_permissions;
    let rendered = render_export(
        &parsed,
        graph,
        format.unwrap_or(config.output_format),
        with_permissions,
    )?;

    match output {
        Some(output) => {
            std::fs::write(output, rendered)
                .with_context(|| format!("writing {}", output.display()))?;
            eprintln!("{} Exported to {}", style("✓").green(), output.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn render_export(
    parsed: &ParsedWorkflow,
    mut graph: WorkflowGraph,
    format: OutputFormat,
    with_permissions: bool,
) -> anyhow::Result<String> {
    if with_permissions && let Some(explicit) = parsed.permissions.as_deref() {
        // Outside a project the document's own groups are the known ones.
        PermissionResolver::new(vec![])
            .with_known_groups(explicit.iter().map(|e| e.group.clone()))
            .apply(&mut graph, Some(explicit))?;
    }

    let document = CanonicalExporter::new(ExportOptions { with_permissions }).export(&graph)?;
    Ok(match format {
        OutputFormat::Yaml => document.to_yaml()?,
        OutputFormat::Json => {
            let mut json = document.to_json()?;
            json.push('\n');
            json
        }
    })
}

/// Print the workflow as a tree.
pub fn graph(config: &CliConfig, path: &Path) -> anyhow::Result<()> {
    let (_, graph) = compile(config, path)?;
    println!("{}", style(&graph.name).bold());
    print!("{}", render_tree(&graph));
    Ok(())
}

/// Indented tree of the graph. A join is expanded under its first parent;
/// later parents show a reference to it.
fn render_tree(graph: &WorkflowGraph) -> String {
    let mut out = String::new();
    let mut expanded = HashSet::new();
    for &root in &graph.roots {
        render_handle(graph, Handle::Node(root), 0, &mut expanded, &mut out);
    }
    out
}

fn render_handle(
    graph: &WorkflowGraph,
    handle: Handle,
    depth: usize,
    expanded: &mut HashSet<Handle>,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    let name = graph.name_of(handle).unwrap_or("?");
    let line = match handle {
        Handle::Node(id) => {
            let pipeline = graph
                .node(id)
                .and_then(|n| n.pipeline.as_deref())
                .unwrap_or("(gate)");
            format!("{indent}- {name} [{pipeline}]")
        }
        Handle::Join(_) => {
            let parents: Vec<&str> = graph
                .predecessors(handle)
                .into_iter()
                .filter_map(|p| graph.name_of(p))
                .collect();
            if !expanded.insert(handle) {
                let _ = writeln!(out, "{indent}+ {name} (join, see above)");
                return;
            }
            format!("{indent}+ {name} (join of {})", parents.join(", "))
        }
    };
    let _ = writeln!(out, "{line}");

    for child in graph.successors(handle) {
        render_handle(graph, child, depth + 1, expanded, out);
    }
}

/// Print the JSON Schema of the workflow document.
pub fn schema() -> anyhow::Result<()> {
    let schema = schemars::schema_for!(WorkflowDocument);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> anyhow::Result<()> {
    println!("{}", style("Configuration").bold());
    if config.pipelines.is_empty() {
        println!("  pipelines: (any)");
    } else {
        let pipelines: Vec<&str> = config.pipelines.iter().map(String::as_str).collect();
        println!("  pipelines: {}", pipelines.join(", "));
    }
    println!("  output_format: {:?}", config.output_format);
    println!("  with_permissions: {}", config.with_permissions);

    if let Ok(path) = CliConfig::config_path() {
        println!("\nConfig file: {}", path.display());
    }

    Ok(())
}

/// Set configuration.
pub fn set_config(key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = CliConfig::load().unwrap_or_default();
    config.set(key, value)?;
    config.save()?;

    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use weave_engine::AnyPipeline;

    const DOCUMENT: &str = r#"
name: release
workflow:
  build:
    pipeline: compile
  test:
    pipeline: unit
    depends_on: [build]
  lint:
    pipeline: clippy
    depends_on: [build]
  ready:
    depends_on: [test, lint]
  ship:
    pipeline: publish
    depends_on: [ready]
permissions:
  owners: 7
"#;

    fn compiled() -> (ParsedWorkflow, WorkflowGraph) {
        let document = WorkflowDocument::from_yaml(DOCUMENT).unwrap();
        weave_engine::compile(&document, &AnyPipeline).unwrap()
    }

    #[test]
    fn test_tree_marks_joins() {
        let (_, graph) = compiled();
        assert_eq!(
            render_tree(&graph),
            "- build [compile]\n  \
               - test [unit]\n    \
                 + ready (join of test, lint)\n      \
                   - ship [publish]\n  \
               - lint [clippy]\n    \
                 + ready (join, see above)\n"
        );
    }

    #[test]
    fn test_export_permissions_on_request() {
        let (parsed, graph) = compiled();
        let without = render_export(&parsed, graph.clone(), OutputFormat::Yaml, false).unwrap();
        assert!(!without.contains("permissions"));

        let with = render_export(&parsed, graph, OutputFormat::Yaml, true).unwrap();
        let document = WorkflowDocument::from_yaml(&with).unwrap();
        assert_eq!(document.permissions, Some(vec![("owners".to_string(), 7)]));
    }

    #[test]
    fn test_json_export_decodes_back() {
        let (parsed, graph) = compiled();
        let json = render_export(&parsed, graph, OutputFormat::Json, false).unwrap();
        let document = WorkflowDocument::from_yaml(&json).unwrap();
        assert_eq!(document.name, "release");
        assert_eq!(document.workflow.len(), 5);
    }
}
