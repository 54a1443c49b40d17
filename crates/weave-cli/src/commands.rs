//! CLI command definitions.

use crate::config::OutputFormat;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a workflow document
    Validate {
        /// Path to the workflow file
        #[arg(default_value = "workflow.yml")]
        path: PathBuf,
    },

    /// Re-emit a workflow in canonical form
    Export {
        /// Path to the workflow file
        path: PathBuf,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (defaults to the configured one)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Include the permissions block
        #[arg(long)]
        with_permissions: bool,
    },

    /// Print the workflow as a tree
    Graph {
        /// Path to the workflow file
        path: PathBuf,
    },

    /// Print the JSON Schema of the workflow document
    Schema,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Key
        key: String,

        /// Value
        value: String,
    },
}
