//! Weave CLI entrypoint.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;

use commands::{Commands, ConfigCommands};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "weave")]
#[command(author, version, about = "Weave workflow command-line interface", long_about = None)]
struct Cli {
    /// Log engine decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::load().unwrap_or_default();

    match cli.command {
        Commands::Validate { path } => handlers::validate(&config, &path)?,
        Commands::Export {
            path,
            output,
            format,
            with_permissions,
        } => handlers::export(&config, &path, output.as_deref(), format, with_permissions)?,
        Commands::Graph { path } => handlers::graph(&config, &path)?,
        Commands::Schema => handlers::schema()?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
            ConfigCommands::Set { key, value } => handlers::set_config(&key, &value)?,
        },
    }

    Ok(())
}
