//! CLI configuration management.

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use weave_engine::{AnyPipeline, PipelineCatalog};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CliConfig {
    /// Pipelines a workflow may reference. Empty accepts any reference.
    #[serde(default)]
    pub pipelines: BTreeSet<String>,
    /// Output format.
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Export the permissions block by default.
    #[serde(default)]
    pub with_permissions: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl CliConfig {
    /// Load configuration from the default file.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default file.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("build", "weave", "weave-cli")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Set a configuration value.
    ///
    /// `pipelines` takes a comma-separated list; an empty value clears it.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "pipelines" => {
                self.pipelines = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect();
            }
            "output_format" => {
                self.output_format = match value {
                    "yaml" => OutputFormat::Yaml,
                    "json" => OutputFormat::Json,
                    _ => bail!("Invalid output format: {}", value),
                };
            }
            "with_permissions" => {
                self.with_permissions = value
                    .parse()
                    .with_context(|| format!("Invalid boolean: {}", value))?;
            }
            _ => bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Pipeline catalog used to validate documents.
    pub fn catalog(&self) -> &dyn PipelineCatalog {
        if self.pipelines.is_empty() {
            &AnyPipeline
        } else {
            &self.pipelines
        }
    }
}
