//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Scenario execution settings
    #[serde(default)]
    pub run: RunConfig,

    /// Report output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Report output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Coloured human-readable tree
    #[default]
    Text,
    /// One JSON document with every scenario report
    Json,
}

/// Scenario execution settings
#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Mark the scenario complete on the first hard failure
    #[serde(default = "default_true")]
    pub stop_on_hard_fail: bool,

    /// Mark the scenario complete on the first soft failure
    #[serde(default)]
    pub stop_on_soft_fail: bool,

    /// Number of scenarios run concurrently
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Default tag filter applied when none is given on the command line
    #[serde(default)]
    pub tags: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stop_on_hard_fail: true,
            stop_on_soft_fail: false,
            jobs: default_jobs(),
            tags: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_jobs() -> usize {
    4
}

/// Output settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct OutputConfig {
    /// Report format
    #[serde(default)]
    pub format: OutputFormat,

    /// Treat soft failures as a failed run
    #[serde(default)]
    pub strict: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        if config.run.jobs == 0 {
            return Err(super::Error::Config("run.jobs must be at least 1".to_string()));
        }
        Ok(config)
    }
}
