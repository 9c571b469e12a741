//! Workspace configuration parsing (.dataworkspace.toml)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::workspace::provider::{ProjectType, ProjectTypeRegistry};

pub const CONFIG_FILE_NAME: &str = ".dataworkspace.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),
    #[error("Failed to read config: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Workspace configuration from .dataworkspace.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_project_types")]
    pub project_types: Vec<ProjectType>,
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub scratch: ScratchSection,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            project_types: default_project_types(),
            scan: ScanSection::default(),
            scratch: ScratchSection::default(),
        }
    }
}

fn default_project_types() -> Vec<ProjectType> {
    vec![ProjectType::new("sqlproj", "sqlproj").with_display_name("SQL Database")]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSection {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            ignore_dirs: default_ignore_dirs(),
        }
    }
}

fn default_max_depth() -> usize {
    8
}

fn default_ignore_dirs() -> Vec<String> {
    [".git", "node_modules", "bin", "obj", "target", "dist", ".vscode"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchSection {
    /// Scratch list location. Defaults to `~/.dataworkspace/scratch.json`.
    pub path: Option<PathBuf>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ScratchSection {
    fn default() -> Self {
        Self {
            path: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

impl WorkspaceConfig {
    /// Load config from a directory, falling back to defaults when absent
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_file(&config_path)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn registry(&self) -> ProjectTypeRegistry {
        ProjectTypeRegistry::new(self.project_types.iter().cloned())
    }

    /// Effective scratch list path, or `None` if no home directory is known
    pub fn scratch_path(&self) -> Option<PathBuf> {
        self.scratch.path.clone().or_else(|| {
            dirs::home_dir().map(|home| home.join(".dataworkspace").join("scratch.json"))
        })
    }
}
