//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::DocFlowConfig;

/// Default project-local configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "./.tools/doc-flow/config.json";

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Project tooling directory: .tools/doc-flow/config.json
        search_paths.push(PathBuf::from(DEFAULT_CONFIG_PATH));

        // 2. Current directory: .doc-flow.toml
        search_paths.push(PathBuf::from(".doc-flow.toml"));

        // 3. User config directory: ~/.config/doc-flow/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("doc-flow").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file.
    ///
    /// # Errors
    ///
    /// Returns an error if no file exists, or the first existing file cannot
    /// be read or parsed.
    pub fn load(&self) -> Result<DocFlowConfig, ConfigError> {
        let path = self.find_config_file().ok_or_else(|| ConfigError::NotFound {
            searched: self.search_paths.clone(),
        })?;
        tracing::debug!(path = %path.display(), "Loading config file");
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_path(path: &Path) -> Result<DocFlowConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: DocFlowConfig = if is_toml(path) {
            toml::from_str(&content).map_err(|e| ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: e,
            })?
        };

        config.assign_names();
        tracing::debug!(servers = config.mcp_servers.len(), "Loaded server definitions");
        Ok(config)
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No config file found (searched: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
