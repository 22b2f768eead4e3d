use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name looked up in the working directory when no config is passed.
pub const DEFAULT_CONFIG_FILE: &str = ".pseudogrep.json";

/// Default number of context lines shown around highlighted nodes.
pub const DEFAULT_CONTEXT_LINES: usize = 5;

/// Configured tool paths for host backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPaths {
    /// Path to the rizin executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rizin: Option<String>,
    /// rizin command producing pseudocode for the function at the current seek
    /// (`pdg` needs rz-ghidra; `pdc` is built in).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rizin_decompile_command: Option<String>,
}

/// Serializable search configuration.
///
/// Every field has a default so a partial file is valid. Command-line flags
/// take precedence over anything set here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Schema/config version. This is about the config format, not the tool version.
    #[serde(default = "default_config_version")]
    pub config_version: String,
    /// Backend used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,
    #[serde(default)]
    pub backends: BackendPaths,
    /// Context lines printed before each highlighted line.
    #[serde(default = "default_context_lines")]
    pub before: usize,
    /// Context lines printed after each highlighted line.
    #[serde(default = "default_context_lines")]
    pub after: usize,
    /// Worker threads used for matching; 1 keeps the search sequential.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Parse patterns and pseudocode as C++.
    #[serde(default)]
    pub cpp: bool,
}

fn default_config_version() -> String {
    "0.1.0".to_string()
}

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}

fn default_jobs() -> usize {
    1
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            default_backend: None,
            backends: BackendPaths::default(),
            before: DEFAULT_CONTEXT_LINES,
            after: DEFAULT_CONTEXT_LINES,
            jobs: default_jobs(),
            cpp: false,
        }
    }
}

/// Load a config file, picking YAML or JSON from the extension.
pub fn load_config(path: &Path) -> Result<SearchConfig> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    if is_yaml_path(path) {
        serde_yaml::from_str(&body).context("Failed to parse config YAML")
    } else {
        serde_json::from_str(&body).context("Failed to parse config JSON")
    }
}

/// Resolve the config to use: an explicit path must exist, otherwise
/// `.pseudogrep.json` under `dir` is used when present, else defaults.
pub fn discover_config(explicit: Option<&Path>, dir: &Path) -> Result<SearchConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let candidate: PathBuf = dir.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        log::debug!("using config {}", candidate.display());
        load_config(&candidate)
    } else {
        Ok(SearchConfig::default())
    }
}

pub(crate) fn is_yaml_path(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: SearchConfig = serde_json::from_str(r#"{"jobs": 4}"#).unwrap();
        assert_eq!(cfg.jobs, 4);
        assert_eq!(cfg.before, DEFAULT_CONTEXT_LINES);
        assert_eq!(cfg.config_version, "0.1.0");
        assert!(cfg.backends.rizin.is_none());
    }

    #[test]
    fn yaml_extension_detection() {
        assert!(is_yaml_path(Path::new("cfg.yml")));
        assert!(is_yaml_path(Path::new("cfg.yaml")));
        assert!(!is_yaml_path(Path::new("cfg.json")));
    }
}
