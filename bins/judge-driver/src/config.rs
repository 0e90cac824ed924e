// Backend configuration management for the judge driver
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/backends.json";
pub const DEFAULT_BACKEND: &str = "python";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Process,
    Docker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub kind: BackendKind,
    /// Harness program and its arguments
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Container image, docker backends only
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u32,
    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: f32,
}

fn default_memory_limit_mb() -> u32 {
    256
}

fn default_cpu_limit() -> f32 {
    0.5
}

#[derive(Debug, Serialize, Deserialize)]
struct BackendsJson {
    backends: Vec<BackendConfig>,
}

/// Backend configuration manager
#[derive(Debug, Clone)]
pub struct BackendConfigManager {
    configs: BTreeMap<String, BackendConfig>,
}

impl BackendConfigManager {
    /// Load backend configurations from backends.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Backend config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let backends_json: BackendsJson = serde_json::from_str(content)?;

        let mut configs = BTreeMap::new();
        for backend in backends_json.backends {
            if backend.kind == BackendKind::Docker && backend.image.is_none() {
                bail!("Docker backend '{}' has no image", backend.name);
            }
            if configs.contains_key(&backend.name) {
                bail!("Backend '{}' is configured twice", backend.name);
            }
            configs.insert(backend.name.clone(), backend);
        }

        Ok(Self { configs })
    }

    /// Get configuration for a named backend
    pub fn get_config(&self, name: &str) -> Result<&BackendConfig> {
        self.configs
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("No configuration found for backend: {}", name))
    }

    /// List all configured backends
    pub fn list_backends(&self) -> Vec<&BackendConfig> {
        self.configs.values().collect()
    }
}
