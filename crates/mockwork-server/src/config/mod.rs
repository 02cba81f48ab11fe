//! Process configuration: the list of workspaces to serve.
//!
//! ```yaml
//! workspaces:
//!   - id: default
//!     name: Default Workspace
//!     host: 0.0.0.0:17070
//!     endpoint: http://127.0.0.1:17070
//! ```
//!
//! JSON is accepted as well, since every JSON document is valid YAML.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKSPACE_ID: &str = "default";
pub const DEFAULT_WORKSPACE_NAME: &str = "Default Workspace";
pub const DEFAULT_HOST: &str = "0.0.0.0:17070";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:17070";

/// One mock server: an id, a bind address and the URL clients use to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Listener address
    pub host: SocketAddr,
    /// Externally visible base URL; informational only
    #[serde(default)]
    pub endpoint: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_WORKSPACE_ID.to_string(),
            name: DEFAULT_WORKSPACE_NAME.to_string(),
            host: SocketAddr::from(([0, 0, 0, 0], 17070)),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl WorkspaceConfig {
    /// Dataset file of this workspace under `dataset_dir`.
    pub fn dataset_file(&self, dataset_dir: &Path) -> PathBuf {
        dataset_dir.join(format!("{}.definitions.json", self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_workspaces")]
    pub workspaces: Vec<WorkspaceConfig>,
}

fn default_workspaces() -> Vec<WorkspaceConfig> {
    vec![WorkspaceConfig::default()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspaces: default_workspaces(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.workspaces.is_empty() {
            anyhow::bail!("At least one workspace must be configured");
        }

        let mut ids = HashSet::new();
        let mut hosts = HashSet::new();
        for workspace in &self.workspaces {
            if workspace.id.trim().is_empty() {
                anyhow::bail!("Workspace id must not be empty");
            }
            if workspace
                .id
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            {
                anyhow::bail!(
                    "Workspace id '{}' may only contain ASCII letters, digits, '-' and '_'",
                    workspace.id
                );
            }
            if !ids.insert(workspace.id.as_str()) {
                anyhow::bail!("Duplicate workspace id '{}'", workspace.id);
            }
            // Port 0 asks the OS for a free port, so it can repeat.
            if workspace.host.port() != 0 && !hosts.insert(workspace.host) {
                anyhow::bail!(
                    "Workspace '{}' reuses host {}",
                    workspace.id,
                    workspace.host
                );
            }
        }
        Ok(())
    }
}
