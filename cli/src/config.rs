//! Configuration management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use snapctlrs_core::{Cluster, Controller, Error, Node, NodeMode, Result};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where to write the snapshot bundle
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Controller description
    #[serde(default)]
    pub controller: Controller,

    /// Cluster nodes to collect from
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// SSH key path for remote execution
    pub ssh_key_path: Option<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("snapshot")
}

/// One node entry in the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// SSH connection string (user@host) or None for an agent on this host
    pub ssh_host: Option<String>,
    pub remote_root: Option<PathBuf>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: String,
    #[serde(default = "default_executors")]
    pub executors: u32,
    #[serde(default)]
    pub mode: NodeMode,
    pub launch_method: Option<String>,
    pub availability: Option<String>,
}

fn default_executors() -> u32 {
    1
}

impl Config {
    /// Load configuration from file or environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(p) = path {
            Self::load_from_file(p)
        } else {
            Self::load_from_env()
        }
    }

    /// Load from configuration file
    fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    fn load_from_env() -> Result<Self> {
        let output_dir = std::env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_output_dir());

        let nodes = if let Ok(node_str) = std::env::var("NODES") {
            Self::parse_nodes(&node_str)?
        } else {
            Vec::new()
        };

        let controller = Controller {
            url: std::env::var("CONTROLLER_URL").ok(),
            root: std::env::var("CONTROLLER_ROOT").ok().map(PathBuf::from),
            jobs_root: std::env::var("JOBS_ROOT").ok().map(PathBuf::from),
            extensions_dir: std::env::var("EXTENSIONS_DIR").ok().map(PathBuf::from),
            ..Controller::default()
        };

        // Support file-based SSH key path (Docker/K8s secrets)
        let ssh_key_path = get_secret("SSH_KEY_PATH");

        Ok(Config {
            output_dir,
            controller,
            nodes,
            ssh_key_path,
        })
    }

    /// Parse node list from string: `name[:ssh_host[:remote_root]],...`
    fn parse_nodes(input: &str) -> Result<Vec<NodeConfig>> {
        input
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                let parts: Vec<&str> = s.split(':').collect();
                match parts.len() {
                    1 => Ok(NodeConfig::local(parts[0])),
                    2 => Ok(NodeConfig::remote(parts[0], parts[1], None)),
                    3 => Ok(NodeConfig::remote(parts[0], parts[1], Some(parts[2]))),
                    _ => Err(Error::ConfigError(format!("Invalid node format: {}", s))),
                }
            })
            .collect()
    }

    /// Build the cluster model this configuration describes
    pub fn build_cluster(&self) -> Cluster {
        let nodes = self.nodes.iter().map(NodeConfig::to_node).collect();
        Cluster::new(self.controller.clone(), nodes, self.ssh_key_path.clone())
    }
}

impl NodeConfig {
    fn local(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ssh_host: None,
            remote_root: None,
            description: String::new(),
            labels: String::new(),
            executors: default_executors(),
            mode: NodeMode::default(),
            launch_method: None,
            availability: None,
        }
    }

    fn remote(name: &str, ssh_host: &str, remote_root: Option<&str>) -> Self {
        Self {
            ssh_host: Some(ssh_host.to_string()),
            remote_root: remote_root.map(PathBuf::from),
            ..Self::local(name)
        }
    }

    fn to_node(&self) -> Node {
        let mut node = match &self.ssh_host {
            Some(host) => Node::remote(&self.name, host),
            None => Node::local(&self.name),
        };
        node.remote_root = self.remote_root.clone();
        node.description = self.description.clone();
        node.labels = self.labels.clone();
        node.executors = self.executors;
        node.mode = self.mode;
        node.launch_method = self.launch_method.clone();
        node.availability = self.availability.clone();
        node
    }
}

/// Get secret from environment variable or file
///
/// Supports both direct environment variables and file-based secrets
/// (Docker/Kubernetes pattern). If `VAR_NAME` is not found, tries
/// `VAR_NAME_FILE` which should point to a file containing the secret.
pub fn get_secret(var_name: &str) -> Option<String> {
    // Try environment variable first
    if let Ok(value) = std::env::var(var_name) {
        return Some(value);
    }

    // Try file-based secret (Docker secrets / Kubernetes)
    let file_var = format!("{}_FILE", var_name);
    if let Ok(path) = std::env::var(&file_var) {
        if let Ok(contents) = std::fs::read_to_string(&path) {
            return Some(contents.trim().to_string());
        }
    }

    None
}
