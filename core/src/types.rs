//! Shared cluster model types

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::remote::{AgentChannel, LocalChannel, SshChannel};

/// How a node is used for builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Use this node as much as possible
    Normal,
    /// Only build jobs tied to this node
    Exclusive,
}

impl Default for NodeMode {
    fn default() -> Self {
        Self::Normal
    }
}

impl std::fmt::Display for NodeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeMode::Normal => write!(f, "NORMAL"),
            NodeMode::Exclusive => write!(f, "EXCLUSIVE"),
        }
    }
}

/// One worker node in the build cluster.
///
/// Nodes are created and destroyed by the [`Cluster`]; everything else holds
/// them as `Arc<Node>` and must tolerate the cluster dropping its copy.
/// The channel is present only while the node is connected.
pub struct Node {
    /// Stable node name, unique within the cluster
    pub name: String,
    /// SSH connection string (user@host) or None for an agent on this host
    pub ssh_host: Option<String>,
    /// Root of the agent's working filesystem, if configured
    pub remote_root: Option<PathBuf>,
    /// Free-form description
    pub description: String,
    /// Space-separated label string
    pub labels: String,
    /// Number of build executors
    pub executors: u32,
    /// Usage mode
    pub mode: NodeMode,
    /// How the agent gets launched (e.g. "ssh", "inbound")
    pub launch_method: Option<String>,
    /// Retention policy name (e.g. "always", "on-demand")
    pub availability: Option<String>,
    channel: RwLock<Option<Arc<dyn AgentChannel>>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("ssh_host", &self.ssh_host)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Node {
    /// Create an agent reached over SSH
    pub fn remote(name: impl Into<String>, ssh_host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ssh_host: Some(ssh_host.into()),
            remote_root: None,
            description: String::new(),
            labels: String::new(),
            executors: 1,
            mode: NodeMode::Normal,
            launch_method: None,
            availability: None,
            channel: RwLock::new(None),
        }
    }

    /// Create an agent running on the controller's own host
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ssh_host: None,
            remote_root: None,
            description: String::new(),
            labels: String::new(),
            executors: 1,
            mode: NodeMode::Normal,
            launch_method: None,
            availability: None,
            channel: RwLock::new(None),
        }
    }

    pub fn with_remote_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.remote_root = Some(root.into());
        self
    }

    pub fn is_local(&self) -> bool {
        self.ssh_host.is_none()
    }

    /// Get display string for the node
    pub fn display(&self) -> String {
        match &self.ssh_host {
            Some(host) => format!("{} ({})", self.name, host),
            None => format!("{} (local)", self.name),
        }
    }

    /// The live channel, if the node is currently connected
    pub fn channel(&self) -> Option<Arc<dyn AgentChannel>> {
        self.channel.read().expect("channel lock poisoned").clone()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.read().expect("channel lock poisoned").is_some()
    }

    /// Install a live channel. Replaces any previous one.
    pub fn attach_channel(&self, channel: Arc<dyn AgentChannel>) {
        *self.channel.write().expect("channel lock poisoned") = Some(channel);
    }

    /// Drop the channel, marking the node disconnected
    pub fn detach_channel(&self) {
        *self.channel.write().expect("channel lock poisoned") = None;
    }
}

/// The controller process itself, described for reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Controller {
    /// Public URL, if configured
    pub url: Option<String>,
    /// Controller home directory
    pub root: Option<PathBuf>,
    /// Directory holding job definitions and build records
    pub jobs_root: Option<PathBuf>,
    /// Directory holding installed extensions
    pub extensions_dir: Option<PathBuf>,
    /// Free-form description
    pub description: String,
    /// Space-separated label string
    pub labels: String,
    /// Number of build executors on the controller
    pub executors: u32,
    /// Usage mode
    pub mode: NodeMode,
}

/// The cluster-management collaborator: owns node lifetime.
///
/// Dropping a node from the roster is what makes its cache entries
/// unobservable, so the roster must be the only long-lived owner of the
/// `Arc<Node>` handles.
pub struct Cluster {
    controller: Controller,
    nodes: Vec<Arc<Node>>,
    ssh_key_path: Option<String>,
}

impl Cluster {
    pub fn new(controller: Controller, nodes: Vec<Node>, ssh_key_path: Option<String>) -> Self {
        Self {
            controller,
            nodes: nodes.into_iter().map(Arc::new).collect(),
            ssh_key_path,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Remove a node from the roster, dropping the cluster's ownership of it
    pub fn remove(&mut self, name: &str) -> Option<Arc<Node>> {
        let idx = self.nodes.iter().position(|n| n.name == name)?;
        Some(self.nodes.remove(idx))
    }

    /// Probe every node and attach channels to the reachable ones.
    ///
    /// Unreachable nodes are left disconnected; collection against them
    /// degrades to cached values per the collector policy. Probes run
    /// concurrently so one dead host does not delay the rest.
    pub async fn connect_all(&self) {
        let mut handles = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let node = Arc::clone(node);
            let key_path = self.ssh_key_path.clone();
            handles.push(tokio::spawn(async move {
                let channel: Arc<dyn AgentChannel> = match &node.ssh_host {
                    Some(host) => Arc::new(SshChannel::new(host.clone(), key_path)),
                    None => Arc::new(LocalChannel::new()),
                };
                match channel.exec("true").await {
                    Ok(_) => {
                        debug!(node = %node.name, "node reachable, channel attached");
                        node.attach_channel(channel);
                    }
                    Err(e) => {
                        warn!(node = %node.name, error = %e, "node unreachable, leaving disconnected");
                        node.detach_channel();
                    }
                }
            }));
        }
        for handle in handles {
            // a panicked probe just leaves its node disconnected
            let _ = handle.await;
        }
    }
}
