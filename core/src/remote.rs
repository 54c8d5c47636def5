//! Remote execution channels
//!
//! A channel is the connectivity handle of a node: the one way to run a
//! command on it. Remote nodes go through SSH, the controller's own host
//! through a local shell.

use async_trait::async_trait;

use crate::{Error, Result};
use tracing::debug;

/// Connectivity handle to a node.
///
/// Implementations must be cheap to share (`Arc<dyn AgentChannel>`) and safe
/// to call concurrently; every call is a single-shot command execution.
#[async_trait]
pub trait AgentChannel: Send + Sync {
    /// Execute a shell command on the node and return its stdout.
    async fn exec(&self, command: &str) -> Result<String>;
}

/// Channel to an agent running on the controller's own host
pub struct LocalChannel;

impl LocalChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentChannel for LocalChannel {
    async fn exec(&self, command: &str) -> Result<String> {
        debug!(command = %command, "Executing locally");

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| Error::RemoteExecutionError(format!("Failed to execute: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::RemoteExecutionError(format!(
                "Command failed: {}",
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Channel to a remote agent, backed by the system `ssh` client
pub struct SshChannel {
    ssh_host: String,
    ssh_key_path: Option<String>,
}

impl SshChannel {
    pub fn new(ssh_host: impl Into<String>, ssh_key_path: Option<String>) -> Self {
        Self {
            ssh_host: ssh_host.into(),
            ssh_key_path,
        }
    }
}

#[async_trait]
impl AgentChannel for SshChannel {
    async fn exec(&self, command: &str) -> Result<String> {
        debug!(
            ssh_host = %self.ssh_host,
            command = %command,
            "Executing remotely via SSH"
        );

        let mut ssh_cmd = tokio::process::Command::new("ssh");
        ssh_cmd
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("ConnectTimeout=10");

        if let Some(key_path) = &self.ssh_key_path {
            ssh_cmd.arg("-i").arg(key_path);
        }

        ssh_cmd.arg(&self.ssh_host).arg(command);

        let output = ssh_cmd
            .output()
            .await
            .map_err(|e| Error::RemoteExecutionError(format!("SSH failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::RemoteExecutionError(format!(
                "Remote command failed: {}",
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
