//! File checksum contents
//!
//! The controller digests its own files in-process; each agent gets one
//! content backed by the collector, sharing a single checksum cache so a
//! slow agent serves last-known-good digests instead of stalling the
//! bundle.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

use snapctlrs_core::{Collector, FileDigests, Node, Result, ResultCache};

use crate::bundle::Content;

/// Hex SHA-256 of one file, streamed in chunks
pub fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest the regular files directly under `dir`, one `digest  prefix/name`
/// line per file, sorted by name. Unreadable files are skipped.
fn digest_dir(dir: &Path, prefix: &str, out: &mut String) {
    let mut names: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not list directory for checksums");
            return;
        }
    };
    names.sort();
    for path in names {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match digest_file(&path) {
            Ok(digest) => {
                out.push_str(&digest);
                out.push_str("  ");
                out.push_str(prefix);
                out.push_str(name);
                out.push('\n');
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "could not compute checksum");
            }
        }
    }
}

/// `nodes/controller/checksums.sha256`: digests of the controller's own
/// home and extensions directories
pub struct ControllerChecksumsContent {
    root: Option<PathBuf>,
    extensions_dir: Option<PathBuf>,
}

impl ControllerChecksumsContent {
    pub fn new(root: Option<PathBuf>, extensions_dir: Option<PathBuf>) -> Self {
        Self {
            root,
            extensions_dir,
        }
    }
}

#[async_trait]
impl Content for ControllerChecksumsContent {
    fn name(&self) -> String {
        "nodes/controller/checksums.sha256".to_string()
    }

    async fn generate(&self) -> Result<String> {
        let mut out = String::new();
        if let Some(root) = &self.root {
            digest_dir(root, "", &mut out);
        }
        if let Some(extensions) = &self.extensions_dir {
            digest_dir(extensions, "extensions/", &mut out);
        }
        Ok(out)
    }
}

/// `nodes/agents/<name>/checksums.sha256`: digests of one agent's remote FS
/// root, collected through the shared checksum cache
pub struct NodeChecksumsContent {
    node: Arc<Node>,
    collector: Arc<Collector>,
    cache: Arc<ResultCache>,
}

impl NodeChecksumsContent {
    pub fn new(node: Arc<Node>, collector: Arc<Collector>, cache: Arc<ResultCache>) -> Self {
        Self {
            node,
            collector,
            cache,
        }
    }
}

#[async_trait]
impl Content for NodeChecksumsContent {
    fn name(&self) -> String {
        format!("nodes/agents/{}/checksums.sha256", self.node.name)
    }

    async fn generate(&self) -> Result<String> {
        let Some(root) = &self.node.remote_root else {
            return Ok("N/A\n".to_string());
        };
        let mut digests = self
            .collector
            .collect(
                &self.node,
                &self.cache,
                FileDigests::new(root),
                "checksums",
                Some("N/A"),
            )
            .await?;
        if !digests.ends_with('\n') {
            digests.push('\n');
        }
        Ok(digests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snapctlrs_core::AgentChannel;
    use std::fs;
    use std::time::Duration;

    #[tokio::test]
    async fn test_controller_checksums_digest_root_and_extensions() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("controller.conf"), b"hello").unwrap();
        let ext = tempfile::tempdir().unwrap();
        fs::write(ext.path().join("docker.toml"), b"world").unwrap();
        fs::create_dir(root.path().join("subdir")).unwrap();

        let text = ControllerChecksumsContent::new(
            Some(root.path().to_path_buf()),
            Some(ext.path().to_path_buf()),
        )
        .generate()
        .await
        .unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        // sha256("hello")
        assert_eq!(
            lines[0],
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824  controller.conf"
        );
        // sha256("world")
        assert_eq!(
            lines[1],
            "486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7  extensions/docker.toml"
        );
    }

    #[tokio::test]
    async fn test_controller_checksums_empty_when_unconfigured() {
        let text = ControllerChecksumsContent::new(None, None)
            .generate()
            .await
            .unwrap();
        assert!(text.is_empty());
    }

    struct CannedChannel;

    #[async_trait]
    impl AgentChannel for CannedChannel {
        async fn exec(&self, _command: &str) -> Result<String> {
            Ok("abc123  ./agent.jar".to_string())
        }
    }

    #[tokio::test]
    async fn test_node_checksums_without_root_is_na() {
        let node = Arc::new(Node::remote("agent-1", "host-1"));
        let content = NodeChecksumsContent::new(
            node,
            Arc::new(Collector::new(Duration::from_secs(5))),
            Arc::new(ResultCache::new()),
        );
        assert_eq!(content.name(), "nodes/agents/agent-1/checksums.sha256");
        assert_eq!(content.generate().await.unwrap(), "N/A\n");
    }

    #[tokio::test]
    async fn test_node_checksums_collects_over_channel() {
        let node = Arc::new(Node::remote("agent-1", "host-1").with_remote_root("/var/lib/agent"));
        node.attach_channel(Arc::new(CannedChannel));
        let cache = Arc::new(ResultCache::new());
        let content = NodeChecksumsContent::new(
            Arc::clone(&node),
            Arc::new(Collector::new(Duration::from_secs(5))),
            Arc::clone(&cache),
        );

        assert_eq!(content.generate().await.unwrap(), "abc123  agent.jar\n");
        assert_eq!(cache.get(&node).unwrap(), "abc123  agent.jar\n");
    }

    #[tokio::test]
    async fn test_node_checksums_disconnected_without_cache_falls_back() {
        let node = Arc::new(Node::remote("agent-1", "host-1").with_remote_root("/var/lib/agent"));
        let content = NodeChecksumsContent::new(
            node,
            Arc::new(Collector::new(Duration::from_secs(5))),
            Arc::new(ResultCache::new()),
        );
        assert_eq!(content.generate().await.unwrap(), "N/A\n");
    }
}
