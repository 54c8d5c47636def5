//! Cluster node inventory
//!
//! One section per node, controller first. Agent version and host info are
//! fetched through the collector with one cache per fact kind; node
//! sections are produced concurrently so one unresponsive agent costs a
//! single deadline, not one per fact per node.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use snapctlrs_core::{
    markdown, AgentVersion, Cluster, Collector, Error, HostInfo, LocalChannel, Node,
    RemoteRoutine, Result, ResultCache,
};

use crate::bundle::Content;

const NODE_MAJOR_BULLET: &str = "      -";
const NODE_MINOR_BULLET: &str = "          +";

/// `nodes.md`: statistics and per-node details
pub struct NodesContent {
    cluster: Arc<Cluster>,
    collector: Arc<Collector>,
    version_cache: Arc<ResultCache>,
    host_info_cache: Arc<ResultCache>,
}

impl NodesContent {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        Self::with_collector(cluster, Collector::default())
    }

    /// Collector injection point for tests with short deadlines
    pub fn with_collector(cluster: Arc<Cluster>, collector: Collector) -> Self {
        Self {
            cluster,
            collector: Arc::new(collector),
            version_cache: Arc::new(ResultCache::new()),
            host_info_cache: Arc::new(ResultCache::new()),
        }
    }

    fn statistics(&self) -> String {
        let nodes = self.cluster.nodes();
        let online = nodes.iter().filter(|n| n.is_connected()).count();
        let executors: u32 = nodes.iter().map(|n| n.executors).sum();
        let executors_online: u32 = nodes
            .iter()
            .filter(|n| n.is_connected())
            .map(|n| n.executors)
            .sum();

        let mut out = String::new();
        out.push_str("Node statistics\n===============\n\n");
        let _ = writeln!(out, "  * Total number of nodes: {}", nodes.len());
        let _ = writeln!(out, "  * Total number of nodes online: {}", online);
        let _ = writeln!(out, "  * Total number of executors: {}", executors);
        let _ = writeln!(
            out,
            "  * Total number of executors online: {}",
            executors_online
        );
        out.push('\n');
        out
    }

    async fn controller_section(&self) -> String {
        let controller = self.cluster.controller();
        let mut out = String::new();
        out.push_str("  * controller\n");
        let _ = writeln!(
            out,
            "      - Description:    _{}_",
            markdown::escape_underscore(&controller.description)
        );
        let _ = writeln!(out, "      - Executors:      {}", controller.executors);
        if let Some(root) = &controller.root {
            let _ = writeln!(
                out,
                "      - FS root:        `{}`",
                markdown::escape_backtick(&root.display().to_string())
            );
        }
        let _ = writeln!(
            out,
            "      - Labels:         {}",
            markdown::pretty_none(&markdown::escape_underscore(&controller.labels))
        );
        let _ = writeln!(out, "      - Usage:          `{}`", controller.mode);
        let _ = writeln!(
            out,
            "      - Agent Version:  {}",
            env!("CARGO_PKG_VERSION")
        );
        // no remote link involved; call the routine directly
        match HostInfo::new(NODE_MAJOR_BULLET, NODE_MINOR_BULLET)
            .call(&LocalChannel::new())
            .await
        {
            Ok(info) => out.push_str(&info),
            Err(e) => warn!(error = %e, "could not collect controller host info"),
        }
        out.push('\n');
        out
    }

    async fn node_section(
        node: Arc<Node>,
        collector: Arc<Collector>,
        version_cache: Arc<ResultCache>,
        host_info_cache: Arc<ResultCache>,
    ) -> String {
        let kind = if node.is_local() {
            "local agent"
        } else {
            "remote agent"
        };
        let mut out = String::new();
        let _ = writeln!(
            out,
            "  * `{}` ({})",
            markdown::escape_backtick(&node.name),
            kind
        );
        let _ = writeln!(
            out,
            "      - Description:    _{}_",
            markdown::escape_underscore(&node.description)
        );
        let _ = writeln!(out, "      - Executors:      {}", node.executors);
        if let Some(root) = &node.remote_root {
            let _ = writeln!(
                out,
                "      - Remote FS root: `{}`",
                markdown::escape_backtick(&root.display().to_string())
            );
        }
        let _ = writeln!(
            out,
            "      - Labels:         {}",
            markdown::pretty_none(&markdown::escape_underscore(&node.labels))
        );
        let _ = writeln!(out, "      - Usage:          `{}`", node.mode);
        let _ = writeln!(
            out,
            "      - Launch method:  {}",
            markdown::code_or_none(node.launch_method.as_deref())
        );
        let _ = writeln!(
            out,
            "      - Availability:   {}",
            markdown::code_or_none(node.availability.as_deref())
        );

        if !node.is_connected() {
            out.push_str("      - Status:         off-line\n\n");
            return out;
        }
        out.push_str("      - Status:         on-line\n");

        match collector
            .collect(
                &node,
                &version_cache,
                AgentVersion::new(),
                "agent version",
                Some("(timeout with no cache available)"),
            )
            .await
        {
            Ok(version) => {
                let _ = writeln!(out, "      - Version:        {}", version);
            }
            Err(e) => warn!(node = %node.name, error = %e, "could not get agent version"),
        }

        match collector
            .collect(
                &node,
                &host_info_cache,
                HostInfo::new(NODE_MAJOR_BULLET, NODE_MINOR_BULLET),
                "host info",
                None,
            )
            .await
        {
            Ok(info) => out.push_str(&info),
            Err(e @ Error::CollectionFailed { .. }) => {
                warn!(node = %node.name, error = %e, "could not get host info")
            }
            Err(e) => {
                debug!(node = %node.name, error = %e, "no host info and no cached value available")
            }
        }
        out.push('\n');
        out
    }
}

#[async_trait]
impl Content for NodesContent {
    fn name(&self) -> String {
        "nodes.md".to_string()
    }

    async fn generate(&self) -> Result<String> {
        let mut out = self.statistics();
        out.push_str("Build Nodes\n===========\n\n");
        out.push_str(&self.controller_section().await);

        let mut handles = Vec::new();
        for node in self.cluster.nodes() {
            handles.push(tokio::spawn(Self::node_section(
                Arc::clone(node),
                Arc::clone(&self.collector),
                Arc::clone(&self.version_cache),
                Arc::clone(&self.host_info_cache),
            )));
        }
        for handle in handles {
            out.push_str(&handle.await.map_err(|e| {
                Error::ReportError(format!("node section task failed: {}", e))
            })?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapctlrs_core::{AgentChannel, Controller};
    use std::time::Duration;

    /// Channel that recognizes the two routines by their commands
    struct ScriptedChannel;

    #[async_trait]
    impl AgentChannel for ScriptedChannel {
        async fn exec(&self, command: &str) -> Result<String> {
            if command.contains("build-agent") {
                Ok("build-agent 3.1.4\n".to_string())
            } else {
                Ok("os.name=Linux\ncpus=4\n".to_string())
            }
        }
    }

    fn test_cluster() -> Arc<Cluster> {
        let mut online = Node::remote("agent-1", "build@agent-1");
        online.description = "fast builder".to_string();
        online.labels = "linux x86_64".to_string();
        online.executors = 4;
        online.launch_method = Some("ssh".to_string());
        let offline = Node::remote("agent-2", "build@agent-2");

        let cluster = Cluster::new(
            Controller {
                description: "primary controller".to_string(),
                executors: 2,
                ..Controller::default()
            },
            vec![online, offline],
            None,
        );
        cluster
            .find("agent-1")
            .unwrap()
            .attach_channel(Arc::new(ScriptedChannel));
        Arc::new(cluster)
    }

    #[tokio::test]
    async fn test_nodes_content_statistics_and_sections() {
        let content = NodesContent::with_collector(
            test_cluster(),
            Collector::new(Duration::from_secs(5)),
        );
        let text = content.generate().await.unwrap();

        assert!(text.contains("  * Total number of nodes: 2\n"));
        assert!(text.contains("  * Total number of nodes online: 1\n"));
        assert!(text.contains("  * Total number of executors: 5\n"));
        assert!(text.contains("  * Total number of executors online: 4\n"));
        assert!(text.contains("  * controller\n"));
        assert!(text.contains("      - Description:    _primary controller_\n"));

        // the online agent reports facts collected over its channel
        assert!(text.contains("  * `agent-1` (remote agent)\n"));
        assert!(text.contains("      - Labels:         linux x86&#95;64\n"));
        assert!(text.contains("      - Launch method:  `ssh`\n"));
        assert!(text.contains("      - Status:         on-line\n"));
        assert!(text.contains("      - Version:        3.1.4\n"));
        assert!(text.contains("          + OS name:          Linux\n"));

        // the offline agent degrades to a status line
        let agent2 = text.split("  * `agent-2`").nth(1).unwrap();
        assert!(agent2.contains("      - Status:         off-line\n"));
        assert!(!agent2.contains("Version:"));
    }

    #[tokio::test]
    async fn test_nodes_content_agent_order_follows_roster() {
        let content = NodesContent::new(test_cluster());
        let text = content.generate().await.unwrap();
        let first = text.find("`agent-1`").unwrap();
        let second = text.find("`agent-2`").unwrap();
        assert!(first < second);
    }
}
