//! `about.md`: controller summary

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use snapctlrs_core::{markdown, Cluster, HostInfo, LocalChannel, RemoteRoutine, Result};

use crate::bundle::Content;
use crate::extensions::ExtensionRegistry;

pub struct AboutContent {
    cluster: Arc<Cluster>,
    registry: Arc<ExtensionRegistry>,
}

impl AboutContent {
    pub fn new(cluster: Arc<Cluster>, registry: Arc<ExtensionRegistry>) -> Self {
        Self { cluster, registry }
    }
}

#[async_trait]
impl Content for AboutContent {
    fn name(&self) -> String {
        "about.md".to_string()
    }

    async fn generate(&self) -> Result<String> {
        let controller = self.cluster.controller();
        let mut out = String::new();
        out.push_str("Build Controller\n================\n\n");
        out.push_str("Version details\n---------------\n\n");
        let _ = writeln!(
            out,
            "  * Version: `{}`",
            markdown::escape_backtick(env!("CARGO_PKG_VERSION"))
        );
        let _ = writeln!(
            out,
            "  * Url:     {}",
            controller.url.as_deref().unwrap_or("(not configured)")
        );
        let _ = writeln!(
            out,
            "  * Home:    {}",
            markdown::code_or_none(
                controller
                    .root
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .as_deref()
            )
        );
        match HostInfo::new("  *", "      -")
            .call(&LocalChannel::new())
            .await
        {
            Ok(info) => out.push_str(&info),
            Err(e) => warn!(error = %e, "could not collect controller host info"),
        }
        out.push('\n');

        out.push_str("Important configuration\n---------------\n\n");
        let _ = writeln!(
            out,
            "  * Jobs root:        {}",
            markdown::code_or_none(
                controller
                    .jobs_root
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .as_deref()
            )
        );
        let _ = writeln!(
            out,
            "  * Extensions dir:   {}",
            markdown::code_or_none(
                controller
                    .extensions_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .as_deref()
            )
        );
        let _ = writeln!(
            out,
            "  * Nodes configured: {}",
            self.cluster.nodes().len()
        );
        out.push('\n');

        out.push_str("Active Extensions\n-----------------\n\n");
        for ext in self.registry.active() {
            let _ = writeln!(
                out,
                "  * {}:{}{} '{}'",
                ext.short_name,
                ext.version,
                if ext.update_available {
                    " *(update available)*"
                } else {
                    ""
                },
                ext.long_name
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::Extension;
    use snapctlrs_core::{Cluster, Controller, Node};

    #[tokio::test]
    async fn test_about_content_renders_configuration_and_extensions() {
        let cluster = Arc::new(Cluster::new(
            Controller {
                url: Some("https://build.example.com/".to_string()),
                jobs_root: Some("/var/lib/controller/jobs".into()),
                ..Controller::default()
            },
            vec![Node::remote("agent-1", "host-1")],
            None,
        ));
        let registry = Arc::new(ExtensionRegistry::new(
            vec![Extension {
                short_name: "docker".to_string(),
                version: "2.0.1".to_string(),
                long_name: "Docker build steps".to_string(),
                enabled: true,
                pinned: false,
                update_available: true,
            }],
            Vec::new(),
            Vec::new(),
        ));

        let text = AboutContent::new(cluster, registry).generate().await.unwrap();

        assert!(text.starts_with("Build Controller\n================\n"));
        assert!(text.contains("  * Url:     https://build.example.com/\n"));
        assert!(text.contains("  * Home:    (none)\n"));
        assert!(text.contains("  * Jobs root:        `/var/lib/controller/jobs`\n"));
        assert!(text.contains("  * Nodes configured: 1\n"));
        assert!(text
            .contains("  * docker:2.0.1 *(update available)* 'Docker build steps'\n"));
    }
}
