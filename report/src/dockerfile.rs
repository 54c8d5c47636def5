//! `docker/Dockerfile`: container recipe reconstructing the controller
//! with its current extension set

use std::sync::Arc;

use async_trait::async_trait;

use snapctlrs_core::Result;

use crate::bundle::Content;
use crate::extensions::ExtensionRegistry;

const EXTENSIONS_REF: &str = "/usr/share/forge/ref/extensions";

pub struct DockerfileContent {
    registry: Arc<ExtensionRegistry>,
    controller_version: String,
}

impl DockerfileContent {
    pub fn new(registry: Arc<ExtensionRegistry>, controller_version: impl Into<String>) -> Self {
        Self {
            registry,
            controller_version: controller_version.into(),
        }
    }
}

#[async_trait]
impl Content for DockerfileContent {
    fn name(&self) -> String {
        "docker/Dockerfile".to_string()
    }

    async fn generate(&self) -> Result<String> {
        let mut out = String::new();
        out.push_str(&format!(
            "FROM forge-controller:{}\n",
            self.controller_version
        ));
        out.push_str(&format!("RUN mkdir -p {}/\n", EXTENSIONS_REF));

        let active = self.registry.active();
        if !active.is_empty() {
            out.push_str("RUN curl \\\n");
            for (i, ext) in active.iter().enumerate() {
                out.push_str(&format!(
                    "\t-L $FORGE_UC/download/extensions/{short}/{version}/{short}.tar.gz -o {dir}/{short}.tar.gz",
                    short = ext.short_name,
                    version = ext.version,
                    dir = EXTENSIONS_REF,
                ));
                if i + 1 < active.len() {
                    out.push_str(" \\\n");
                } else {
                    out.push('\n');
                }
            }
        }

        let disabled = self.registry.disabled();
        if !disabled.is_empty() {
            out.push_str("RUN touch \\\n");
            for (i, ext) in disabled.iter().enumerate() {
                out.push_str(&format!("\t{}/{}.disabled", EXTENSIONS_REF, ext.short_name));
                if i + 1 < disabled.len() {
                    out.push_str(" \\\n");
                } else {
                    out.push('\n');
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::Extension;

    fn ext(short: &str, version: &str, enabled: bool) -> Extension {
        Extension {
            short_name: short.to_string(),
            version: version.to_string(),
            long_name: String::new(),
            enabled,
            pinned: false,
            update_available: false,
        }
    }

    #[tokio::test]
    async fn test_dockerfile_renders_active_and_disabled() {
        let registry = Arc::new(ExtensionRegistry::new(
            vec![ext("docker", "2.0.1", true), ext("git", "1.3.0", true)],
            vec![ext("old-ui", "0.9.0", false)],
            Vec::new(),
        ));
        let text = DockerfileContent::new(registry, "4.2.0")
            .generate()
            .await
            .unwrap();

        assert_eq!(
            text,
            "FROM forge-controller:4.2.0\n\
             RUN mkdir -p /usr/share/forge/ref/extensions/\n\
             RUN curl \\\n\
             \t-L $FORGE_UC/download/extensions/docker/2.0.1/docker.tar.gz -o /usr/share/forge/ref/extensions/docker.tar.gz \\\n\
             \t-L $FORGE_UC/download/extensions/git/1.3.0/git.tar.gz -o /usr/share/forge/ref/extensions/git.tar.gz\n\
             RUN touch \\\n\
             \t/usr/share/forge/ref/extensions/old-ui.disabled\n"
        );
    }

    #[tokio::test]
    async fn test_dockerfile_without_extensions() {
        let registry = Arc::new(ExtensionRegistry::empty());
        let text = DockerfileContent::new(registry, "4.2.0")
            .generate()
            .await
            .unwrap();
        assert_eq!(
            text,
            "FROM forge-controller:4.2.0\nRUN mkdir -p /usr/share/forge/ref/extensions/\n"
        );
    }
}
