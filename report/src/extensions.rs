//! Installed extensions
//!
//! The controller's extensions live in a directory of `<name>.toml`
//! metadata files; a `<name>.failed` marker holds the load failure cause.
//! The registry is scanned once per snapshot and shared by every content
//! that needs it.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use snapctlrs_core::Result;

use crate::bundle::Content;

/// One installed extension
#[derive(Debug, Clone, Deserialize)]
pub struct Extension {
    pub short_name: String,
    pub version: String,
    #[serde(default)]
    pub long_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub update_available: bool,
}

fn default_true() -> bool {
    true
}

impl Extension {
    fn pin_state(&self) -> &'static str {
        if self.pinned {
            "pinned"
        } else {
            "not-pinned"
        }
    }
}

/// An extension that could not be loaded
#[derive(Debug, Clone)]
pub struct FailedExtension {
    pub name: String,
    pub cause: String,
}

/// All installed extensions, partitioned by state and sorted by name
pub struct ExtensionRegistry {
    active: Vec<Extension>,
    disabled: Vec<Extension>,
    failed: Vec<FailedExtension>,
}

impl ExtensionRegistry {
    pub fn empty() -> Self {
        Self {
            active: Vec::new(),
            disabled: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn new(
        active: Vec<Extension>,
        disabled: Vec<Extension>,
        failed: Vec<FailedExtension>,
    ) -> Self {
        Self {
            active,
            disabled,
            failed,
        }
    }

    /// Scan an extensions directory.
    ///
    /// Metadata that does not parse is reported as a failed extension
    /// rather than silently dropped.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut active = Vec::new();
        let mut disabled = Vec::new();
        let mut failed = Vec::new();

        let entries = std::fs::read_dir(dir)?;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => {
                    let raw = match std::fs::read_to_string(&path) {
                        Ok(raw) => raw,
                        Err(e) => {
                            warn!(file = %path.display(), error = %e, "unreadable extension metadata");
                            failed.push(FailedExtension {
                                name: stem.to_string(),
                                cause: e.to_string(),
                            });
                            continue;
                        }
                    };
                    match toml::from_str::<Extension>(&raw) {
                        Ok(ext) if ext.enabled => active.push(ext),
                        Ok(ext) => disabled.push(ext),
                        Err(e) => {
                            warn!(file = %path.display(), error = %e, "bad extension metadata");
                            failed.push(FailedExtension {
                                name: stem.to_string(),
                                cause: e.to_string(),
                            });
                        }
                    }
                }
                Some("failed") => {
                    let cause = std::fs::read_to_string(&path).unwrap_or_default();
                    failed.push(FailedExtension {
                        name: stem.to_string(),
                        cause: cause.trim().to_string(),
                    });
                }
                _ => {}
            }
        }

        active.sort_by(|a, b| a.short_name.cmp(&b.short_name));
        disabled.sort_by(|a, b| a.short_name.cmp(&b.short_name));
        failed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            active,
            disabled,
            failed,
        })
    }

    pub fn active(&self) -> &[Extension] {
        &self.active
    }

    pub fn disabled(&self) -> &[Extension] {
        &self.disabled
    }

    pub fn failed(&self) -> &[FailedExtension] {
        &self.failed
    }
}

fn extension_lines(extensions: &[Extension]) -> String {
    let mut out = String::new();
    for ext in extensions {
        out.push_str(&format!(
            "{}:{}:{}\n",
            ext.short_name,
            ext.version,
            ext.pin_state()
        ));
    }
    out
}

/// `extensions/active.txt`
pub struct ActiveExtensionsContent {
    registry: Arc<ExtensionRegistry>,
}

impl ActiveExtensionsContent {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Content for ActiveExtensionsContent {
    fn name(&self) -> String {
        "extensions/active.txt".to_string()
    }

    async fn generate(&self) -> Result<String> {
        Ok(extension_lines(self.registry.active()))
    }
}

/// `extensions/disabled.txt`
pub struct DisabledExtensionsContent {
    registry: Arc<ExtensionRegistry>,
}

impl DisabledExtensionsContent {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Content for DisabledExtensionsContent {
    fn name(&self) -> String {
        "extensions/disabled.txt".to_string()
    }

    async fn generate(&self) -> Result<String> {
        Ok(extension_lines(self.registry.disabled()))
    }
}

/// `extensions/failed.txt`
pub struct FailedExtensionsContent {
    registry: Arc<ExtensionRegistry>,
}

impl FailedExtensionsContent {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Content for FailedExtensionsContent {
    fn name(&self) -> String {
        "extensions/failed.txt".to_string()
    }

    async fn generate(&self) -> Result<String> {
        let mut out = String::new();
        for failed in self.registry.failed() {
            out.push_str(&format!("{} -> {}\n", failed.name, failed.cause));
        }
        Ok(out)
    }
}
