//! Bundle assembly and writing
//!
//! A bundle is a set of named contents written under one output directory.
//! Contents generate concurrently — a section stuck waiting on an
//! unresponsive node must not delay the others — and are written in
//! registration order once all are done.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use snapctlrs_core::{Error, Result};

/// One named section of the snapshot bundle
#[async_trait]
pub trait Content: Send + Sync + 'static {
    /// Relative path of this section within the bundle
    fn name(&self) -> String;

    /// Produce the section's full text
    async fn generate(&self) -> Result<String>;
}

/// Record of one section in the bundle manifest
#[derive(Debug, Clone, Serialize)]
pub struct SectionRecord {
    pub path: String,
    pub status: SectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    Ok,
    Failed,
}

/// Manifest written alongside the bundle as `manifest.json`
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub tool_version: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<SectionRecord>,
}

/// An ordered collection of contents
pub struct Bundle {
    contents: Vec<Arc<dyn Content>>,
}

impl Bundle {
    pub fn new() -> Self {
        Self {
            contents: Vec::new(),
        }
    }

    pub fn add(&mut self, content: impl Content) {
        self.contents.push(Arc::new(content));
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Generate every content and write the bundle under `out_dir`.
    ///
    /// A failing section is recorded in the manifest and logged; it never
    /// aborts the rest of the bundle.
    pub async fn write_to(&self, out_dir: &Path) -> Result<Manifest> {
        tokio::fs::create_dir_all(out_dir).await?;

        let mut handles = Vec::with_capacity(self.contents.len());
        for content in &self.contents {
            let content = Arc::clone(content);
            handles.push(tokio::spawn(async move {
                (content.name(), content.generate().await)
            }));
        }

        let mut sections = Vec::with_capacity(handles.len());
        for handle in handles {
            let (name, outcome) = handle.await.map_err(|e| {
                Error::ReportError(format!("content task failed: {}", e))
            })?;
            match outcome {
                Ok(text) => {
                    let path = out_dir.join(&name);
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&path, &text).await?;
                    info!(section = %name, bytes = text.len(), "section written");
                    sections.push(SectionRecord {
                        path: name,
                        status: SectionStatus::Ok,
                        bytes: Some(text.len() as u64),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(section = %name, error = %e, "section failed, continuing");
                    sections.push(SectionRecord {
                        path: name,
                        status: SectionStatus::Failed,
                        bytes: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let manifest = Manifest {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            sections,
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(out_dir.join("manifest.json"), json).await?;

        Ok(manifest)
    }
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}
