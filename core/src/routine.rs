//! Remote routines
//!
//! A routine is an immutable, serializable unit of work: "run this logic on
//! a node and give back a string". Routines capture only owned parameters,
//! never controller-local state, so the same value can be shipped to any
//! node. The collector owns the deadline; a routine only has to keep its own
//! work bounded (one directory level, one version probe, a fixed set of
//! host facts).

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::markdown;
use crate::remote::AgentChannel;
use crate::Result;

/// A unit of work executed on a node through its channel.
#[async_trait]
pub trait RemoteRoutine: Send + Sync {
    /// Run against the node and produce the fact string, or fail with a
    /// transport/execution error.
    async fn call(&self, channel: &dyn AgentChannel) -> Result<String>;
}

/// Quote a string for safe interpolation into a `sh -c` command line
fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

// ============================================================================
// File digests
// ============================================================================

/// Digest every regular file directly under a directory on the node.
///
/// Output is one `<hex digest>  <file name>` line per file. Unreadable files
/// are skipped; a missing directory fails the routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDigests {
    root: String,
}

impl FileDigests {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.display().to_string(),
        }
    }
}

#[async_trait]
impl RemoteRoutine for FileDigests {
    async fn call(&self, channel: &dyn AgentChannel) -> Result<String> {
        let command = format!(
            "cd {} || exit 1; find . -maxdepth 1 -type f -exec sha256sum {{}} \\; 2>/dev/null; true",
            shell_quote(&self.root)
        );
        let raw = channel.exec(&command).await?;
        Ok(parse_digest_output(&raw))
    }
}

/// Strip the `./` path prefix `find` leaves on each file name
fn parse_digest_output(raw: &str) -> String {
    let mut result = String::new();
    for line in raw.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        match line.split_once("  ") {
            Some((digest, name)) => {
                result.push_str(digest);
                result.push_str("  ");
                result.push_str(name.strip_prefix("./").unwrap_or(name));
                result.push('\n');
            }
            None => {
                result.push_str(line);
                result.push('\n');
            }
        }
    }
    result
}

// ============================================================================
// Agent version
// ============================================================================

/// Report the installed build-agent version, `"N/A"` when the agent does not
/// expose one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentVersion;

impl AgentVersion {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteRoutine for AgentVersion {
    async fn call(&self, channel: &dyn AgentChannel) -> Result<String> {
        let raw = channel
            .exec("build-agent --version 2>/dev/null; true")
            .await?;
        Ok(normalize_version(&raw))
    }
}

fn normalize_version(raw: &str) -> String {
    let first = raw.lines().next().unwrap_or("").trim();
    if first.is_empty() {
        return "N/A".to_string();
    }
    first
        .strip_prefix("build-agent ")
        .unwrap_or(first)
        .to_string()
}

// ============================================================================
// Host info
// ============================================================================

const HOST_INFO_SCRIPT: &str = r#"echo "os.name=$(uname -s 2>/dev/null)"
echo "os.version=$(uname -r 2>/dev/null)"
echo "os.arch=$(uname -m 2>/dev/null)"
echo "cpus=$(getconf _NPROCESSORS_ONLN 2>/dev/null || nproc 2>/dev/null)"
echo "mem.total.kb=$(awk '/^MemTotal:/ {print $2}' /proc/meminfo 2>/dev/null)"
echo "mem.available.kb=$(awk '/^MemAvailable:/ {print $2}' /proc/meminfo 2>/dev/null)"
echo "uptime.s=$(cut -d. -f1 /proc/uptime 2>/dev/null)"
echo "distro=$([ -r /etc/os-release ] && . /etc/os-release && echo "$PRETTY_NAME")"
true"#;

/// Collect OS, CPU, memory and uptime facts from a node, formatted as
/// markdown bullets.
///
/// The bullet prefixes are captured at construction so the same routine can
/// render at different indentation depths in different report sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    major_bullet: String,
    minor_bullet: String,
}

impl HostInfo {
    pub fn new(major_bullet: impl Into<String>, minor_bullet: impl Into<String>) -> Self {
        Self {
            major_bullet: major_bullet.into(),
            minor_bullet: minor_bullet.into(),
        }
    }
}

#[async_trait]
impl RemoteRoutine for HostInfo {
    async fn call(&self, channel: &dyn AgentChannel) -> Result<String> {
        let raw = channel.exec(HOST_INFO_SCRIPT).await?;
        Ok(format_host_info(
            &parse_key_values(&raw),
            &self.major_bullet,
            &self.minor_bullet,
        ))
    }
}

fn parse_key_values(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(_, v)| !v.is_empty())
        .collect()
}

fn format_host_info(facts: &HashMap<String, String>, maj: &str, min: &str) -> String {
    let mut out = String::new();
    let mut line = |prefix: &str, key: &str, value: &str| {
        out.push_str(prefix);
        out.push(' ');
        out.push_str(key);
        out.push_str(value);
        out.push('\n');
    };

    line(maj, "Host", "");
    if let Some(v) = facts.get("os.name") {
        line(min, "OS name:          ", &markdown::escape_underscore(v));
    }
    if let Some(v) = facts.get("os.version") {
        line(min, "OS version:       ", &markdown::escape_underscore(v));
    }
    if let Some(v) = facts.get("os.arch") {
        line(min, "Architecture:     ", &markdown::escape_underscore(v));
    }
    if let Some(v) = facts.get("cpus") {
        line(min, "Processors:       ", v);
    }
    if let Some(bytes) = facts
        .get("mem.total.kb")
        .and_then(|v| v.parse::<u64>().ok())
    {
        line(min, "Total memory:     ", &human_readable_size(bytes * 1024));
    }
    if let Some(bytes) = facts
        .get("mem.available.kb")
        .and_then(|v| v.parse::<u64>().ok())
    {
        line(min, "Available memory: ", &human_readable_size(bytes * 1024));
    }
    if let Some(secs) = facts.get("uptime.s").and_then(|v| v.parse::<u64>().ok()) {
        line(min, "Uptime:           ", &format_uptime(secs));
    }
    if let Some(v) = facts.get("distro") {
        line(min, "Distribution:     ", &markdown::escape_underscore(v));
    }
    out
}

/// Render a byte count as `12.34 MB (12939428)`, bare bytes below 1 KB
pub fn human_readable_size(size: u64) -> String {
    if size < 1024 {
        return format!("{} B", size);
    }
    let mut number = size as f64;
    let mut measure = "B";
    if number >= 1024.0 {
        number /= 1024.0;
        measure = "KB";
        if number >= 1024.0 {
            number /= 1024.0;
            measure = "MB";
            if number >= 1024.0 {
                number /= 1024.0;
                measure = "GB";
            }
        }
    }
    format!("{:.2} {} ({})", number, measure, size)
}

/// Render an uptime in seconds as its two most significant units
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("{} days {} hr", days, hours)
    } else if hours > 0 {
        format!("{} hr {} min", hours, minutes)
    } else if minutes > 0 {
        format!("{} min {} sec", minutes, seconds)
    } else {
        format!("{} sec", seconds)
    }
}
