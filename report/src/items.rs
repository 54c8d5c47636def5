//! Job and build statistics
//!
//! Walks the controller's jobs directory and summarizes item counts and
//! builds-per-job statistics without loading any build record: builds are
//! counted from directory names alone, which is cheap even for jobs with
//! tens of thousands of builds.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

use snapctlrs_core::Result;

use crate::bundle::Content;
use crate::stats::Stats;

const LEGACY_BUILD_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `items.md`: counts and build statistics per item kind
pub struct ItemsContent {
    jobs_root: Option<PathBuf>,
}

impl ItemsContent {
    pub fn new(jobs_root: Option<PathBuf>) -> Self {
        Self { jobs_root }
    }
}

#[async_trait]
impl Content for ItemsContent {
    fn name(&self) -> String {
        "items.md".to_string()
    }

    async fn generate(&self) -> Result<String> {
        let mut survey = Survey::default();
        if let Some(root) = &self.jobs_root {
            survey.walk(root);
        }

        let mut out = String::new();
        out.push_str("Item statistics\n===============\n\n");
        for (kind, count) in &survey.container_counts {
            out.push_str(&format!("  * `{}`\n", kind));
            out.push_str(&format!("    - Number of items: {}\n", count));
            if let Some(s) = survey.job_stats.get(kind) {
                out.push_str(&format!("    - Number of builds per job: {}\n", s));
            }
            if let Some(s) = survey.container_stats.get(kind) {
                out.push_str(&format!("    - Number of items per container: {}\n", s));
            }
        }
        out.push('\n');
        out.push_str("Total job statistics\n======================\n\n");
        out.push_str(&format!("  * Number of jobs: {}\n", survey.job_total.n()));
        out.push_str(&format!(
            "  * Number of builds per job: {}\n",
            survey.job_total
        ));
        Ok(out)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JobManifest {
    #[serde(default = "default_kind")]
    kind: String,
}

fn default_kind() -> String {
    "job".to_string()
}

#[derive(Default)]
struct Survey {
    container_counts: BTreeMap<String, usize>,
    job_stats: HashMap<String, Stats>,
    job_total: Stats,
    container_stats: HashMap<String, Stats>,
}

impl Survey {
    /// Visit every item under `dir`, recursing into folders
    fn walk(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "jobs directory unreadable");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let manifest = path.join("job.toml");
            if !manifest.is_file() {
                continue;
            }
            self.visit_item(&path, &manifest);
        }
    }

    fn visit_item(&mut self, path: &Path, manifest: &Path) {
        let kind = std::fs::read_to_string(manifest)
            .ok()
            .and_then(|raw| toml::from_str::<JobManifest>(&raw).ok())
            .map(|m| m.kind)
            .unwrap_or_else(default_kind);

        *self.container_counts.entry(kind.clone()).or_insert(0) += 1;

        let builds_dir = path.join("builds");
        if builds_dir.is_dir() {
            let builds = count_builds(&builds_dir);
            self.job_total.add(builds);
            self.job_stats.entry(kind.clone()).or_default().add(builds);
        }

        let children_dir = path.join("jobs");
        if children_dir.is_dir() {
            let children = std::fs::read_dir(&children_dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .filter(|e| e.path().join("job.toml").is_file())
                        .count()
                })
                .unwrap_or(0);
            self.container_stats
                .entry(kind)
                .or_default()
                .add(children as i64);
            self.walk(&children_dir);
        }
    }
}

/// Count build directories without parsing any build record.
///
/// New-format job directories (marked by a `legacyIds` file) use plain
/// numeric build ids; legacy directories use timestamp-formatted names.
fn count_builds(builds_dir: &Path) -> i64 {
    let new_format = builds_dir.join("legacyIds").is_file();
    let entries = match std::fs::read_dir(builds_dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    let mut builds = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if new_format {
            if name.parse::<u64>().is_ok() && entry.path().is_dir() {
                builds += 1;
            }
        } else if may_be_date(name)
            && NaiveDateTime::parse_from_str(name, LEGACY_BUILD_FORMAT).is_ok()
            && entry.path().is_dir()
        {
            builds += 1;
        }
    }
    builds
}

/// A pre-check to see if a string is a legacy build-timestamp formatted date.
///
/// Cheap positional filter run before the real parse; allows a false
/// positive, never a false negative.
pub fn may_be_date(s: &str) -> bool {
    // yyyy-MM-dd_HH-mm-ss
    if s.len() != 19 {
        return false;
    }
    for (i, c) in s.bytes().enumerate() {
        let ok = match c {
            b'-' => matches!(i, 4 | 7 | 13 | 16),
            b'_' => i == 10,
            b'0' | b'1' => !matches!(i, 4 | 7 | 10 | 13 | 16),
            b'2' => !matches!(i, 4 | 5 | 7 | 10 | 13 | 16),
            // year safely begins with digit 2 for the next 800-odd years
            b'3' => !matches!(i, 0 | 4 | 5 | 7 | 10 | 11 | 13 | 16),
            b'4' | b'5' => !matches!(i, 0 | 4 | 5 | 7 | 8 | 10 | 11 | 13 | 16),
            b'6'..=b'9' => !matches!(i, 0 | 4 | 5 | 7 | 8 | 10 | 11 | 13 | 14 | 16 | 17),
            _ => false,
        };
        if !ok {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_may_be_date_accepts_valid_timestamps() {
        assert!(may_be_date("2024-01-31_12-34-56"));
        assert!(may_be_date("2199-12-01_23-59-59"));
    }

    #[test]
    fn test_may_be_date_rejects_malformed() {
        assert!(!may_be_date(""));
        assert!(!may_be_date("2024-01-31"));
        assert!(!may_be_date("2024-01-31_12-34-5x"));
        assert!(!may_be_date("9024-01-31_12-34-56")); // year out of range
        assert!(!may_be_date("2024-41-31_12-34-56")); // month tens digit
        assert!(!may_be_date("2024-01-31-12-34-56")); // wrong separator
        assert!(!may_be_date("2024-01-31_72-34-56")); // hour tens digit
        assert!(!may_be_date("2024-01-31_12-74-56")); // minute tens digit
        assert!(!may_be_date("2024-01-31_12-34-76")); // second tens digit
    }

    fn make_job(root: &Path, name: &str, kind: &str, builds: &[&str], legacy_ids: bool) {
        let job = root.join(name);
        fs::create_dir_all(job.join("builds")).unwrap();
        fs::write(job.join("job.toml"), format!("kind = \"{}\"\n", kind)).unwrap();
        if legacy_ids {
            fs::write(job.join("builds/legacyIds"), "").unwrap();
        }
        for build in builds {
            fs::create_dir_all(job.join("builds").join(build)).unwrap();
        }
    }

    #[tokio::test]
    async fn test_items_content_counts_new_and_legacy_builds() {
        let dir = tempfile::tempdir().unwrap();
        make_job(dir.path(), "app", "freestyle", &["1", "2", "17", "junk"], true);
        make_job(
            dir.path(),
            "old-app",
            "freestyle",
            &["2024-01-31_12-34-56", "not-a-build"],
            false,
        );

        let text = ItemsContent::new(Some(dir.path().to_path_buf()))
            .generate()
            .await
            .unwrap();

        assert!(text.contains("  * `freestyle`\n    - Number of items: 2\n"));
        // app has 3 numeric builds, old-app has 1 legacy build
        assert!(text.contains("  * Number of jobs: 2\n"));
        assert!(text.contains("  * Number of builds per job: 2 [n=2, s=1]\n"));
    }

    #[tokio::test]
    async fn test_items_content_recurses_into_folders() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("team");
        fs::create_dir_all(folder.join("jobs")).unwrap();
        fs::write(folder.join("job.toml"), "kind = \"folder\"\n").unwrap();
        make_job(&folder.join("jobs"), "inner", "pipeline", &["1"], true);

        let text = ItemsContent::new(Some(dir.path().to_path_buf()))
            .generate()
            .await
            .unwrap();

        assert!(text.contains("  * `folder`\n    - Number of items: 1\n"));
        assert!(text.contains("    - Number of items per container: 1 [n=1]\n"));
        assert!(text.contains("  * `pipeline`\n    - Number of items: 1\n"));
        assert!(text.contains("  * Number of jobs: 1\n"));
    }

    #[tokio::test]
    async fn test_items_content_without_jobs_root() {
        let text = ItemsContent::new(None).generate().await.unwrap();
        assert!(text.contains("  * Number of jobs: 0\n"));
        assert!(text.contains("  * Number of builds per job: N/A\n"));
    }
}
