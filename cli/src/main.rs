//! SnapCtl — build cluster diagnostic snapshot tool
//!
//! Collects a point-in-time support bundle from the controller and its
//! build agents: node inventory, host info, agent versions, file checksums,
//! job statistics, extension state, and a container recipe.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use snapctlrs_report::{standard_bundle, ExtensionRegistry, SectionStatus};

mod config;

use config::Config;

/// SnapCtl — build cluster diagnostic snapshot tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SNAPCTL_CONFIG")]
    config: Option<String>,

    /// Output directory for the snapshot bundle
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,snapctl=debug".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI args
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;
    let output = args.output.unwrap_or_else(|| config.output_dir.clone());

    let cluster = Arc::new(config.build_cluster());
    info!(nodes = cluster.nodes().len(), "Probing cluster nodes");
    cluster.connect_all().await;
    let online = cluster.nodes().iter().filter(|n| n.is_connected()).count();
    info!(
        online,
        total = cluster.nodes().len(),
        "Cluster probe complete"
    );

    let registry = match &cluster.controller().extensions_dir {
        Some(dir) => match ExtensionRegistry::scan(dir) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Could not scan extensions directory");
                ExtensionRegistry::empty()
            }
        },
        None => ExtensionRegistry::empty(),
    };

    let bundle = standard_bundle(Arc::clone(&cluster), Arc::new(registry));
    info!(
        sections = bundle.len(),
        output = %output.display(),
        "Generating snapshot bundle"
    );
    let manifest = bundle.write_to(&output).await?;

    let failed = manifest
        .sections
        .iter()
        .filter(|s| s.status == SectionStatus::Failed)
        .count();
    if failed > 0 {
        warn!(
            written = manifest.sections.len() - failed,
            failed, "Snapshot bundle complete with failed sections"
        );
    } else {
        info!(
            written = manifest.sections.len(),
            "Snapshot bundle complete"
        );
    }

    Ok(())
}
