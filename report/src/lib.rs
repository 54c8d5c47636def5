//! Report generation for SnapCtlRS
//!
//! Everything here is formatting: the contents pull facts through the
//! collection layer in `snapctlrs-core` and render the bundle sections.

pub mod about;
pub mod bundle;
pub mod checksums;
pub mod dockerfile;
pub mod extensions;
pub mod items;
pub mod nodes;
pub mod stats;

use std::sync::Arc;

use snapctlrs_core::{Cluster, Collector, ResultCache};

pub use about::AboutContent;
pub use bundle::{Bundle, Content, Manifest, SectionRecord, SectionStatus};
pub use checksums::{ControllerChecksumsContent, NodeChecksumsContent};
pub use dockerfile::DockerfileContent;
pub use extensions::{
    ActiveExtensionsContent, DisabledExtensionsContent, Extension, ExtensionRegistry,
    FailedExtension, FailedExtensionsContent,
};
pub use items::ItemsContent;
pub use nodes::NodesContent;
pub use stats::Stats;

/// Assemble the standard snapshot bundle for a cluster.
///
/// All per-agent checksum contents share one collector and one checksum
/// cache; nodes.md owns its own per-fact caches.
pub fn standard_bundle(cluster: Arc<Cluster>, registry: Arc<ExtensionRegistry>) -> Bundle {
    let controller = cluster.controller().clone();
    let mut bundle = Bundle::new();

    bundle.add(AboutContent::new(
        Arc::clone(&cluster),
        Arc::clone(&registry),
    ));
    bundle.add(ItemsContent::new(controller.jobs_root.clone()));
    bundle.add(NodesContent::new(Arc::clone(&cluster)));
    bundle.add(ActiveExtensionsContent::new(Arc::clone(&registry)));
    bundle.add(DisabledExtensionsContent::new(Arc::clone(&registry)));
    bundle.add(FailedExtensionsContent::new(Arc::clone(&registry)));
    bundle.add(DockerfileContent::new(
        Arc::clone(&registry),
        env!("CARGO_PKG_VERSION"),
    ));
    bundle.add(ControllerChecksumsContent::new(
        controller.root.clone(),
        controller.extensions_dir.clone(),
    ));

    let collector = Arc::new(Collector::default());
    let checksum_cache = Arc::new(ResultCache::new());
    for node in cluster.nodes() {
        bundle.add(NodeChecksumsContent::new(
            Arc::clone(node),
            Arc::clone(&collector),
            Arc::clone(&checksum_cache),
        ));
    }

    bundle
}
