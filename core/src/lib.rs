//! Core library for SnapCtlRS
//!
//! This crate defines the cluster model, the remote execution channels, and
//! the diagnostic collection layer (routines, per-node caches, bounded
//! collector) used across all SnapCtlRS components.

pub mod cache;
pub mod collect;
pub mod error;
pub mod markdown;
pub mod remote;
pub mod routine;
pub mod types;

// Re-exports
pub use cache::ResultCache;
pub use collect::{Collector, REMOTE_OPERATION_TIMEOUT};
pub use error::{Error, Result};
pub use remote::{AgentChannel, LocalChannel, SshChannel};
pub use routine::{AgentVersion, FileDigests, HostInfo, RemoteRoutine};
pub use types::{Cluster, Controller, Node, NodeMode};
