//! Diagnostic collection with a bounded wait
//!
//! `Collector::collect` is the one operation the report producers call. It
//! runs a routine against a node under a hard wall-clock deadline and
//! resolves every outcome to either a usable string or one of the three
//! typed collection errors:
//!
//! 1. disconnected node: cached value, else fallback, else `NoConnection`;
//! 2. fresh result inside the deadline: cache it and return it;
//! 3. failure or deadline: cached value, else fallback, else
//!    `CollectionFailed`/`CollectionTimeout`.
//!
//! The routine task is never aborted by the deadline. It keeps running in
//! the background and, if it eventually succeeds, refreshes the cache for
//! the next caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::cache::ResultCache;
use crate::routine::RemoteRoutine;
use crate::types::Node;
use crate::{Error, Result};

/// Hard deadline for one remote fact collection. Long enough for a loaded
/// agent to answer, short enough that one dead node cannot stall a
/// cluster-wide report.
pub const REMOTE_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded remote invoker
pub struct Collector {
    deadline: Duration,
}

impl Collector {
    /// Collector with a non-standard deadline. Report producers use
    /// [`Collector::default`]; this exists for tests.
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Collect one fact from one node.
    ///
    /// Returns the routine's fresh result when it completes in time, a stale
    /// cached value when it does not, the fallback when there is nothing
    /// cached, and a typed error when there is nothing at all.
    #[instrument(skip(self, node, cache, routine, fallback), fields(node = %node.name, label = label))]
    pub async fn collect<R>(
        &self,
        node: &Arc<Node>,
        cache: &Arc<ResultCache>,
        routine: R,
        label: &str,
        fallback: Option<&str>,
    ) -> Result<String>
    where
        R: RemoteRoutine + 'static,
    {
        let Some(channel) = node.channel() else {
            debug!("node disconnected, skipping remote call");
            return self.degraded(
                node,
                cache,
                fallback,
                Error::NoConnection {
                    node: node.name.clone(),
                    label: label.to_string(),
                },
            );
        };

        let (tx, rx) = oneshot::channel();
        {
            let node = Arc::clone(node);
            let cache = Arc::clone(cache);
            let label = label.to_string();
            tokio::spawn(async move {
                match routine.call(channel.as_ref()).await {
                    Ok(value) => {
                        // cache first: the observer may be gone already
                        cache.put(&node, value.clone());
                        debug!(node = %node.name, label = %label, "remote routine completed");
                        let _ = tx.send(Ok(value));
                    }
                    Err(e) => {
                        warn!(node = %node.name, label = %label, error = %e, "remote routine failed");
                        let _ = tx.send(Err(e));
                    }
                }
            });
        }

        match timeout(self.deadline, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => self.degraded(
                node,
                cache,
                fallback,
                Error::CollectionFailed {
                    node: node.name.clone(),
                    label: label.to_string(),
                    reason: e.to_string(),
                },
            ),
            // the routine task died without reporting; treat like a failure
            Ok(Err(_)) => self.degraded(
                node,
                cache,
                fallback,
                Error::CollectionFailed {
                    node: node.name.clone(),
                    label: label.to_string(),
                    reason: "routine task dropped".to_string(),
                },
            ),
            Err(_) => {
                debug!("deadline exceeded, abandoning wait; routine continues in background");
                self.degraded(
                    node,
                    cache,
                    fallback,
                    Error::CollectionTimeout {
                        node: node.name.clone(),
                        label: label.to_string(),
                    },
                )
            }
        }
    }

    /// Degraded precedence: stale cache wins over fallback wins over error
    fn degraded(
        &self,
        node: &Arc<Node>,
        cache: &ResultCache,
        fallback: Option<&str>,
        error: Error,
    ) -> Result<String> {
        if let Some(stale) = cache.get(node) {
            debug!(node = %node.name, "returning stale cached value");
            return Ok(stale);
        }
        if let Some(fallback) = fallback {
            return Ok(fallback.to_string());
        }
        Err(error)
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(REMOTE_OPERATION_TIMEOUT)
    }
}
