//! Per-node result cache
//!
//! One cache instance exists per fact kind, owned by whichever report
//! producer collects that fact. Entries hold the last successful result for
//! a node, keyed by the node's identity: the stored `Weak<Node>` must
//! upgrade to the same allocation the caller presents. Once the cluster
//! drops a node, its entry can never be observed again and is purged the
//! next time it is touched.

use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::types::Node;

struct CacheEntry {
    node: Weak<Node>,
    value: String,
}

/// Last-known-good result per node, for one kind of fact.
///
/// Safe for concurrent `get`/`put`; contention is per map shard, never
/// across the whole cluster.
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Last cached value for this node, if any.
    ///
    /// Non-blocking. Returns nothing for a node whose entry was written by a
    /// different allocation of the same name, or whose node has been dropped
    /// by the cluster (the entry is purged on the spot).
    pub fn get(&self, node: &Arc<Node>) -> Option<String> {
        {
            let entry = self.entries.get(node.name.as_str())?;
            match entry.node.upgrade() {
                Some(held) if Arc::ptr_eq(&held, node) => return Some(entry.value.clone()),
                Some(_) => return None,
                None => {}
            }
        }
        // dead weak reference; drop the guard before mutating the shard
        self.entries.remove(node.name.as_str());
        None
    }

    /// Store a fresh successful result, replacing any previous entry whole.
    ///
    /// Also sweeps entries whose nodes are gone, so a long-lived cache does
    /// not accumulate dead names.
    pub fn put(&self, node: &Arc<Node>, value: String) {
        self.entries.retain(|_, entry| entry.node.strong_count() > 0);
        self.entries.insert(
            node.name.clone(),
            CacheEntry {
                node: Arc::downgrade(node),
                value,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_last_put() {
        let cache = ResultCache::new();
        let node = Arc::new(Node::remote("agent-1", "host-1"));

        assert!(cache.get(&node).is_none());
        cache.put(&node, "v1".to_string());
        assert_eq!(cache.get(&node).unwrap(), "v1");

        // a fresh result supersedes the old one
        cache.put(&node, "v2".to_string());
        assert_eq!(cache.get(&node).unwrap(), "v2");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_dropped_node_entry_becomes_unobservable() {
        let cache = ResultCache::new();
        let node = Arc::new(Node::remote("agent-1", "host-1"));
        cache.put(&node, "v1".to_string());
        drop(node);

        // a re-created node with the same name must not see the old value
        let reborn = Arc::new(Node::remote("agent-1", "host-1"));
        assert!(cache.get(&reborn).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_same_name_different_allocation_is_a_miss() {
        let cache = ResultCache::new();
        let original = Arc::new(Node::remote("agent-1", "host-1"));
        cache.put(&original, "v1".to_string());

        // original still owned by the cluster; an impostor handle misses
        let impostor = Arc::new(Node::remote("agent-1", "host-1"));
        assert!(cache.get(&impostor).is_none());
        assert_eq!(cache.get(&original).unwrap(), "v1");
    }

    #[test]
    fn test_put_sweeps_dead_entries() {
        let cache = ResultCache::new();
        let doomed = Arc::new(Node::remote("doomed", "host-1"));
        let kept = Arc::new(Node::remote("kept", "host-2"));
        cache.put(&doomed, "x".to_string());
        cache.put(&kept, "y".to_string());
        assert_eq!(cache.len(), 2);

        drop(doomed);
        let other = Arc::new(Node::remote("other", "host-3"));
        cache.put(&other, "z".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&kept).unwrap(), "y");
        assert_eq!(cache.get(&other).unwrap(), "z");
    }
}
