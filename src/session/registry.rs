//! Fixed-capacity registry of active nodes.
//!
//! Process-wide table mapping node numbers `1..=max_nodes` to live
//! [`Session`] records. The transport acceptor registers a session before
//! handing it to the menu executor and unregisters it when the node task
//! returns; everything in between (who listings, paging, chat joins) looks
//! sessions up here.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use super::Session;

/// Registry of all active sessions, keyed by node number.
#[derive(Debug)]
pub struct NodeRegistry {
    max_nodes: u16,
    nodes: Mutex<HashMap<u16, Arc<Session>>>,
}

impl NodeRegistry {
    /// Creates a registry with capacity `max_nodes`.
    #[must_use]
    pub fn new(max_nodes: u16) -> Self {
        Self {
            max_nodes,
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Configured node capacity.
    #[must_use]
    pub fn max_nodes(&self) -> u16 {
        self.max_nodes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u16, Arc<Session>>> {
        self.nodes.lock().expect("node registry lock poisoned")
    }

    /// Registers `session` under `node`.
    ///
    /// Fails if the node number is out of `[1, max_nodes]` or already taken.
    pub fn register(&self, node: u16, session: Arc<Session>) -> Result<()> {
        if node == 0 || node > self.max_nodes {
            bail!("node {node} outside 1..={}", self.max_nodes);
        }
        let mut nodes = self.lock();
        if nodes.contains_key(&node) {
            bail!("node {node} is already registered");
        }
        nodes.insert(node, session);
        Ok(())
    }

    /// Removes a node's session, returning it if it was present.
    pub fn unregister(&self, node: u16) -> Option<Arc<Session>> {
        self.lock().remove(&node)
    }

    /// Looks up a live session.
    #[must_use]
    pub fn get(&self, node: u16) -> Option<Arc<Session>> {
        self.lock().get(&node).map(Arc::clone)
    }

    /// All active sessions, ordered by node number.
    #[must_use]
    pub fn list_active(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<Arc<Session>> = self.lock().values().map(Arc::clone).collect();
        sessions.sort_by_key(|s| s.node);
        sessions
    }

    /// Number of active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Lowest free node number, if any capacity remains.
    #[must_use]
    pub fn first_free_node(&self) -> Option<u16> {
        let nodes = self.lock();
        (1..=self.max_nodes).find(|n| !nodes.contains_key(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_out_of_range_and_duplicates() {
        let registry = NodeRegistry::new(2);
        let session = Arc::new(Session::new(1, false, 80, 25));
        registry.register(1, Arc::clone(&session)).expect("register");

        assert!(registry.register(0, Arc::clone(&session)).is_err());
        assert!(registry.register(3, Arc::clone(&session)).is_err());
        assert!(registry
            .register(1, Arc::new(Session::new(1, false, 80, 25)))
            .is_err());
    }

    #[test]
    fn test_listing_is_ordered_and_counts() {
        let registry = NodeRegistry::new(8);
        for node in [5u16, 2, 7] {
            registry
                .register(node, Arc::new(Session::new(node, false, 80, 25)))
                .expect("register");
        }
        assert_eq!(registry.active_count(), 3);
        let order: Vec<u16> = registry.list_active().iter().map(|s| s.node).collect();
        assert_eq!(order, vec![2, 5, 7]);

        registry.unregister(5);
        assert_eq!(registry.active_count(), 2);
        assert!(registry.get(5).is_none());
    }

    #[test]
    fn test_first_free_node_fills_gaps() {
        let registry = NodeRegistry::new(3);
        assert_eq!(registry.first_free_node(), Some(1));
        registry
            .register(1, Arc::new(Session::new(1, false, 80, 25)))
            .expect("register");
        registry
            .register(3, Arc::new(Session::new(3, false, 80, 25)))
            .expect("register");
        assert_eq!(registry.first_free_node(), Some(2));
        registry
            .register(2, Arc::new(Session::new(2, false, 80, 25)))
            .expect("register");
        assert_eq!(registry.first_free_node(), None);
    }
}
