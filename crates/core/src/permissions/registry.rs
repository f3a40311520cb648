//! Host permission nodes
//!
//! The host server grants players dotted permission nodes such as
//! `mychunks.server-admin`. The registry keeps those nodes per player and
//! answers whether a player counts as a server admin for claim checks.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::identity::PlayerId;

/// Node that makes a player an implicit owner of admin-owned land
pub const ADMIN_NODE: &str = "mychunks.server-admin";

/// Answers whether an actor counts as a server admin
pub trait AdminPredicate: Send + Sync {
    fn is_admin(&self, player: PlayerId) -> bool;
}

/// Predicate that never grants admin status
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdmins;

impl AdminPredicate for NoAdmins {
    fn is_admin(&self, _player: PlayerId) -> bool {
        false
    }
}

/// Permission nodes held by a single player
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<String>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, nodes: &[&str]) {
        for node in nodes {
            self.nodes.insert((*node).to_string());
        }
    }

    pub fn remove(&mut self, nodes: &[&str]) {
        for node in nodes {
            self.nodes.remove(*node);
        }
    }

    /// Check if a node is held directly or through a wildcard.
    ///
    /// `mychunks.*` covers every node under `mychunks.`, and `*` covers
    /// everything.
    pub fn has(&self, node: &str) -> bool {
        if self.nodes.contains(node) || self.nodes.contains("*") {
            return true;
        }

        node.match_indices('.')
            .any(|(i, _)| self.nodes.contains(&format!("{}.*", &node[..i])))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Concurrent registry of host permission nodes keyed by player
#[derive(Debug, Default)]
pub struct NodeRegistry {
    players: DashMap<PlayerId, NodeSet>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant nodes to a player, creating the entry if needed
    pub fn add_nodes(&self, player: PlayerId, nodes: &[&str]) {
        self.players.entry(player).or_default().add(nodes);
    }

    /// Revoke nodes from a player. Empty entries are dropped.
    pub fn remove_nodes(&self, player: PlayerId, nodes: &[&str]) {
        if let Some(mut set) = self.players.get_mut(&player) {
            set.remove(nodes);
        }
        self.players.remove_if(&player, |_, set| set.is_empty());
    }

    /// Forget everything about a player (e.g. on disconnect)
    pub fn clear_player(&self, player: PlayerId) {
        self.players.remove(&player);
    }

    pub fn has_node(&self, player: PlayerId, node: &str) -> bool {
        self.players
            .get(&player)
            .map(|set| set.has(node))
            .unwrap_or(false)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

impl AdminPredicate for NodeRegistry {
    fn is_admin(&self, player: PlayerId) -> bool {
        self.has_node(player, ADMIN_NODE)
    }
}
