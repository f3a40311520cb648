//! Ranks: named sets of granted permissions

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::ValidationError;
use crate::identity::RankId;
use crate::normalize::normalize_identifier;
use crate::permissions::{Permission, PermissionSet};

/// A rank shared by every member that holds it
pub type SharedRank = Arc<RwLock<Rank>>;

/// A named set of permissions granted to members of a context
///
/// Rank names must be unique per server; uniqueness is checked on the
/// [normalized](Rank::normalized_name) form.
#[derive(Debug, Clone)]
pub struct Rank {
    id: RankId,
    name: String,
    permissions: PermissionSet,
    modified: bool,
}

impl Rank {
    /// Create a rank with a fresh id
    pub fn new(name: &str, permissions: PermissionSet) -> Result<Self, ValidationError> {
        Self::with_id(RankId::new_random(), name, permissions)
    }

    /// Create a rank with a known id, as done when loading
    pub fn with_id(
        id: RankId,
        name: &str,
        permissions: PermissionSet,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            name: trimmed_name(name)?,
            permissions,
            modified: false,
        })
    }

    pub fn id(&self) -> RankId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename. Does not check for conflicts with other ranks.
    pub fn set_name(&mut self, name: &str) -> Result<(), ValidationError> {
        let name = trimmed_name(name)?;
        self.modified |= self.name != name;
        self.name = name;
        Ok(())
    }

    pub fn normalized_name(&self) -> String {
        normalize_identifier(&self.name)
    }

    /// `Some(true)` if the rank grants the permission, `None` otherwise.
    ///
    /// Ranks never revoke a permission.
    pub fn permission(&self, permission: Permission) -> Option<bool> {
        self.grants(permission).then_some(true)
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.grants(permission)
    }

    pub fn permissions(&self) -> PermissionSet {
        self.permissions
    }

    /// Add a permission. Returns `true` if the set changed.
    pub fn grant(&mut self, permission: Permission) -> bool {
        let changed = !self.grants(permission);
        self.permissions.insert(permission.flag());
        self.modified |= changed;
        changed
    }

    /// Remove a permission. Returns `true` if the set changed.
    pub fn revoke(&mut self, permission: Permission) -> bool {
        let changed = self.grants(permission);
        self.permissions.remove(permission.flag());
        self.modified |= changed;
        changed
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_clean(&mut self) {
        self.modified = false;
    }
}

fn trimmed_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

/// Concurrent lookup of ranks by id
///
/// Persisted memberships only carry a rank id; the registry turns it back
/// into the shared rank when claims are loaded.
#[derive(Debug, Default)]
pub struct RankRegistry {
    ranks: DashMap<RankId, SharedRank>,
}

impl RankRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rank and return its shared handle.
    ///
    /// A rank with the same id is replaced.
    pub fn insert(&self, rank: Rank) -> SharedRank {
        let id = rank.id();
        let shared = Arc::new(RwLock::new(rank));
        self.ranks.insert(id, Arc::clone(&shared));
        shared
    }

    pub fn get(&self, id: RankId) -> Option<SharedRank> {
        self.ranks.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub fn remove(&self, id: RankId) -> Option<SharedRank> {
        self.ranks.remove(&id).map(|(_, rank)| rank)
    }

    /// Find a rank whose normalized name matches
    pub fn find_by_name(&self, name: &str) -> Option<SharedRank> {
        let wanted = normalize_identifier(name);
        self.ranks
            .iter()
            .find(|r| r.value().read().normalized_name() == wanted)
            .map(|r| Arc::clone(r.value()))
    }

    /// Snapshot of every registered rank
    pub fn all(&self) -> Vec<SharedRank> {
        self.ranks.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}
