//! The reusable owner/members/overrides unit
//!
//! Chunks, zones, world fallbacks and the wilderness all hold one
//! [`AccessContext`]. The context answers a local verdict; walking from one
//! layer to the next is done by the resolution chain in [`crate::claims`].

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::identity::{Identity, PlayerId};
use crate::permissions::{Permission, Tristate};

use super::member::Member;

/// Owner, members and explicit permission overrides of one protected area
#[derive(Debug, Clone, Default)]
pub struct AccessContext {
    owner: Option<Identity>,
    members: HashMap<PlayerId, HashSet<Member>>,
    overrides: BTreeMap<Permission, bool>,
    modified: bool,
}

impl AccessContext {
    /// An empty context: no owner, no members, no overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// A context with only overrides, as loaded from configuration
    pub fn with_overrides(overrides: BTreeMap<Permission, bool>) -> Self {
        Self {
            overrides,
            ..Self::default()
        }
    }

    /// Local verdict for an actor, first match wins:
    ///
    /// 1. the explicit owner, or any admin when the owner is unset
    /// 2. a member whose rank grants the permission
    /// 3. an explicit override, allow or deny
    ///
    /// `None` means this context has no opinion and the next layer decides.
    pub fn check(&self, permission: Permission, actor: PlayerId, is_admin: bool) -> Option<bool> {
        match &self.owner {
            Some(owner) if owner.id() == actor => return Some(true),
            Some(owner) if owner.is_admins() && is_admin => return Some(true),
            None if is_admin => return Some(true),
            _ => {}
        }

        if self.member_grants(permission, actor) {
            return Some(true);
        }

        self.public_permission(permission)
    }

    /// Check if any of the actor's ranks grants the permission
    pub fn member_grants(&self, permission: Permission, actor: PlayerId) -> bool {
        self.members
            .get(&actor)
            .is_some_and(|set| set.iter().any(|m| m.grants(permission)))
    }

    /// The explicit override for a permission, if any
    pub fn public_permission(&self, permission: Permission) -> Option<bool> {
        self.overrides.get(&permission).copied()
    }

    /// Store, replace or clear an override.
    ///
    /// Returns `true` only if the stored state changed.
    pub fn set_public_permission(&mut self, permission: Permission, value: Tristate) -> bool {
        let changed = match value.as_option() {
            None => self.overrides.remove(&permission).is_some(),
            Some(value) => self.overrides.insert(permission, value) != Some(value),
        };
        self.modified |= changed;
        changed
    }

    pub fn overrides(&self) -> &BTreeMap<Permission, bool> {
        &self.overrides
    }

    pub fn owner(&self) -> Option<&Identity> {
        self.owner.as_ref()
    }

    /// Replace the owner. `None` hands the context back to the server admins.
    pub fn set_owner(&mut self, owner: Option<Identity>) {
        if self.owner != owner || owner_name(&self.owner) != owner_name(&owner) {
            self.modified = true;
        }
        self.owner = owner;
    }

    pub fn add_member(&mut self, member: Member) {
        let inserted = self
            .members
            .entry(member.player().id())
            .or_default()
            .insert(member);
        self.modified |= inserted;
    }

    /// Remove one (player, rank) association.
    ///
    /// The player's entry disappears once its last association is gone.
    pub fn remove_member(&mut self, member: &Member) -> bool {
        let player = member.player().id();
        let Some(set) = self.members.get_mut(&player) else {
            return false;
        };

        let mut removed = set.remove(member);
        if set.is_empty() {
            removed |= self.members.remove(&player).is_some();
        }
        self.modified |= removed;
        removed
    }

    /// Every association of a player
    pub fn memberships(&self, player: PlayerId) -> impl Iterator<Item = &Member> {
        self.members.get(&player).into_iter().flatten()
    }

    /// Every member association of this context
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values().flatten()
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.members.contains_key(&player)
    }

    pub fn has_members(&self) -> bool {
        !self.members.is_empty()
    }

    /// Check if anything changed since the last save
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn touch(&mut self) {
        self.modified = true;
    }

    pub fn mark_clean(&mut self) {
        self.modified = false;
    }
}

fn owner_name(owner: &Option<Identity>) -> Option<&str> {
    owner.as_ref().map(Identity::name)
}
