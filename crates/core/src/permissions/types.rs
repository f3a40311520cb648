//! Permission kinds, permission sets and their configured defaults
//!
//! This module defines the closed set of protected actions and the values
//! used when no context states an explicit verdict.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A protected action on a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Place, break or replace blocks
    Modify,
    /// Walk into the chunk
    Enter,
}

impl Permission {
    /// Every permission kind, in declaration order
    pub const ALL: [Permission; 2] = [Permission::Modify, Permission::Enter];

    /// Identifier used in configuration files
    pub const fn key(self) -> &'static str {
        match self {
            Permission::Modify => "modify",
            Permission::Enter => "enter",
        }
    }

    /// Human readable description, written next to config entries
    pub const fn description(self) -> &'static str {
        match self {
            Permission::Modify => "Place, break or replace blocks",
            Permission::Enter => "Enter the chunk",
        }
    }

    /// Message shown to a player when this permission is denied
    pub const fn failure_message(self) -> &'static str {
        match self {
            Permission::Modify => "You do not have permission to modify this chunk.",
            Permission::Enter => "You do not have permission to enter on this chunk.",
        }
    }

    /// Built-in fallback for claimed land
    pub const fn builtin_fallback(self) -> bool {
        match self {
            Permission::Modify => false,
            Permission::Enter => true,
        }
    }

    /// Built-in default for unclaimed land
    pub const fn builtin_wild(self) -> bool {
        match self {
            Permission::Modify => false,
            Permission::Enter => true,
        }
    }

    /// The single-bit set for this permission
    pub const fn flag(self) -> PermissionSet {
        match self {
            Permission::Modify => PermissionSet::MODIFY,
            Permission::Enter => PermissionSet::ENTER,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error for an unknown permission key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

bitflags! {
    /// A set of permission kinds, as granted by a rank
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PermissionSet: u8 {
        const MODIFY = 0x01;
        const ENTER = 0x02;
    }
}

impl PermissionSet {
    /// Check if the set grants a permission kind
    pub fn grants(&self, permission: Permission) -> bool {
        self.contains(permission.flag())
    }

    /// The permission kinds in this set, in declaration order
    pub fn kinds(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL.into_iter().filter(|p| self.grants(*p))
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter()
            .fold(PermissionSet::empty(), |set, p| set | p.flag())
    }
}

/// An explicit permission value: allow, deny, or unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tristate {
    True,
    False,
    #[default]
    Undefined,
}

impl Tristate {
    pub const fn as_option(self) -> Option<bool> {
        match self {
            Tristate::True => Some(true),
            Tristate::False => Some(false),
            Tristate::Undefined => None,
        }
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Tristate::Undefined, Tristate::from)
    }
}

/// The values applied when no layer states a verdict
///
/// Loaded once at startup and replaced wholesale on reload. A resolution in
/// flight keeps reading the value it started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDefaults {
    fallback: PermissionSet,
    wild: PermissionSet,
}

impl PermissionDefaults {
    /// Defaults with every flag taken from the built-in values
    pub fn builtin() -> Self {
        Self {
            fallback: Permission::ALL
                .into_iter()
                .filter(|p| p.builtin_fallback())
                .collect(),
            wild: Permission::ALL
                .into_iter()
                .filter(|p| p.builtin_wild())
                .collect(),
        }
    }

    /// Fallback for claimed land that does not define the permission
    pub fn fallback(&self, permission: Permission) -> bool {
        self.fallback.grants(permission)
    }

    /// Default for unclaimed land
    pub fn wild(&self, permission: Permission) -> bool {
        self.wild.grants(permission)
    }

    /// Change a fallback value. Returns `true` if it changed.
    pub fn set_fallback(&mut self, permission: Permission, allowed: bool) -> bool {
        let changed = self.fallback(permission) != allowed;
        self.fallback.set(permission.flag(), allowed);
        changed
    }

    /// Change a wilderness value. Returns `true` if it changed.
    pub fn set_wild(&mut self, permission: Permission, allowed: bool) -> bool {
        let changed = self.wild(permission) != allowed;
        self.wild.set(permission.flag(), allowed);
        changed
    }

    /// Every permission allowed by fallback
    pub fn fallback_set(&self) -> PermissionSet {
        self.fallback
    }

    /// Every permission allowed in the wilderness
    pub fn wild_set(&self) -> PermissionSet {
        self.wild
    }
}

impl Default for PermissionDefaults {
    fn default() -> Self {
        Self::builtin()
    }
}
