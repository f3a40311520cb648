//! Stable identifiers and player identities
//!
//! Every persistent entity is keyed by a UUID newtype so that world, zone,
//! rank and player ids cannot be mixed up. [`Identity`] pairs a player id
//! with a display name that may change over time; equality only looks at
//! the id.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a fresh random id
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// The underlying UUID
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id! {
    /// Unique id of a player (or of a sentinel pseudo-player)
    PlayerId
}

uuid_id! {
    /// Unique id of a loaded world
    WorldId
}

uuid_id! {
    /// Unique id of a zone, stable across renames
    ZoneId
}

uuid_id! {
    /// Unique id of a rank, stable across renames
    RankId
}

/// Id of the "Server Admins" pseudo-player
pub const ADMINS_ID: PlayerId = PlayerId::from_uuid(Uuid::from_u128(0x6d79_6368_756e_3ba1_8d3e_5365_7276_6572));

/// Id of the "Wilderness" pseudo-player
pub const WILDERNESS_ID: PlayerId = PlayerId::from_uuid(Uuid::from_u128(0x6d79_6368_756e_3ba1_9c44_5769_6c64_0001));

/// A player reference: stable id plus mutable display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    id: PlayerId,
    name: String,
}

impl Identity {
    /// Create an identity, rejecting blank names
    pub fn new(id: PlayerId, name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self { id, name })
    }

    /// The "Server Admins" sentinel
    pub fn admins() -> Self {
        Self {
            id: ADMINS_ID,
            name: "Server Admins".to_string(),
        }
    }

    /// The "Wilderness" sentinel, used when naming the owner of unclaimed land
    pub fn wilderness() -> Self {
        Self {
            id: WILDERNESS_ID,
            name: "Wilderness".to_string(),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the display name. The id is unaffected.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.name = name;
        Ok(())
    }

    /// Check if this is the admins sentinel
    pub fn is_admins(&self) -> bool {
        self.id == ADMINS_ID
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
