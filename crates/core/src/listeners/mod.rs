//! Permission denial listeners
//!
//! Callbacks are stored in a thread-safe registry and invoked synchronously
//! when a player-facing check denies an action with notification requested.
//! Their return values are never consulted; they only observe.
//!
//! # Example
//!
//! ```ignore
//! let key = engine.on_permission_denied(|event| {
//!     tracing::info!("{} was denied by {}", event.actor, event.owner);
//! });
//!
//! // Later, unregister if needed
//! engine.remove_listener(key);
//! ```

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use crate::identity::{Identity, PlayerId, WorldId};
use crate::permissions::Permission;
use crate::position::ChunkPos;

new_key_type! {
    /// Key for registered listeners, used for removal
    pub struct ListenerKey;
}

/// A denied player-facing check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialEvent {
    pub world: WorldId,
    pub position: ChunkPos,
    pub permission: Permission,
    pub actor: PlayerId,
    /// Nearest owner found on the chain, or a sentinel
    pub owner: Identity,
}

impl DenialEvent {
    /// Plain failure message for the actor
    pub fn message(&self) -> String {
        format!("{} ({})", self.permission.failure_message(), self.owner)
    }
}

/// Callback for denials
pub type DenialCallback = Box<dyn Fn(&DenialEvent) + Send + Sync>;

/// Registry of denial callbacks
#[derive(Default)]
pub struct DenialListeners {
    callbacks: RwLock<SlotMap<ListenerKey, DenialCallback>>,
}

impl DenialListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    ///
    /// # Returns
    /// A key that can be used to unregister the callback via `remove`.
    pub fn register<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(&DenialEvent) + Send + Sync + 'static,
    {
        self.callbacks.write().insert(Box::new(callback))
    }

    /// Remove a listener by its key
    ///
    /// Returns `true` if the listener was found and removed.
    pub fn remove(&self, key: ListenerKey) -> bool {
        self.callbacks.write().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Fire all denial callbacks
    pub fn fire(&self, event: &DenialEvent) {
        tracing::debug!(
            "Firing OnPermissionDenied: actor={}, permission={}, world={}, chunk={}",
            event.actor,
            event.permission,
            event.world,
            event.position
        );
        let callbacks = self.callbacks.read();
        for (_, callback) in callbacks.iter() {
            callback(event);
        }
    }
}

impl std::fmt::Debug for DenialListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenialListeners")
            .field("count", &self.len())
            .finish()
    }
}
