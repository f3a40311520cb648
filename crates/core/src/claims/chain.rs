//! The resolution chain
//!
//! A permission query walks an ordered list of layers. The first layer with
//! a verdict wins, an explicit `false` included. When every layer abstains
//! the terminal default decides.
//!
//! | Target | Layers | Terminal |
//! |--------|--------|----------|
//! | claimed chunk | chunk → zone (if linked) → world fallback | global fallback default |
//! | unclaimed chunk | wilderness | wilderness default |
//!
//! Chunk and zone layers run the full owner/member/override check. The
//! world fallback and wilderness layers only consult their overrides.

use crate::identity::ZoneId;
use crate::permissions::{Permission, PermissionDefaults};
use crate::position::ChunkPos;

/// One step of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Chunk(ChunkPos),
    Zone(ZoneId),
    WorldFallback,
    Wilderness,
}

impl Layer {
    /// Only chunk and zone layers have owners and members
    pub fn has_members(&self) -> bool {
        matches!(self, Layer::Chunk(_) | Layer::Zone(_))
    }
}

/// Default used when every layer abstains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Fallback,
    Wilderness,
}

impl Terminal {
    pub fn verdict(self, permission: Permission, defaults: &PermissionDefaults) -> bool {
        match self {
            Terminal::Fallback => defaults.fallback(permission),
            Terminal::Wilderness => defaults.wild(permission),
        }
    }
}

/// Where a verdict came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Layer(Layer),
    Default(Terminal),
}

/// Outcome of walking a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub allowed: bool,
    pub source: Source,
}

/// Ordered layers plus the terminal default for one position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    layers: Vec<Layer>,
    terminal: Terminal,
}

impl Chain {
    pub fn claimed(position: ChunkPos, zone: Option<ZoneId>) -> Self {
        let mut layers = vec![Layer::Chunk(position)];
        layers.extend(zone.map(Layer::Zone));
        layers.push(Layer::WorldFallback);
        Self {
            layers,
            terminal: Terminal::Fallback,
        }
    }

    pub fn unclaimed() -> Self {
        Self {
            layers: vec![Layer::Wilderness],
            terminal: Terminal::Wilderness,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn terminal(&self) -> Terminal {
        self.terminal
    }

    /// Walk the layers with `check`, stopping at the first verdict
    pub fn resolve<F>(&self, permission: Permission, defaults: &PermissionDefaults, mut check: F) -> Resolution
    where
        F: FnMut(Layer) -> Option<bool>,
    {
        for &layer in &self.layers {
            if let Some(allowed) = check(layer) {
                return Resolution {
                    allowed,
                    source: Source::Layer(layer),
                };
            }
        }

        Resolution {
            allowed: self.terminal.verdict(permission, defaults),
            source: Source::Default(self.terminal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claimed_chain_order() {
        let zone = ZoneId::new_random();
        let pos = ChunkPos::new(1, 1);

        let chain = Chain::claimed(pos, Some(zone));
        assert_eq!(
            chain.layers(),
            &[Layer::Chunk(pos), Layer::Zone(zone), Layer::WorldFallback]
        );
        assert_eq!(chain.terminal(), Terminal::Fallback);

        let chain = Chain::claimed(pos, None);
        assert_eq!(chain.layers(), &[Layer::Chunk(pos), Layer::WorldFallback]);
    }

    #[test]
    fn test_first_verdict_wins() {
        let defaults = PermissionDefaults::builtin();
        let chain = Chain::claimed(ChunkPos::new(0, 0), Some(ZoneId::new_random()));

        let mut visited = Vec::new();
        let resolution = chain.resolve(Permission::Enter, &defaults, |layer| {
            visited.push(layer);
            match layer {
                Layer::Zone(_) => Some(false),
                _ => Some(true),
            }
        });

        // The chunk layer answers before the zone is asked
        assert!(resolution.allowed);
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_explicit_false_stops() {
        let defaults = PermissionDefaults::builtin();
        let chain = Chain::claimed(ChunkPos::new(0, 0), None);

        let resolution = chain.resolve(Permission::Enter, &defaults, |layer| match layer {
            Layer::Chunk(_) => Some(false),
            _ => Some(true),
        });
        assert!(!resolution.allowed);
        assert_eq!(resolution.source, Source::Layer(Layer::Chunk(ChunkPos::new(0, 0))));
    }

    #[test]
    fn test_terminal_defaults() {
        let defaults = PermissionDefaults::builtin();

        let claimed = Chain::claimed(ChunkPos::new(0, 0), None).resolve(Permission::Modify, &defaults, |_| None);
        assert_eq!(
            claimed,
            Resolution {
                allowed: false,
                source: Source::Default(Terminal::Fallback),
            }
        );

        let wild = Chain::unclaimed().resolve(Permission::Enter, &defaults, |_| None);
        assert!(wild.allowed);
        assert_eq!(wild.source, Source::Default(Terminal::Wilderness));
    }
}
