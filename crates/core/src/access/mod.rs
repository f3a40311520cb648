//! Access contexts, ranks and members
//!
//! An [`AccessContext`] is the unit every protected area is built from. It
//! holds an optional owner, a multi-map of members (one player may hold
//! several ranks) and a partial map of explicit permission overrides.

mod context;
mod member;
mod rank;

pub use context::AccessContext;
pub use member::Member;
pub use rank::{Rank, RankRegistry, SharedRank};
