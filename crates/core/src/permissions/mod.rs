//! Permission kinds, defaults and host admin nodes
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                  Permission values                    │
//! │   Permission (closed set)   PermissionSet (bitflags)  │
//! │   Tristate (override)       PermissionDefaults        │
//! └───────────────────────────────────────────────────────┘
//!              ▲                           ▲
//!              │ ranks, overrides          │ terminal step
//!      ┌───────┴────────┐          ┌───────┴────────┐
//!      │ AccessContext  │          │ ClaimEngine    │
//!      └────────────────┘          └───────┬────────┘
//!                                          │ is_admin?
//!                                  ┌───────▼────────┐
//!                                  │ NodeRegistry   │
//!                                  │ (host nodes)   │
//!                                  └────────────────┘
//! ```
//!
//! # Defaults
//!
//! | Permission | Fallback (claimed) | Wilderness |
//! |------------|--------------------|------------|
//! | `modify`   | false              | false      |
//! | `enter`    | true               | true       |
//!
//! Both columns can be changed through `default-permissions.toml`.

mod registry;
mod types;

pub use registry::{AdminPredicate, NoAdmins, NodeRegistry, NodeSet, ADMIN_NODE};
pub use types::{Permission, PermissionDefaults, PermissionSet, Tristate, UnknownPermission};
