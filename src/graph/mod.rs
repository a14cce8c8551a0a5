//! Knowledge graph: typed nodes, typed edges and the scopes they are created in.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      GraphStore                       │
//! │  ┌────────────┐ ┌────────────┐ ┌───────────────────┐  │
//! │  │ Node tables│ │ Edge list  │ │ Relation labels   │  │
//! │  │ (shared id)│ │ (own ids)  │ │ (exact-match set) │  │
//! │  └────────────┘ └────────────┘ └───────────────────┘  │
//! │                  open scopes record every creation    │
//! └───────────────────────────────────────────────────────┘
//! ```

mod predicate;
mod scope;
mod stats;
mod store;
mod types;

pub use predicate::{PredicateStructure, Role, Segment};
pub use scope::{ItemSnapshot, ItemState, ItemWindow, Scope, ScopeHandle, ScopeKind};
pub use stats::GraphStats;
pub use store::GraphStore;
pub use types::*;
