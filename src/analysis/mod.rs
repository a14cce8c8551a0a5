//! Analyses over graph scopes.
//!
//! - [`equivalence`]: embedding similarity clustering into `equivalent` edges.
//! - [`temporal`]: `next_TimeStamp` ordering inside one item.
//! - [`relations`]: causal, detail and auto-discovered relations from the classifier.
//! - [`groups`]: union-find over `equivalent` edges of a finished graph.
//! - [`timeline`]: event groups chained along `next_TimeStamp` edges.

pub mod equivalence;
pub mod groups;
pub mod relations;
pub mod temporal;
pub mod timeline;

pub use equivalence::{EquivalenceEngine, EquivalenceOutcome};
pub use groups::{describe_groups, EquivalenceGroups};
pub use relations::{DiscoveryOutcome, RelationMiner};
pub use temporal::{TemporalEngine, TemporalOutcome};
pub use timeline::{build_timelines, describe_timelines, Timeline};
