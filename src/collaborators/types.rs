//! Request and response records exchanged with collaborators.

use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, RelationLabel};

/// Time and place expressions of a sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePlace {
    pub time: Vec<String>,
    pub place: Vec<String>,
}

impl TimePlace {
    pub fn is_empty(&self) -> bool {
        self.time.is_empty() && self.place.is_empty()
    }
}

/// Structures extracted from a sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceStructures {
    /// Raw `text(role), ...` strings, one per predicate.
    pub predicates: Vec<String>,
    pub entities: Vec<String>,
}

/// A node as shown to a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeText {
    pub id: NodeId,
    pub text: String,
}

impl NodeText {
    pub fn new(id: NodeId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// An existing edge as shown to a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTriple {
    pub id: u64,
    pub label: String,
    pub from: NodeId,
    pub to: NodeId,
}

/// Input of relation discovery for one scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationRequest {
    pub nodes: Vec<NodeText>,
    pub edges: Vec<EdgeTriple>,
    /// Concatenated source text of the scope.
    pub text: String,
    /// Fixed structural vocabulary: label and description.
    pub vocabulary: Vec<RelationLabel>,
    /// Labels discovered so far in the run.
    pub discovered: Vec<RelationLabel>,
}

/// A discovered edge to materialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub label: String,
}

/// Output of relation discovery. Empty means "none".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationResponse {
    pub labels: Vec<RelationLabel>,
    pub edges: Vec<DiscoveredEdge>,
}

impl RelationResponse {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.edges.is_empty()
    }
}

/// Kind of a causal relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CausalKind {
    /// Direct cause (`explain_cause`).
    Cause,
    /// Reason or rationale (`explain_reason`).
    Reason,
}

/// `cause` explains `effect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalRelation {
    pub cause: NodeId,
    pub effect: NodeId,
    pub kind: CausalKind,
    /// Cue expression in the sentence (`ため`, `により` ...).
    pub cue: String,
}

/// `detail` gives details about `explained`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRelation {
    pub explained: NodeId,
    pub detail: NodeId,
    /// What the detail explains.
    pub target: String,
}

/// Input of the ordering consistency check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderingReview {
    pub text: String,
    pub nodes: Vec<NodeText>,
    /// Accepted `next_TimeStamp` pairs.
    pub accepted: Vec<(NodeId, NodeId)>,
}

/// An ordering the classifier thinks is directly missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingCandidate {
    pub from: NodeId,
    pub to: NodeId,
}
