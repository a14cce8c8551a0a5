//! Core node and edge types of the knowledge graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::predicate::PredicateStructure;

/// Identifier shared by all node kinds.
pub type NodeId = u64;

/// Identifier of an edge. Counted independently of node ids.
pub type EdgeId = u64;

// ============================================================================
// Nodes
// ============================================================================

/// Role of a category node in the document hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    /// The input file as a whole (`カテゴリ名`).
    Collection,
    /// One report inside the input (`文書名`).
    Document,
    /// A section or item heading inside a report (`項目名`).
    Item,
}

impl CategoryType {
    /// Label used in the exported tables.
    pub fn label(&self) -> &'static str {
        match self {
            CategoryType::Collection => "カテゴリ名",
            CategoryType::Document => "文書名",
            CategoryType::Item => "項目名",
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CategoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "カテゴリ名" => Ok(CategoryType::Collection),
            "文書名" => Ok(CategoryType::Document),
            "項目名" => Ok(CategoryType::Item),
            other => Err(format!("unknown category type: {}", other)),
        }
    }
}

/// A document, section or item label.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryNode {
    pub id: NodeId,
    pub hierarchical_level: u32,
    pub category_type: CategoryType,
    pub title: String,
}

/// A noun-phrase concept or state.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityNode {
    pub id: NodeId,
    pub hierarchical_level: u32,
    pub text: String,
}

/// An event or action with its case-marked arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateNode {
    pub id: NodeId,
    pub hierarchical_level: u32,
    pub structure: PredicateStructure,
}

impl PredicateNode {
    /// Bare predicate text, without the role marker.
    pub fn predicate_text(&self) -> &str {
        self.structure.predicate_text()
    }

    /// Bare agent (`ガ格`) text, empty when the structure has no agent.
    pub fn agent_text(&self) -> &str {
        self.structure.agent_text()
    }

    /// Canonical sentence form with case particles reattached.
    pub fn render(&self) -> String {
        self.structure.render()
    }
}

/// Kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Category,
    Entity,
    Predicate,
}

/// Borrowed view of any node.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Category(&'a CategoryNode),
    Entity(&'a EntityNode),
    Predicate(&'a PredicateNode),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        match self {
            NodeRef::Category(n) => n.id,
            NodeRef::Entity(n) => n.id,
            NodeRef::Predicate(n) => n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Category(_) => NodeKind::Category,
            NodeRef::Entity(_) => NodeKind::Entity,
            NodeRef::Predicate(_) => NodeKind::Predicate,
        }
    }

    /// Category title, entity text or predicate text.
    pub fn text(&self) -> &'a str {
        match self {
            NodeRef::Category(n) => &n.title,
            NodeRef::Entity(n) => &n.text,
            NodeRef::Predicate(n) => n.predicate_text(),
        }
    }
}

// ============================================================================
// Edges
// ============================================================================

/// Fixed structural edge vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructuralEdge {
    /// Taxonomic hierarchy: `to` is below `from`.
    Sub,
    /// `to` gives the specific time of `from`.
    SpecificTime,
    /// `to` gives the specific place of `from`.
    SpecificPlace,
    /// `to` details `from`.
    ExplainDetails,
    /// `to` explains the reason for `from`.
    ExplainReason,
    /// `to` is the direct cause of `from`.
    ExplainCause,
    /// `from` and `to` carry near-identical information.
    Equivalent,
    /// `to` happens right after `from`.
    NextTimeStamp,
}

impl StructuralEdge {
    pub const ALL: [StructuralEdge; 8] = [
        StructuralEdge::Sub,
        StructuralEdge::SpecificTime,
        StructuralEdge::SpecificPlace,
        StructuralEdge::ExplainDetails,
        StructuralEdge::ExplainReason,
        StructuralEdge::ExplainCause,
        StructuralEdge::Equivalent,
        StructuralEdge::NextTimeStamp,
    ];

    /// Label used in the exported tables.
    pub fn label(&self) -> &'static str {
        match self {
            StructuralEdge::Sub => "sub",
            StructuralEdge::SpecificTime => "info_SpecificTime",
            StructuralEdge::SpecificPlace => "info_SpecificPlace",
            StructuralEdge::ExplainDetails => "explain_details",
            StructuralEdge::ExplainReason => "explain_reason",
            StructuralEdge::ExplainCause => "explain_cause",
            StructuralEdge::Equivalent => "equivalent",
            StructuralEdge::NextTimeStamp => "next_TimeStamp",
        }
    }

    /// Meaning of the relation, as handed to the text classifier.
    pub fn description(&self) -> &'static str {
        match self {
            StructuralEdge::Sub => "(y)は(x)の分類的階層構造において下位である",
            StructuralEdge::SpecificTime => "(y)は(x)に詳細な時間情報を提供する",
            StructuralEdge::SpecificPlace => "(y)は(x)に詳細な場所情報を提供する",
            StructuralEdge::ExplainDetails => "(y)は(x)に詳細な情報を提供する",
            StructuralEdge::ExplainReason => "(y)は(x)に対する理由を説明する",
            StructuralEdge::ExplainCause => "(y)は(x)に対する直接的な原因である",
            StructuralEdge::Equivalent => "(y)と(x)は類似した情報である",
            StructuralEdge::NextTimeStamp => "(y)のTimeStampは(x)のTimeStampの直後である",
        }
    }

    /// Look up a structural edge by its label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.label() == label)
    }
}

/// Edge type: a fixed structural relation or one registered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeType {
    Structural(StructuralEdge),
    Discovered(String),
}

impl EdgeType {
    /// Parse a label, preferring the structural vocabulary.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        StructuralEdge::from_label(label)
            .map(EdgeType::Structural)
            .unwrap_or_else(|| EdgeType::Discovered(label.to_string()))
    }

    pub fn label(&self) -> &str {
        match self {
            EdgeType::Structural(e) => e.label(),
            EdgeType::Discovered(label) => label,
        }
    }

    pub fn is(&self, structural: StructuralEdge) -> bool {
        matches!(self, EdgeType::Structural(e) if *e == structural)
    }
}

impl From<StructuralEdge> for EdgeType {
    fn from(edge: StructuralEdge) -> Self {
        EdgeType::Structural(edge)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A directed, typed edge between two node ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub edge_type: EdgeType,
    pub from: NodeId,
    pub to: NodeId,
}

/// Entry of the auto-discovered relation dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationLabel {
    pub label: String,
    pub explanation: String,
}

impl RelationLabel {
    pub fn new(label: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            explanation: explanation.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_labels() {
        assert_eq!(
            EdgeType::from_label("next_TimeStamp"),
            EdgeType::Structural(StructuralEdge::NextTimeStamp)
        );
        assert_eq!(
            EdgeType::from_label(" as_like "),
            EdgeType::Discovered("as_like".to_string())
        );
        for edge in StructuralEdge::ALL {
            assert_eq!(StructuralEdge::from_label(edge.label()), Some(edge));
        }
    }

    #[test]
    fn test_category_type_round_trip() {
        for ty in [
            CategoryType::Collection,
            CategoryType::Document,
            CategoryType::Item,
        ] {
            assert_eq!(ty.label().parse::<CategoryType>().unwrap(), ty);
        }
        assert!("見出し".parse::<CategoryType>().is_err());
    }
}
