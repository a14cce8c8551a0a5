//! Equivalence groups: connected components of `equivalent` edges.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use crate::graph::{EdgeType, GraphStore, NodeId, NodeRef, StructuralEdge};

/// Edge types listed as outgoing context of a group.
const CONTEXT_EDGES: [StructuralEdge; 3] = [
    StructuralEdge::SpecificTime,
    StructuralEdge::SpecificPlace,
    StructuralEdge::ExplainDetails,
];

/// Disjoint-set forest with path compression and union by rank.
#[derive(Debug, Clone, Default)]
pub struct DisjointSet {
    parent: HashMap<NodeId, NodeId>,
    rank: HashMap<NodeId, u32>,
}

impl DisjointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId) {
        self.parent.entry(id).or_insert(id);
        self.rank.entry(id).or_insert(0);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.parent.contains_key(&id)
    }

    /// Representative of `id`'s set, or `None` if `id` was never inserted.
    pub fn find(&mut self, id: NodeId) -> Option<NodeId> {
        let mut root = *self.parent.get(&id)?;
        while let Some(&next) = self.parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }

        // path compression
        let mut current = id;
        while current != root {
            let next = self.parent[&current];
            self.parent.insert(current, root);
            current = next;
        }
        Some(root)
    }

    /// Merge the sets of `a` and `b`. Ignored when either is unknown.
    pub fn union(&mut self, a: NodeId, b: NodeId) {
        let (Some(mut root_a), Some(mut root_b)) = (self.find(a), self.find(b)) else {
            return;
        };
        if root_a == root_b {
            return;
        }
        if self.rank[&root_a] < self.rank[&root_b] {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent.insert(root_b, root_a);
        if self.rank[&root_a] == self.rank[&root_b] {
            if let Some(rank) = self.rank.get_mut(&root_a) {
                *rank += 1;
            }
        }
    }
}

/// Groups of level-0 entity and predicate nodes joined by `equivalent` edges.
#[derive(Debug, Clone)]
pub struct EquivalenceGroups {
    groups: Vec<Vec<NodeId>>,
}

impl EquivalenceGroups {
    pub fn from_store(store: &GraphStore) -> Self {
        let mut set = DisjointSet::new();
        let level_zero = store
            .entities()
            .iter()
            .filter(|n| n.hierarchical_level == 0)
            .map(|n| n.id)
            .chain(
                store
                    .predicates()
                    .iter()
                    .filter(|n| n.hierarchical_level == 0)
                    .map(|n| n.id),
            );
        for id in level_zero {
            set.insert(id);
        }

        for edge in store.all_edges() {
            if edge.edge_type.is(StructuralEdge::Equivalent) {
                set.union(edge.from, edge.to);
            }
        }

        let mut ids: Vec<NodeId> = set.parent.keys().copied().collect();
        ids.sort_unstable();

        let mut by_root: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for id in ids {
            if let Some(root) = set.find(id) {
                by_root.entry(root).or_default().push(id);
            }
        }

        let mut groups: Vec<Vec<NodeId>> = by_root.into_values().collect();
        groups.sort_by_key(|members| members[0]);
        Self { groups }
    }

    /// Groups ordered by smallest member id; members ascending.
    pub fn groups(&self) -> &[Vec<NodeId>] {
        &self.groups
    }

    /// Groups with more than one member.
    pub fn merged(&self) -> impl Iterator<Item = &Vec<NodeId>> {
        self.groups.iter().filter(|g| g.len() > 1)
    }

    pub fn group_of(&self, id: NodeId) -> Option<&[NodeId]> {
        self.groups
            .iter()
            .find(|g| g.binary_search(&id).is_ok())
            .map(Vec::as_slice)
    }
}

/// Text used when listing a node: entity text or rendered predicate.
pub fn display_text(store: &GraphStore, id: NodeId) -> String {
    match store.node(id) {
        Some(NodeRef::Entity(n)) => n.text.clone(),
        Some(NodeRef::Predicate(n)) => n.render(),
        Some(NodeRef::Category(n)) => n.title.clone(),
        None => format!("(Node {})", id),
    }
}

/// Numbered listing of every group with its outgoing time, place and detail
/// edges to nodes outside the group.
pub fn describe_groups(store: &GraphStore, groups: &EquivalenceGroups) -> String {
    let mut out = String::new();
    for (n, members) in groups.groups().iter().enumerate() {
        let _ = writeln!(out, "({})", n + 1);
        for &id in members {
            let _ = writeln!(out, "  {}", display_text(store, id));
        }
        for &id in members {
            for edge in store.all_edges().iter().filter(|e| e.from == id) {
                let EdgeType::Structural(kind) = &edge.edge_type else {
                    continue;
                };
                if CONTEXT_EDGES.contains(kind) && !members.contains(&edge.to) {
                    let _ = writeln!(out, "  [{}] {}", kind.label(), display_text(store, edge.to));
                }
            }
        }
        out.push('\n');
    }
    out
}
