use std::collections::BTreeMap;

use serde::Serialize;

use super::store::GraphStore;

/// Node and edge counts of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub categories: usize,
    pub entities: usize,
    pub predicates: usize,
    pub edges: usize,
    /// Edge count per label, structural and discovered alike.
    pub edges_by_type: BTreeMap<String, usize>,
    pub relation_labels: usize,
}

impl GraphStats {
    pub fn collect(store: &GraphStore) -> Self {
        let mut edges_by_type = BTreeMap::new();
        for edge in store.all_edges() {
            *edges_by_type
                .entry(edge.edge_type.label().to_string())
                .or_insert(0) += 1;
        }
        Self {
            categories: store.categories().len(),
            entities: store.entities().len(),
            predicates: store.predicates().len(),
            edges: store.edge_count(),
            edges_by_type,
            relation_labels: store.all_relation_labels().len(),
        }
    }

    pub fn nodes(&self) -> usize {
        self.categories + self.entities + self.predicates
    }
}
