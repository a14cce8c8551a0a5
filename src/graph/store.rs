//! In-memory graph store.
//!
//! Owns the node and edge id counters, the three node tables, the edge list,
//! the auto-discovered relation dictionary and the open scopes. The store is
//! append-only: nodes and edges are never mutated or removed.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::predicate::PredicateStructure;
use super::scope::{Scope, ScopeHandle, ScopeKind};
use super::types::{
    CategoryNode, CategoryType, Edge, EdgeId, EdgeType, EntityNode, NodeId, NodeKind, NodeRef,
    PredicateNode, RelationLabel,
};
use crate::error::{GraphError, Result};
use crate::trace::TraceLog;

/// Append-only knowledge graph.
#[derive(Debug)]
pub struct GraphStore {
    next_node_id: NodeId,
    next_edge_id: EdgeId,
    next_scope_id: u64,
    categories: Vec<CategoryNode>,
    entities: Vec<EntityNode>,
    predicates: Vec<PredicateNode>,
    /// Node id -> table and position.
    index: HashMap<NodeId, (NodeKind, usize)>,
    edges: Vec<Edge>,
    edge_ids: HashSet<EdgeId>,
    relation_labels: Vec<RelationLabel>,
    open_scopes: BTreeMap<u64, Scope>,
    trace: TraceLog,
}

impl GraphStore {
    /// Create an empty store. Node and edge ids both start at 1.
    pub fn new(trace: TraceLog) -> Self {
        Self {
            next_node_id: 1,
            next_edge_id: 1,
            next_scope_id: 1,
            categories: Vec::new(),
            entities: Vec::new(),
            predicates: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            edge_ids: HashSet::new(),
            relation_labels: Vec::new(),
            open_scopes: BTreeMap::new(),
            trace,
        }
    }

    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    // ========================================================================
    // Node creation
    // ========================================================================

    pub fn create_category(
        &mut self,
        title: impl Into<String>,
        level: u32,
        category_type: CategoryType,
    ) -> NodeId {
        let id = self.allocate_node_id();
        let node = CategoryNode {
            id,
            hierarchical_level: level,
            category_type,
            title: title.into(),
        };
        self.trace.line(format!(
            "Creating category node : [{}] {} (level {}, {})",
            id, node.title, level, category_type
        ));
        self.index
            .insert(id, (NodeKind::Category, self.categories.len()));
        self.categories.push(node);
        self.record_node(id);
        id
    }

    pub fn create_entity(&mut self, text: impl Into<String>) -> NodeId {
        let id = self.allocate_node_id();
        let node = EntityNode {
            id,
            hierarchical_level: 0,
            text: text.into(),
        };
        self.trace
            .line(format!("Creating entity node : [{}] {}", id, node.text));
        self.index.insert(id, (NodeKind::Entity, self.entities.len()));
        self.entities.push(node);
        self.record_node(id);
        id
    }

    /// Create an entity from the first of several candidate texts.
    pub fn create_entity_from_first(&mut self, texts: &[String]) -> Result<NodeId> {
        let first = texts
            .first()
            .ok_or_else(|| GraphError::InvalidInput("empty entity list".to_string()))?;
        Ok(self.create_entity(first.clone()))
    }

    /// Create one predicate node per raw structure string, in order.
    pub fn create_predicates<S: AsRef<str>>(&mut self, raw_structures: &[S]) -> Vec<NodeId> {
        raw_structures
            .iter()
            .map(|raw| self.create_predicate(PredicateStructure::parse(raw.as_ref())))
            .collect()
    }

    pub fn create_predicate(&mut self, structure: PredicateStructure) -> NodeId {
        let id = self.allocate_node_id();
        let node = PredicateNode {
            id,
            hierarchical_level: 0,
            structure,
        };
        self.trace.line(format!(
            "Creating predicate node : [{}] {}",
            id,
            node.render()
        ));
        self.index
            .insert(id, (NodeKind::Predicate, self.predicates.len()));
        self.predicates.push(node);
        self.record_node(id);
        id
    }

    fn allocate_node_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn record_node(&mut self, id: NodeId) {
        for scope in self.open_scopes.values_mut() {
            scope.node_ids.insert(id);
        }
    }

    // ========================================================================
    // Node lookup
    // ========================================================================

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        let (kind, pos) = *self.index.get(&id)?;
        Some(match kind {
            NodeKind::Category => NodeRef::Category(&self.categories[pos]),
            NodeKind::Entity => NodeRef::Entity(&self.entities[pos]),
            NodeKind::Predicate => NodeRef::Predicate(&self.predicates[pos]),
        })
    }

    /// Category title, entity text or predicate text; `unknown_idx:{id}` if absent.
    pub fn lookup_text(&self, id: NodeId) -> String {
        self.node(id)
            .map(|node| node.text().to_string())
            .unwrap_or_else(|| format!("unknown_idx:{}", id))
    }

    pub fn categories(&self) -> &[CategoryNode] {
        &self.categories
    }

    pub fn entities(&self) -> &[EntityNode] {
        &self.entities
    }

    pub fn predicates(&self) -> &[PredicateNode] {
        &self.predicates
    }

    pub fn category(&self, id: NodeId) -> Option<&CategoryNode> {
        match self.node(id)? {
            NodeRef::Category(node) => Some(node),
            _ => None,
        }
    }

    pub fn entity(&self, id: NodeId) -> Option<&EntityNode> {
        match self.node(id)? {
            NodeRef::Entity(node) => Some(node),
            _ => None,
        }
    }

    pub fn predicate(&self, id: NodeId) -> Option<&PredicateNode> {
        match self.node(id)? {
            NodeRef::Predicate(node) => Some(node),
            _ => None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Append an edge. Endpoints are not validated.
    pub fn append_edge(
        &mut self,
        edge_type: impl Into<EdgeType>,
        from: NodeId,
        to: NodeId,
    ) -> EdgeId {
        let edge_type = edge_type.into();
        let id = self.next_edge_id;
        self.next_edge_id += 1;

        self.trace.line(format!(
            "Creating edge : [{}] --({})--> [{}]",
            self.lookup_text(from),
            edge_type,
            self.lookup_text(to)
        ));

        self.edges.push(Edge {
            id,
            edge_type,
            from,
            to,
        });
        self.edge_ids.insert(id);
        for scope in self.open_scopes.values_mut() {
            scope.edge_ids.insert(id);
        }
        id
    }

    pub fn all_edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Register a discovered relation label. Exact-match dedup; returns
    /// `false` when the label was already present.
    pub fn register_relation_label(
        &mut self,
        label: impl Into<String>,
        explanation: impl Into<String>,
    ) -> bool {
        let label = label.into();
        if self.relation_labels.iter().any(|r| r.label == label) {
            return false;
        }
        let explanation = explanation.into();
        self.trace.line(format!(
            "Registering relation label : {} : {}",
            label, explanation
        ));
        self.relation_labels
            .push(RelationLabel::new(label, explanation));
        true
    }

    pub fn all_relation_labels(&self) -> &[RelationLabel] {
        &self.relation_labels
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Open a scope. Every node and edge created until it is closed is recorded in it.
    pub fn begin_scope(&mut self, kind: ScopeKind, label: impl Into<String>) -> ScopeHandle {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        self.open_scopes.insert(id, Scope::new(id, kind, label.into()));
        ScopeHandle { id, kind }
    }

    /// Snapshot of an open scope.
    pub fn scope_view(&self, handle: &ScopeHandle) -> Result<Scope> {
        self.open_scopes
            .get(&handle.id)
            .cloned()
            .ok_or(GraphError::UnknownScope(handle.id))
    }

    /// Close a scope and return its final contents.
    pub fn close_scope(&mut self, handle: ScopeHandle) -> Result<Scope> {
        self.open_scopes
            .remove(&handle.id)
            .ok_or(GraphError::UnknownScope(handle.id))
    }

    /// Number of scopes currently recording creations.
    pub fn open_scope_count(&self) -> usize {
        self.open_scopes.len()
    }

    pub fn entities_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a EntityNode> {
        self.entities.iter().filter(|n| scope.contains_node(n.id))
    }

    pub fn predicates_in<'a>(
        &'a self,
        scope: &'a Scope,
    ) -> impl Iterator<Item = &'a PredicateNode> {
        self.predicates.iter().filter(|n| scope.contains_node(n.id))
    }

    pub fn categories_in<'a>(
        &'a self,
        scope: &'a Scope,
    ) -> impl Iterator<Item = &'a CategoryNode> {
        self.categories.iter().filter(|n| scope.contains_node(n.id))
    }

    pub fn edges_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(|e| scope.contains_edge(e.id))
    }

    // ========================================================================
    // Restore (CSV import)
    // ========================================================================

    pub fn restore_category(&mut self, node: CategoryNode) -> Result<()> {
        self.claim_id(node.id)?;
        self.index
            .insert(node.id, (NodeKind::Category, self.categories.len()));
        self.categories.push(node);
        Ok(())
    }

    pub fn restore_entity(&mut self, node: EntityNode) -> Result<()> {
        self.claim_id(node.id)?;
        self.index
            .insert(node.id, (NodeKind::Entity, self.entities.len()));
        self.entities.push(node);
        Ok(())
    }

    pub fn restore_predicate(&mut self, node: PredicateNode) -> Result<()> {
        self.claim_id(node.id)?;
        self.index
            .insert(node.id, (NodeKind::Predicate, self.predicates.len()));
        self.predicates.push(node);
        Ok(())
    }

    pub fn restore_edge(&mut self, edge: Edge) -> Result<()> {
        if !self.edge_ids.insert(edge.id) {
            return Err(GraphError::InvalidInput(format!(
                "duplicate edge id {}",
                edge.id
            )));
        }
        self.next_edge_id = self.next_edge_id.max(edge.id + 1);
        self.edges.push(edge);
        Ok(())
    }

    fn claim_id(&mut self, id: NodeId) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(GraphError::InvalidInput(format!("duplicate node id {}", id)));
        }
        self.next_node_id = self.next_node_id.max(id + 1);
        Ok(())
    }
}
