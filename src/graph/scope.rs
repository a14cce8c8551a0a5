//! Document and item scopes.
//!
//! A scope collects the ids of every node and edge created while it is open.
//! Scopes are opened with [`GraphStore::begin_scope`](super::GraphStore::begin_scope),
//! which hands back a [`ScopeHandle`], and closed by giving the handle back.
//! Several scopes may be open at once: an item scope nested in a document
//! scope sees the same creations, so the document scope is a superset.

use std::collections::BTreeSet;

use super::store::GraphStore;
use super::types::{EdgeId, NodeId};
use crate::error::{GraphError, Result};

/// Granularity of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Document,
    Item,
}

/// Token for an open scope. Not cloneable: a scope is closed exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct ScopeHandle {
    pub(super) id: u64,
    pub(super) kind: ScopeKind,
}

impl ScopeHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }
}

/// Ids created inside one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub id: u64,
    pub kind: ScopeKind,
    pub label: String,
    pub node_ids: BTreeSet<NodeId>,
    pub edge_ids: BTreeSet<EdgeId>,
}

impl Scope {
    pub(super) fn new(id: u64, kind: ScopeKind, label: String) -> Self {
        Self {
            id,
            kind,
            label,
            node_ids: BTreeSet::new(),
            edge_ids: BTreeSet::new(),
        }
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_ids.contains(&id)
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edge_ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty() && self.edge_ids.is_empty()
    }
}

// ============================================================================
// Item window
// ============================================================================

/// Lifecycle state of an item window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Accumulating nodes and sentences.
    Open,
    /// Analyses have been handed the item's snapshot.
    Finalized,
    /// Scope closed and cache dropped.
    Cleared,
}

/// Frozen view of an item handed to the analysis engines.
#[derive(Debug, Clone)]
pub struct ItemSnapshot {
    pub scope: Scope,
    /// Source sentences of the item, concatenated.
    pub text: String,
}

/// One first-level item being processed: its scope plus the source sentences.
///
/// `Open -> Finalized -> Cleared`. The scope stays open while finalized so
/// that edges produced by the analyses are tagged to the item; it is closed
/// by [`ItemWindow::clear`].
#[derive(Debug)]
pub struct ItemWindow {
    handle: Option<ScopeHandle>,
    label: String,
    state: ItemState,
    sentences: Vec<String>,
}

impl ItemWindow {
    /// Open a new item scope on the store.
    pub fn open(store: &mut GraphStore, label: impl Into<String>) -> Self {
        let label = label.into();
        let handle = store.begin_scope(ScopeKind::Item, label.clone());
        Self {
            handle: Some(handle),
            label,
            state: ItemState::Open,
            sentences: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    /// Append a source sentence to the item cache.
    pub fn push_sentence(&mut self, sentence: impl Into<String>) -> Result<()> {
        if self.state != ItemState::Open {
            return Err(GraphError::Lifecycle(format!(
                "item '{}' is {:?}, cannot accept sentences",
                self.label, self.state
            )));
        }
        self.sentences.push(sentence.into());
        Ok(())
    }

    /// Concatenated source sentences.
    pub fn text(&self) -> String {
        self.sentences.concat()
    }

    /// Freeze the item. Fails unless the item is open.
    pub fn finalize(&mut self, store: &GraphStore) -> Result<ItemSnapshot> {
        if self.state != ItemState::Open {
            return Err(GraphError::Lifecycle(format!(
                "item '{}' is {:?}, cannot finalize",
                self.label, self.state
            )));
        }
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| GraphError::Lifecycle(format!("item '{}' has no scope", self.label)))?;
        let scope = store.scope_view(handle)?;

        self.state = ItemState::Finalized;
        Ok(ItemSnapshot {
            scope,
            text: self.text(),
        })
    }

    /// Close the item scope and drop the cache. Fails unless finalized.
    pub fn clear(&mut self, store: &mut GraphStore) -> Result<Scope> {
        if self.state != ItemState::Finalized {
            return Err(GraphError::Lifecycle(format!(
                "item '{}' is {:?}, cannot clear",
                self.label, self.state
            )));
        }
        let handle = self
            .handle
            .take()
            .ok_or_else(|| GraphError::Lifecycle(format!("item '{}' has no scope", self.label)))?;

        self.sentences.clear();
        self.state = ItemState::Cleared;
        store.close_scope(handle)
    }

    /// Close the item scope whatever the state, dropping the cache.
    ///
    /// Used when finalizing failed; returns `None` if the scope was already closed.
    pub fn abandon(&mut self, store: &mut GraphStore) -> Option<Scope> {
        self.sentences.clear();
        self.state = ItemState::Cleared;
        let handle = self.handle.take()?;
        store.close_scope(handle).ok()
    }
}
