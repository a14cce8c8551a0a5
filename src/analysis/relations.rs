//! Merging classifier output into the graph.
//!
//! Sentence level: causal (`explain_cause` / `explain_reason`) and detail
//! (`explain_details`) edges. Item level: auto-discovered relations, whose new
//! labels are registered before their edges are appended.

use std::sync::Arc;

use crate::collaborators::{CausalKind, EdgeTriple, NodeText, RelationRequest, TextClassifier};
use crate::graph::{EdgeId, EdgeType, GraphStore, RelationLabel, Scope, StructuralEdge};

/// Result of relation discovery over one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryOutcome {
    /// Labels that were new to the dictionary.
    pub registered: Vec<String>,
    pub edges: Vec<EdgeId>,
}

pub struct RelationMiner {
    classifier: Arc<dyn TextClassifier>,
}

impl RelationMiner {
    pub fn new(classifier: Arc<dyn TextClassifier>) -> Self {
        Self { classifier }
    }

    /// Entity and predicate nodes of the scope as shown to the classifier.
    pub fn scope_nodes(store: &GraphStore, scope: &Scope) -> Vec<NodeText> {
        let mut nodes: Vec<NodeText> = store
            .entities_in(scope)
            .map(|n| NodeText::new(n.id, &n.text))
            .chain(
                store
                    .predicates_in(scope)
                    .map(|n| NodeText::new(n.id, n.predicate_text())),
            )
            .collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    /// Build the discovery request for a scope.
    pub fn request(store: &GraphStore, scope: &Scope, text: &str) -> RelationRequest {
        RelationRequest {
            nodes: Self::scope_nodes(store, scope),
            edges: store
                .edges_in(scope)
                .map(|e| EdgeTriple {
                    id: e.id,
                    label: e.edge_type.label().to_string(),
                    from: e.from,
                    to: e.to,
                })
                .collect(),
            text: text.to_string(),
            vocabulary: StructuralEdge::ALL
                .iter()
                .map(|e| RelationLabel::new(e.label(), e.description()))
                .collect(),
            discovered: store.all_relation_labels().to_vec(),
        }
    }

    /// Ask for relations not yet expressed in the scope and materialize them.
    pub async fn discover(
        &self,
        store: &mut GraphStore,
        scope: &Scope,
        text: &str,
    ) -> DiscoveryOutcome {
        let request = Self::request(store, scope, text);
        if request.nodes.len() < 2 {
            return DiscoveryOutcome::default();
        }

        let response = match self.classifier.discover_relations(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Relation discovery failed for '{}': {}", scope.label, e);
                store
                    .trace()
                    .line(format!("[RELATION ERROR] {}: {}", scope.label, e));
                return DiscoveryOutcome::default();
            }
        };

        let mut outcome = DiscoveryOutcome::default();
        if response.is_empty() {
            store.trace().line("No new auto-generated edges found.");
            return outcome;
        }

        for entry in response.labels {
            if store.register_relation_label(&entry.label, &entry.explanation) {
                outcome.registered.push(entry.label);
            }
        }
        for edge in response.edges {
            let edge_type = EdgeType::from_label(&edge.label);
            outcome
                .edges
                .push(store.append_edge(edge_type, edge.from, edge.to));
        }
        outcome
    }

    /// Causal edges among the nodes of one sentence, effect -> cause.
    pub async fn link_causal(
        &self,
        store: &mut GraphStore,
        sentence: &str,
        nodes: &[NodeText],
    ) -> Vec<EdgeId> {
        if nodes.len() < 2 {
            return Vec::new();
        }
        let relations = match self.classifier.extract_causal(sentence, nodes).await {
            Ok(relations) => relations,
            Err(e) => {
                tracing::warn!("Causal extraction failed: {}", e);
                store.trace().line(format!("[CAUSAL ERROR] {}", e));
                return Vec::new();
            }
        };

        relations
            .into_iter()
            .map(|r| {
                let edge_type = match r.kind {
                    CausalKind::Cause => StructuralEdge::ExplainCause,
                    CausalKind::Reason => StructuralEdge::ExplainReason,
                };
                store.trace().line(format!("[CausalCue] {}", r.cue));
                store.append_edge(edge_type, r.effect, r.cause)
            })
            .collect()
    }

    /// Detail edges among the nodes of one sentence, explained -> detail.
    ///
    /// A pair already linked by a causal edge in the same direction is skipped.
    pub async fn link_details(
        &self,
        store: &mut GraphStore,
        sentence: &str,
        nodes: &[NodeText],
    ) -> Vec<EdgeId> {
        if nodes.len() < 2 {
            return Vec::new();
        }
        let relations = match self.classifier.extract_details(sentence, nodes).await {
            Ok(relations) => relations,
            Err(e) => {
                tracing::warn!("Detail extraction failed: {}", e);
                store.trace().line(format!("[DETAIL ERROR] {}", e));
                return Vec::new();
            }
        };

        let mut edges = Vec::new();
        for r in relations {
            let causal = store.all_edges().iter().any(|e| {
                e.from == r.explained
                    && e.to == r.detail
                    && (e.edge_type.is(StructuralEdge::ExplainCause)
                        || e.edge_type.is(StructuralEdge::ExplainReason))
            });
            if causal {
                continue;
            }
            store.trace().line(format!("[ExplainTarget] {}", r.target));
            edges.push(store.append_edge(StructuralEdge::ExplainDetails, r.explained, r.detail));
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::stub::ScriptedClassifier;
    use crate::collaborators::{CausalRelation, DetailRelation, DiscoveredEdge, RelationResponse};
    use crate::graph::ScopeKind;
    use crate::trace::TraceLog;

    fn store_with_item() -> (GraphStore, Scope, Vec<u64>) {
        let mut store = GraphStore::new(TraceLog::in_memory());
        let handle = store.begin_scope(ScopeKind::Item, "概要");
        let a = store.create_entity("荷重オーバー");
        let p = store.create_predicates(&["エスカレーター(ガ格), 自動停止し(述語)"])[0];
        let scope = store.scope_view(&handle).unwrap();
        (store, scope, vec![a, p])
    }

    #[tokio::test]
    async fn test_discover_registers_labels_once() {
        let (mut store, scope, ids) = store_with_item();
        let response = RelationResponse {
            labels: vec![
                RelationLabel::new("as_like", "(y)は(x)のようである"),
                RelationLabel::new("as_like", "(y)は(x)のようである"),
            ],
            edges: vec![DiscoveredEdge {
                from: ids[1],
                to: ids[0],
                label: "as_like".to_string(),
            }],
        };
        let miner = RelationMiner::new(Arc::new(ScriptedClassifier::new().with_relations(response)));

        let outcome = miner.discover(&mut store, &scope, "本文。").await;
        assert_eq!(outcome.registered, vec!["as_like".to_string()]);
        assert_eq!(outcome.edges.len(), 1);
        assert_eq!(store.all_relation_labels().len(), 1);

        let edge = store.all_edges().last().unwrap();
        assert_eq!(edge.edge_type, EdgeType::Discovered("as_like".to_string()));
        assert_eq!((edge.from, edge.to), (ids[1], ids[0]));
    }

    #[tokio::test]
    async fn test_request_carries_vocabulary() {
        let (store, scope, _) = store_with_item();
        let request = RelationMiner::request(&store, &scope, "本文。");
        assert_eq!(request.nodes.len(), 2);
        assert_eq!(request.nodes[1].text, "自動停止し");
        assert_eq!(request.vocabulary.len(), StructuralEdge::ALL.len());
        assert!(request.discovered.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_not_fatal() {
        let (mut store, scope, _) = store_with_item();
        let miner = RelationMiner::new(Arc::new(ScriptedClassifier::failing()));
        let nodes = RelationMiner::scope_nodes(&store, &scope);

        assert_eq!(miner.discover(&mut store, &scope, "").await, DiscoveryOutcome::default());
        assert!(miner.link_causal(&mut store, "文。", &nodes).await.is_empty());
        assert!(miner.link_details(&mut store, "文。", &nodes).await.is_empty());
        assert_eq!(store.edge_count(), 0);

        let lines = store.trace().lines();
        assert!(lines.iter().any(|l| l.starts_with("[RELATION ERROR]")));
        assert!(lines.iter().any(|l| l.starts_with("[CAUSAL ERROR]")));
    }

    #[tokio::test]
    async fn test_causal_then_details_skip_duplicates() {
        let (mut store, scope, ids) = store_with_item();
        let (entity, predicate) = (ids[0], ids[1]);
        let sentence = "荷重オーバーで自動停止した。";
        let classifier = ScriptedClassifier::new()
            .with_causal(
                sentence,
                vec![CausalRelation {
                    cause: entity,
                    effect: predicate,
                    kind: CausalKind::Cause,
                    cue: "で".to_string(),
                }],
            )
            .with_details(
                sentence,
                vec![
                    DetailRelation {
                        explained: predicate,
                        detail: entity,
                        target: "原因".to_string(),
                    },
                    DetailRelation {
                        explained: entity,
                        detail: predicate,
                        target: "結果".to_string(),
                    },
                ],
            );
        let miner = RelationMiner::new(Arc::new(classifier));
        let nodes = RelationMiner::scope_nodes(&store, &scope);

        let causal = miner.link_causal(&mut store, sentence, &nodes).await;
        assert_eq!(causal.len(), 1);
        let edge = &store.all_edges()[0];
        assert!(edge.edge_type.is(StructuralEdge::ExplainCause));
        assert_eq!((edge.from, edge.to), (predicate, entity));

        let details = miner.link_details(&mut store, sentence, &nodes).await;
        assert_eq!(details.len(), 1);
        let edge = store.all_edges().last().unwrap();
        assert!(edge.edge_type.is(StructuralEdge::ExplainDetails));
        assert_eq!((edge.from, edge.to), (entity, predicate));
        assert!(store
            .trace()
            .lines()
            .contains(&"[ExplainTarget] 結果".to_string()));
    }
}
