//! Similarity-based equivalence clustering.
//!
//! Every entity and predicate node of a scope is embedded; for each node the
//! other nodes are ranked by cosine similarity and those at or above the
//! threshold are registered as its children. One `equivalent` edge is emitted
//! per (parent, child) pair, so a pair that crosses the threshold from both
//! sides gets an edge in each direction.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::collaborators::{EmbeddingProvider, NodeText};
use crate::config::EquivalenceConfig;
use crate::error::{CollaboratorError, Result};
use crate::graph::{EdgeId, GraphStore, NodeId, Scope, StructuralEdge};
use crate::text::is_heading_start;

/// A ranked candidate of one base node.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: NodeId,
    pub text: String,
    pub score: f32,
}

/// Children registered for one parent node.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentEntry {
    pub parent: NodeText,
    pub children: Vec<Candidate>,
}

/// Result of one clustering run.
#[derive(Debug, Clone, Default)]
pub struct EquivalenceOutcome {
    /// Parent entries in node order; entries without children are kept.
    pub parents: Vec<ParentEntry>,
    /// Ids of the `equivalent` edges created.
    pub edges: Vec<EdgeId>,
    /// Per base node, the candidates at or above the report threshold, descending.
    pub report: Vec<(NodeText, Vec<Candidate>)>,
}

impl EquivalenceOutcome {
    /// `[SIMILARITY LOG] a --(equivalent)--> b (score=0.85)` lines.
    pub fn registration_lines(&self) -> Vec<String> {
        self.parents
            .iter()
            .flat_map(|entry| {
                entry.children.iter().map(move |child| {
                    format!(
                        "[SIMILARITY LOG] {} --(equivalent)--> {} (score={:.2})",
                        entry.parent.text, child.text, child.score
                    )
                })
            })
            .collect()
    }

    /// Human-readable similarity report.
    pub fn render_report(&self) -> String {
        let mut out = String::from("=== Similarity Calculation Report ===\n");
        for line in self.registration_lines() {
            let _ = writeln!(out, "{}", line);
        }
        for (base, candidates) in &self.report {
            let _ = writeln!(out, "\n[base node idx={}, text='{}'] :", base.id, base.text);
            for c in candidates {
                let _ = writeln!(
                    out,
                    "   -> score={:.3}, idx={}, text='{}'",
                    c.score, c.id, c.text
                );
            }
        }
        out
    }
}

/// Clusters near-duplicate nodes of a scope into `equivalent` edges.
pub struct EquivalenceEngine {
    embeddings: Arc<dyn EmbeddingProvider>,
    config: EquivalenceConfig,
}

impl EquivalenceEngine {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, config: EquivalenceConfig) -> Self {
        Self { embeddings, config }
    }

    /// Entity and predicate nodes of the scope with the text to embed.
    ///
    /// Predicates are rendered in sentence form. Bare heading markers up to
    /// `heading_max_len` characters are skipped.
    pub fn gather(&self, store: &GraphStore, scope: &Scope) -> Vec<NodeText> {
        let entities = store
            .entities_in(scope)
            .map(|n| NodeText::new(n.id, n.text.trim()));
        let predicates = store
            .predicates_in(scope)
            .map(|n| NodeText::new(n.id, n.render().trim()));

        entities
            .chain(predicates)
            .filter(|n| {
                !(is_heading_start(&n.text) && n.text.chars().count() <= self.config.heading_max_len)
            })
            .collect()
    }

    /// Cluster the scope and append the `equivalent` edges.
    ///
    /// An embedding failure is logged and yields an empty outcome.
    pub async fn run(&self, store: &mut GraphStore, scope: &Scope) -> EquivalenceOutcome {
        let nodes = self.gather(store, scope);
        if nodes.len() < 2 {
            return EquivalenceOutcome::default();
        }

        let matrix = match self.similarities(&nodes).await {
            Ok(matrix) => matrix,
            Err(e) => {
                tracing::warn!("Similarity check skipped for scope '{}': {}", scope.label, e);
                store
                    .trace()
                    .line(format!("[SIMILARITY ERROR] {}: {}", scope.label, e));
                return EquivalenceOutcome::default();
            }
        };

        let ranked = rank_candidates(&nodes, &matrix);
        let parents = cluster(&nodes, &ranked, self.config.threshold);

        let mut edges = Vec::new();
        for entry in &parents {
            for child in &entry.children {
                edges.push(store.append_edge(StructuralEdge::Equivalent, entry.parent.id, child.id));
            }
        }

        let report = nodes
            .iter()
            .zip(ranked)
            .filter_map(|(node, candidates)| {
                let above: Vec<Candidate> = candidates
                    .into_iter()
                    .filter(|c| c.score >= self.config.report_threshold)
                    .collect();
                (!above.is_empty()).then(|| (node.clone(), above))
            })
            .collect();

        tracing::debug!(
            "Equivalence over '{}': {} nodes, {} edges",
            scope.label,
            nodes.len(),
            edges.len()
        );

        EquivalenceOutcome {
            parents,
            edges,
            report,
        }
    }

    async fn similarities(&self, nodes: &[NodeText]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = nodes.iter().map(|n| n.text.clone()).collect();
        let vectors = self.embeddings.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(CollaboratorError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))
            .into());
        }
        Ok(similarity_matrix(&vectors))
    }
}

/// Full pairwise cosine similarity matrix.
pub fn similarity_matrix(vectors: &[Vec<f32>]) -> Vec<Vec<f32>> {
    vectors
        .iter()
        .map(|a| vectors.iter().map(|b| cosine_similarity(a, b)).collect())
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// For each node, every other node sorted by descending similarity.
pub fn rank_candidates(nodes: &[NodeText], matrix: &[Vec<f32>]) -> Vec<Vec<Candidate>> {
    (0..nodes.len())
        .map(|i| {
            let mut candidates: Vec<Candidate> = (0..nodes.len())
                .filter(|&j| j != i)
                .map(|j| Candidate {
                    id: nodes[j].id,
                    text: nodes[j].text.clone(),
                    score: matrix[i][j],
                })
                .collect();
            candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
            candidates
        })
        .collect()
}

/// Register children at or above `threshold`, walking each ranked list until
/// the first candidate below it.
pub fn cluster(nodes: &[NodeText], ranked: &[Vec<Candidate>], threshold: f32) -> Vec<ParentEntry> {
    let mut parents: Vec<ParentEntry> = Vec::new();

    for (node, candidates) in nodes.iter().zip(ranked) {
        let pos = match parents.iter().position(|p| p.parent.id == node.id) {
            Some(pos) => pos,
            None => {
                parents.push(ParentEntry {
                    parent: node.clone(),
                    children: Vec::new(),
                });
                parents.len() - 1
            }
        };
        let entry = &mut parents[pos];

        for candidate in candidates {
            if candidate.score < threshold {
                break;
            }
            if !entry.children.iter().any(|c| c.id == candidate.id) {
                entry.children.push(candidate.clone());
            }
        }
    }

    parents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::stub::{FailingEmbeddings, StaticEmbeddings};
    use crate::graph::ScopeKind;
    use crate::trace::TraceLog;

    fn similar_pair() -> (Vec<f32>, Vec<f32>) {
        let s = 0.85f32;
        (vec![1.0, 0.0], vec![s, (1.0 - s * s).sqrt()])
    }

    #[test]
    fn test_cluster_both_directions() {
        let nodes = vec![NodeText::new(1, "A"), NodeText::new(2, "B")];
        let matrix = vec![vec![1.0, 0.85], vec![0.85, 1.0]];
        let ranked = rank_candidates(&nodes, &matrix);
        let parents = cluster(&nodes, &ranked, 0.8);

        assert_eq!(parents.len(), 2);
        assert_eq!(parents[0].children[0].id, 2);
        assert_eq!(parents[1].children[0].id, 1);
    }

    #[test]
    fn test_cluster_stops_below_threshold() {
        let nodes = vec![
            NodeText::new(1, "A"),
            NodeText::new(2, "B"),
            NodeText::new(3, "C"),
        ];
        let matrix = vec![
            vec![1.0, 0.79, 0.95],
            vec![0.79, 1.0, 0.1],
            vec![0.95, 0.1, 1.0],
        ];
        let ranked = rank_candidates(&nodes, &matrix);
        assert_eq!(ranked[0][0].id, 3);
        assert_eq!(ranked[0][1].id, 2);

        let parents = cluster(&nodes, &ranked, 0.8);
        let ids: Vec<_> = parents[0].children.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3]);
        assert!(parents[1].children.is_empty());
    }

    #[tokio::test]
    async fn test_run_emits_equivalent_edges_in_both_directions() {
        let (a, b) = similar_pair();
        let embeddings = StaticEmbeddings::new(2)
            .with("電車が遅延した", a)
            .with("電車の遅延", b);
        let engine = EquivalenceEngine::new(Arc::new(embeddings), EquivalenceConfig::default());

        let mut store = GraphStore::new(TraceLog::in_memory());
        let handle = store.begin_scope(ScopeKind::Document, "doc");
        let first = store.create_entity("電車が遅延した");
        let second = store.create_entity("電車の遅延");
        store.create_entity("・");
        let scope = store.close_scope(handle).unwrap();

        let outcome = engine.run(&mut store, &scope).await;
        assert_eq!(outcome.edges.len(), 2);

        let pairs: Vec<_> = store
            .all_edges()
            .iter()
            .filter(|e| e.edge_type.is(StructuralEdge::Equivalent))
            .map(|e| (e.from, e.to))
            .collect();
        assert_eq!(pairs, vec![(first, second), (second, first)]);

        let lines = outcome.registration_lines();
        assert_eq!(
            lines[0],
            "[SIMILARITY LOG] 電車が遅延した --(equivalent)--> 電車の遅延 (score=0.85)"
        );
        assert_eq!(outcome.report.len(), 2);
        assert!(outcome.render_report().contains("idx=2"));
    }

    #[tokio::test]
    async fn test_gather_skips_short_headings() {
        let engine = EquivalenceEngine::new(
            Arc::new(StaticEmbeddings::new(2)),
            EquivalenceConfig::default(),
        );
        let mut store = GraphStore::new(TraceLog::in_memory());
        let handle = store.begin_scope(ScopeKind::Document, "doc");
        store.create_entity("1.");
        store.create_entity("注");
        store.create_entity("荷重オーバー");
        store.create_predicates(&["エスカレーター(ガ格), 停止し(述語)"]);
        let scope = store.close_scope(handle).unwrap();

        let texts: Vec<_> = engine
            .gather(&store, &scope)
            .into_iter()
            .map(|n| n.text)
            .collect();
        assert_eq!(texts, vec!["荷重オーバー", "エスカレーターが停止し"]);
    }

    #[tokio::test]
    async fn test_embedding_failure_yields_empty_outcome() {
        let engine = EquivalenceEngine::new(Arc::new(FailingEmbeddings), EquivalenceConfig::default());
        let mut store = GraphStore::new(TraceLog::in_memory());
        let handle = store.begin_scope(ScopeKind::Document, "doc");
        store.create_entity("a");
        store.create_entity("b");
        let scope = store.close_scope(handle).unwrap();

        let outcome = engine.run(&mut store, &scope).await;
        assert!(outcome.edges.is_empty());
        assert_eq!(store.edge_count(), 0);
        assert!(store
            .trace()
            .lines()
            .iter()
            .any(|l| l.starts_with("[SIMILARITY ERROR]")));
    }
}
