//! Event ordering: `next_TimeStamp` edges between nodes of one item.
//!
//! For every pair `a < b` of scope nodes the score is
//!
//! ```text
//! score = bonus + cos(a, b) * temporal_proximity(a, b) * distributional_proximity(a, b)
//! ```
//!
//! where `cos` is the cosine similarity of term-frequency vectors over the
//! tokenized node texts, `temporal_proximity` decays with the id distance and
//! with the distance between the timestamp groups of `a` and `b`, and
//! `distributional_proximity` decays with the id distance relative to the
//! scope size. Pairs at or above the threshold get an edge `a -> b`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::collaborators::{NodeText, OrderingCandidate, OrderingReview, TextClassifier, Tokenizer};
use crate::config::TemporalConfig;
use crate::error::Result;
use crate::graph::{EdgeId, GraphStore, NodeId, Scope, StructuralEdge};

/// A node taking part in ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedNode {
    pub id: NodeId,
    /// Entity text or rendered predicate.
    pub text: String,
    /// Agent argument text; empty for entities.
    pub agent: String,
    pub is_predicate: bool,
}

/// Score components of one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    pub from: NodeId,
    pub to: NodeId,
    pub cosine: f64,
    pub temporal: f64,
    pub distributional: f64,
    pub bonus: f64,
    pub score: f64,
}

/// Result of one ordering run.
#[derive(Debug, Clone, Default)]
pub struct TemporalOutcome {
    /// Every scored pair, in `(from, to)` order.
    pub scores: Vec<PairScore>,
    /// Ids of the `next_TimeStamp` edges created.
    pub edges: Vec<EdgeId>,
    /// Accepted `(from, to)` pairs.
    pub accepted: Vec<(NodeId, NodeId)>,
    /// Directly missing orderings reported by the consistency check.
    pub findings: Vec<OrderingCandidate>,
}

// ============================================================================
// Timestamp groups
// ============================================================================

/// Assignment of nodes to the nearest preceding timestamp node.
#[derive(Debug, Clone, Default)]
pub struct TimestampGroups {
    /// Timestamp node ids ascending; the position is the rank.
    timestamps: Vec<NodeId>,
    representative: HashMap<NodeId, NodeId>,
    sizes: HashMap<NodeId, usize>,
}

impl TimestampGroups {
    /// Group `nodes` under `timestamps`.
    ///
    /// A node belongs to the timestamp with the largest id not above its own.
    /// Nodes preceding every timestamp belong to the first one.
    pub fn new(nodes: &[NodeId], timestamps: &[NodeId]) -> Self {
        let timestamps: Vec<NodeId> = timestamps
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if timestamps.is_empty() {
            return Self::default();
        }

        let mut representative = HashMap::new();
        let mut sizes: HashMap<NodeId, usize> = HashMap::new();
        for &id in nodes {
            let pos = timestamps.partition_point(|&t| t <= id);
            let rep = timestamps[pos.saturating_sub(1)];
            representative.insert(id, rep);
            *sizes.entry(rep).or_default() += 1;
        }

        Self {
            timestamps,
            representative,
            sizes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamp_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn representative(&self, id: NodeId) -> Option<NodeId> {
        self.representative.get(&id).copied()
    }

    pub fn group_size(&self, id: NodeId) -> usize {
        self.representative(id)
            .and_then(|rep| self.sizes.get(&rep).copied())
            .unwrap_or(0)
    }

    fn rank(&self, timestamp: NodeId) -> usize {
        self.timestamps.binary_search(&timestamp).unwrap_or(0)
    }

    /// Decay over id distance and timestamp distance, for `a < b`.
    pub fn temporal_proximity(&self, a: NodeId, b: NodeId, config: &TemporalConfig) -> f64 {
        if self.is_empty() {
            return 1.0;
        }
        let m = b.saturating_sub(a) as f64;
        let span = config.timestamp_span;

        let distance = match (self.representative(a), self.representative(b)) {
            (Some(ra), Some(rb)) if ra == rb => {
                let size = self.group_size(a);
                if size > config.large_group_size {
                    span / (size - 1) as f64 * m
                } else {
                    config.intra_group_scale * m
                }
            }
            (Some(ra), Some(rb)) => {
                let rank_gap = self.rank(ra).abs_diff(self.rank(rb)) as f64;
                config.intra_group_scale * m + span * rank_gap
            }
            _ => config.intra_group_scale * m,
        };

        let total = self.timestamp_count() as f64 * span;
        (-0.5 * distance / total).exp()
    }
}

/// `exp(-0.5 * |b - a| / n)`.
pub fn distributional_proximity(a: NodeId, b: NodeId, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (-0.5 * a.abs_diff(b) as f64 / n as f64).exp()
}

/// Rule bonus for adjacent ids, doubled when the agent texts are equal.
///
/// The comparison is exact, so two agentless predicates count as sharing an agent.
pub fn adjacency_bonus(a: &OrderedNode, b: &OrderedNode, config: &TemporalConfig) -> f64 {
    if b.id.checked_sub(a.id) != Some(1) {
        return 0.0;
    }
    let mut bonus = config.adjacency_bonus;
    if a.agent == b.agent {
        bonus += config.same_agent_bonus;
    }
    bonus
}

// ============================================================================
// Term vectors
// ============================================================================

/// Term-frequency vectors normalized by the maximum count of each document,
/// optionally weighted by `ln(N / df)`.
pub fn term_vectors(documents: &[Vec<String>], use_idf: bool) -> Vec<HashMap<String, f64>> {
    let n = documents.len() as f64;
    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in documents {
        let unique: BTreeSet<&str> = doc.iter().map(String::as_str).collect();
        for token in unique {
            *df.entry(token).or_default() += 1;
        }
    }

    documents
        .iter()
        .map(|doc| {
            let mut counts: HashMap<String, f64> = HashMap::new();
            for token in doc {
                *counts.entry(token.clone()).or_default() += 1.0;
            }
            let max = counts.values().copied().fold(0.0, f64::max);
            for (token, value) in counts.iter_mut() {
                *value /= max;
                if use_idf {
                    let freq = df.get(token.as_str()).copied().unwrap_or(1) as f64;
                    *value *= (n / freq).ln();
                }
            }
            counts
        })
        .collect()
}

pub fn sparse_cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(token, x)| b.get(token).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

// ============================================================================
// Engine
// ============================================================================

/// Scores ordering candidates of an item and appends `next_TimeStamp` edges.
pub struct TemporalEngine {
    tokenizer: Arc<dyn Tokenizer>,
    classifier: Option<Arc<dyn TextClassifier>>,
    config: TemporalConfig,
}

impl TemporalEngine {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: TemporalConfig) -> Self {
        Self {
            tokenizer,
            classifier: None,
            config,
        }
    }

    /// Review accepted orderings with `classifier` when `consistency_check` is on.
    pub fn with_classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Predicate nodes of the scope (and entities if configured), ascending id.
    pub fn gather(&self, store: &GraphStore, scope: &Scope) -> Vec<OrderedNode> {
        let mut nodes: Vec<OrderedNode> = store
            .predicates_in(scope)
            .map(|n| OrderedNode {
                id: n.id,
                text: n.render(),
                agent: n.agent_text().to_string(),
                is_predicate: true,
            })
            .collect();
        if self.config.include_entities {
            nodes.extend(store.entities_in(scope).map(|n| OrderedNode {
                id: n.id,
                text: n.text.clone(),
                agent: String::new(),
                is_predicate: false,
            }));
        }
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    /// From-endpoints of the scope's `info_SpecificTime` edges.
    pub fn timestamps(store: &GraphStore, scope: &Scope) -> Vec<NodeId> {
        store
            .edges_in(scope)
            .filter(|e| e.edge_type.is(StructuralEdge::SpecificTime))
            .map(|e| e.from)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Order the nodes of an item scope; `text` is the item's source text.
    ///
    /// A tokenizer failure is logged and yields an empty outcome.
    pub async fn run(&self, store: &mut GraphStore, scope: &Scope, text: &str) -> TemporalOutcome {
        let nodes = self.gather(store, scope);
        if nodes.len() < 2 {
            return TemporalOutcome::default();
        }

        let documents = match self.tokenize(&nodes).await {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!("Temporal ordering skipped for '{}': {}", scope.label, e);
                store
                    .trace()
                    .line(format!("[TEMPORAL ERROR] {}: {}", scope.label, e));
                return TemporalOutcome::default();
            }
        };

        let ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        let groups = TimestampGroups::new(&ids, &Self::timestamps(store, scope));
        let scores = self.score_pairs(&nodes, &documents, &groups);

        let mut outcome = TemporalOutcome::default();
        for pair in &scores {
            store.trace().line(format!(
                "[TEMPORAL] {} -> {} cos={:.3} tp={:.3} dp={:.3} bonus={:.1} score={:.3}",
                pair.from, pair.to, pair.cosine, pair.temporal, pair.distributional, pair.bonus,
                pair.score
            ));
            if pair.score >= self.config.threshold {
                outcome
                    .edges
                    .push(store.append_edge(StructuralEdge::NextTimeStamp, pair.from, pair.to));
                outcome.accepted.push((pair.from, pair.to));
            }
        }
        outcome.scores = scores;

        tracing::debug!(
            "Temporal ordering over '{}': {} nodes, {} edges",
            scope.label,
            nodes.len(),
            outcome.edges.len()
        );

        if self.config.consistency_check && !outcome.accepted.is_empty() {
            outcome.findings = self.review(store, &nodes, &outcome.accepted, text).await;
        }
        outcome
    }

    /// Score every pair `a < b`.
    pub fn score_pairs(
        &self,
        nodes: &[OrderedNode],
        documents: &[Vec<String>],
        groups: &TimestampGroups,
    ) -> Vec<PairScore> {
        let vectors = term_vectors(documents, self.config.use_idf);
        let n = nodes.len();

        let mut scores = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&nodes[i], &nodes[j]);
                let cosine = sparse_cosine(&vectors[i], &vectors[j]);
                let temporal = groups.temporal_proximity(a.id, b.id, &self.config);
                let distributional = distributional_proximity(a.id, b.id, n);
                let bonus = adjacency_bonus(a, b, &self.config);
                scores.push(PairScore {
                    from: a.id,
                    to: b.id,
                    cosine,
                    temporal,
                    distributional,
                    bonus,
                    score: bonus + cosine * temporal * distributional,
                });
            }
        }
        scores
    }

    async fn tokenize(&self, nodes: &[OrderedNode]) -> Result<Vec<Vec<String>>> {
        let mut documents = Vec::with_capacity(nodes.len());
        for node in nodes {
            let mut tokens: Vec<String> = self
                .tokenizer
                .tokenize(&node.text)
                .await?
                .into_iter()
                .filter(|t| !self.config.stop_words.contains(t))
                .collect();
            // the trailing lemma repeats the predicate
            if node.is_predicate {
                tokens.pop();
            }
            documents.push(tokens);
        }
        Ok(documents)
    }

    async fn review(
        &self,
        store: &GraphStore,
        nodes: &[OrderedNode],
        accepted: &[(NodeId, NodeId)],
        text: &str,
    ) -> Vec<OrderingCandidate> {
        let Some(classifier) = &self.classifier else {
            return Vec::new();
        };
        let review = OrderingReview {
            text: text.to_string(),
            nodes: nodes.iter().map(|n| NodeText::new(n.id, &n.text)).collect(),
            accepted: accepted.to_vec(),
        };

        match classifier.check_ordering(&review).await {
            Ok(findings) => {
                for f in &findings {
                    store.trace().line(format!(
                        "[ORDER CHECK] missing next_TimeStamp: [{}] -> [{}]",
                        store.lookup_text(f.from),
                        store.lookup_text(f.to)
                    ));
                }
                findings
            }
            Err(e) => {
                tracing::warn!("Ordering check failed: {}", e);
                store.trace().line(format!("[ORDER CHECK ERROR] {}", e));
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::stub::ScriptedClassifier;
    use crate::collaborators::CharNgramTokenizer;
    use crate::graph::ScopeKind;
    use crate::trace::TraceLog;

    fn node(id: NodeId, agent: &str) -> OrderedNode {
        OrderedNode {
            id,
            text: format!("node {}", id),
            agent: agent.to_string(),
            is_predicate: true,
        }
    }

    #[test]
    fn test_adjacent_same_agent_crosses_threshold() {
        let config = TemporalConfig::default();
        let a = node(5, "エスカレーター");
        let b = node(6, "エスカレーター");
        let groups = TimestampGroups::new(&[5, 6], &[]);

        assert_eq!(groups.temporal_proximity(5, 6, &config), 1.0);
        assert!((adjacency_bonus(&a, &b, &config) - 0.6).abs() < 1e-12);

        for n in 2..=50 {
            let dp = distributional_proximity(5, 6, n);
            assert!((dp - (-0.5 / n as f64).exp()).abs() < 1e-12);
            for cosine in [0.0, 0.5, 1.0] {
                let score = adjacency_bonus(&a, &b, &config) + cosine * dp;
                assert!(score >= config.threshold);
            }
        }
    }

    #[test]
    fn test_bonus_rules() {
        let config = TemporalConfig::default();
        assert_eq!(adjacency_bonus(&node(5, ""), &node(6, ""), &config), 0.6);
        assert_eq!(adjacency_bonus(&node(5, ""), &node(6, "a"), &config), 0.3);
        assert_eq!(adjacency_bonus(&node(5, "a"), &node(6, "b"), &config), 0.3);
        assert_eq!(adjacency_bonus(&node(5, "a"), &node(7, "a"), &config), 0.0);
    }

    #[test]
    fn test_timestamp_groups() {
        let config = TemporalConfig::default();
        let groups = TimestampGroups::new(&[2, 3, 4, 7, 8], &[3, 7]);

        assert_eq!(groups.representative(2), Some(3));
        assert_eq!(groups.representative(4), Some(3));
        assert_eq!(groups.representative(8), Some(7));
        assert_eq!(groups.group_size(4), 3);

        let total: f64 = 2.0 * 1000.0;
        let same = groups.temporal_proximity(3, 4, &config);
        assert!((same - (-0.5 * 100.0 / total).exp()).abs() < 1e-12);

        let across = groups.temporal_proximity(4, 7, &config);
        let expected = (-0.5 * (300.0 + 1000.0) / total).exp();
        assert!((across - expected).abs() < 1e-12);
        assert!(across < same);
    }

    #[test]
    fn test_large_group_spreads_distance() {
        let config = TemporalConfig::default();
        let ids: Vec<NodeId> = (1..=12).collect();
        let groups = TimestampGroups::new(&ids, &[1]);
        assert_eq!(groups.group_size(5), 12);

        let tp = groups.temporal_proximity(2, 4, &config);
        let expected = (-0.5_f64 * (1000.0 / 11.0 * 2.0) / 1000.0).exp();
        assert!((tp - expected).abs() < 1e-12);
    }

    #[test]
    fn test_term_vectors() {
        let docs = vec![
            vec!["停止".to_string(), "停止".to_string(), "逆走".to_string()],
            vec!["逆走".to_string()],
        ];
        let tf = term_vectors(&docs, false);
        assert_eq!(tf[0]["停止"], 1.0);
        assert_eq!(tf[0]["逆走"], 0.5);

        let tfidf = term_vectors(&docs, true);
        assert_eq!(tfidf[0]["逆走"], 0.0);
        assert!((tfidf[0]["停止"] - 2f64.ln()).abs() < 1e-12);
        assert_eq!(sparse_cosine(&tfidf[0], &tfidf[1]), 0.0);
    }

    #[tokio::test]
    async fn test_run_links_consecutive_predicates() {
        let mut store = GraphStore::new(TraceLog::in_memory());
        let handle = store.begin_scope(ScopeKind::Item, "事故の概要");
        let ids = store.create_predicates(&[
            "エスカレーター(ガ格), 自動停止し(述語)",
            "エスカレーター(ガ格), さらに(修飾), 効かず(述語)",
            "エスカレーター(ガ格), 逆走・降下した(述語)",
        ]);
        let scope = store.scope_view(&handle).unwrap();

        let classifier = Arc::new(ScriptedClassifier::new());
        let engine = TemporalEngine::new(
            Arc::new(CharNgramTokenizer::default()),
            TemporalConfig::default(),
        )
        .with_classifier(classifier.clone());

        let outcome = engine.run(&mut store, &scope, "本文。").await;
        assert_eq!(outcome.scores.len(), 3);
        assert!(outcome.accepted.contains(&(ids[0], ids[1])));
        assert!(outcome.accepted.contains(&(ids[1], ids[2])));
        assert_eq!(outcome.edges.len(), outcome.accepted.len());

        let reviews = classifier.reviews();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].accepted, outcome.accepted);
        assert!(store
            .trace()
            .lines()
            .iter()
            .any(|l| l.starts_with("[TEMPORAL] ")));
    }

    #[tokio::test]
    async fn test_findings_are_logged_not_materialized() {
        let mut store = GraphStore::new(TraceLog::in_memory());
        let handle = store.begin_scope(ScopeKind::Item, "item");
        let ids = store.create_predicates(&["電車(ガ格), 停止し(述語)", "電車(ガ格), 発車した(述語)"]);
        let scope = store.scope_view(&handle).unwrap();

        let classifier = Arc::new(ScriptedClassifier::new().with_ordering(vec![
            OrderingCandidate {
                from: ids[1],
                to: ids[0],
            },
        ]));
        let engine = TemporalEngine::new(
            Arc::new(CharNgramTokenizer::default()),
            TemporalConfig::default(),
        )
        .with_classifier(classifier);

        let edges_before = store.edge_count();
        let outcome = engine.run(&mut store, &scope, "").await;
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(store.edge_count(), edges_before + outcome.edges.len());
        assert!(store
            .trace()
            .lines()
            .iter()
            .any(|l| l.starts_with("[ORDER CHECK] missing next_TimeStamp")));
    }
}
