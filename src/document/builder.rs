//! JSON report walker.

use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::analysis::{
    DiscoveryOutcome, EquivalenceEngine, EquivalenceOutcome, RelationMiner, TemporalEngine,
    TemporalOutcome,
};
use crate::collaborators::{
    Collaborators, NodeText, StructureExtractor, TimePlace, TokenUsage, UsageSnapshot,
};
use crate::config::Config;
use crate::error::{GraphError, Result};
use crate::graph::{
    CategoryType, GraphStore, ItemWindow, NodeId, Scope, ScopeKind, StructuralEdge,
};
use crate::text::{char_offset, residue, split_heading_and_rest, split_sentences, SENTENCE_END};
use crate::trace::TraceLog;

/// Offset given to expressions not found in their sentence.
const UNKNOWN_OFFSET: usize = 999_999;

/// Analyses run when an item is finalized.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub label: String,
    pub temporal: TemporalOutcome,
    pub discovery: DiscoveryOutcome,
}

/// Result of one document.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub name: String,
    /// Everything created while the document was processed.
    pub scope: Scope,
    pub items: Vec<ItemReport>,
    pub equivalence: EquivalenceOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailKind {
    Time,
    Place,
    Predicate,
    Entity,
}

/// A node created for a sentence, with its position in the sentence.
#[derive(Debug, Clone)]
struct SentenceNode {
    id: NodeId,
    text: String,
    offset: usize,
    kind: DetailKind,
}

/// Builds the graph from nested JSON reports.
pub struct DocumentBuilder {
    store: GraphStore,
    extractor: Arc<dyn StructureExtractor>,
    relations: RelationMiner,
    equivalence: EquivalenceEngine,
    temporal: TemporalEngine,
    item: Option<ItemWindow>,
    finished_items: Vec<ItemReport>,
    usage: TokenUsage,
}

impl DocumentBuilder {
    pub fn new(config: &Config, collaborators: Collaborators, trace: TraceLog) -> Self {
        let mut temporal = TemporalEngine::new(collaborators.tokenizer, config.temporal.clone());
        if config.temporal.consistency_check {
            temporal = temporal.with_classifier(collaborators.classifier.clone());
        }

        Self {
            store: GraphStore::new(trace),
            extractor: collaborators.extractor,
            relations: RelationMiner::new(collaborators.classifier),
            equivalence: EquivalenceEngine::new(
                collaborators.embeddings,
                config.equivalence.clone(),
            ),
            temporal,
            item: None,
            finished_items: Vec::new(),
            usage: collaborators.usage,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn into_store(self) -> GraphStore {
        self.store
    }

    /// Tokens spent by the API collaborators so far.
    pub fn token_usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    /// Process a JSON report file; the root category is named after the file stem.
    pub async fn process_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<DocumentReport>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.process_json(&value, &name).await
    }

    /// Process a parsed report. Each top-level key is one document.
    pub async fn process_json(&mut self, value: &Value, name: &str) -> Result<Vec<DocumentReport>> {
        let documents = value.as_object().ok_or_else(|| {
            GraphError::InvalidInput(format!("'{}': top level must be a JSON object", name))
        })?;

        let root = self
            .store
            .create_category(name, 3, CategoryType::Collection);
        self.store
            .trace()
            .line(format!("[category] '{}' (level=3, {})", name, CategoryType::Collection));

        let mut reports = Vec::with_capacity(documents.len());
        for (doc_name, doc_value) in documents {
            reports.push(self.process_document(root, doc_name, doc_value).await?);
        }

        let usage = self.usage.snapshot();
        self.store.trace().line(format!(
            "[TOKEN USAGE] '{}': {} calls, {} tokens in total",
            name, usage.calls, usage.tokens
        ));
        self.store.trace().flush();
        Ok(reports)
    }

    async fn process_document(
        &mut self,
        root: NodeId,
        name: &str,
        value: &Value,
    ) -> Result<DocumentReport> {
        tracing::info!("Processing document '{}'", name);
        let handle = self.store.begin_scope(ScopeKind::Document, name);

        let doc = self.store.create_category(name, 2, CategoryType::Document);
        self.store
            .trace()
            .line(format!("[category] '{}' (level=2, {})", name, CategoryType::Document));
        self.store.append_edge(StructuralEdge::Sub, root, doc);

        // a body without keys is one item named after the document
        if !value.is_object() {
            self.item = Some(ItemWindow::open(&mut self.store, name));
        }
        self.process_value(None, value, doc, 1).await?;
        self.finish_item().await?;

        let view = self.store.scope_view(&handle)?;
        let equivalence = self.equivalence.run(&mut self.store, &view).await;
        let scope = self.store.close_scope(handle)?;

        let trace = self.store.trace();
        for line in results_dump(&self.store, &scope) {
            trace.line(line);
        }
        for line in equivalence.registration_lines() {
            trace.line(line);
        }
        trace.line(equivalence.render_report());

        tracing::info!(
            "Document '{}': {} nodes, {} edges",
            name,
            scope.node_ids.len(),
            scope.edge_ids.len()
        );

        Ok(DocumentReport {
            name: name.to_string(),
            scope,
            items: std::mem::take(&mut self.finished_items),
            equivalence,
        })
    }

    /// Walk one JSON value. `level` is the level a category for `key` gets.
    fn process_value<'a>(
        &'a mut self,
        key: Option<&'a str>,
        value: &'a Value,
        parent: NodeId,
        level: u32,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut current = parent;
            let mut child_level = level;

            if let Some(key) = key {
                if level == 1 {
                    self.finish_item().await?;
                    self.item = Some(ItemWindow::open(&mut self.store, key));
                }
                self.store
                    .trace()
                    .line(format!("[category(level={})] {}", level, key));
                current = self.store.create_category(key, level, CategoryType::Item);
                self.store.append_edge(StructuralEdge::Sub, parent, current);
                child_level = level.saturating_sub(1);
            }

            match value {
                Value::Object(map) => {
                    for (k, v) in map {
                        self.process_value(Some(k.as_str()), v, current, child_level)
                            .await?;
                    }
                }
                Value::Array(items) => {
                    for v in items {
                        self.process_value(None, v, current, child_level).await?;
                    }
                }
                Value::String(text) => self.process_leaf(text, current).await?,
                Value::Null => {}
                other => self.process_leaf(&other.to_string(), current).await?,
            }
            Ok(())
        })
    }

    async fn process_leaf(&mut self, value: &str, category: NodeId) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            tracing::debug!("Skipping empty value");
            return Ok(());
        }

        let mut created = Vec::new();
        match split_heading_and_rest(value) {
            Some((prefix, rest)) => {
                self.store
                    .trace()
                    .line(format!("[entity(only heading prefix)] {}", prefix));
                created.push(self.store.create_entity(prefix.clone()));

                if rest.contains(SENTENCE_END) {
                    for sentence in split_sentences(&rest) {
                        created.extend(self.process_sentence(&sentence).await?);
                    }
                } else if !rest.is_empty() {
                    let text = format!("{}{}", prefix, rest);
                    self.store
                        .trace()
                        .line(format!("[entity(with heading)] {}", text));
                    created.push(self.store.create_entity(text));
                }
            }
            None if value.contains(SENTENCE_END) => {
                for sentence in split_sentences(value) {
                    created.extend(self.process_sentence(&sentence).await?);
                }
            }
            None => {
                self.store.trace().line(format!("[entity] {}", value));
                created.push(self.store.create_entity(value));
            }
        }

        for id in created {
            self.store.append_edge(StructuralEdge::Sub, category, id);
        }
        Ok(())
    }

    /// Nodes and edges of one sentence. Returns the created node ids.
    async fn process_sentence(&mut self, sentence: &str) -> Result<Vec<NodeId>> {
        self.store.trace().line(format!("\n[sentence] {}", sentence));

        let time_place = match self.extractor.extract_time_and_place(sentence).await {
            Ok(tp) => tp,
            Err(e) => {
                self.collaborator_failure("time/place extraction", &e);
                TimePlace::default()
            }
        };
        let structures = match self
            .extractor
            .extract_structures(sentence, &time_place)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                self.collaborator_failure("structure extraction", &e);
                Default::default()
            }
        };

        let mut nodes = Vec::new();
        for (texts, kind) in [
            (&time_place.time, DetailKind::Time),
            (&time_place.place, DetailKind::Place),
        ] {
            for text in texts {
                let id = self.store.create_entity(text.as_str());
                nodes.push(SentenceNode {
                    id,
                    text: text.clone(),
                    offset: char_offset(sentence, text).unwrap_or(UNKNOWN_OFFSET),
                    kind,
                });
            }
        }

        for (i, raw) in structures.predicates.iter().enumerate() {
            self.store.trace().line(format!("({}) {}", i + 1, raw));
        }
        let predicate_ids = self.store.create_predicates(&structures.predicates);
        for id in predicate_ids {
            let text = self
                .store
                .predicate(id)
                .map(|p| p.predicate_text().to_string())
                .unwrap_or_default();
            nodes.push(SentenceNode {
                id,
                offset: char_offset(sentence, &text).unwrap_or(UNKNOWN_OFFSET),
                text,
                kind: DetailKind::Predicate,
            });
        }

        for text in &structures.entities {
            let id = self.store.create_entity(text.as_str());
            nodes.push(SentenceNode {
                id,
                text: text.clone(),
                offset: char_offset(sentence, text).unwrap_or(UNKNOWN_OFFSET),
                kind: DetailKind::Entity,
            });
        }

        if structures.predicates.is_empty() {
            self.store
                .trace()
                .line("[residue] no predicate structures, skipped");
        } else {
            self.store.trace().line(format!(
                "[residue] {}",
                residue(sentence, &structures.predicates)
            ));
        }

        for (from, to, edge) in link_time_and_place(&nodes) {
            self.store.append_edge(edge, from, to);
        }

        if let Some(item) = self.item.as_mut() {
            item.push_sentence(sentence)?;
        }

        let texts: Vec<NodeText> = nodes.iter().map(|n| NodeText::new(n.id, &n.text)).collect();
        self.relations
            .link_causal(&mut self.store, sentence, &texts)
            .await;
        self.relations
            .link_details(&mut self.store, sentence, &texts)
            .await;

        Ok(nodes.into_iter().map(|n| n.id).collect())
    }

    /// Finalize the pending item: ordering, then relation discovery.
    async fn finish_item(&mut self) -> Result<()> {
        let Some(mut item) = self.item.take() else {
            return Ok(());
        };
        let snapshot = match item.finalize(&self.store) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                item.abandon(&mut self.store);
                return Err(e);
            }
        };
        tracing::debug!("Finalizing item '{}'", item.label());

        let temporal = self
            .temporal
            .run(&mut self.store, &snapshot.scope, &snapshot.text)
            .await;
        let discovery = self
            .relations
            .discover(&mut self.store, &snapshot.scope, &snapshot.text)
            .await;
        item.clear(&mut self.store)?;

        self.finished_items.push(ItemReport {
            label: item.label().to_string(),
            temporal,
            discovery,
        });
        Ok(())
    }

    fn collaborator_failure(&self, what: &str, error: &GraphError) {
        tracing::warn!("{} failed: {}", what, error);
        self.store
            .trace()
            .line(format!("[ERROR] {} failed: {}", what, error));
    }
}

/// `info_SpecificTime` / `info_SpecificPlace` edges of a sentence.
///
/// Nodes are ordered by offset (stable); every time or place node is attached
/// to the first predicate or entity that follows it, as `(from, to, type)`
/// with the predicate or entity as `from`.
fn link_time_and_place(nodes: &[SentenceNode]) -> Vec<(NodeId, NodeId, StructuralEdge)> {
    let mut sorted: Vec<&SentenceNode> = nodes.iter().collect();
    sorted.sort_by_key(|n| n.offset);

    let mut links = Vec::new();
    for (i, node) in sorted.iter().enumerate() {
        let edge = match node.kind {
            DetailKind::Time => StructuralEdge::SpecificTime,
            DetailKind::Place => StructuralEdge::SpecificPlace,
            _ => continue,
        };
        let target = sorted[i + 1..].iter().find(|n| {
            matches!(n.kind, DetailKind::Predicate | DetailKind::Entity) && n.offset >= node.offset
        });
        if let Some(target) = target {
            links.push((target.id, node.id, edge));
        }
    }
    links
}

/// Per-document listing of categories, entities, predicates and edges.
fn results_dump(store: &GraphStore, scope: &Scope) -> Vec<String> {
    let mut lines = vec![format!(
        "===== [parsing results for document: {}] =====",
        scope.label
    )];

    lines.push("[Category Nodes]".to_string());
    lines.extend(store.categories_in(scope).map(|c| {
        format!(
            "  ({}) level={} type={} title={}",
            c.id, c.hierarchical_level, c.category_type, c.title
        )
    }));

    lines.push("[Entity Nodes]".to_string());
    lines.extend(
        store
            .entities_in(scope)
            .map(|e| format!("  ({}) level={} {}", e.id, e.hierarchical_level, e.text)),
    );

    lines.push("[Predicate Nodes]".to_string());
    lines.extend(store.predicates_in(scope).map(|p| {
        let s = &p.structure;
        format!(
            "  ({}) agent={} predicate={} arguments=[{}] modifier={}",
            p.id,
            s.agent_display(),
            s.predicate_display(),
            s.arguments_display(),
            s.modifier_display()
        )
    }));

    lines.push("[Edges]".to_string());
    lines.extend(store.edges_in(scope).map(|e| {
        format!(
            "  ({}) [{}] --({})--> [{}]",
            e.id,
            store.lookup_text(e.from),
            e.edge_type,
            store.lookup_text(e.to)
        )
    }));
    lines
}
