//! Fixed-response collaborators for tests and offline runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::{
    CausalRelation, DetailRelation, NodeText, OrderingCandidate, OrderingReview, RelationRequest,
    RelationResponse, SentenceStructures, TimePlace,
};
use super::{EmbeddingProvider, StructureExtractor, TextClassifier};
use crate::error::{CollaboratorError, Result};
use crate::text::SENTENCE_END;

// ============================================================================
// Embeddings
// ============================================================================

/// Embeddings looked up by exact text. Unknown texts embed as the zero vector.
#[derive(Debug, Clone, Default)]
pub struct StaticEmbeddings {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl StaticEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
        }
    }

    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| match self.vectors.get(text) {
                Some(v) if v.len() != self.dimension => Err(CollaboratorError::DimensionMismatch {
                    expected: self.dimension,
                    got: v.len(),
                }
                .into()),
                Some(v) => Ok(v.clone()),
                None => Ok(vec![0.0; self.dimension]),
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Bag of hashed character bigrams, L2-normalized. Needs no network.
#[derive(Debug, Clone)]
pub struct HashedCharEmbeddings {
    dimension: usize,
}

impl Default for HashedCharEmbeddings {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

impl HashedCharEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mut vector = vec![0.0f32; self.dimension];
        let grams: Vec<&[char]> = if chars.len() < 2 {
            vec![chars.as_slice()]
        } else {
            chars.windows(2).collect()
        };
        for gram in grams.into_iter().filter(|g| !g.is_empty()) {
            let bucket = (fnv1a(gram) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for c in chars {
        for byte in (*c as u32).to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashedCharEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedding provider that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingEmbeddings;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddings {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(CollaboratorError::Unavailable("embedding service offline".to_string()).into())
    }

    fn dimension(&self) -> usize {
        0
    }
}

// ============================================================================
// Sentence analysis
// ============================================================================

/// Structure extractor answering from a per-sentence script.
/// Unscripted sentences yield nothing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExtractor {
    scripts: HashMap<String, (TimePlace, SentenceStructures)>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a sentence. The key is matched with and without the trailing `。`.
    pub fn with_sentence(
        mut self,
        sentence: &str,
        time_place: TimePlace,
        structures: SentenceStructures,
    ) -> Self {
        self.scripts.insert(
            sentence.trim_end_matches(SENTENCE_END).to_string(),
            (time_place, structures),
        );
        self
    }

    fn lookup(&self, sentence: &str) -> Option<&(TimePlace, SentenceStructures)> {
        self.scripts.get(sentence.trim_end_matches(SENTENCE_END))
    }
}

#[async_trait]
impl StructureExtractor for ScriptedExtractor {
    async fn extract_time_and_place(&self, sentence: &str) -> Result<TimePlace> {
        Ok(self
            .lookup(sentence)
            .map(|(tp, _)| tp.clone())
            .unwrap_or_default())
    }

    async fn extract_structures(
        &self,
        sentence: &str,
        _time_place: &TimePlace,
    ) -> Result<SentenceStructures> {
        Ok(self
            .lookup(sentence)
            .map(|(_, s)| s.clone())
            .unwrap_or_default())
    }
}

/// Offline extractor: each sentence becomes a single entity.
#[derive(Debug, Clone, Default)]
pub struct SentenceAsEntity;

#[async_trait]
impl StructureExtractor for SentenceAsEntity {
    async fn extract_time_and_place(&self, _sentence: &str) -> Result<TimePlace> {
        Ok(TimePlace::default())
    }

    async fn extract_structures(
        &self,
        sentence: &str,
        _time_place: &TimePlace,
    ) -> Result<SentenceStructures> {
        let text = sentence.trim().trim_end_matches(SENTENCE_END).trim();
        Ok(SentenceStructures {
            predicates: Vec::new(),
            entities: if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            },
        })
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Classifier with canned answers that records every call.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    relations: RelationResponse,
    causal: HashMap<String, Vec<CausalRelation>>,
    details: HashMap<String, Vec<DetailRelation>>,
    ordering: Vec<OrderingCandidate>,
    fail: bool,
    calls: Mutex<Vec<String>>,
    reviews: Mutex<Vec<OrderingReview>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with [`CollaboratorError::Unavailable`].
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_relations(mut self, response: RelationResponse) -> Self {
        self.relations = response;
        self
    }

    pub fn with_causal(mut self, sentence: &str, relations: Vec<CausalRelation>) -> Self {
        self.causal.insert(
            sentence.trim_end_matches(SENTENCE_END).to_string(),
            relations,
        );
        self
    }

    pub fn with_details(mut self, sentence: &str, relations: Vec<DetailRelation>) -> Self {
        self.details.insert(
            sentence.trim_end_matches(SENTENCE_END).to_string(),
            relations,
        );
        self
    }

    pub fn with_ordering(mut self, candidates: Vec<OrderingCandidate>) -> Self {
        self.ordering = candidates;
        self
    }

    /// Names of the methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Ordering reviews received so far.
    pub fn reviews(&self) -> Vec<OrderingReview> {
        self.reviews.lock().clone()
    }

    fn record(&self, call: &str) -> Result<()> {
        self.calls.lock().push(call.to_string());
        if self.fail {
            return Err(CollaboratorError::Unavailable(format!("{} failed", call)).into());
        }
        Ok(())
    }
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    async fn discover_relations(&self, _request: &RelationRequest) -> Result<RelationResponse> {
        self.record("discover_relations")?;
        Ok(self.relations.clone())
    }

    async fn extract_causal(
        &self,
        sentence: &str,
        _nodes: &[NodeText],
    ) -> Result<Vec<CausalRelation>> {
        self.record("extract_causal")?;
        Ok(self
            .causal
            .get(sentence.trim_end_matches(SENTENCE_END))
            .cloned()
            .unwrap_or_default())
    }

    async fn extract_details(
        &self,
        sentence: &str,
        _nodes: &[NodeText],
    ) -> Result<Vec<DetailRelation>> {
        self.record("extract_details")?;
        Ok(self
            .details
            .get(sentence.trim_end_matches(SENTENCE_END))
            .cloned()
            .unwrap_or_default())
    }

    async fn check_ordering(&self, review: &OrderingReview) -> Result<Vec<OrderingCandidate>> {
        self.record("check_ordering")?;
        self.reviews.lock().push(review.clone());
        Ok(self.ordering.clone())
    }
}

/// Classifier that never finds anything.
#[derive(Debug, Clone, Default)]
pub struct SilentClassifier;

#[async_trait]
impl TextClassifier for SilentClassifier {
    async fn discover_relations(&self, _request: &RelationRequest) -> Result<RelationResponse> {
        Ok(RelationResponse::default())
    }

    async fn extract_causal(
        &self,
        _sentence: &str,
        _nodes: &[NodeText],
    ) -> Result<Vec<CausalRelation>> {
        Ok(Vec::new())
    }

    async fn extract_details(
        &self,
        _sentence: &str,
        _nodes: &[NodeText],
    ) -> Result<Vec<DetailRelation>> {
        Ok(Vec::new())
    }

    async fn check_ordering(&self, _review: &OrderingReview) -> Result<Vec<OrderingCandidate>> {
        Ok(Vec::new())
    }
}
