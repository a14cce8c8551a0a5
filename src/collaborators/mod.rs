//! External collaborators: sentence analysis, text classification,
//! embeddings and tokenization.
//!
//! The graph core only depends on the traits defined here. Implementations:
//!
//! - [`OpenAiClient`]: OpenAI-compatible chat completions for
//!   [`StructureExtractor`] and [`TextClassifier`].
//! - [`OpenAiEmbeddings`]: OpenAI-compatible `/embeddings` endpoint.
//! - [`LinderaTokenizer`]: IPADIC morphological analyser producing lemmas.
//! - [`CharNgramTokenizer`]: local character-bigram tokenizer for offline runs.
//! - [`TokenUsage`]: token ledger shared by the API clients.
//! - [`stub`]: fixed-response implementations for tests and offline runs.

mod embedding;
mod openai;
pub mod parse;
pub mod stub;
mod tokenizer;
mod types;
mod usage;

pub use embedding::OpenAiEmbeddings;
pub use openai::OpenAiClient;
#[cfg(feature = "morphology")]
pub use tokenizer::LinderaTokenizer;
pub use tokenizer::CharNgramTokenizer;
pub use types::*;
pub use usage::{TokenUsage, UsageSnapshot};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;

/// Dense text embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed each text. The result has one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding dimension.
    fn dimension(&self) -> usize;
}

/// Morphological tokenizer producing lemma tokens.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    async fn tokenize(&self, text: &str) -> Result<Vec<String>>;
}

/// Sentence-level analysis.
#[async_trait]
pub trait StructureExtractor: Send + Sync {
    /// Time and place noun phrases of a sentence.
    async fn extract_time_and_place(&self, sentence: &str) -> Result<TimePlace>;

    /// Raw predicate-argument structure strings and entity texts of a sentence.
    async fn extract_structures(
        &self,
        sentence: &str,
        time_place: &TimePlace,
    ) -> Result<SentenceStructures>;
}

/// Relation classification over nodes of a scope.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Propose new relation labels and typed edges for a scope.
    async fn discover_relations(&self, request: &RelationRequest) -> Result<RelationResponse>;

    /// Causal relations between the nodes created for one sentence.
    async fn extract_causal(&self, sentence: &str, nodes: &[NodeText])
        -> Result<Vec<CausalRelation>>;

    /// Explanatory relations between the nodes created for one sentence.
    async fn extract_details(
        &self,
        sentence: &str,
        nodes: &[NodeText],
    ) -> Result<Vec<DetailRelation>>;

    /// Directly missing orderings given the accepted `next_TimeStamp` pairs.
    async fn check_ordering(&self, review: &OrderingReview) -> Result<Vec<OrderingCandidate>>;
}

/// The collaborator set used by the document walker.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn StructureExtractor>,
    pub classifier: Arc<dyn TextClassifier>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub tokenizer: Arc<dyn Tokenizer>,
    /// Tokens spent by the API clients; stays at zero for local collaborators.
    pub usage: TokenUsage,
}

impl Collaborators {
    /// OpenAI-compatible chat and embedding endpoints, morphological tokenizer.
    pub fn from_config(config: &Config) -> Result<Self> {
        let usage = TokenUsage::new();
        let client =
            Arc::new(OpenAiClient::from_config(&config.llm)?.with_usage(usage.clone()));
        let embeddings =
            OpenAiEmbeddings::from_config(&config.embedding)?.with_usage(usage.clone());
        Ok(Self {
            extractor: client.clone(),
            classifier: client,
            embeddings: Arc::new(embeddings),
            tokenizer: default_tokenizer()?,
            usage,
        })
    }

    /// No network: whole sentences as entities, hashed bigram embeddings,
    /// no relations.
    pub fn offline() -> Self {
        Self {
            extractor: Arc::new(stub::SentenceAsEntity),
            classifier: Arc::new(stub::SilentClassifier),
            embeddings: Arc::new(stub::HashedCharEmbeddings::default()),
            tokenizer: Arc::new(CharNgramTokenizer::default()),
            usage: TokenUsage::new(),
        }
    }
}

#[cfg(feature = "morphology")]
fn default_tokenizer() -> Result<Arc<dyn Tokenizer>> {
    Ok(Arc::new(LinderaTokenizer::new()?))
}

#[cfg(not(feature = "morphology"))]
fn default_tokenizer() -> Result<Arc<dyn Tokenizer>> {
    tracing::warn!("Built without the morphology feature; ordering uses character bigrams");
    Ok(Arc::new(CharNgramTokenizer::default()))
}
