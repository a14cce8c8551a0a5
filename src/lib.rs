//! incident-graph: knowledge graphs from Japanese incident reports.
//!
//! Nested JSON reports are walked into category, entity and predicate nodes.
//! Sentences are analysed by external collaborators (structure extraction,
//! relation classification, embeddings), items are ordered in time and each
//! document is clustered for equivalence. The result is exported as four CSV
//! tables.

pub mod analysis;
pub mod collaborators;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod graph;
pub mod text;
pub mod trace;

pub use analysis::{
    build_timelines, EquivalenceEngine, EquivalenceGroups, RelationMiner, TemporalEngine,
};
pub use collaborators::{
    Collaborators, EmbeddingProvider, StructureExtractor, TextClassifier, Tokenizer,
};
pub use config::Config;
pub use document::{DocumentBuilder, DocumentReport, ItemReport};
pub use error::{GraphError, Result};
pub use export::{export_csv, import_csv, ExportResult};
pub use graph::{
    CategoryType, Edge, EdgeType, GraphStats, GraphStore, NodeId, PredicateStructure,
    StructuralEdge,
};
pub use trace::TraceLog;
