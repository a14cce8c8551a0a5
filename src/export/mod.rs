//! CSV export and import of a finished graph.
//!
//! Four tables are written to one directory:
//! - `category_structure_node.csv`: `index,hierarchical level,category type,category title`
//! - `entity_structure_node.csv`: `index,hierarchical level,entity`
//! - `predicate_structure_node.csv`: `index,hierarchical level,agent argument,predicate,argument,modifier`
//! - `edge.csv`: `index,type,from,to`
//!
//! Importing the tables rebuilds a [`GraphStore`] whose id counters continue
//! after the largest imported ids.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::graph::{
    CategoryNode, CategoryType, Edge, EdgeId, EdgeType, EntityNode, GraphStore, NodeId,
    PredicateNode, PredicateStructure,
};
use crate::trace::TraceLog;

pub const CATEGORY_FILE: &str = "category_structure_node.csv";
pub const ENTITY_FILE: &str = "entity_structure_node.csv";
pub const PREDICATE_FILE: &str = "predicate_structure_node.csv";
pub const EDGE_FILE: &str = "edge.csv";

const CATEGORY_HEADER: [&str; 4] = [
    "index",
    "hierarchical level",
    "category type",
    "category title",
];
const ENTITY_HEADER: [&str; 3] = ["index", "hierarchical level", "entity"];
const PREDICATE_HEADER: [&str; 6] = [
    "index",
    "hierarchical level",
    "agent argument",
    "predicate",
    "argument",
    "modifier",
];
const EDGE_HEADER: [&str; 4] = ["index", "type", "from", "to"];

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CategoryRow {
    index: NodeId,
    #[serde(rename = "hierarchical level")]
    level: u32,
    #[serde(rename = "category type")]
    category_type: String,
    #[serde(rename = "category title")]
    title: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntityRow {
    index: NodeId,
    #[serde(rename = "hierarchical level")]
    level: u32,
    entity: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PredicateRow {
    index: NodeId,
    #[serde(rename = "hierarchical level")]
    level: u32,
    #[serde(rename = "agent argument")]
    agent: String,
    predicate: String,
    argument: String,
    modifier: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRow {
    index: EdgeId,
    #[serde(rename = "type")]
    edge_type: String,
    from: NodeId,
    to: NodeId,
}

/// Result of an export operation.
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    /// Directory holding the four tables.
    pub dir: PathBuf,
    pub categories: usize,
    pub entities: usize,
    pub predicates: usize,
    pub edges: usize,
}

// ============================================================================
// Export
// ============================================================================

/// Write the four tables of `store` into `dir`, creating it when missing.
pub fn export_csv(store: &GraphStore, dir: impl AsRef<Path>) -> Result<ExportResult> {
    let dir = dir.as_ref().to_path_buf();
    std::fs::create_dir_all(&dir).map_err(ExportError::Io)?;

    write_rows(
        &dir.join(CATEGORY_FILE),
        &CATEGORY_HEADER,
        store.categories().iter().map(|n| CategoryRow {
            index: n.id,
            level: n.hierarchical_level,
            category_type: n.category_type.label().to_string(),
            title: n.title.clone(),
        }),
    )?;

    write_rows(
        &dir.join(ENTITY_FILE),
        &ENTITY_HEADER,
        store.entities().iter().map(|n| EntityRow {
            index: n.id,
            level: n.hierarchical_level,
            entity: n.text.clone(),
        }),
    )?;

    write_rows(
        &dir.join(PREDICATE_FILE),
        &PREDICATE_HEADER,
        store.predicates().iter().map(|n| PredicateRow {
            index: n.id,
            level: n.hierarchical_level,
            agent: n.structure.agent_display(),
            predicate: n.structure.predicate_display(),
            argument: n.structure.arguments_display(),
            modifier: n.structure.modifier_display(),
        }),
    )?;

    write_rows(
        &dir.join(EDGE_FILE),
        &EDGE_HEADER,
        store.all_edges().iter().map(|e| EdgeRow {
            index: e.id,
            edge_type: e.edge_type.label().to_string(),
            from: e.from,
            to: e.to,
        }),
    )?;

    let result = ExportResult {
        dir,
        categories: store.categories().len(),
        entities: store.entities().len(),
        predicates: store.predicates().len(),
        edges: store.edge_count(),
    };
    tracing::info!(
        "Exported {} categories, {} entities, {} predicates, {} edges to {}",
        result.categories,
        result.entities,
        result.predicates,
        result.edges,
        result.dir.display()
    );
    Ok(result)
}

/// The header is written even when there are no rows.
fn write_rows<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl Iterator<Item = T>,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(ExportError::Csv)?;
    writer.write_record(header).map_err(ExportError::Csv)?;
    for row in rows {
        writer.serialize(row).map_err(ExportError::Csv)?;
    }
    writer.flush().map_err(ExportError::Io)?;
    Ok(())
}

// ============================================================================
// Import
// ============================================================================

/// Rebuild a store from tables previously written by [`export_csv`].
pub fn import_csv(dir: impl AsRef<Path>) -> Result<GraphStore> {
    import_csv_with_trace(dir, TraceLog::in_memory())
}

/// Same as [`import_csv`], writing later activity to `trace`.
pub fn import_csv_with_trace(dir: impl AsRef<Path>, trace: TraceLog) -> Result<GraphStore> {
    let dir = dir.as_ref();
    let mut store = GraphStore::new(trace);

    for row in read_rows::<CategoryRow>(&dir.join(CATEGORY_FILE))? {
        let category_type: CategoryType =
            row.category_type
                .parse()
                .map_err(|message| ExportError::InvalidRow {
                    file: CATEGORY_FILE.to_string(),
                    message,
                })?;
        store.restore_category(CategoryNode {
            id: row.index,
            hierarchical_level: row.level,
            category_type,
            title: row.title,
        })?;
    }

    for row in read_rows::<EntityRow>(&dir.join(ENTITY_FILE))? {
        store.restore_entity(EntityNode {
            id: row.index,
            hierarchical_level: row.level,
            text: row.entity,
        })?;
    }

    for row in read_rows::<PredicateRow>(&dir.join(PREDICATE_FILE))? {
        store.restore_predicate(PredicateNode {
            id: row.index,
            hierarchical_level: row.level,
            structure: PredicateStructure::from_columns(
                &row.agent,
                &row.predicate,
                &row.argument,
                &row.modifier,
            ),
        })?;
    }

    for row in read_rows::<EdgeRow>(&dir.join(EDGE_FILE))? {
        if row.edge_type.trim().is_empty() {
            return Err(ExportError::InvalidRow {
                file: EDGE_FILE.to_string(),
                message: format!("edge {} has no type", row.index),
            }
            .into());
        }
        store.restore_edge(Edge {
            id: row.index,
            edge_type: EdgeType::from_label(&row.edge_type),
            from: row.from,
            to: row.to,
        })?;
    }

    tracing::info!(
        "Imported {} nodes and {} edges from {}",
        store.node_count(),
        store.edge_count(),
        dir.display()
    );
    Ok(store)
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = path.file_name().and_then(|f| f.to_str()).unwrap_or_default();
    let mut reader = csv::Reader::from_path(path).map_err(ExportError::Csv)?;
    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<T>().enumerate() {
        let row = record.map_err(|e| ExportError::InvalidRow {
            file: file.to_string(),
            message: format!("row {}: {}", line + 1, e),
        })?;
        rows.push(row);
    }
    Ok(rows)
}
