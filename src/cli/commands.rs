//! CLI command handlers.
//!
//! `build` runs the document walker and exports the tables; the other
//! commands import an exported directory and report on it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use incident_graph::analysis::{build_timelines, describe_groups, describe_timelines};
use incident_graph::collaborators::UsageSnapshot;
use incident_graph::{
    export_csv, import_csv, Collaborators, Config, DocumentBuilder, DocumentReport,
    EquivalenceGroups, ExportResult, GraphStats, TraceLog,
};

use super::output;

/// Summary of one processed document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub nodes: usize,
    pub edges: usize,
    pub items: usize,
    pub equivalent_edges: usize,
    pub next_timestamp_edges: usize,
    pub discovered_edges: usize,
    pub registered_labels: Vec<String>,
}

impl From<&DocumentReport> for DocumentSummary {
    fn from(report: &DocumentReport) -> Self {
        Self {
            name: report.name.clone(),
            nodes: report.scope.node_ids.len(),
            edges: report.scope.edge_ids.len(),
            items: report.items.len(),
            equivalent_edges: report.equivalence.edges.len(),
            next_timestamp_edges: report.items.iter().map(|i| i.temporal.edges.len()).sum(),
            discovered_edges: report.items.iter().map(|i| i.discovery.edges.len()).sum(),
            registered_labels: report
                .items
                .iter()
                .flat_map(|i| i.discovery.registered.iter().cloned())
                .collect(),
        }
    }
}

/// Result of the build command.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub input: PathBuf,
    pub documents: Vec<DocumentSummary>,
    pub export: ExportResult,
    pub trace: Option<PathBuf>,
    /// API calls and tokens spent on the build.
    pub usage: UsageSnapshot,
}

/// Run the build command.
pub async fn run_build(
    config: Config,
    input: PathBuf,
    output_dir: Option<PathBuf>,
    offline: bool,
    json_output: bool,
) -> Result<()> {
    let trace = TraceLog::create(config.trace_dir())?;
    let collaborators = if offline {
        tracing::info!("Running without LLM collaborators");
        Collaborators::offline()
    } else {
        Collaborators::from_config(&config)?
    };

    let mut builder = DocumentBuilder::new(&config, collaborators, trace.clone());
    let reports = builder
        .process_file(&input)
        .await
        .with_context(|| format!("failed to process {}", input.display()))?;

    let dir = output_dir.unwrap_or_else(|| config.output_dir());
    let usage = builder.token_usage();
    let store = builder.into_store();
    let export = export_csv(&store, &dir)?;
    trace.flush();

    let summary = BuildSummary {
        input,
        documents: reports.iter().map(DocumentSummary::from).collect(),
        export,
        trace: trace.path(),
        usage,
    };
    output::print_build_summary(&summary, json_output)
}

fn load(dir: &Path) -> Result<incident_graph::GraphStore> {
    import_csv(dir).with_context(|| format!("failed to import {}", dir.display()))
}

/// Run the groups command.
pub fn run_groups(dir: PathBuf, json_output: bool) -> Result<()> {
    let store = load(&dir)?;
    let groups = EquivalenceGroups::from_store(&store);
    if json_output {
        output::print_groups_json(&store, &groups)
    } else {
        print!("{}", describe_groups(&store, &groups));
        Ok(())
    }
}

/// Run the stats command.
pub fn run_stats(dir: PathBuf, json_output: bool) -> Result<()> {
    let store = load(&dir)?;
    output::print_stats(&GraphStats::collect(&store), json_output)
}

/// Run the timeline command.
pub fn run_timeline(dir: PathBuf, json_output: bool) -> Result<()> {
    let store = load(&dir)?;
    let timelines = build_timelines(&store);
    if json_output {
        output::print_timelines_json(&store, &timelines)
    } else {
        if timelines.is_empty() {
            println!("No predicates found.");
        }
        print!("{}", describe_timelines(&store, &timelines));
        Ok(())
    }
}
