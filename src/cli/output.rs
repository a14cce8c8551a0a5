//! Output formatting for CLI commands.
//!
//! This module handles formatting output as either JSON or human-readable text.

use anyhow::Result;
use serde::Serialize;

use incident_graph::analysis::groups::display_text;
use incident_graph::analysis::Timeline;
use incident_graph::{EquivalenceGroups, GraphStats, GraphStore};

use super::commands::BuildSummary;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the build summary.
pub fn print_build_summary(summary: &BuildSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }

    println!("Input: {}", summary.input.display());
    for doc in &summary.documents {
        println!("\n[{}]", doc.name);
        println!("  Nodes: {}", doc.nodes);
        println!("  Edges: {}", doc.edges);
        println!("  Items: {}", doc.items);
        println!("  equivalent edges: {}", doc.equivalent_edges);
        println!("  next_TimeStamp edges: {}", doc.next_timestamp_edges);
        println!("  Discovered edges: {}", doc.discovered_edges);
        if !doc.registered_labels.is_empty() {
            println!("  New labels: {}", doc.registered_labels.join(", "));
        }
    }

    let export = &summary.export;
    println!(
        "\nExported {} categories, {} entities, {} predicates, {} edges to {}",
        export.categories,
        export.entities,
        export.predicates,
        export.edges,
        export.dir.display()
    );
    println!(
        "API usage: {} calls, {} tokens",
        summary.usage.calls, summary.usage.tokens
    );
    if let Some(trace) = &summary.trace {
        println!("Trace: {}", trace.display());
    }
    Ok(())
}

/// Print graph statistics.
pub fn print_stats(stats: &GraphStats, json: bool) -> Result<()> {
    if json {
        return print_json(stats);
    }

    println!("Graph Statistics");
    println!("================");
    println!("Categories: {}", stats.categories);
    println!("Entities: {}", stats.entities);
    println!("Predicates: {}", stats.predicates);
    println!("Edges: {}", stats.edges);
    for (label, count) in &stats.edges_by_type {
        println!("  {}: {}", label, count);
    }
    println!("Discovered relation labels: {}", stats.relation_labels);
    Ok(())
}

#[derive(Serialize)]
struct GroupJson {
    members: Vec<MemberJson>,
}

#[derive(Serialize)]
struct MemberJson {
    id: u64,
    text: String,
}

fn members(store: &GraphStore, ids: impl IntoIterator<Item = u64>) -> Vec<MemberJson> {
    ids.into_iter()
        .map(|id| MemberJson {
            id,
            text: display_text(store, id),
        })
        .collect()
}

/// Print equivalence groups as JSON.
pub fn print_groups_json(store: &GraphStore, groups: &EquivalenceGroups) -> Result<()> {
    let groups: Vec<GroupJson> = groups
        .groups()
        .iter()
        .map(|group| GroupJson {
            members: members(store, group.iter().copied()),
        })
        .collect();
    print_json(&groups)
}

#[derive(Serialize)]
struct EventJson {
    predicates: Vec<MemberJson>,
    entities: Vec<MemberJson>,
}

/// Print timelines as JSON.
pub fn print_timelines_json(store: &GraphStore, timelines: &[Timeline]) -> Result<()> {
    let timelines: Vec<Vec<EventJson>> = timelines
        .iter()
        .map(|timeline| {
            timeline
                .event_groups
                .iter()
                .map(|group| EventJson {
                    predicates: members(store, group.predicates.iter().copied()),
                    entities: members(store, group.entities.iter().copied()),
                })
                .collect()
        })
        .collect();
    print_json(&timelines)
}
