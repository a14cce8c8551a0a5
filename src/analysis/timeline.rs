//! Timelines: chains of event groups over `next_TimeStamp` edges.
//!
//! An event group is a level-0 predicate together with its `equivalent`
//! closure and the entities those predicates point at through detail, time or
//! place edges. Each still unassigned predicate, in id order, starts a
//! timeline; the timeline then grows depth-first along `next_TimeStamp` edges.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use super::groups::display_text;
use crate::graph::{EdgeType, GraphStore, NodeId, StructuralEdge};

const ENTITY_EDGES: [StructuralEdge; 3] = [
    StructuralEdge::ExplainDetails,
    StructuralEdge::SpecificTime,
    StructuralEdge::SpecificPlace,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventGroup {
    pub predicates: BTreeSet<NodeId>,
    pub entities: BTreeSet<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    pub event_groups: Vec<EventGroup>,
}

#[derive(Debug, Default)]
struct EdgeMaps {
    equivalent: BTreeMap<NodeId, BTreeSet<NodeId>>,
    next: BTreeMap<NodeId, BTreeSet<NodeId>>,
    entities: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl EdgeMaps {
    fn build(
        store: &GraphStore,
        predicates: &BTreeSet<NodeId>,
        entities: &BTreeSet<NodeId>,
    ) -> Self {
        let mut maps = Self::default();
        for edge in store.all_edges() {
            let EdgeType::Structural(kind) = &edge.edge_type else {
                continue;
            };
            let (f, t) = (edge.from, edge.to);
            match kind {
                StructuralEdge::Equivalent if predicates.contains(&f) && predicates.contains(&t) => {
                    maps.equivalent.entry(f).or_default().insert(t);
                    maps.equivalent.entry(t).or_default().insert(f);
                }
                StructuralEdge::NextTimeStamp
                    if predicates.contains(&f) && predicates.contains(&t) =>
                {
                    maps.next.entry(f).or_default().insert(t);
                }
                k if ENTITY_EDGES.contains(k)
                    && predicates.contains(&f)
                    && entities.contains(&t) =>
                {
                    maps.entities.entry(f).or_default().insert(t);
                }
                _ => {}
            }
        }
        maps
    }
}

struct TimelineBuilder {
    maps: EdgeMaps,
    assigned: BTreeSet<NodeId>,
}

impl TimelineBuilder {
    /// `start` and its unassigned equivalent closure, with linked entities.
    fn event_group(&mut self, start: NodeId) -> EventGroup {
        let mut group = EventGroup::default();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if group.predicates.contains(&current) {
                continue;
            }
            if self.assigned.contains(&current) {
                tracing::debug!("Predicate {} already belongs to another event group", current);
                continue;
            }
            group.predicates.insert(current);
            self.assigned.insert(current);
            if let Some(eq) = self.maps.equivalent.get(&current) {
                stack.extend(eq.iter().filter(|p| !group.predicates.contains(*p)));
            }
        }

        for p in &group.predicates {
            if let Some(entities) = self.maps.entities.get(p) {
                group.entities.extend(entities);
            }
        }
        group
    }

    fn explore(&mut self, current: &EventGroup, timeline: &mut Timeline) {
        let candidates: BTreeSet<NodeId> = current
            .predicates
            .iter()
            .filter_map(|p| self.maps.next.get(p))
            .flatten()
            .filter(|n| !self.assigned.contains(*n))
            .copied()
            .collect();

        for next in candidates {
            let group = self.event_group(next);
            if group.predicates.is_empty() {
                continue;
            }
            timeline.event_groups.push(group.clone());
            self.explore(&group, timeline);
        }
    }
}

/// Timelines over the level-0 predicates of the store.
pub fn build_timelines(store: &GraphStore) -> Vec<Timeline> {
    let predicates: BTreeSet<NodeId> = store
        .predicates()
        .iter()
        .filter(|n| n.hierarchical_level == 0)
        .map(|n| n.id)
        .collect();
    let entities: BTreeSet<NodeId> = store
        .entities()
        .iter()
        .filter(|n| n.hierarchical_level == 0)
        .map(|n| n.id)
        .collect();

    let mut builder = TimelineBuilder {
        maps: EdgeMaps::build(store, &predicates, &entities),
        assigned: BTreeSet::new(),
    };

    let mut timelines = Vec::new();
    for &p in &predicates {
        if builder.assigned.contains(&p) {
            continue;
        }
        let mut timeline = Timeline::default();
        let first = builder.event_group(p);
        if first.predicates.is_empty() {
            continue;
        }
        timeline.event_groups.push(first.clone());
        builder.explore(&first, &mut timeline);
        timelines.push(timeline);
    }
    timelines
}

pub fn describe_timelines(store: &GraphStore, timelines: &[Timeline]) -> String {
    let mut out = String::new();
    for (n, timeline) in timelines.iter().enumerate() {
        let _ = writeln!(out, "Timeline {}", n + 1);
        for (m, group) in timeline.event_groups.iter().enumerate() {
            let _ = writeln!(out, "  [event {}]", m + 1);
            for &p in &group.predicates {
                let _ = writeln!(out, "    {}", display_text(store, p));
            }
            for &e in &group.entities {
                let _ = writeln!(out, "    <{}>", display_text(store, e));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceLog;

    #[test]
    fn test_timeline_follows_next_edges() {
        let mut store = GraphStore::new(TraceLog::in_memory());
        let p = store.create_predicates(&[
            "電車(ガ格), 停止し(述語)",
            "乗客(ガ格), 避難した(述語)",
            "電車(ガ格), 止まった(述語)",
            "運転士(ガ格), 報告した(述語)",
        ]);
        let time = store.create_entity("午前9時");
        store.append_edge(StructuralEdge::Equivalent, p[0], p[2]);
        store.append_edge(StructuralEdge::NextTimeStamp, p[0], p[1]);
        store.append_edge(StructuralEdge::SpecificTime, p[1], time);

        let timelines = build_timelines(&store);
        assert_eq!(timelines.len(), 2);

        let first = &timelines[0];
        assert_eq!(first.event_groups.len(), 2);
        assert_eq!(first.event_groups[0].predicates, BTreeSet::from([p[0], p[2]]));
        assert_eq!(first.event_groups[1].predicates, BTreeSet::from([p[1]]));
        assert_eq!(first.event_groups[1].entities, BTreeSet::from([time]));

        assert_eq!(timelines[1].event_groups[0].predicates, BTreeSet::from([p[3]]));

        let text = describe_timelines(&store, &timelines);
        assert!(text.starts_with("Timeline 1\n  [event 1]\n    電車が停止し\n    電車が止まった\n"));
        assert!(text.contains("    <午前9時>\n"));
    }

    #[test]
    fn test_assigned_predicates_are_not_revisited() {
        let mut store = GraphStore::new(TraceLog::in_memory());
        let p = store.create_predicates(&["a(述語)", "b(述語)", "c(述語)"]);
        store.append_edge(StructuralEdge::NextTimeStamp, p[0], p[1]);
        store.append_edge(StructuralEdge::NextTimeStamp, p[1], p[2]);
        store.append_edge(StructuralEdge::NextTimeStamp, p[0], p[2]);

        let timelines = build_timelines(&store);
        assert_eq!(timelines.len(), 1);
        let order: Vec<NodeId> = timelines[0]
            .event_groups
            .iter()
            .flat_map(|g| g.predicates.iter().copied())
            .collect();
        assert_eq!(order, vec![p[0], p[1], p[2]]);
    }
}
