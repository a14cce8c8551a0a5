//! Parsers for the line-oriented chat responses.
//!
//! Every parser is lenient: lines that do not match are skipped, and a
//! response consisting of `無し` ("none") yields an empty result.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{
    CausalKind, CausalRelation, DetailRelation, DiscoveredEdge, OrderingCandidate,
    RelationResponse, SentenceStructures, TimePlace,
};
use crate::graph::RelationLabel;
use crate::text::CASE_MARKERS;

/// Marker used by the model for "nothing found".
pub const NONE_MARKER: &str = "無し";

static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<time\s*:\s*(.*?)>").expect("Invalid regex"));
static PLACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<place\s*:\s*(.*?)>").expect("Invalid regex"));
static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\d+\)\s*(.*)$").expect("Invalid regex"));
static LABEL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(x\)-\[(.+?)\]→\(y\)\s*:\s*(.*)$").expect("Invalid regex"));
static EDGE_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*(\d+)\s*,\s*(\d+)\s*,\s*([^\),]+)\s*\)").expect("Invalid regex")
});
static CAUSAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\d+\)\s*\(\s*(\d+)\s*,\s*(\d+)\s*,\s*'(cause|reason)'\s*,\s*'(.*?)'\s*\)$")
        .expect("Invalid regex")
});
static DETAIL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\d+\)\s*\(\s*(\d+)\s*,\s*(\d+)\s*,\s*'(.*?)'\s*\)$").expect("Invalid regex")
});
static ORDER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\d+\)\s*\(\s*(\d+)\s*,\s*(\d+)\s*\)$").expect("Invalid regex")
});

/// `<time : X>, <place : Y>` with `無し` meaning none. Comma-separated values
/// inside one tag are split; duplicates are dropped.
pub fn parse_time_place(content: &str) -> TimePlace {
    TimePlace {
        time: tagged_values(&TIME_PATTERN, content),
        place: tagged_values(&PLACE_PATTERN, content),
    }
}

fn tagged_values(pattern: &Regex, content: &str) -> Vec<String> {
    let raw: Vec<&str> = pattern
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .collect();
    if raw.iter().any(|v| *v == NONE_MARKER) {
        return Vec::new();
    }

    let mut values: Vec<String> = Vec::new();
    for part in raw.iter().flat_map(|v| v.split(',')) {
        let part = part.trim();
        if !part.is_empty() && !values.iter().any(|v| v == part) {
            values.push(part.to_string());
        }
    }
    values
}

/// `[述語項構造]` and `[エンティティ]` sections of numbered lines.
pub fn parse_structures(content: &str) -> SentenceStructures {
    let predicates = section(content, "[述語項構造]", Some("[エンティティ]"))
        .map(|body| numbered_items(body).map(|s| fix_trailing_particles(&s)).collect())
        .unwrap_or_default();
    let entities = section(content, "[エンティティ]", None)
        .map(|body| numbered_items(body).collect())
        .unwrap_or_default();
    SentenceStructures {
        predicates,
        entities,
    }
}

fn section<'a>(content: &'a str, start: &str, end: Option<&str>) -> Option<&'a str> {
    let begin = content.find(start)? + start.len();
    let rest = &content[begin..];
    let stop = end.and_then(|e| rest.find(e)).unwrap_or(rest.len());
    Some(&rest[..stop])
}

fn numbered_items(body: &str) -> impl Iterator<Item = String> + '_ {
    body.lines()
        .filter_map(|line| NUMBERED_LINE.captures(line.trim()))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|s| !s.is_empty() && s != NONE_MARKER)
}

/// Drop a case particle the model repeated before its marker
/// (`エスカレーターが(ガ格)` -> `エスカレーター(ガ格)`).
pub fn fix_trailing_particles(structure: &str) -> String {
    structure
        .split(',')
        .map(str::trim)
        .map(|segment| strip_repeated_particle(segment).unwrap_or_else(|| segment.to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn strip_repeated_particle(segment: &str) -> Option<String> {
    let body = segment.strip_suffix(')')?;
    let open = body.rfind('(')?;
    let (base, marker) = (body[..open].trim_end(), body[open + 1..].trim());
    let (_, particle) = CASE_MARKERS.iter().find(|(name, _)| *name == marker)?;
    let stripped = base.strip_suffix(*particle)?.trim_end();
    if stripped.is_empty() {
        return None;
    }
    Some(format!("{}({})", stripped, marker))
}

/// `(自動生成エッジ辞書追加)` label lines and `(自動生成エッジ)` triples.
pub fn parse_relation_response(content: &str) -> RelationResponse {
    let content = content.trim();
    if content == NONE_MARKER {
        return RelationResponse::default();
    }

    let labels = section(content, "(自動生成エッジ辞書追加)", Some("(自動生成エッジ)"))
        .map(|body| {
            body.lines()
                .filter_map(|line| LABEL_LINE.captures(line.trim()))
                .map(|c| RelationLabel::new(c[1].trim(), c[2].trim()))
                .collect()
        })
        .unwrap_or_default();

    let edges = section(content, "(自動生成エッジ)", None)
        .map(|body| {
            EDGE_TRIPLE
                .captures_iter(body)
                .filter_map(|c| {
                    Some(DiscoveredEdge {
                        from: c[1].parse().ok()?,
                        to: c[2].parse().ok()?,
                        label: c[3].trim().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    RelationResponse { labels, edges }
}

/// `[CAUSAL_RELATION]` section: `(n) (cause, effect, 'cause'|'reason', 'cue')`.
pub fn parse_causal(content: &str) -> Vec<CausalRelation> {
    section_lines(content, "[CAUSAL_RELATION]")
        .filter_map(|line| {
            let c = CAUSAL_LINE.captures(line)?;
            Some(CausalRelation {
                cause: c[1].parse().ok()?,
                effect: c[2].parse().ok()?,
                kind: if &c[3] == "cause" {
                    CausalKind::Cause
                } else {
                    CausalKind::Reason
                },
                cue: c[4].to_string(),
            })
        })
        .collect()
}

/// `[EXPLAIN_RELATION]` section: `(n) (explained, detail, 'target')`.
pub fn parse_details(content: &str) -> Vec<DetailRelation> {
    section_lines(content, "[EXPLAIN_RELATION]")
        .filter_map(|line| {
            let c = DETAIL_LINE.captures(line)?;
            Some(DetailRelation {
                explained: c[1].parse().ok()?,
                detail: c[2].parse().ok()?,
                target: c[3].to_string(),
            })
        })
        .collect()
}

/// `[MISSING_ORDER]` section: `(n) (from, to)`.
pub fn parse_ordering(content: &str) -> Vec<OrderingCandidate> {
    section_lines(content, "[MISSING_ORDER]")
        .filter_map(|line| {
            let c = ORDER_LINE.captures(line)?;
            Some(OrderingCandidate {
                from: c[1].parse().ok()?,
                to: c[2].parse().ok()?,
            })
        })
        .collect()
}

/// Trimmed lines after `header`, up to a `無し` line.
fn section_lines<'a>(content: &'a str, header: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    content
        .lines()
        .map(str::trim)
        .skip_while(move |line| !line.contains(header))
        .skip(1)
        .take_while(|line| *line != NONE_MARKER)
}
