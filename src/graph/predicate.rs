//! Predicate-argument structure parsing.
//!
//! Structure strings come from the sentence analyzer in the form
//! `エスカレーター(ガ格), 自動停止し(述語)`: comma-separated segments, each a
//! text followed by a parenthesized role marker. Segments that do not follow
//! the grammar are kept verbatim as [`Segment::Raw`].

use std::fmt;

use crate::text::{case_particle, normalize_text};

/// Role marker of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// `述語`
    Predicate,
    /// `修飾`
    Modifier,
    /// `ガ格`, the grammatical subject.
    Agent,
    /// Any other case marker ending in `格`.
    Case(String),
    /// Any other marker, e.g. `外の関係`.
    Other(String),
}

impl Role {
    pub fn from_marker(marker: &str) -> Self {
        match marker.trim() {
            "述語" => Role::Predicate,
            "修飾" => Role::Modifier,
            "ガ格" => Role::Agent,
            m if m.ends_with('格') => Role::Case(m.to_string()),
            m => Role::Other(m.to_string()),
        }
    }

    pub fn marker(&self) -> &str {
        match self {
            Role::Predicate => "述語",
            Role::Modifier => "修飾",
            Role::Agent => "ガ格",
            Role::Case(m) | Role::Other(m) => m,
        }
    }

    /// Position in the rendered sentence: agent, cases, modifier, predicate, rest.
    fn render_order(&self) -> u8 {
        match self {
            Role::Agent => 0,
            Role::Case(_) => 1,
            Role::Modifier => 2,
            Role::Predicate => 3,
            Role::Other(_) => 4,
        }
    }
}

/// One comma-separated piece of a structure string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Marked { text: String, role: Role },
    Raw(String),
}

impl Segment {
    /// Parse `text(role)`; anything else is kept as raw text.
    pub fn parse(segment: &str) -> Self {
        let segment = normalize_text(segment);
        if let Some(body) = segment.strip_suffix(')') {
            if let Some(open) = body.rfind('(') {
                let text = body[..open].trim();
                let marker = body[open + 1..].trim();
                if !text.is_empty() && !marker.is_empty() {
                    return Segment::Marked {
                        text: text.to_string(),
                        role: Role::from_marker(marker),
                    };
                }
            }
        }
        Segment::Raw(segment)
    }

    /// Text without the role marker.
    pub fn text(&self) -> &str {
        match self {
            Segment::Marked { text, .. } => text,
            Segment::Raw(raw) => raw,
        }
    }

    pub fn role(&self) -> Option<&Role> {
        match self {
            Segment::Marked { role, .. } => Some(role),
            Segment::Raw(_) => None,
        }
    }

    /// Text with the case particle reattached (`エスカレーター` + `ガ格` -> `エスカレーターが`).
    fn with_particle(&self) -> String {
        match self {
            Segment::Marked {
                text,
                role: Role::Agent,
            } => format!("{}{}", text, case_particle("ガ格")),
            Segment::Marked {
                text,
                role: Role::Case(marker),
            } => format!("{}{}", text, case_particle(marker)),
            other => other.text().to_string(),
        }
    }

    fn render_order(&self) -> u8 {
        self.role().map(Role::render_order).unwrap_or(4)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Marked { text, role } => write!(f, "{}({})", text, role.marker()),
            Segment::Raw(raw) => f.write_str(raw),
        }
    }
}

/// Typed predicate-argument record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateStructure {
    pub agent: Option<Segment>,
    pub predicate: Option<Segment>,
    pub arguments: Vec<Segment>,
    pub modifier: Option<Segment>,
}

impl PredicateStructure {
    /// Parse one raw structure string. Never fails.
    ///
    /// The first agent, predicate and modifier segments fill their slots;
    /// repeated ones, other cases, other markers and raw text become arguments.
    pub fn parse(raw: &str) -> Self {
        let mut structure = PredicateStructure::default();

        for piece in normalize_text(raw).split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let segment = Segment::parse(piece);
            let slot = match segment.role() {
                Some(Role::Agent) => &mut structure.agent,
                Some(Role::Predicate) => &mut structure.predicate,
                Some(Role::Modifier) => &mut structure.modifier,
                _ => {
                    structure.arguments.push(segment);
                    continue;
                }
            };
            if slot.is_none() {
                *slot = Some(segment);
            } else {
                structure.arguments.push(segment);
            }
        }

        structure
    }

    /// Rebuild from the exported columns.
    pub fn from_columns(agent: &str, predicate: &str, arguments: &str, modifier: &str) -> Self {
        let joined = [agent, arguments, modifier, predicate]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        Self::parse(&joined)
    }

    pub fn predicate_text(&self) -> &str {
        self.predicate.as_ref().map(Segment::text).unwrap_or("")
    }

    pub fn agent_text(&self) -> &str {
        self.agent.as_ref().map(Segment::text).unwrap_or("")
    }

    /// Agent column, marker included.
    pub fn agent_display(&self) -> String {
        display_opt(&self.agent)
    }

    /// Predicate column, marker included.
    pub fn predicate_display(&self) -> String {
        display_opt(&self.predicate)
    }

    /// Modifier column, marker included.
    pub fn modifier_display(&self) -> String {
        display_opt(&self.modifier)
    }

    /// Argument column: segments with markers, joined by `, `.
    pub fn arguments_display(&self) -> String {
        self.arguments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Canonical sentence form: agent, case arguments, modifier, predicate,
    /// then anything else, with case particles reattached.
    pub fn render(&self) -> String {
        let mut segments: Vec<&Segment> = self
            .agent
            .iter()
            .chain(self.arguments.iter())
            .chain(self.modifier.iter())
            .chain(self.predicate.iter())
            .collect();
        segments.sort_by_key(|s| s.render_order());
        segments.iter().map(|s| s.with_particle()).collect()
    }
}

fn display_opt(segment: &Option<Segment>) -> String {
    segment.as_ref().map(ToString::to_string).unwrap_or_default()
}
