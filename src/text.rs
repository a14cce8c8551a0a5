//! Text helpers for Japanese report text.
//!
//! Case-marker rendering, heading detection and sentence splitting shared by
//! the predicate parser, the document walker and the analysis engines.

use std::sync::LazyLock;

use regex::Regex;

/// Case-marker role names and the particle they render as.
pub const CASE_MARKERS: &[(&str, &str)] = &[
    ("ガ格", "が"),
    ("ヲ格", "を"),
    ("ニ格", "に"),
    ("デ格", "で"),
    ("カラ格", "から"),
    ("ト格", "と"),
    ("ヨリ格", "より"),
    ("ヘ格", "へ"),
    ("マデ格", "まで"),
    ("トシテ格", "として"),
    ("ニヨル格", "による"),
    ("ニヨリ格", "により"),
    ("ニヨッテ格", "によって"),
    ("ニオケル格", "における"),
    ("ニタイスル格", "に対する"),
    ("ノ格", "の"),
];

/// Sentence terminator used by the reports.
pub const SENTENCE_END: char = '。';

/// Particle for a case role such as `ヲ格`.
///
/// Unknown roles ending in `格` render as the role name without `格`.
pub fn case_particle(role: &str) -> String {
    CASE_MARKERS
        .iter()
        .find(|(name, _)| *name == role)
        .map(|(_, particle)| particle.to_string())
        .unwrap_or_else(|| role.trim_end_matches('格').to_string())
}

/// Trim and fold full-width parentheses and Japanese quotes.
pub fn normalize_text(text: &str) -> String {
    text.trim()
        .replace('（', "(")
        .replace('）', ")")
        .replace(['「', '」'], "\"")
}

/// Fold full-width digits to ASCII.
pub fn fold_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

static HEADING_ONLY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.|[・（）()注]+)$").expect("Invalid regex"));
// `1.` and `注` / parentheses need whitespace or the end of the value after
// them; a bullet `・` may run straight into the text.
static HEADING_PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:(\d+\.)(?:\s+(.*))?|(・+)\s*(.*)|([（）()注]+)(?:\s+(.*))?)$")
        .expect("Invalid regex")
});

/// Whether the text consists of a bare heading marker (`1.`, `・`, `注` ...).
pub fn is_heading_start(text: &str) -> bool {
    let text = fold_digits(&normalize_text(text));
    HEADING_ONLY_PATTERN.is_match(text.trim())
}

/// Split a heading-prefixed value into the marker and the remaining text.
///
/// A marker only counts when it stands apart from the text: `注 詳細` and
/// `2. 概要` split, `注意喚起` and `3.5m` do not.
pub fn split_heading_and_rest(value: &str) -> Option<(String, String)> {
    let folded = fold_digits(value.trim());
    let caps = HEADING_PREFIX_PATTERN.captures(&folded)?;
    [(1, 2), (3, 4), (5, 6)].into_iter().find_map(|(marker, rest)| {
        let prefix = caps.get(marker)?.as_str().to_string();
        let rest = caps.get(rest).map(|m| m.as_str().trim()).unwrap_or("");
        Some((prefix, rest.to_string()))
    })
}

static MARKED_SEGMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\((述語|修飾|[^()]+格)\)$").expect("Invalid regex"));

/// What is left of a sentence once the expressions of its predicate-argument
/// structures are removed.
///
/// Case-marked expressions are removed with their particle first
/// (`荷重オーバー(デ格)` removes `荷重オーバーで`), then every expression bare.
pub fn residue<S: AsRef<str>>(sentence: &str, structures: &[S]) -> String {
    let mut with_particle = Vec::new();
    let mut bare = Vec::new();
    for segment in structures.iter().flat_map(|s| s.as_ref().split(',')) {
        let segment = normalize_text(segment);
        let Some(caps) = MARKED_SEGMENT_PATTERN.captures(&segment) else {
            continue;
        };
        let text = normalize_text(&caps[1]);
        if text.is_empty() {
            continue;
        }
        if let Some((_, particle)) = CASE_MARKERS.iter().find(|(name, _)| *name == &caps[2]) {
            with_particle.push(format!("{}{}", text, particle));
        }
        bare.push(text);
    }

    let mut rest = normalize_text(sentence);
    for expression in with_particle.iter().chain(&bare) {
        rest = rest.replace(expression.as_str(), "");
    }
    rest.trim().to_string()
}

/// Split text on `。`, dropping empty pieces and re-attaching the terminator.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(SENTENCE_END)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}{}", s, SENTENCE_END))
        .collect()
}

/// Character offset of `needle` in `haystack`, if present.
pub fn char_offset(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_particle() {
        assert_eq!(case_particle("ガ格"), "が");
        assert_eq!(case_particle("ニヨリ格"), "により");
        assert_eq!(case_particle("ホニャ格"), "ホニャ");
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(" 停止（述語） "), "停止(述語)");
        assert_eq!(normalize_text("「群集雪崩」"), "\"群集雪崩\"");
    }

    #[test]
    fn test_is_heading_start() {
        assert!(is_heading_start("1."));
        assert!(is_heading_start("１."));
        assert!(is_heading_start("・"));
        assert!(is_heading_start("注"));
        assert!(!is_heading_start("1. 概要"));
        assert!(!is_heading_start("エスカレーター"));
    }

    #[test]
    fn test_split_heading_and_rest() {
        let (prefix, rest) = split_heading_and_rest("２. 事故の概要").unwrap();
        assert_eq!(prefix, "2.");
        assert_eq!(rest, "事故の概要");

        let (prefix, rest) = split_heading_and_rest("・乗客が転倒した。").unwrap();
        assert_eq!(prefix, "・");
        assert_eq!(rest, "乗客が転倒した。");

        assert!(split_heading_and_rest("事故の概要").is_none());

        let (prefix, rest) = split_heading_and_rest("注").unwrap();
        assert_eq!((prefix.as_str(), rest.as_str()), ("注", ""));
        let (prefix, rest) = split_heading_and_rest("注 詳細は調査中").unwrap();
        assert_eq!((prefix.as_str(), rest.as_str()), ("注", "詳細は調査中"));
    }

    #[test]
    fn test_heading_marker_needs_a_boundary() {
        assert!(split_heading_and_rest("注意喚起を行った").is_none());
        assert!(split_heading_and_rest("注意喚起を行った。").is_none());
        assert!(split_heading_and_rest("3.5mの段差").is_none());
        assert!(split_heading_and_rest("３.５mの段差").is_none());
        assert!(split_heading_and_rest("（株）東日本旅客鉄道").is_none());
        assert!(split_heading_and_rest("(1)概要").is_none());
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("停止した。 逆走した。。");
        assert_eq!(sentences, vec!["停止した。", "逆走した。"]);
        assert!(split_sentences("  ").is_empty());
    }

    #[test]
    fn test_residue() {
        let sentence = "エスカレーターは、荷重オーバーで自動停止しさらにブレーキも効かず逆走・降下した。";
        let structures = [
            "荷重オーバー(デ格), 自動停止し(述語)",
            "ブレーキ(ガ格), さらに(修飾), 効かず(述語)",
            "逆走・降下した(述語)",
        ];
        assert_eq!(residue(sentence, &structures), "エスカレーターは、も。");

        // malformed segments remove nothing
        assert_eq!(residue("停止した。", &["停止した"]), "停止した。");
        assert_eq!(residue(" 停止した。", &[] as &[&str]), "停止した。");
    }

    #[test]
    fn test_char_offset() {
        assert_eq!(char_offset("エスカレーターが停止", "停止"), Some(8));
        assert_eq!(char_offset("abc", "z"), None);
        assert_eq!(char_offset("abc", ""), None);
    }
}
