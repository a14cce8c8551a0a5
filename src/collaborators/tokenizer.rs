//! Tokenizers for the ordering engine.
//!
//! [`LinderaTokenizer`] runs the IPADIC morphological analyser and yields
//! base forms. [`CharNgramTokenizer`] needs no dictionary and backs offline
//! runs and tests.

use async_trait::async_trait;

use super::Tokenizer;
use crate::error::Result;

// ============================================================================
// Morphological analyser
// ============================================================================

/// IPADIC field holding the base form (原形).
#[cfg(any(feature = "morphology", test))]
const BASE_FORM_FIELD: usize = 6;

/// Lemma tokenizer over the IPADIC dictionary. Punctuation and symbols are dropped.
#[cfg(feature = "morphology")]
pub struct LinderaTokenizer {
    inner: lindera::Tokenizer,
}

#[cfg(feature = "morphology")]
impl LinderaTokenizer {
    /// Load the embedded IPADIC dictionary.
    pub fn new() -> Result<Self> {
        let config = lindera::TokenizerConfig {
            dictionary: lindera::DictionaryConfig {
                kind: Some(lindera::DictionaryKind::IPADIC),
                path: None,
            },
            user_dictionary: None,
            mode: lindera::Mode::Normal,
        };
        let inner = lindera::Tokenizer::from_config(config).map_err(|e| {
            crate::error::CollaboratorError::Unavailable(format!(
                "failed to load IPADIC dictionary: {}",
                e
            ))
        })?;
        Ok(Self { inner })
    }

    pub fn tokenize_sync(&self, text: &str) -> Result<Vec<String>> {
        let mut tokens = self.inner.tokenize(text).map_err(|e| {
            crate::error::CollaboratorError::Api(format!("tokenization failed: {}", e))
        })?;

        let mut lemmas = Vec::with_capacity(tokens.len());
        for token in tokens.iter_mut() {
            let surface = token.text.to_string();
            let details: Vec<String> = token
                .get_details()
                .map(|d| d.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default();
            if let Some(lemma) = lemma_of(&surface, &details) {
                lemmas.push(lemma);
            }
        }
        Ok(lemmas)
    }
}

/// Base form of a token, or the surface when the dictionary has none.
/// `None` for symbols and whitespace.
#[cfg(any(feature = "morphology", test))]
fn lemma_of(surface: &str, details: &[String]) -> Option<String> {
    if surface.trim().is_empty() || details.first().is_some_and(|pos| pos == "記号") {
        return None;
    }
    let lemma = details
        .get(BASE_FORM_FIELD)
        .filter(|base| base.as_str() != "*")
        .map(String::as_str)
        .unwrap_or(surface);
    Some(lemma.to_string())
}

#[cfg(feature = "morphology")]
#[async_trait]
impl Tokenizer for LinderaTokenizer {
    async fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        self.tokenize_sync(text)
    }
}

// ============================================================================
// Character n-grams
// ============================================================================

/// Character n-gram tokenizer.
///
/// Japanese runs (kana, kanji, long vowel mark) are cut into overlapping
/// character n-grams; a run shorter than `n` is one token. Latin letters and
/// digits form whole lowercase words. Everything else separates tokens.
#[derive(Debug, Clone)]
pub struct CharNgramTokenizer {
    n: usize,
}

impl Default for CharNgramTokenizer {
    fn default() -> Self {
        Self { n: 2 }
    }
}

impl CharNgramTokenizer {
    pub fn new(n: usize) -> Self {
        Self { n: n.max(1) }
    }

    pub fn tokenize_sync(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut run: Vec<char> = Vec::new();
        let mut run_kind = CharKind::Separator;

        for c in text.chars() {
            let kind = CharKind::of(c);
            if kind != run_kind {
                self.flush(&mut run, run_kind, &mut tokens);
                run_kind = kind;
            }
            if kind != CharKind::Separator {
                run.push(c);
            }
        }
        self.flush(&mut run, run_kind, &mut tokens);
        tokens
    }

    fn flush(&self, run: &mut Vec<char>, kind: CharKind, tokens: &mut Vec<String>) {
        match kind {
            CharKind::Separator => {}
            CharKind::Word => tokens.push(run.iter().collect::<String>().to_lowercase()),
            CharKind::Japanese if run.len() <= self.n => tokens.push(run.iter().collect()),
            CharKind::Japanese => {
                tokens.extend(run.windows(self.n).map(|w| w.iter().collect::<String>()))
            }
        }
        run.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharKind {
    Japanese,
    Word,
    Separator,
}

impl CharKind {
    fn of(c: char) -> Self {
        match c {
            '\u{3041}'..='\u{309F}' // hiragana
            | '\u{30A0}'..='\u{30FF}' // katakana
            | '\u{4E00}'..='\u{9FFF}' // CJK unified ideographs
            | '\u{3005}' => CharKind::Japanese,
            c if c.is_ascii_alphanumeric() => CharKind::Word,
            '\u{FF10}'..='\u{FF19}' | '\u{FF21}'..='\u{FF3A}' | '\u{FF41}'..='\u{FF5A}' => {
                CharKind::Word
            }
            _ => CharKind::Separator,
        }
    }
}

#[async_trait]
impl Tokenizer for CharNgramTokenizer {
    async fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.tokenize_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_japanese_bigrams() {
        let t = CharNgramTokenizer::default();
        assert_eq!(t.tokenize_sync("逆走した"), vec!["逆走", "走し", "した"]);
        assert_eq!(t.tokenize_sync("が"), vec!["が"]);
    }

    #[test]
    fn test_separators_and_words() {
        let t = CharNgramTokenizer::default();
        assert_eq!(
            t.tokenize_sync("約9.3t、ブレーキ"),
            vec!["約", "9", "3t", "ブレ", "レー", "ーキ"]
        );
        assert!(t.tokenize_sync("  、。 ").is_empty());
    }

    fn details(fields: &str) -> Vec<String> {
        fields.split(',').map(str::to_string).collect()
    }

    #[test]
    fn test_lemma_prefers_base_form() {
        let verb = details("動詞,自立,*,*,五段・ラ行,連用タ接続,逆走る,ギャクハシ,ギャクハシ");
        assert_eq!(lemma_of("逆走っ", &verb).as_deref(), Some("逆走る"));

        let unknown = details("名詞,一般,*,*,*,*,*");
        assert_eq!(lemma_of("エスカレーター", &unknown).as_deref(), Some("エスカレーター"));
        assert_eq!(lemma_of("荷重", &details("UNK")).as_deref(), Some("荷重"));

        assert!(lemma_of("、", &details("記号,読点,*,*,*,*,、,、,、")).is_none());
        assert!(lemma_of(" ", &[]).is_none());
    }

    #[cfg(feature = "morphology")]
    #[test]
    fn test_lindera_yields_lemmas() {
        let tokenizer = LinderaTokenizer::new().unwrap();
        let tokens = tokenizer.tokenize_sync("エスカレーターが停止した。").unwrap();
        assert!(tokens.contains(&"エスカレーター".to_string()));
        assert!(tokens.contains(&"する".to_string()));
        assert!(!tokens.contains(&"。".to_string()));
    }

    #[tokio::test]
    async fn test_async_tokenize() {
        let t = CharNgramTokenizer::new(3);
        let tokens = t.tokenize("自動停止").await.unwrap();
        assert_eq!(tokens, vec!["自動停", "動停止"]);
    }
}
