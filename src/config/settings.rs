//! Configuration settings for the incident graph builder.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub equivalence: EquivalenceConfig,
    pub temporal: TemporalConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("incident-graph.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("incident-graph/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        let unit_range = [
            ("equivalence.threshold", self.equivalence.threshold),
            ("equivalence.report_threshold", self.equivalence.report_threshold),
        ];
        for (field, value) in unit_range {
            if !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [-1, 1], got {}",
                    field, value
                ))
                .into());
            }
        }

        if self.equivalence.report_threshold > self.equivalence.threshold {
            return Err(ConfigError::Invalid(
                "equivalence.report_threshold must not exceed equivalence.threshold".to_string(),
            )
            .into());
        }

        if self.temporal.threshold < 0.0 {
            return Err(ConfigError::Invalid("temporal.threshold must be >= 0".to_string()).into());
        }

        if self.temporal.intra_group_scale <= 0.0 || self.temporal.timestamp_span <= 0.0 {
            return Err(ConfigError::Invalid(
                "temporal distance scales must be > 0".to_string(),
            )
            .into());
        }

        if self.llm.api_endpoint.is_empty() {
            return Err(ConfigError::MissingField("llm.api_endpoint".to_string()).into());
        }
        if self.llm.model.is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()).into());
        }
        if self.embedding.model.is_empty() {
            return Err(ConfigError::MissingField("embedding.model".to_string()).into());
        }

        Ok(())
    }

    /// Expand the output directory path.
    pub fn output_dir(&self) -> PathBuf {
        expand(&self.output.dir)
    }

    /// Expand the trace directory path.
    pub fn trace_dir(&self) -> PathBuf {
        expand(&self.output.trace_dir)
    }
}

fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

/// Similarity-based equivalence clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EquivalenceConfig {
    /// Minimum cosine similarity for an `equivalent` edge.
    pub threshold: f32,
    /// Candidates at or above this score are listed in the similarity report.
    pub report_threshold: f32,
    /// Heading-only texts up to this many characters are not embedded.
    pub heading_max_len: usize,
}

impl Default for EquivalenceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            report_threshold: 0.5,
            heading_max_len: 2,
        }
    }
}

/// Event ordering (`next_TimeStamp`) scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Minimum combined score for a `next_TimeStamp` edge.
    pub threshold: f64,
    /// Bonus for nodes whose ids are adjacent.
    pub adjacency_bonus: f64,
    /// Extra bonus for adjacent nodes sharing the same agent argument.
    pub same_agent_bonus: f64,
    /// Weight term frequencies by inverse document frequency.
    pub use_idf: bool,
    /// Also order entity nodes, not only predicate nodes.
    pub include_entities: bool,
    /// Groups larger than this spread their distance over the group size.
    pub large_group_size: usize,
    /// Distance per id step inside one timestamp group.
    pub intra_group_scale: f64,
    /// Distance spread across a large group, and per timestamp rank step.
    pub timestamp_span: f64,
    /// Ask the text classifier to review the accepted ordering.
    pub consistency_check: bool,
    /// Tokens ignored when vectorizing node text.
    pub stop_words: Vec<String>,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            threshold: 0.60,
            adjacency_bonus: 0.3,
            same_agent_bonus: 0.3,
            use_idf: false,
            include_entities: false,
            large_group_size: 10,
            intra_group_scale: 100.0,
            timestamp_span: 1000.0,
            consistency_check: true,
            stop_words: default_stop_words(),
        }
    }
}

fn default_stop_words() -> Vec<String> {
    [
        "が", "で", "した", "に", "する", "を", "から", "の", "へ", "て", "と", "など", "による",
        "、", "し", "な", "\"",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// OpenAI-compatible chat completion endpoint used for extraction and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the API.
    pub api_endpoint: String,
    /// API key (loaded from `OPENAI_API_KEY` if not set).
    pub api_key: Option<String>,
    /// Chat model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

/// Embedding API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding API.
    pub api_endpoint: String,
    /// API key (loaded from `OPENAI_API_KEY` if not set).
    pub api_key: Option<String>,
    /// Embedding model name.
    pub model: String,
    /// Maximum texts per request.
    pub batch_size: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            batch_size: 100,
            timeout_secs: 30,
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving the four CSV tables.
    pub dir: String,
    /// Directory receiving the human-readable trace logs.
    pub trace_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "results".to_string(),
            trace_dir: "logs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.equivalence.threshold, 0.8);
        assert_eq!(config.equivalence.report_threshold, 0.5);
        assert_eq!(config.temporal.threshold, 0.60);
        assert!(!config.temporal.use_idf);
        assert!(config.temporal.stop_words.contains(&"を".to_string()));
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [equivalence]
            threshold = 0.9

            [temporal]
            use_idf = true
            include_entities = true

            [llm]
            model = "gpt-4o-mini"
            timeout_secs = 15

            [output]
            dir = "out"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.equivalence.threshold, 0.9);
        assert_eq!(config.equivalence.report_threshold, 0.5);
        assert!(config.temporal.use_idf);
        assert!(config.temporal.include_entities);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, 15);
        assert_eq!(config.output_dir(), PathBuf::from("out"));
        assert_eq!(config.output.trace_dir, "logs");
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let toml = r#"
            [equivalence]
            threshold = 0.4
            report_threshold = 0.5
        "#;
        assert!(Config::from_str(toml).is_err());

        let toml = r#"
            [equivalence]
            threshold = 1.5
        "#;
        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_missing_model_rejected() {
        let toml = r#"
            [llm]
            model = ""
        "#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("llm.model"));
    }
}
