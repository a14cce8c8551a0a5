//! Error types for the incident graph builder.

use thiserror::Error;

/// Main error type for graph construction.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("Unknown scope: {0}")]
    UnknownScope(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors raised by external collaborators (LLM, embedding, tokenizer).
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0}s")]
    Timeout(u64),

    #[error("API key not provided: {0}")]
    MissingApiKey(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// CSV export and import errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid row in {file}: {message}")]
    InvalidRow { file: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trace log errors.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to create trace directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open trace file {path}: {source}")]
    OpenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
