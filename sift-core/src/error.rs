//! Error types for the sift pipeline.
//!
//! Uses `thiserror` for structured error variants covering the search
//! provider, content fetching, the dependency-batched executor, and
//! configuration. None of these are fatal to a pipeline run: the coordinator
//! recovers every one of them locally and degrades the response instead.

/// Top-level error type for the sift core library.
#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    #[error("Search provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Content fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from search provider calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Search request failed: {message}")]
    Request { message: String },

    #[error("Search endpoint returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to parse search response: {message}")]
    Parse { message: String },

    #[error("Search request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Search request was cancelled")]
    Cancelled,
}

/// Errors from fetching and extracting page content.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Fetch of {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("No readable content at {url}")]
    Empty { url: String },

    #[error("Fetch of {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("Fetch of {url} was cancelled")]
    Cancelled { url: String },
}

/// Errors recorded by the dependency-batched executor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutorError {
    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("Step '{step}' timed out after {timeout_secs}s")]
    StepTimeout { step: String, timeout_secs: u64 },

    #[error("Dependency cycle detected among steps: {}", remaining.join(", "))]
    CycleDetected { remaining: Vec<String> },

    #[error("Step '{step}' was cancelled before it could run")]
    Cancelled { step: String },

    #[error("Synthesis failed: {message}")]
    SynthesisFailed { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

impl From<Box<figment::Error>> for ConfigError {
    fn from(err: Box<figment::Error>) -> Self {
        ConfigError::ParseError {
            message: err.to_string(),
        }
    }
}

/// A type alias for results using the top-level `SiftError`.
pub type Result<T> = std::result::Result<T, SiftError>;
