//! Error types for skill-eval operations.
//!
//! Defines error types for the major subsystems:
//! - LLM API interactions
//! - Case file loading and schema validation
//! - Search index store access
//! - Per-case task execution (prompt construction and generation)
//! - Run configuration

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: set OPENROUTER_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM response contained no content")]
    EmptyResponse,
}

/// A single schema violation, addressed by its field path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    /// Source file the violation was found in.
    pub file: String,
    /// Dot/bracket path of the offending field, e.g. `cases[1].input.prompt`.
    pub path: String,
    /// Description of the violation.
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.file, self.path, self.message)
    }
}

/// Errors that can occur while loading case definitions.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("Case path '{0}' does not exist")]
    NotFound(String),

    #[error("No case files found under '{0}'")]
    NoCases(String),

    #[error("Case schema validation failed with {} error(s):\n{}", .errors.len(), format_field_errors(.errors))]
    Schema { errors: Vec<FieldError> },
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors that can occur when talking to the search index store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to connect: {0}")]
    Connection(String),

    #[error("Failed to list search indexes on {namespace}: {message}")]
    List { namespace: String, message: String },

    #[error("Failed to drop search index '{index}' on {namespace}: {message}")]
    Drop {
        namespace: String,
        index: String,
        message: String,
    },
}

/// Invalid run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MongoDB connection string is required: set MONGODB_URI or pass --mongodb-uri")]
    MissingMongoUri,

    #[error("Model name must not be empty")]
    MissingModel,

    #[error("Temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f64),

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("At least one approach must be selected")]
    NoApproaches,
}

/// Errors that abort a single (case, approach) evaluation.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Skill unavailable for case '{case}': {reason}")]
    MissingSkill { case: String, reason: String },

    #[error("Generation failed: {0}")]
    Llm(#[from] LlmError),
}
