//! Template error types

use thiserror::Error;

/// Errors raised while declaring or rendering a template
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Identifier already declared: {0}")]
    DuplicateIdentifier(String),

    #[error("Output already declared: {0}")]
    DuplicateOutput(String),

    #[error("Invalid logical identifier '{0}': must be 1-255 ASCII alphanumeric characters")]
    InvalidLogicalId(String),

    #[error("Reference to '{0}' was issued by a different template builder")]
    ForeignReference(String),

    #[error("Undeclared reference '{reference}' in {location}")]
    UndeclaredReference { reference: String, location: String },

    #[error("Cyclic reference chain: {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),

    #[error("Unsupported value in {location}: {reason}")]
    UnsupportedValue { location: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
