//! Blueprint error types

use stackforge_template::TemplateError;
use thiserror::Error;

/// Blueprint assembly errors
#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Feature '{feature}' requires the '{requires}' block")]
    MissingFeature {
        feature: &'static str,
        requires: &'static str,
    },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    #[error("Blueprint declares no feature blocks")]
    Empty,
}

pub type Result<T> = std::result::Result<T, BlueprintError>;
