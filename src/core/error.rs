//! Error types for the tree generator

use thiserror::Error;

/// Errors raised at the configuration boundary.
///
/// Generation itself never fails; these only come from loading or
/// validating parameter files and from the CLI.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}
