//! Error types for object paging

use thiserror::Error;

use crate::records::RecordType;

/// Main error type for the paging core
#[derive(Debug, Error)]
pub enum Error {
    #[error("cell ({x}, {y}) context {context} could not be read: {reason}")]
    CellRead {
        x: i32,
        y: i32,
        context: usize,
        reason: String,
    },

    #[error("no model lookup for record type {0:?}")]
    UnresolvableType(RecordType),

    #[error("template {path} failed to load: {reason}")]
    TemplateLoad { path: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
