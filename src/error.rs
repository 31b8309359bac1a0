//! Error types for planust.
//!
//! Expansion itself never fails: an empty window or an empty weekday set
//! simply yields nothing. Errors come from validation at creation time,
//! from the output bound, from id resolution and from the storage layer.

use thiserror::Error;
use uuid::Uuid;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlannerError>;

/// Core error type.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// IO errors from the storage or config files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be serialized
    #[error("Failed to write configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Invalid course: {0}")]
    InvalidCourse(String),

    #[error("Invalid meeting pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid task template: {0}")]
    InvalidTemplate(String),

    /// A single call would have produced more instances than allowed.
    #[error("Generation window too large: more than {limit} instances in one call")]
    WindowTooLarge { limit: usize },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Id prefix '{prefix}' matches more than one {kind}")]
    AmbiguousId { kind: &'static str, prefix: String },

    /// User input that could not be parsed (dates, times, colors...)
    #[error("{0}")]
    Parse(String),
}

impl PlannerError {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        PlannerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
