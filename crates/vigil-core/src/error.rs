//! Error types for the Vigil engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Vigil workspace.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum VigilError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Data access error (context store layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An event that is not legal in the session's current phase
    #[error("Invalid transition: {event} is not accepted in phase '{phase}'")]
    InvalidTransition { phase: String, event: &'static str },

    /// A confirmation gate already guards this session
    #[error("A confirmation is already pending for session '{0}'")]
    ConfirmationPending(String),

    /// No confirmation gate exists to resolve
    #[error("No pending confirmation for session '{0}'")]
    NoPendingConfirmation(String),

    /// Workflow has no remaining steps to advance or skip
    #[error("Workflow '{workflow_id}' is already at its final step ({total_steps} steps)")]
    WorkflowComplete {
        workflow_id: String,
        total_steps: usize,
    },

    /// No active workflow on the session
    #[error("No active workflow for session '{0}'")]
    NoActiveWorkflow(String),

    /// Unknown workflow template id
    #[error("Unknown workflow template: '{0}'")]
    UnknownTemplate(String),

    /// Command execution error
    #[error("Execution error: {0}")]
    Execution(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates an Execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a DataAccess error.
    ///
    /// The application layer uses this to decide whether a failure should
    /// degrade the session to an ephemeral in-memory context instead of
    /// failing the turn.
    pub fn is_data_access(&self) -> bool {
        matches!(self, Self::DataAccess(_) | Self::Io { .. })
    }

    /// Check if this is an InvalidTransition error
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

impl From<std::io::Error> for VigilError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for VigilError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for VigilError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for VigilError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, VigilError>`.
pub type Result<T> = std::result::Result<T, VigilError>;
