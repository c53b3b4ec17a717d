use thiserror::Error;

use crate::parameters::bounds::BoundsError;
use crate::parameters::parameters::SerializationError;

/// Error types for the optix-rs library.
#[derive(Error, Debug)]
pub enum OptixError {
    /// The element reference is null, stale, or was deleted by the engine.
    #[error("Invalid element handle: {message}")]
    InvalidHandle { message: String },

    /// The element has no parameter with this name.
    #[error("Unknown parameter '{name}': {message}")]
    UnknownParameter { name: String, message: String },

    /// A host value of the wrong kind was supplied.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Protocol sequencing was violated on the host side.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The engine reported a failure; `message` is its last-error text.
    #[error("{operation} failed: {message}")]
    Engine {
        operation: &'static str,
        message: String,
    },

    /// A name could not be encoded as a C string.
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// The engine library could not be loaded or lacks a symbol.
    #[error("Library error: {0}")]
    Library(String),

    /// Error for invalid bounds built from untrusted input.
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// Parameter snapshot (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OptixError {
    /// Message attached by the engine error channel, if this error came from the engine.
    pub fn engine_message(&self) -> Option<&str> {
        match self {
            OptixError::InvalidHandle { message }
            | OptixError::UnknownParameter { message, .. }
            | OptixError::Engine { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether the failure was detected locally, before any foreign call.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            OptixError::TypeMismatch(_) | OptixError::InvalidState(_) | OptixError::InvalidName(_)
        )
    }
}

/// Result type alias for optix-rs operations.
pub type Result<T> = std::result::Result<T, OptixError>;
