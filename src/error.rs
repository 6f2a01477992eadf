//! Error types for the Chef resource reconcilers.
//!
//! This module provides the error hierarchy for every stage of an operation:
//! configuration, the Chef server API, and the per-resource reconcile logic.

use std::path::PathBuf;
use thiserror::Error;

/// HTTP status the Chef server uses for a missing object.
const NOT_FOUND_STATUS: u16 = 404;

/// The main error type for the Chef resource system.
#[derive(Debug, Error)]
pub enum ChefResourcesError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Chef server API errors.
    #[error("Chef API error: {0}")]
    Api(#[from] ChefApiError),

    /// Resource reconcile errors.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A required setting is absent from both the file and the environment.
    #[error("Missing setting {name} (set it in the config file or via {env_var})")]
    MissingSetting {
        /// Name of the setting.
        name: String,
        /// Environment variable that can provide it.
        env_var: String,
    },

    /// The client private key could not be read or decoded.
    #[error("Invalid client key: {message}")]
    InvalidKey {
        /// Description of the key problem.
        message: String,
    },
}

/// Chef server API errors.
#[derive(Debug, Error)]
pub enum ChefApiError {
    /// The server answered with a non-success status.
    #[error("Chef API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body returned by the server.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with the Chef server: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from the Chef server: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The request could not be signed.
    #[error("Failed to sign request: {message}")]
    SigningFailed {
        /// Description of the signing failure.
        message: String,
    },
}

/// Errors raised by resource reconcilers before or after the remote call.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A required property is missing.
    #[error("{kind}: missing required property '{field}'")]
    MissingField {
        /// Resource kind.
        kind: String,
        /// Property name.
        field: String,
    },

    /// A property has the wrong JSON type.
    #[error("{kind}: property '{field}' must be {expected}")]
    InvalidField {
        /// Resource kind.
        kind: String,
        /// Property name.
        field: String,
        /// Expected type description.
        expected: String,
    },

    /// A property is not declared by the schema.
    #[error("{kind}: unknown property '{field}'")]
    UnknownField {
        /// Resource kind.
        kind: String,
        /// Property name.
        field: String,
    },

    /// A JSON-encoded property could not be parsed.
    #[error("{field}: {message}")]
    InvalidJson {
        /// Property name.
        field: String,
        /// Parser message.
        message: String,
    },

    /// Data bag item content lacks a usable `id`.
    #[error("content_json must have id attribute, set to a string")]
    MissingItemId,

    /// Import id does not follow the expected format.
    #[error("unexpected format of ID ({id}), expected {expected}")]
    InvalidImportId {
        /// The id that was given.
        id: String,
        /// Description of the expected format.
        expected: String,
    },

    /// The resource kind does not implement this operation.
    #[error("{kind} does not support {operation}")]
    UnsupportedOperation {
        /// Resource kind.
        kind: String,
        /// Operation name.
        operation: String,
    },

    /// An operation needs an id but none is recorded.
    #[error("{kind}: operation {operation} requires an id")]
    MissingId {
        /// Resource kind.
        kind: String,
        /// Operation name.
        operation: String,
    },

    /// The remote object does not exist.
    #[error("Cannot import non-existent remote object: {kind} '{id}'")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Requested id.
        id: String,
    },

    /// A search flagged as unique did not return exactly one row.
    #[error("query returned {total} results, expected exactly one")]
    SearchNotUnique {
        /// Number of results the server reported.
        total: u64,
    },
}

/// Result type alias for Chef resource operations.
pub type Result<T> = std::result::Result<T, ChefResourcesError>;

impl ChefResourcesError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the Chef server reported the object as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Api(ChefApiError::ApiRequestFailed {
                status: NOT_FOUND_STATUS,
                ..
            })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a key error with the given message.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl ChefApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl ResourceError {
    /// Creates an unsupported-operation error.
    #[must_use]
    pub fn unsupported(kind: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            kind: kind.into(),
            operation: operation.into(),
        }
    }

    /// Creates a JSON parse error for a property.
    #[must_use]
    pub fn invalid_json(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidJson {
            field: field.into(),
            message: message.into(),
        }
    }
}
