//! Error types for the VocalScale admin services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for store, upstream and validation failures
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidTransition,

    // Authentication errors (2xxx)
    Unauthorized,

    // Resource errors (4xxx)
    NotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Store errors (7xxx)
    QueryError,

    // External service errors (8xxx)
    UpstreamError,
    DraftGenerationFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidTransition => 1002,

            ErrorCode::Unauthorized => 2001,

            ErrorCode::NotFound => 4001,

            ErrorCode::RateLimited => 6001,

            ErrorCode::QueryError => 7001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::DraftGenerationFailed => 8002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid ticket transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Store errors
    #[error("Query rejected by store: {message}")]
    Query { message: String },

    // External service errors
    #[error("Upstream {service} unavailable: {message}")]
    Upstream { service: String, message: String },

    #[error("Draft generation failed: {message}")]
    DraftGeneration { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a store rejection
    pub fn query(message: impl Into<String>) -> Self {
        AppError::Query {
            message: message.into(),
        }
    }

    /// Shorthand for a missing entity
    pub fn not_found(resource_type: &str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.into(),
        }
    }

    /// Shorthand for an unreachable or failing upstream service
    pub fn upstream(service: &str, message: impl Into<String>) -> Self {
        AppError::Upstream {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Query { .. } => ErrorCode::QueryError,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::DraftGeneration { .. } => ErrorCode::DraftGenerationFailed,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Query { .. }
            | AppError::Upstream { .. }
            | AppError::DraftGeneration { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Rebuild an owned copy of an error that is shared between several
    /// waiters of one coalesced fetch.
    ///
    /// Variants wrapping foreign error types are flattened into the closest
    /// string-carrying variant with the same status class.
    pub fn duplicate(&self) -> AppError {
        match self {
            AppError::Validation { message, field } => AppError::Validation {
                message: message.clone(),
                field: field.clone(),
            },
            AppError::InvalidTransition { from, to } => AppError::InvalidTransition {
                from: from.clone(),
                to: to.clone(),
            },
            AppError::Unauthorized { message } => AppError::Unauthorized {
                message: message.clone(),
            },
            AppError::NotFound { resource_type, id } => AppError::NotFound {
                resource_type: resource_type.clone(),
                id: id.clone(),
            },
            AppError::RateLimited { limit } => AppError::RateLimited { limit: *limit },
            AppError::Query { message } => AppError::query(message.clone()),
            AppError::Upstream { service, message } => AppError::Upstream {
                service: service.clone(),
                message: message.clone(),
            },
            AppError::DraftGeneration { message } => AppError::DraftGeneration {
                message: message.clone(),
            },
            AppError::HttpClient(e) => AppError::upstream("http", e.to_string()),
            AppError::Internal { message } => AppError::Internal {
                message: message.clone(),
            },
            AppError::Configuration { message } => AppError::Configuration {
                message: message.clone(),
            },
            AppError::Serialization(e) => AppError::Internal {
                message: format!("Serialization error: {}", e),
            },
            AppError::Other(e) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|k| k.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("profile", "u-1");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code().as_code(), 4001);
    }

    #[test]
    fn test_query_error_carries_store_message() {
        let err = AppError::query("column calls.nope does not exist");
        assert_eq!(err.code(), ErrorCode::QueryError);
        assert!(err.to_string().contains("column calls.nope does not exist"));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "page must be >= 1".into(),
            field: Some("page".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_duplicate_keeps_kind() {
        let err = AppError::DraftGeneration {
            message: "HTTP 502".into(),
        };
        let copy = err.duplicate();
        assert_eq!(copy.code(), ErrorCode::DraftGenerationFailed);
        assert_eq!(copy.to_string(), err.to_string());

        let other = AppError::Other(anyhow::anyhow!("boom"));
        assert_eq!(other.duplicate().code(), ErrorCode::InternalError);
    }
}
